//! Store configuration.

use crate::compute::spatial::rtree::DEFAULT_FANOUT;
use crate::error::{Result, StoreError};
use crate::storage::TextEncoding;
use serde::de::Error;
use serde::{Deserialize, Serialize};
use shapestore_types::crs::Crs;

/// Bounds accepted for [`StoreConfig::index_fanout`].
pub const FANOUT_RANGE: std::ops::RangeInclusive<usize> = 2..=1024;

/// Tunables for opening a [`FeatureStore`](crate::FeatureStore).
///
/// # Examples
///
/// ```rust
/// use shapestore::StoreConfig;
///
/// let config = StoreConfig::from_json(r#"{ "index_fanout": 32, "index_cache": false }"#).unwrap();
/// assert_eq!(config.index_fanout, 32);
/// assert_eq!(config.default_crs, "EPSG:4326");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Children per index node (2-1024, default: 16)
    #[serde(default = "StoreConfig::default_index_fanout")]
    pub index_fanout: usize,

    /// Whether the index cache file is read and written
    #[serde(default = "StoreConfig::default_index_cache")]
    pub index_cache: bool,

    /// CRS code used when the store has no readable CRS hint
    #[serde(default = "StoreConfig::default_crs")]
    pub default_crs: String,

    /// Attribute text encoding; `None` uses the encoding hint file, else ISO-8859-1
    #[serde(default)]
    pub encoding: Option<TextEncoding>,

    /// When set, the store CRS carries heights and 2D input is lifted to this value
    #[serde(default)]
    pub default_height: Option<f64>,
}

impl StoreConfig {
    const fn default_index_fanout() -> usize {
        DEFAULT_FANOUT
    }

    const fn default_index_cache() -> bool {
        true
    }

    fn default_crs() -> String {
        "EPSG:4326".to_string()
    }

    pub fn with_index_fanout(mut self, fanout: usize) -> Self {
        self.index_fanout = fanout;
        self
    }

    pub fn with_index_cache(mut self, enabled: bool) -> Self {
        self.index_cache = enabled;
        self
    }

    pub fn with_default_crs(mut self, code: impl Into<String>) -> Self {
        self.default_crs = code.into();
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_default_height(mut self, height: f64) -> Self {
        self.default_height = Some(height);
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !FANOUT_RANGE.contains(&self.index_fanout) {
            return Err(format!(
                "Index fanout must be between {} and {}, got {}",
                FANOUT_RANGE.start(),
                FANOUT_RANGE.end(),
                self.index_fanout
            ));
        }

        if Crs::from_code(&self.default_crs).is_none() {
            return Err(format!("Unknown default CRS {:?}", self.default_crs));
        }

        if let Some(h) = self.default_height
            && !h.is_finite()
        {
            return Err("Default height must be finite".to_string());
        }

        Ok(())
    }

    /// [`StoreConfig::validate`] mapped into the crate error type.
    pub(crate) fn check(&self) -> Result<()> {
        self.validate().map_err(StoreError::InvalidConfig)
    }

    /// The fallback CRS, with the configured default height applied.
    pub fn fallback_crs(&self) -> Result<Crs> {
        let crs = Crs::from_code(&self.default_crs).ok_or_else(|| {
            StoreError::InvalidConfig(format!("Unknown default CRS {:?}", self.default_crs))
        })?;
        Ok(self.apply_height(crs))
    }

    pub(crate) fn apply_height(&self, crs: Crs) -> Crs {
        match self.default_height {
            Some(h) => crs.with_default_height(h),
            None => crs,
        }
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: StoreConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        let config: StoreConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index_fanout: Self::default_index_fanout(),
            index_cache: Self::default_index_cache(),
            default_crs: Self::default_crs(),
            encoding: None,
            default_height: None,
        }
    }
}
