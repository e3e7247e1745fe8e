//! Store builder for flexible configuration
//!
//! This module provides a builder pattern for opening a feature store with
//! a CRS override, an attribute encoding and index settings.

use crate::config::StoreConfig;
use crate::error::Result;
use crate::storage::TextEncoding;
use crate::store::FeatureStore;
use shapestore_types::crs::Crs;
use std::path::PathBuf;

/// Builder for a [`FeatureStore`].
///
/// # Examples
///
/// ```rust,no_run
/// use shapestore::{StoreBuilder, TextEncoding};
/// use shapestore::Crs;
///
/// let store = StoreBuilder::new("data/roads.shp")
///     .crs(Crs::web_mercator())
///     .encoding(TextEncoding::Utf8)
///     .index_fanout(32)
///     .open()?;
/// # Ok::<(), shapestore::StoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct StoreBuilder {
    base: PathBuf,
    crs: Option<Crs>,
    config: StoreConfig,
}

impl StoreBuilder {
    /// Start from the store's base path, with or without the `.shp` suffix.
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base: base.into(),
            crs: None,
            config: StoreConfig::default(),
        }
    }

    /// Use `crs` instead of consulting the CRS hint file.
    pub fn crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    /// Decode attribute text with `encoding` instead of the encoding hint.
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.config.encoding = Some(encoding);
        self
    }

    /// Replace the whole configuration. Settings made earlier through the
    /// other builder methods are discarded.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn index_fanout(mut self, fanout: usize) -> Self {
        self.config.index_fanout = fanout;
        self
    }

    /// Enable or disable reading and writing the index cache file.
    pub fn index_cache(mut self, enabled: bool) -> Self {
        self.config.index_cache = enabled;
        self
    }

    pub fn default_height(mut self, height: f64) -> Self {
        self.config.default_height = Some(height);
        self
    }

    /// Open the store.
    pub fn open(self) -> Result<FeatureStore> {
        FeatureStore::open_with(self.base, self.crs, self.config)
    }
}
