use serde::{Deserialize, Serialize};

/// A reference ellipsoid described by its semi-axes in meters.
///
/// # Examples
///
/// ```
/// use shapestore_types::crs::Ellipsoid;
///
/// let wgs84 = Ellipsoid::WGS84;
/// assert!((wgs84.squared_eccentricity() - 0.006_694_379_990_14).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    semi_major_axis: f64,
    semi_minor_axis: f64,
}

impl Ellipsoid {
    /// WGS 84 (a = 6378137, 1/f = 298.257223563).
    pub const WGS84: Ellipsoid = Ellipsoid {
        semi_major_axis: 6_378_137.0,
        semi_minor_axis: 6_356_752.314_245_179,
    };

    /// GRS 1980 (a = 6378137, 1/f = 298.257222101).
    pub const GRS80: Ellipsoid = Ellipsoid {
        semi_major_axis: 6_378_137.0,
        semi_minor_axis: 6_356_752.314_140_356,
    };

    /// Clarke 1866, used by NAD27.
    pub const CLARKE_1866: Ellipsoid = Ellipsoid {
        semi_major_axis: 6_378_206.4,
        semi_minor_axis: 6_356_583.8,
    };

    /// Sphere with the WGS 84 semi-major axis, used by web Mercator.
    pub const WEB_SPHERE: Ellipsoid = Ellipsoid {
        semi_major_axis: 6_378_137.0,
        semi_minor_axis: 6_378_137.0,
    };

    pub fn new(semi_major_axis: f64, semi_minor_axis: f64) -> Self {
        Self {
            semi_major_axis,
            semi_minor_axis,
        }
    }

    /// Build an ellipsoid from a semi-major axis and inverse flattening.
    ///
    /// An inverse flattening of zero describes a sphere, which is how WKT
    /// writes spherical datums.
    pub fn from_inverse_flattening(semi_major_axis: f64, inverse_flattening: f64) -> Self {
        let semi_minor_axis = if inverse_flattening == 0.0 {
            semi_major_axis
        } else {
            semi_major_axis * (1.0 - 1.0 / inverse_flattening)
        };
        Self::new(semi_major_axis, semi_minor_axis)
    }

    pub fn semi_major_axis(&self) -> f64 {
        self.semi_major_axis
    }

    pub fn semi_minor_axis(&self) -> f64 {
        self.semi_minor_axis
    }

    /// First eccentricity squared, `(a² - b²) / a²`.
    pub fn squared_eccentricity(&self) -> f64 {
        let a2 = self.semi_major_axis * self.semi_major_axis;
        let b2 = self.semi_minor_axis * self.semi_minor_axis;
        (a2 - b2) / a2
    }

    /// Second eccentricity squared, `(a² - b²) / b²`.
    pub fn second_squared_eccentricity(&self) -> f64 {
        let a2 = self.semi_major_axis * self.semi_major_axis;
        let b2 = self.semi_minor_axis * self.semi_minor_axis;
        (a2 - b2) / b2
    }

    /// Equal within a millimeter on both axes.
    pub fn approx_eq(&self, other: &Ellipsoid) -> bool {
        (self.semi_major_axis - other.semi_major_axis).abs() < 1e-3
            && (self.semi_minor_axis - other.semi_minor_axis).abs() < 1e-3
    }
}

/// The coordinate space a [`Crs`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CrsKind {
    /// Longitude/latitude in degrees on an ellipsoid.
    Geographic { ellipsoid: Ellipsoid },
    /// Earth-centered Cartesian x/y/z in meters.
    Geocentric { ellipsoid: Ellipsoid },
    /// Spherical ("pseudo") Mercator in meters.
    WebMercator,
}

/// A resolved coordinate reference system.
///
/// Only the handful of systems the store needs for reprojection are modelled:
/// geographic, geocentric and web Mercator. Identity is carried by `id`
/// (for example `EPSG:4326`), equivalence by [`Crs::is_equivalent`].
///
/// # Examples
///
/// ```
/// use shapestore_types::crs::Crs;
///
/// let a = Crs::from_code("EPSG:4326").unwrap();
/// let b = Crs::from_code("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap();
/// assert!(a.is_equivalent(&b));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    id: String,
    kind: CrsKind,
    /// Present when the system carries a vertical axis; holds the height
    /// substituted for points without one.
    #[serde(default)]
    default_height: Option<f64>,
}

impl Crs {
    pub fn new(id: impl Into<String>, kind: CrsKind) -> Self {
        Self {
            id: id.into(),
            kind,
            default_height: None,
        }
    }

    /// WGS 84 geographic, the fallback for stores without a CRS hint.
    pub fn wgs84() -> Self {
        Self::new(
            "EPSG:4326",
            CrsKind::Geographic {
                ellipsoid: Ellipsoid::WGS84,
            },
        )
    }

    /// WGS 84 geocentric.
    pub fn wgs84_geocentric() -> Self {
        Self::new(
            "EPSG:4978",
            CrsKind::Geocentric {
                ellipsoid: Ellipsoid::WGS84,
            },
        )
    }

    pub fn web_mercator() -> Self {
        Self::new("EPSG:3857", CrsKind::WebMercator)
    }

    /// Mark this system as carrying heights, defaulting missing ones to `height`.
    pub fn with_default_height(mut self, height: f64) -> Self {
        self.default_height = Some(height);
        self
    }

    /// Resolve an authority code such as `EPSG:4326`, `CRS:84`,
    /// `urn:ogc:def:crs:EPSG::3857` or
    /// `http://www.opengis.net/def/crs/EPSG/0/4326`.
    pub fn from_code(code: &str) -> Option<Self> {
        let (authority, number) = split_code(code)?;
        let crs = match (authority.as_str(), number.as_str()) {
            ("EPSG", "4326") => Self::wgs84(),
            ("CRS", "84") | ("OGC", "CRS84") => Self::new(
                "CRS:84",
                CrsKind::Geographic {
                    ellipsoid: Ellipsoid::WGS84,
                },
            ),
            ("EPSG", "4258") => Self::new(
                "EPSG:4258",
                CrsKind::Geographic {
                    ellipsoid: Ellipsoid::GRS80,
                },
            ),
            ("EPSG", "4269") => Self::new(
                "EPSG:4269",
                CrsKind::Geographic {
                    ellipsoid: Ellipsoid::GRS80,
                },
            ),
            ("EPSG", "4267") => Self::new(
                "EPSG:4267",
                CrsKind::Geographic {
                    ellipsoid: Ellipsoid::CLARKE_1866,
                },
            ),
            ("EPSG", "4978") => Self::wgs84_geocentric(),
            ("EPSG", "3857") | ("EPSG", "900913") | ("EPSG", "3785") | ("EPSG", "102100")
            | ("ESRI", "102100") => Self::web_mercator(),
            _ => return None,
        };
        Some(crs)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &CrsKind {
        &self.kind
    }

    pub fn default_height(&self) -> Option<f64> {
        self.default_height
    }

    pub fn has_height(&self) -> bool {
        self.default_height.is_some()
    }

    /// The ellipsoid coordinates are referenced to.
    pub fn ellipsoid(&self) -> Ellipsoid {
        match self.kind {
            CrsKind::Geographic { ellipsoid } | CrsKind::Geocentric { ellipsoid } => ellipsoid,
            CrsKind::WebMercator => Ellipsoid::WEB_SPHERE,
        }
    }

    /// Same system by identifier or by definition.
    ///
    /// Aliases such as `EPSG:4326` and `CRS:84` resolve to the same kind and
    /// therefore compare equivalent; axis order is not modelled.
    pub fn is_equivalent(&self, other: &Crs) -> bool {
        if self.id.eq_ignore_ascii_case(&other.id) {
            return true;
        }
        match (&self.kind, &other.kind) {
            (CrsKind::Geographic { ellipsoid: a }, CrsKind::Geographic { ellipsoid: b })
            | (CrsKind::Geocentric { ellipsoid: a }, CrsKind::Geocentric { ellipsoid: b }) => {
                a.approx_eq(b)
            }
            (CrsKind::WebMercator, CrsKind::WebMercator) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Split a code into upper-cased `(authority, code)`.
fn split_code(code: &str) -> Option<(String, String)> {
    let code = code.trim();
    if code.is_empty() {
        return None;
    }
    let upper = code.to_ascii_uppercase();

    if let Some(rest) = upper
        .strip_prefix("HTTP://WWW.OPENGIS.NET/DEF/CRS/")
        .or_else(|| upper.strip_prefix("HTTPS://WWW.OPENGIS.NET/DEF/CRS/"))
    {
        // AUTHORITY/VERSION/CODE
        let mut parts = rest.split('/');
        let authority = parts.next()?;
        let number = parts.last()?;
        return Some((authority.to_string(), number.to_string()));
    }

    if let Some(rest) = upper.strip_prefix("URN:OGC:DEF:CRS:") {
        // AUTHORITY:[VERSION]:CODE
        let authority = rest.split(':').next()?;
        let number = rest.rsplit(':').next()?;
        return Some((authority.to_string(), number.to_string()));
    }

    let (authority, number) = upper.split_once(':')?;
    Some((authority.trim().to_string(), number.trim().to_string()))
}
