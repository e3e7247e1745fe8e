use crate::crs::Crs;
use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box, optionally tagged with its CRS.
///
/// Envelopes are closed: two envelopes sharing only a boundary edge or a
/// corner intersect. Construction normalizes the corners so that
/// `min <= max` holds on both axes.
///
/// # Examples
///
/// ```
/// use shapestore_types::envelope::Envelope;
///
/// let a = Envelope::new(0.0, 0.0, 10.0, 10.0);
/// let b = Envelope::new(10.0, 10.0, 20.0, 20.0);
/// assert!(a.intersects(&b));
/// assert_eq!(a.union(&b), Envelope::new(0.0, 0.0, 20.0, 20.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    #[serde(default)]
    crs: Option<Crs>,
}

impl Envelope {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let (min_x, max_x) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (min_y, max_y) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            crs: None,
        }
    }

    /// Tag the envelope with a CRS.
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    /// Replace the CRS tag (or clear it).
    pub fn with_crs_opt(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    /// Bounding envelope of a set of points, `None` when the set is empty or
    /// contains no finite coordinate.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut acc: Option<Envelope> = None;
        for (x, y) in points {
            if !(x.is_finite() && y.is_finite()) {
                continue;
            }
            acc = Some(match acc {
                Some(env) => env.expand_to_include(x, y),
                None => Envelope::new(x, y, x, y),
            });
        }
        acc
    }

    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
        )
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    /// Closed-interval intersection test; touching boundaries intersect.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Whether `other` lies entirely inside this envelope (boundary included).
    pub fn contains(&self, other: &Envelope) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Smallest envelope covering both. Keeps this envelope's CRS tag.
    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
            crs: self.crs.clone(),
        }
    }

    pub fn expand_to_include(&self, x: f64, y: f64) -> Envelope {
        Envelope {
            min_x: self.min_x.min(x),
            min_y: self.min_y.min(y),
            max_x: self.max_x.max(x),
            max_y: self.max_y.max(y),
            crs: self.crs.clone(),
        }
    }

    /// Grow (or shrink, for negative deltas) by `dx`/`dy` on each side.
    pub fn inflate(&self, dx: f64, dy: f64) -> Envelope {
        Envelope::new(
            self.min_x - dx,
            self.min_y - dy,
            self.max_x + dx,
            self.max_y + dy,
        )
        .with_crs_opt(self.crs.clone())
    }

    /// The four corners followed by the four edge midpoints.
    pub fn sample_points(&self) -> [(f64, f64); 8] {
        let (cx, cy) = self.center();
        [
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
            (cx, self.min_y),
            (self.max_x, cy),
            (cx, self.max_y),
            (self.min_x, cy),
        ]
    }

    /// Bounds only, ignoring the CRS tag.
    pub fn same_bounds(&self, other: &Envelope) -> bool {
        self.min_x == other.min_x
            && self.min_y == other.min_y
            && self.max_x == other.max_x
            && self.max_y == other.max_y
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Envelope({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )?;
        if let Some(crs) = &self.crs {
            write!(f, " [{}]", crs)?;
        }
        Ok(())
    }
}
