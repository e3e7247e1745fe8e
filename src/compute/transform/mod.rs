//! Coordinate reference system transforms.
//!
//! Every supported system reduces to longitude/latitude/height on an
//! ellipsoid, so a [`CrsTransformer`] is a short chain of
//! [`CoordinateTransform`] steps through that geographic pivot. Geographic
//! systems on different ellipsoids are bridged through geocentric
//! coordinates; no datum shift is applied.

pub mod geocentric;
pub mod mercator;

pub use geocentric::GeocentricTransform;
pub use mercator::WebMercator;

use crate::error::{Result, StoreError};
use geo::{Coord, MapCoords};
use shapestore_types::crs::{Crs, CrsKind, Ellipsoid};
use shapestore_types::envelope::Envelope;
use shapestore_types::geometry::{Geometry, Shape};

/// A coordinate triple `[x, y, height]`.
pub type Point3 = [f64; 3];

/// A reversible transform applied in place to batches of points.
pub trait CoordinateTransform: Send + Sync + std::fmt::Debug {
    fn forward(&self, points: &mut [Point3]) -> Result<()>;
    fn inverse(&self, points: &mut [Point3]) -> Result<()>;
}

#[derive(Debug)]
enum Step {
    Forward(Box<dyn CoordinateTransform>),
    Inverse(Box<dyn CoordinateTransform>),
}

impl Step {
    fn apply(&self, points: &mut [Point3]) -> Result<()> {
        match self {
            Step::Forward(t) => t.forward(points),
            Step::Inverse(t) => t.inverse(points),
        }
    }
}

/// Ellipsoid the geographic pivot of `crs` lives on.
fn pivot_ellipsoid(crs: &Crs) -> Ellipsoid {
    match crs.kind() {
        CrsKind::Geographic { ellipsoid } | CrsKind::Geocentric { ellipsoid } => *ellipsoid,
        CrsKind::WebMercator => Ellipsoid::WGS84,
    }
}

fn to_geographic(crs: &Crs, steps: &mut Vec<Step>) {
    match crs.kind() {
        CrsKind::Geographic { .. } => {}
        CrsKind::Geocentric { .. } => {
            steps.push(Step::Inverse(Box::new(GeocentricTransform::for_crs(crs))))
        }
        CrsKind::WebMercator => steps.push(Step::Inverse(Box::new(WebMercator))),
    }
}

fn from_geographic(crs: &Crs, steps: &mut Vec<Step>) {
    match crs.kind() {
        CrsKind::Geographic { .. } => {}
        CrsKind::Geocentric { .. } => {
            steps.push(Step::Forward(Box::new(GeocentricTransform::for_crs(crs))))
        }
        CrsKind::WebMercator => steps.push(Step::Forward(Box::new(WebMercator))),
    }
}

/// Transforms coordinates from one CRS to another.
///
/// # Examples
///
/// ```rust
/// use shapestore::compute::transform::CrsTransformer;
/// use shapestore::Crs;
/// use shapestore::Envelope;
///
/// let t = CrsTransformer::new(Crs::wgs84(), Crs::web_mercator());
/// let env = t.transform_envelope(&Envelope::new(-1.0, -1.0, 1.0, 1.0))?;
/// assert!(env.max_x() > 111_000.0 && env.max_x() < 112_000.0);
/// # Ok::<(), shapestore::StoreError>(())
/// ```
#[derive(Debug)]
pub struct CrsTransformer {
    source: Crs,
    target: Crs,
    steps: Vec<Step>,
}

impl CrsTransformer {
    pub fn new(source: Crs, target: Crs) -> Self {
        let mut steps = Vec::new();
        if !source.is_equivalent(&target) {
            to_geographic(&source, &mut steps);
            let from = pivot_ellipsoid(&source);
            let to = pivot_ellipsoid(&target);
            if !from.approx_eq(&to) {
                steps.push(Step::Forward(Box::new(GeocentricTransform::new(
                    from,
                    source.default_height(),
                ))));
                steps.push(Step::Inverse(Box::new(GeocentricTransform::new(
                    to,
                    target.default_height(),
                ))));
            }
            from_geographic(&target, &mut steps);
        }
        Self {
            source,
            target,
            steps,
        }
    }

    pub fn source(&self) -> &Crs {
        &self.source
    }

    pub fn target(&self) -> &Crs {
        &self.target
    }

    /// Whether source and target are the same system.
    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    /// Transform points in place.
    pub fn transform_points(&self, points: &mut [Point3]) -> Result<()> {
        for step in &self.steps {
            step.apply(points)?;
        }
        Ok(())
    }

    fn transform_xy(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let mut p = [[x, y, self.source.default_height().unwrap_or(0.0)]];
        self.transform_points(&mut p)?;
        Ok((p[0][0], p[0][1]))
    }

    /// Bounding envelope of the transformed corners and edge midpoints.
    ///
    /// The result is a bounding box in the target CRS, not the exact image
    /// of the input rectangle. Identity transforms return the input as is.
    pub fn transform_envelope(&self, envelope: &Envelope) -> Result<Envelope> {
        if self.is_identity() {
            return Ok(envelope.clone());
        }
        let mut points: Vec<Point3> = envelope
            .sample_points()
            .iter()
            .map(|&(x, y)| [x, y, self.source.default_height().unwrap_or(0.0)])
            .collect();
        self.transform_points(&mut points)?;
        Envelope::from_points(points.iter().map(|p| (p[0], p[1])))
            .map(|env| env.with_crs(self.target.clone()))
            .ok_or_else(|| {
                StoreError::Transform(format!(
                    "envelope {envelope} has no finite image in {}",
                    self.target
                ))
            })
    }

    /// Reproject every vertex of `geometry` and tag it with the target CRS.
    pub fn transform_geometry(&self, geometry: &Geometry) -> Result<Geometry> {
        if self.is_identity() {
            return Ok(Geometry::new(geometry.shape().clone()).with_crs(self.target.clone()));
        }
        let map = |c: Coord<f64>| -> Result<Coord<f64>> {
            let (x, y) = self.transform_xy(c.x, c.y)?;
            Ok(Coord { x, y })
        };
        let shape = match geometry.shape() {
            Shape::Point(p) => Shape::Point(p.try_map_coords(map)?),
            Shape::MultiPoint(mp) => Shape::MultiPoint(mp.try_map_coords(map)?),
            Shape::PolyLine(ml) => Shape::PolyLine(ml.try_map_coords(map)?),
            Shape::Polygon(mp) => Shape::Polygon(mp.try_map_coords(map)?),
        };
        Ok(Geometry::new(shape).with_crs(self.target.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    #[test]
    fn test_equivalent_crs_is_noop() {
        let t = CrsTransformer::new(Crs::wgs84(), Crs::from_code("CRS:84").unwrap());
        assert!(t.is_identity());
        let env = Envelope::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(t.transform_envelope(&env).unwrap(), env);
    }

    #[test]
    fn test_envelope_to_web_mercator_and_back() {
        let there = CrsTransformer::new(Crs::wgs84(), Crs::web_mercator());
        let back = CrsTransformer::new(Crs::web_mercator(), Crs::wgs84());
        let env = Envelope::new(5.0, 45.0, 15.0, 55.0);

        let projected = there.transform_envelope(&env).unwrap();
        assert_eq!(projected.crs().map(Crs::id), Some("EPSG:3857"));
        let restored = back.transform_envelope(&projected).unwrap();
        assert!((restored.min_x() - 5.0).abs() < 1e-7);
        assert!((restored.max_y() - 55.0).abs() < 1e-7);
    }

    #[test]
    fn test_geographic_to_geocentric_point() {
        let t = CrsTransformer::new(Crs::wgs84(), Crs::wgs84_geocentric());
        let mut pts = [[0.0, 0.0, 0.0]];
        t.transform_points(&mut pts).unwrap();
        assert!((pts[0][0] - 6_378_137.0).abs() < 1e-6);
    }

    #[test]
    fn test_ellipsoid_change_round_trip() {
        let nad27 = Crs::from_code("EPSG:4267").unwrap();
        let there = CrsTransformer::new(nad27.clone(), Crs::wgs84());
        let back = CrsTransformer::new(Crs::wgs84(), nad27);
        assert!(!there.is_identity());

        let mut pts = [[-100.0, 40.0, 0.0]];
        there.transform_points(&mut pts).unwrap();
        // Same geocentric frame, different ellipsoid: latitude shifts slightly.
        assert!((pts[0][1] - 40.0).abs() > 1e-6);
        back.transform_points(&mut pts).unwrap();
        assert!((pts[0][0] + 100.0).abs() < 1e-7);
        assert!((pts[0][1] - 40.0).abs() < 1e-7);
    }

    #[test]
    fn test_transform_geometry_tags_target() {
        let t = CrsTransformer::new(Crs::wgs84(), Crs::web_mercator());
        let g = Geometry::new(Shape::Point(Point::new(180.0, 0.0))).with_crs(Crs::wgs84());
        let out = t.transform_geometry(&g).unwrap();
        assert_eq!(out.crs().map(Crs::id), Some("EPSG:3857"));
        match out.shape() {
            Shape::Point(p) => assert!((p.x() - 20_037_508.342_789_244).abs() < 1e-6),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_transform_failure_surfaces_error() {
        let t = CrsTransformer::new(Crs::wgs84(), Crs::wgs84_geocentric());
        assert!(t.transform_envelope(&Envelope::new(0.0, 80.0, 1.0, 95.0)).is_err());
    }
}
