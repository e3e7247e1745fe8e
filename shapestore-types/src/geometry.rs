use crate::crs::Crs;
use crate::envelope::Envelope;
use geo::{BoundingRect, MultiLineString, MultiPoint, MultiPolygon, Point};
use serde::{Deserialize, Serialize};

/// The geometry payload of one record, decoded once per read.
///
/// Variants follow the record kinds of the geometry file: points, multipoints,
/// polylines (one or more parts) and polygons (one or more shells with holes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Point(Point<f64>),
    MultiPoint(MultiPoint<f64>),
    PolyLine(MultiLineString<f64>),
    Polygon(MultiPolygon<f64>),
}

impl Shape {
    /// Bounding envelope, `None` for a shape without coordinates.
    pub fn envelope(&self) -> Option<Envelope> {
        let rect = match self {
            Shape::Point(p) => Some(p.bounding_rect()),
            Shape::MultiPoint(mp) => mp.bounding_rect(),
            Shape::PolyLine(ml) => ml.bounding_rect(),
            Shape::Polygon(mp) => mp.bounding_rect(),
        };
        rect.map(Envelope::from_rect)
    }

    pub fn to_geo(&self) -> geo::Geometry<f64> {
        match self {
            Shape::Point(p) => geo::Geometry::Point(*p),
            Shape::MultiPoint(mp) => geo::Geometry::MultiPoint(mp.clone()),
            Shape::PolyLine(ml) => geo::Geometry::MultiLineString(ml.clone()),
            Shape::Polygon(mp) => geo::Geometry::MultiPolygon(mp.clone()),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Point(_) => "Point",
            Shape::MultiPoint(_) => "MultiPoint",
            Shape::PolyLine(_) => "PolyLine",
            Shape::Polygon(_) => "Polygon",
        }
    }
}

/// A shape tagged with the CRS its coordinates are expressed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    shape: Shape,
    #[serde(default)]
    crs: Option<Crs>,
}

impl Geometry {
    pub fn new(shape: Shape) -> Self {
        Self { shape, crs: None }
    }

    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn into_shape(self) -> Shape {
        self.shape
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Envelope tagged with this geometry's CRS.
    pub fn envelope(&self) -> Option<Envelope> {
        self.shape
            .envelope()
            .map(|env| env.with_crs_opt(self.crs.clone()))
    }
}

impl From<Shape> for Geometry {
    fn from(shape: Shape) -> Self {
        Geometry::new(shape)
    }
}
