//! Exact intersection test applied after the envelope filter.

use geo::Intersects;
use shapestore_types::envelope::Envelope;
use shapestore_types::geometry::Shape;

/// Whether `shape` truly intersects the query rectangle, boundaries included.
///
/// Non-finite query envelopes never match.
pub fn intersects_envelope(shape: &Shape, envelope: &Envelope) -> bool {
    if !envelope.is_finite() {
        return false;
    }
    let rect = envelope.to_rect();
    match shape {
        Shape::Point(p) => p.intersects(&rect),
        Shape::MultiPoint(mp) => mp.intersects(&rect),
        Shape::PolyLine(ml) => ml.intersects(&rect),
        Shape::Polygon(mp) => mp.intersects(&rect),
    }
}
