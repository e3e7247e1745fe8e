//! Reader for the binary geometry file (ESRI shape layout).
//!
//! The file starts with a 100-byte header: big-endian file code and length
//! (in 16-bit words), then little-endian version, shape type and the global
//! bounding box. Records follow, each with a big-endian record number and
//! content length (again in 16-bit words) and a little-endian payload that
//! starts with the record's shape type.
//!
//! The whole file is loaded into an immutable [`Bytes`] buffer on open, so a
//! reader is a consistent snapshot that any number of threads can fetch from.

use crate::compute::spatial::rtree::{Bounds, IndexEntry};
use crate::error::{FileKind, Result, StoreError};
use bytes::{Buf, Bytes};
use geo::{Contains, Coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Winding};
use shapestore_types::envelope::Envelope;
use shapestore_types::feature::RecordId;
use shapestore_types::geometry::{Geometry, Shape};
use smallvec::SmallVec;
use std::path::{Path, PathBuf};

pub const FILE_CODE: i32 = 9994;
pub const FILE_VERSION: i32 = 1000;
pub const HEADER_LEN: usize = 100;
pub const RECORD_HEADER_LEN: usize = 8;

/// Geometry kind codes of the shape format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
}

/// The payload layout shared by a kind and its Z/M variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Null,
    Point,
    MultiPoint,
    Parts { polygon: bool },
}

impl ShapeType {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::PolyLine,
            5 => ShapeType::Polygon,
            8 => ShapeType::MultiPoint,
            11 => ShapeType::PointZ,
            13 => ShapeType::PolyLineZ,
            15 => ShapeType::PolygonZ,
            18 => ShapeType::MultiPointZ,
            21 => ShapeType::PointM,
            23 => ShapeType::PolyLineM,
            25 => ShapeType::PolygonM,
            28 => ShapeType::MultiPointM,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        match self {
            ShapeType::Null => 0,
            ShapeType::Point => 1,
            ShapeType::PolyLine => 3,
            ShapeType::Polygon => 5,
            ShapeType::MultiPoint => 8,
            ShapeType::PointZ => 11,
            ShapeType::PolyLineZ => 13,
            ShapeType::PolygonZ => 15,
            ShapeType::MultiPointZ => 18,
            ShapeType::PointM => 21,
            ShapeType::PolyLineM => 23,
            ShapeType::PolygonM => 25,
            ShapeType::MultiPointM => 28,
        }
    }

    fn layout(self) -> Layout {
        match self {
            ShapeType::Null => Layout::Null,
            ShapeType::Point | ShapeType::PointZ | ShapeType::PointM => Layout::Point,
            ShapeType::MultiPoint | ShapeType::MultiPointZ | ShapeType::MultiPointM => {
                Layout::MultiPoint
            }
            ShapeType::PolyLine | ShapeType::PolyLineZ | ShapeType::PolyLineM => {
                Layout::Parts { polygon: false }
            }
            ShapeType::Polygon | ShapeType::PolygonZ | ShapeType::PolygonM => {
                Layout::Parts { polygon: true }
            }
        }
    }

    /// Smallest content length (type code included) a non-null record of
    /// this kind can have.
    fn min_content_len(self) -> usize {
        match self.layout() {
            Layout::Null => 4,
            Layout::Point => 20,
            Layout::MultiPoint => 40,
            Layout::Parts { .. } => 44,
        }
    }
}

/// Decoded file header.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeHeader {
    /// Declared file length in bytes
    pub file_length: usize,
    pub version: i32,
    pub shape_type: ShapeType,
    pub envelope: Envelope,
}

/// Decode the fixed 100-byte header.
pub fn decode_header(bytes: &[u8]) -> Result<ShapeHeader> {
    if bytes.len() < HEADER_LEN {
        return Err(StoreError::format(
            FileKind::Geometry,
            format!("header needs {HEADER_LEN} bytes, file has {}", bytes.len()),
        ));
    }
    let mut buf = &bytes[..HEADER_LEN];

    let file_code = buf.get_i32();
    if file_code != FILE_CODE {
        return Err(StoreError::format(
            FileKind::Geometry,
            format!("unexpected file code {file_code}"),
        ));
    }
    buf.advance(20);
    let file_length = buf.get_i32();
    if file_length < (HEADER_LEN / 2) as i32 {
        return Err(StoreError::format(
            FileKind::Geometry,
            format!("declared length {file_length} words is shorter than the header"),
        ));
    }
    let version = buf.get_i32_le();
    let code = buf.get_i32_le();
    let shape_type = ShapeType::from_code(code).ok_or_else(|| {
        StoreError::format(FileKind::Geometry, format!("unsupported geometry kind {code}"))
    })?;
    let min_x = buf.get_f64_le();
    let min_y = buf.get_f64_le();
    let max_x = buf.get_f64_le();
    let max_y = buf.get_f64_le();

    Ok(ShapeHeader {
        file_length: file_length as usize * 2,
        version,
        shape_type,
        envelope: Envelope::new(min_x, min_y, max_x, max_y),
    })
}

fn ensure(buf: &[u8], needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(StoreError::format(
            FileKind::Geometry,
            format!("{what} needs {needed} bytes, record has {}", buf.remaining()),
        ));
    }
    Ok(())
}

fn read_count(buf: &mut &[u8], what: &str) -> Result<usize> {
    ensure(*buf, 4, what)?;
    let n = buf.get_i32_le();
    if n < 0 {
        return Err(StoreError::format(
            FileKind::Geometry,
            format!("negative {what} {n}"),
        ));
    }
    Ok(n as usize)
}

fn read_coords(buf: &mut &[u8], count: usize) -> Result<Vec<Coord<f64>>> {
    ensure(*buf, count.saturating_mul(16), "point array")?;
    Ok((0..count)
        .map(|_| {
            let x = buf.get_f64_le();
            let y = buf.get_f64_le();
            Coord { x, y }
        })
        .collect())
}

/// Decode one record's content into a shape.
///
/// `bytes` starts at the record content (the shape type code) and `length`
/// is the content length the record header declares. Decoding never looks
/// past `length`, and any bytes left over after the payload are ignored.
/// Returns `Ok(None)` for a null record. Z and M ordinates are skipped.
pub fn decode_shape(bytes: &[u8], length: usize) -> Result<Option<Shape>> {
    if bytes.len() < length {
        return Err(StoreError::format(
            FileKind::Geometry,
            format!("record declares {length} bytes but only {} remain", bytes.len()),
        ));
    }
    let mut buf = &bytes[..length];
    ensure(buf, 4, "shape type")?;
    let code = buf.get_i32_le();
    let shape_type = ShapeType::from_code(code).ok_or_else(|| {
        StoreError::format(FileKind::Geometry, format!("unsupported geometry kind {code}"))
    })?;

    match shape_type.layout() {
        Layout::Null => Ok(None),
        Layout::Point => {
            ensure(buf, 16, "point")?;
            let x = buf.get_f64_le();
            let y = buf.get_f64_le();
            Ok(Some(Shape::Point(Point::new(x, y))))
        }
        Layout::MultiPoint => {
            ensure(buf, 32, "bounding box")?;
            buf.advance(32);
            let count = read_count(&mut buf, "point count")?;
            let coords = read_coords(&mut buf, count)?;
            Ok(Some(Shape::MultiPoint(MultiPoint::new(
                coords.into_iter().map(Point::from).collect(),
            ))))
        }
        Layout::Parts { polygon } => {
            ensure(buf, 32, "bounding box")?;
            buf.advance(32);
            let num_parts = read_count(&mut buf, "part count")?;
            let num_points = read_count(&mut buf, "point count")?;
            ensure(buf, num_parts.saturating_mul(4), "part offsets")?;

            let mut starts: SmallVec<[usize; 8]> = SmallVec::with_capacity(num_parts);
            for _ in 0..num_parts {
                let start = buf.get_i32_le();
                let previous = starts.last().copied().unwrap_or(0);
                if start < 0 || start as usize >= num_points.max(1) || (start as usize) < previous {
                    return Err(StoreError::format(
                        FileKind::Geometry,
                        format!("part offset {start} out of order or beyond {num_points} points"),
                    ));
                }
                starts.push(start as usize);
            }

            let coords = read_coords(&mut buf, num_points)?;
            let parts: Vec<LineString<f64>> = starts
                .iter()
                .enumerate()
                .map(|(i, &start)| {
                    let end = starts.get(i + 1).copied().unwrap_or(num_points);
                    LineString::new(coords[start..end].to_vec())
                })
                .collect();

            if polygon {
                Ok(Some(Shape::Polygon(assemble_polygons(parts))))
            } else {
                Ok(Some(Shape::PolyLine(MultiLineString::new(parts))))
            }
        }
    }
}

/// Group rings into polygons: clockwise rings are shells, counter-clockwise
/// rings are holes of the first shell that contains them. A hole no shell
/// contains is promoted to a shell of its own.
fn assemble_polygons(rings: Vec<LineString<f64>>) -> MultiPolygon<f64> {
    let mut shells: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for ring in rings {
        if ring.0.is_empty() {
            continue;
        }
        if ring.is_ccw() {
            holes.push(ring);
        } else {
            shells.push((ring, Vec::new()));
        }
    }

    for hole in holes {
        let owner = shells.iter().position(|(shell, _)| {
            Polygon::new(shell.clone(), Vec::new()).contains(&hole)
                || ring_bounds_contain(shell, &hole)
        });
        match owner {
            Some(i) => shells[i].1.push(hole),
            None => shells.push((hole, Vec::new())),
        }
    }

    MultiPolygon::new(
        shells
            .into_iter()
            .map(|(exterior, interiors)| Polygon::new(exterior, interiors))
            .collect(),
    )
}

fn ring_bounds_contain(outer: &LineString<f64>, inner: &LineString<f64>) -> bool {
    let outer = Envelope::from_points(outer.coords().map(|c| (c.x, c.y)));
    let inner = Envelope::from_points(inner.coords().map(|c| (c.x, c.y)));
    match (outer, inner) {
        (Some(o), Some(i)) => o.contains(&i) && !o.same_bounds(&i),
        _ => false,
    }
}

/// Location of one record's content within the file buffer.
#[derive(Debug, Clone, Copy)]
struct RecordSlot {
    offset: usize,
    length: usize,
    null: bool,
}

/// An open geometry file.
pub struct ShapeReader {
    path: Option<PathBuf>,
    data: Bytes,
    header: ShapeHeader,
    records: Vec<RecordSlot>,
}

impl ShapeReader {
    /// Load and validate the geometry file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| StoreError::io_at(path, e))?;
        let mut reader = Self::from_bytes(Bytes::from(data))?;
        reader.path = Some(path.to_path_buf());
        log::debug!(
            "Opened geometry file {} ({} records, kind {:?})",
            path.display(),
            reader.len(),
            reader.header.shape_type
        );
        Ok(reader)
    }

    /// Parse a geometry file held in memory.
    ///
    /// Record boundaries come from the declared content lengths alone; every
    /// non-null record must carry the file's geometry kind.
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        let header = decode_header(&data)?;
        let end = if header.file_length > data.len() {
            log::warn!(
                "Geometry file declares {} bytes but holds {}; reading what is present",
                header.file_length,
                data.len()
            );
            data.len()
        } else {
            header.file_length
        };

        let mut records = Vec::new();
        let mut pos = HEADER_LEN;
        while pos + RECORD_HEADER_LEN <= end {
            let mut rh = &data[pos..pos + RECORD_HEADER_LEN];
            let number = rh.get_i32();
            let words = rh.get_i32();
            if words < 0 {
                return Err(StoreError::format(
                    FileKind::Geometry,
                    format!("record {number} has negative length"),
                ));
            }
            let offset = pos + RECORD_HEADER_LEN;
            let length = words as usize * 2;
            if offset + length > end {
                return Err(StoreError::format(
                    FileKind::Geometry,
                    format!("record {number} runs past the end of the file"),
                ));
            }
            if number as usize != records.len() + 1 {
                log::trace!(
                    "Record number {} at position {} (expected {})",
                    number,
                    records.len(),
                    records.len() + 1
                );
            }

            let content = &data[offset..offset + length];
            if content.len() < 4 {
                return Err(StoreError::format(
                    FileKind::Geometry,
                    format!("record {number} is too short to hold a geometry kind"),
                ));
            }
            let code = i32::from_le_bytes([content[0], content[1], content[2], content[3]]);
            let kind = ShapeType::from_code(code).ok_or_else(|| {
                StoreError::format(FileKind::Geometry, format!("unsupported geometry kind {code}"))
            })?;
            let null = kind == ShapeType::Null;
            if !null {
                if kind != header.shape_type {
                    return Err(StoreError::format(
                        FileKind::Geometry,
                        format!(
                            "record {number} has kind {:?} in a {:?} file",
                            kind, header.shape_type
                        ),
                    ));
                }
                if length < kind.min_content_len() {
                    return Err(StoreError::format(
                        FileKind::Geometry,
                        format!("record {number} is too short for a {kind:?}"),
                    ));
                }
            }

            records.push(RecordSlot {
                offset,
                length,
                null,
            });
            pos = offset + length;
        }

        Ok(Self {
            path: None,
            data,
            header,
            records,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn header(&self) -> &ShapeHeader {
        &self.header
    }

    pub fn shape_type(&self) -> ShapeType {
        self.header.shape_type
    }

    /// Number of records, null records included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The bounding box the header declares for the whole file.
    pub fn global_envelope(&self) -> Envelope {
        self.header.envelope.clone()
    }

    /// Whether `id` names a record that carries a geometry.
    pub fn has_geometry(&self, id: RecordId) -> bool {
        self.records
            .get(id as usize)
            .is_some_and(|slot| !slot.null)
    }

    /// Decode the geometry of record `id`.
    ///
    /// Out-of-range ids and null records are [`StoreError::NotFound`].
    pub fn fetch(&self, id: RecordId) -> Result<Geometry> {
        let slot = self
            .records
            .get(id as usize)
            .filter(|slot| !slot.null)
            .ok_or(StoreError::NotFound(id))?;
        let content = &self.data[slot.offset..slot.offset + slot.length];
        decode_shape(content, slot.length)?
            .map(Geometry::new)
            .ok_or(StoreError::NotFound(id))
    }

    /// Per-record bounding boxes for index construction, in file order.
    ///
    /// Reads only the bounding box each record stores, not the full
    /// payload. Null records and records with non-finite boxes are skipped.
    pub fn read_envelopes(&self) -> impl Iterator<Item = IndexEntry> + '_ {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.null)
            .filter_map(|(i, slot)| {
                let mut buf = &self.data[slot.offset + 4..slot.offset + slot.length];
                let bounds = match self.header.shape_type.layout() {
                    Layout::Point => {
                        let x = buf.get_f64_le();
                        let y = buf.get_f64_le();
                        Bounds::new(x, y, x, y)
                    }
                    _ => {
                        let min_x = buf.get_f64_le();
                        let min_y = buf.get_f64_le();
                        let max_x = buf.get_f64_le();
                        let max_y = buf.get_f64_le();
                        Bounds::new(min_x, min_y, max_x, max_y)
                    }
                };
                if bounds.is_finite() {
                    Some(IndexEntry::new(i as RecordId, bounds))
                } else {
                    log::debug!("Skipping record {} with a non-finite bounding box", i);
                    None
                }
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    /// Build a complete geometry file from record contents (type code included).
    pub(crate) fn build_file(shape_type: i32, bbox: [f64; 4], contents: &[Vec<u8>]) -> Bytes {
        let body_len: usize = contents.iter().map(|c| RECORD_HEADER_LEN + c.len()).sum();
        let total = HEADER_LEN + body_len;
        let mut buf = BytesMut::with_capacity(total);
        buf.put_i32(FILE_CODE);
        buf.put_bytes(0, 20);
        buf.put_i32((total / 2) as i32);
        buf.put_i32_le(FILE_VERSION);
        buf.put_i32_le(shape_type);
        for v in bbox {
            buf.put_f64_le(v);
        }
        buf.put_bytes(0, 32);
        for (i, content) in contents.iter().enumerate() {
            buf.put_i32(i as i32 + 1);
            buf.put_i32((content.len() / 2) as i32);
            buf.put_slice(content);
        }
        buf.freeze()
    }

    pub(crate) fn point_content(x: f64, y: f64) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_i32_le(1);
        buf.put_f64_le(x);
        buf.put_f64_le(y);
        buf.to_vec()
    }

    fn parts_content(code: i32, parts: &[&[(f64, f64)]]) -> Vec<u8> {
        let coords: Vec<(f64, f64)> = parts.iter().flat_map(|p| p.iter().copied()).collect();
        let env = Envelope::from_points(coords.iter().copied()).unwrap();
        let mut buf = BytesMut::new();
        buf.put_i32_le(code);
        buf.put_f64_le(env.min_x());
        buf.put_f64_le(env.min_y());
        buf.put_f64_le(env.max_x());
        buf.put_f64_le(env.max_y());
        buf.put_i32_le(parts.len() as i32);
        buf.put_i32_le(coords.len() as i32);
        let mut start = 0;
        for part in parts {
            buf.put_i32_le(start);
            start += part.len() as i32;
        }
        for (x, y) in coords {
            buf.put_f64_le(x);
            buf.put_f64_le(y);
        }
        buf.to_vec()
    }

    #[test]
    fn test_decode_point_record() {
        let content = point_content(3.5, -2.0);
        let shape = decode_shape(&content, content.len()).unwrap().unwrap();
        assert_eq!(shape, Shape::Point(Point::new(3.5, -2.0)));
    }

    #[test]
    fn test_decode_null_record() {
        let content = 0i32.to_le_bytes();
        assert_eq!(decode_shape(&content, 4).unwrap(), None);
    }

    #[test]
    fn test_decode_respects_declared_length() {
        let content = point_content(1.0, 1.0);
        // Declared length cuts the payload short
        let err = decode_shape(&content, 12).unwrap_err();
        assert!(matches!(err, StoreError::Format { .. }));

        // Trailing bytes beyond the payload are ignored
        let mut padded = content.clone();
        padded.extend_from_slice(&[0xAA; 8]);
        let shape = decode_shape(&padded, padded.len()).unwrap().unwrap();
        assert_eq!(shape, Shape::Point(Point::new(1.0, 1.0)));

        // Declared length larger than the slice
        assert!(decode_shape(&content, content.len() + 8).is_err());
    }

    #[test]
    fn test_decode_pointz_skips_z() {
        let mut buf = BytesMut::new();
        buf.put_i32_le(11);
        buf.put_f64_le(1.0);
        buf.put_f64_le(2.0);
        buf.put_f64_le(99.0);
        buf.put_f64_le(0.0);
        let shape = decode_shape(&buf, buf.len()).unwrap().unwrap();
        assert_eq!(shape, Shape::Point(Point::new(1.0, 2.0)));
    }

    #[test]
    fn test_decode_polyline_parts() {
        let content = parts_content(3, &[&[(0.0, 0.0), (1.0, 1.0)], &[(5.0, 5.0), (6.0, 5.0), (7.0, 4.0)]]);
        let Shape::PolyLine(ml) = decode_shape(&content, content.len()).unwrap().unwrap() else {
            panic!("expected polyline");
        };
        assert_eq!(ml.0.len(), 2);
        assert_eq!(ml.0[0].0.len(), 2);
        assert_eq!(ml.0[1].0.len(), 3);
    }

    #[test]
    fn test_decode_polygon_with_hole() {
        // Clockwise shell, counter-clockwise hole
        let shell: &[(f64, f64)] = &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)];
        let hole: &[(f64, f64)] = &[(2.0, 2.0), (4.0, 2.0), (4.0, 4.0), (2.0, 4.0), (2.0, 2.0)];
        let content = parts_content(5, &[shell, hole]);
        let Shape::Polygon(mp) = decode_shape(&content, content.len()).unwrap().unwrap() else {
            panic!("expected polygon");
        };
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
    }

    #[test]
    fn test_decode_two_shells() {
        let a: &[(f64, f64)] = &[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)];
        let b: &[(f64, f64)] = &[(5.0, 5.0), (5.0, 6.0), (6.0, 6.0), (6.0, 5.0), (5.0, 5.0)];
        let content = parts_content(5, &[a, b]);
        let Shape::Polygon(mp) = decode_shape(&content, content.len()).unwrap().unwrap() else {
            panic!("expected polygon");
        };
        assert_eq!(mp.0.len(), 2);
    }

    #[test]
    fn test_decode_rejects_bad_part_offsets() {
        let mut content = parts_content(3, &[&[(0.0, 0.0), (1.0, 1.0)]]);
        // part offset lives right after type(4) + bbox(32) + counts(8)
        content[44..48].copy_from_slice(&7i32.to_le_bytes());
        assert!(decode_shape(&content, content.len()).is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let content = 31i32.to_le_bytes();
        assert!(decode_shape(&content, 4).is_err());
    }

    #[test]
    fn test_header_rejects_unknown_kind() {
        let data = build_file(31, [0.0; 4], &[]);
        let err = ShapeReader::from_bytes(data).err().unwrap();
        assert!(matches!(err, StoreError::Format { kind: FileKind::Geometry, .. }));
    }

    #[test]
    fn test_header_rejects_bad_file_code() {
        let mut data = build_file(1, [0.0; 4], &[]).to_vec();
        data[0..4].copy_from_slice(&1234i32.to_be_bytes());
        assert!(ShapeReader::from_bytes(Bytes::from(data)).is_err());
    }

    #[test]
    fn test_reader_fetch_and_envelopes() {
        let data = build_file(
            1,
            [0.0, 0.0, 20.0, 20.0],
            &[point_content(0.0, 0.0), point_content(10.0, 10.0), point_content(20.0, 20.0)],
        );
        let reader = ShapeReader::from_bytes(data).unwrap();
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.shape_type(), ShapeType::Point);

        let g = reader.fetch(1).unwrap();
        assert_eq!(g.shape(), &Shape::Point(Point::new(10.0, 10.0)));
        assert!(matches!(reader.fetch(3), Err(StoreError::NotFound(3))));

        let global = reader.global_envelope();
        for id in 0..3 {
            let env = reader.fetch(id).unwrap().envelope().unwrap();
            assert!(global.contains(&env));
        }

        let entries: Vec<IndexEntry> = reader.read_envelopes().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].record_id, 2);
        assert_eq!(entries[2].bounds, Bounds::new(20.0, 20.0, 20.0, 20.0));
    }

    #[test]
    fn test_null_records_are_not_found() {
        let data = build_file(
            1,
            [0.0, 0.0, 1.0, 1.0],
            &[point_content(1.0, 1.0), 0i32.to_le_bytes().to_vec()],
        );
        let reader = ShapeReader::from_bytes(data).unwrap();
        assert_eq!(reader.len(), 2);
        assert!(!reader.has_geometry(1));
        assert!(matches!(reader.fetch(1), Err(StoreError::NotFound(1))));
        assert_eq!(reader.read_envelopes().count(), 1);
    }

    #[test]
    fn test_mixed_kinds_fail_open() {
        let line = parts_content(3, &[&[(0.0, 0.0), (1.0, 1.0)]]);
        let data = build_file(1, [0.0, 0.0, 1.0, 1.0], &[point_content(0.0, 0.0), line]);
        assert!(ShapeReader::from_bytes(data).is_err());
    }

    #[test]
    fn test_record_past_end_fails_open() {
        let mut data = build_file(1, [0.0; 4], &[point_content(0.0, 0.0)]).to_vec();
        // Inflate the record's declared length beyond the file
        data[104..108].copy_from_slice(&100i32.to_be_bytes());
        assert!(ShapeReader::from_bytes(Bytes::from(data)).is_err());
    }
}
