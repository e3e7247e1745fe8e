//! Fixture writers for geometry and attribute files.
#![allow(dead_code)]

use bytes::{BufMut, BytesMut};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const POINT: i32 = 1;
pub const POLYLINE: i32 = 3;
pub const POLYGON: i32 = 5;

/// Record content (type code included), or `None` for a null record.
pub type Content = Option<Vec<u8>>;

pub fn point(x: f64, y: f64) -> Content {
    let mut buf = BytesMut::new();
    buf.put_i32_le(POINT);
    buf.put_f64_le(x);
    buf.put_f64_le(y);
    Some(buf.to_vec())
}

fn parts(shape_type: i32, parts: &[Vec<(f64, f64)>]) -> Content {
    let all: Vec<(f64, f64)> = parts.iter().flatten().copied().collect();
    let (min_x, min_y, max_x, max_y) = bounds(&all);

    let mut buf = BytesMut::new();
    buf.put_i32_le(shape_type);
    buf.put_f64_le(min_x);
    buf.put_f64_le(min_y);
    buf.put_f64_le(max_x);
    buf.put_f64_le(max_y);
    buf.put_i32_le(parts.len() as i32);
    buf.put_i32_le(all.len() as i32);
    let mut start = 0;
    for part in parts {
        buf.put_i32_le(start);
        start += part.len() as i32;
    }
    for (x, y) in all {
        buf.put_f64_le(x);
        buf.put_f64_le(y);
    }
    Some(buf.to_vec())
}

pub fn polyline(lines: &[Vec<(f64, f64)>]) -> Content {
    parts(POLYLINE, lines)
}

/// Rings as stored: shells clockwise, holes counter-clockwise.
pub fn polygon(rings: &[Vec<(f64, f64)>]) -> Content {
    parts(POLYGON, rings)
}

/// A clockwise square ring.
pub fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<(f64, f64)> {
    vec![
        (min_x, min_y),
        (min_x, max_y),
        (max_x, max_y),
        (max_x, min_y),
        (min_x, min_y),
    ]
}

fn bounds(points: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    points.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(a, b, c, d), &(x, y)| (a.min(x), b.min(y), c.max(x), d.max(y)),
    )
}

fn content_bounds(content: &[u8]) -> (f64, f64, f64, f64) {
    let f = |at: usize| f64::from_le_bytes(content[at..at + 8].try_into().unwrap());
    if content.len() == 20 {
        (f(4), f(12), f(4), f(12))
    } else {
        (f(4), f(12), f(20), f(28))
    }
}

/// A complete geometry file holding `records`.
pub fn shp(shape_type: i32, records: &[Content]) -> Vec<u8> {
    let mut body = BytesMut::new();
    let mut extent = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (i, record) in records.iter().enumerate() {
        let content = match record {
            Some(content) => {
                let (a, b, c, d) = content_bounds(content);
                extent = (extent.0.min(a), extent.1.min(b), extent.2.max(c), extent.3.max(d));
                content.clone()
            }
            None => 0i32.to_le_bytes().to_vec(),
        };
        body.put_i32(i as i32 + 1);
        body.put_i32((content.len() / 2) as i32);
        body.put_slice(&content);
    }
    if !extent.0.is_finite() {
        extent = (0.0, 0.0, 0.0, 0.0);
    }

    let mut buf = BytesMut::new();
    buf.put_i32(9994);
    buf.put_bytes(0, 20);
    buf.put_i32(((100 + body.len()) / 2) as i32);
    buf.put_i32_le(1000);
    buf.put_i32_le(shape_type);
    buf.put_f64_le(extent.0);
    buf.put_f64_le(extent.1);
    buf.put_f64_le(extent.2);
    buf.put_f64_le(extent.3);
    buf.put_bytes(0, 32);
    buf.put_slice(&body);
    buf.to_vec()
}

/// One attribute row: deleted flag and raw cell bytes.
pub type Row<'a> = (bool, Vec<&'a [u8]>);

/// A complete attribute file with `fields` as `(name, code, width, decimals)`.
pub fn dbf(fields: &[(&str, char, u8, u8)], rows: &[Row]) -> Vec<u8> {
    let record_len: u16 = 1 + fields.iter().map(|f| f.2 as u16).sum::<u16>();
    let header_len = (32 + fields.len() * 32 + 1) as u16;

    let mut buf = BytesMut::new();
    buf.put_u8(0x03);
    buf.put_slice(&[125, 1, 1]);
    buf.put_u32_le(rows.len() as u32);
    buf.put_u16_le(header_len);
    buf.put_u16_le(record_len);
    buf.put_bytes(0, 20);
    for (name, code, width, decimals) in fields {
        let mut raw = [0u8; 32];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        raw[11] = *code as u8;
        raw[16] = *width;
        raw[17] = *decimals;
        buf.put_slice(&raw);
    }
    buf.put_u8(0x0D);
    for (deleted, cells) in rows {
        buf.put_u8(if *deleted { b'*' } else { b' ' });
        for ((_, _, width, _), cell) in fields.iter().zip(cells) {
            let mut padded = vec![b' '; *width as usize];
            padded[..cell.len()].copy_from_slice(cell);
            buf.put_slice(&padded);
        }
    }
    buf.put_u8(0x1A);
    buf.to_vec()
}

/// Single text field `name` with one row per value.
pub fn names_dbf(names: &[&str]) -> Vec<u8> {
    let rows: Vec<Row> = names.iter().map(|n| (false, vec![n.as_bytes()])).collect();
    dbf(&[("name", 'C', 10, 0)], &rows)
}

/// Route library logs to the test harness (set RUST_LOG=debug to see them).
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Write `<dir>/<name>.shp` and, when given, `<name>.dbf`. Returns the base path.
pub fn write_store(dir: &Path, name: &str, shp: &[u8], dbf: Option<&[u8]>) -> PathBuf {
    init_logging();
    let base = dir.join(name);
    std::fs::write(base.with_extension("shp"), shp).unwrap();
    if let Some(dbf) = dbf {
        std::fs::write(base.with_extension("dbf"), dbf).unwrap();
    }
    base
}

/// The A/B/C points store: (0,0), (10,10), (20,20).
pub fn abc_store(dir: &Path) -> PathBuf {
    write_store(
        dir,
        "abc",
        &shp(POINT, &[point(0.0, 0.0), point(10.0, 10.0), point(20.0, 20.0)]),
        Some(&names_dbf(&["A", "B", "C"])),
    )
}

/// Move the file's modification time `secs` seconds past now, so a rewrite
/// is visible even on filesystems with coarse timestamps.
pub fn touch_forward(path: &Path, secs: u64) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(secs))
        .unwrap();
}

/// Names of `features` in order.
pub fn names<I: IntoIterator<Item = shapestore::FeatureRecord>>(features: I) -> Vec<String> {
    features
        .into_iter()
        .map(|f| {
            f.get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}
