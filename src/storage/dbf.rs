//! Reader for dBASE attribute tables (`.dbf`).
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! 0      version byte
//! 1..4   last update, YY (since 1900) MM DD
//! 4..8   record count (u32)
//! 8..10  header length in bytes (u16)
//! 10..12 record width in bytes (u16)
//! 32..   32-byte field descriptors, terminated by 0x0D
//! ```
//!
//! Each descriptor holds an 11-byte NUL-padded name, a type code, the field
//! width and the decimal count. Rows follow the header back to back; each
//! starts with a marker byte (`' '` live, `'*'` deleted) and then the fields
//! as fixed-width text.

use crate::error::{FileKind, Result, StoreError};
use bytes::{Buf, Bytes};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shapestore_types::feature::{
    FeatureTypeDescriptor, FieldDeclaration, FieldType, RecordId, Value,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PREFIX_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const DESCRIPTOR_END: u8 = 0x0D;
const DELETED_MARKER: u8 = b'*';

/// Character encoding of text stored in the attribute table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    Utf8,
    /// ISO-8859-1, the historical default for attribute tables
    #[default]
    Latin1,
    /// Windows code page 1252: Latin-1 with printable characters in 0x80..=0x9F
    Windows1252,
}

/// Code points of bytes 0x80..=0x9F in code page 1252. The five unassigned
/// bytes map to the matching C1 control, as browsers do.
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

impl TextEncoding {
    /// Resolve a code page label as found in `.cpg` files.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "UTF8" | "65001" => Some(TextEncoding::Utf8),
            "ISO88591" | "LATIN1" | "88591" => Some(TextEncoding::Latin1),
            "1252" | "CP1252" | "WINDOWS1252" | "ANSI1252" => Some(TextEncoding::Windows1252),
            _ => None,
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            TextEncoding::Windows1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => WINDOWS_1252_HIGH[(b - 0x80) as usize],
                    _ => b as char,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbfHeader {
    pub version: u8,
    pub last_update: Option<NaiveDate>,
    pub record_count: u32,
    pub header_len: u16,
    pub record_len: u16,
}

fn field_type_for(code: char) -> FieldType {
    match code.to_ascii_uppercase() {
        'N' | 'F' => FieldType::Numeric,
        'L' => FieldType::Boolean,
        'D' => FieldType::Timestamp,
        _ => FieldType::Text,
    }
}

/// Parse the fixed prefix and the field descriptor table.
pub fn decode_header(
    bytes: &[u8],
    encoding: TextEncoding,
) -> Result<(DbfHeader, Vec<FieldDeclaration>)> {
    if bytes.len() < PREFIX_LEN + 1 {
        return Err(StoreError::format(
            FileKind::Attributes,
            format!("header needs at least {} bytes, got {}", PREFIX_LEN + 1, bytes.len()),
        ));
    }
    let mut buf = bytes;
    let version = buf.get_u8();
    let (yy, mm, dd) = (buf.get_u8(), buf.get_u8(), buf.get_u8());
    let last_update = NaiveDate::from_ymd_opt(1900 + yy as i32, mm as u32, dd as u32);
    let record_count = buf.get_u32_le();
    let header_len = buf.get_u16_le();
    let record_len = buf.get_u16_le();

    let header_end = header_len as usize;
    if header_end > bytes.len() || header_end < PREFIX_LEN + 1 {
        return Err(StoreError::format(
            FileKind::Attributes,
            format!("header length {header_len} does not fit file of {} bytes", bytes.len()),
        ));
    }

    let mut fields = Vec::new();
    let mut pos = PREFIX_LEN;
    while pos < header_end && bytes[pos] != DESCRIPTOR_END {
        if pos + DESCRIPTOR_LEN > header_end {
            return Err(StoreError::format(
                FileKind::Attributes,
                "field descriptor table runs past the header",
            ));
        }
        let raw = &bytes[pos..pos + DESCRIPTOR_LEN];
        let name_end = raw[..11].iter().position(|&b| b == 0).unwrap_or(11);
        let name = encoding.decode(&raw[..name_end]).trim().to_string();
        let type_code = raw[11] as char;
        let width = raw[16];
        let precision = raw[17];
        fields.push(FieldDeclaration::new(
            name,
            field_type_for(type_code),
            type_code,
            width,
            precision,
        ));
        pos += DESCRIPTOR_LEN;
    }

    let row_width: usize = 1 + fields.iter().map(|f| f.width as usize).sum::<usize>();
    if row_width > record_len as usize {
        return Err(StoreError::format(
            FileKind::Attributes,
            format!("fields need {row_width} bytes per row but records are {record_len} bytes"),
        ));
    }

    Ok((
        DbfHeader {
            version,
            last_update,
            record_count,
            header_len,
            record_len,
        },
        fields,
    ))
}

/// Decode one raw text field according to its declaration.
pub fn decode_value(field: &FieldDeclaration, raw: &[u8], encoding: TextEncoding) -> Value {
    let text = encoding.decode(raw);
    let trimmed = text.trim_matches(|c: char| c == ' ' || c == '\0');
    match field.field_type {
        FieldType::Text => Value::Text(trimmed.to_string()),
        FieldType::Numeric => {
            if trimmed.is_empty() || trimmed.starts_with('?') || trimmed.starts_with('*') {
                return Value::Null;
            }
            if field.precision == 0 {
                if let Ok(i) = trimmed.parse::<i64>() {
                    return Value::Integer(i);
                }
            }
            match trimmed.parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => {
                    log::debug!("Unparseable numeric value {:?} in field {}", trimmed, field.name);
                    Value::Null
                }
            }
        }
        FieldType::Boolean => match trimmed.chars().next() {
            Some('T' | 't' | 'Y' | 'y') => Value::Boolean(true),
            Some('F' | 'f' | 'N' | 'n') => Value::Boolean(false),
            _ => Value::Null,
        },
        FieldType::Timestamp => {
            if trimmed.len() != 8 || trimmed.bytes().all(|b| b == b'0') {
                return Value::Null;
            }
            match NaiveDate::parse_from_str(trimmed, "%Y%m%d") {
                Ok(date) => Value::Date(date),
                Err(_) => {
                    log::debug!("Unparseable date {:?} in field {}", trimmed, field.name);
                    Value::Null
                }
            }
        }
    }
}

/// Decode one row. Returns `None` for a row carrying the deleted marker.
pub fn decode_row(
    row: &[u8],
    fields: &[Arc<FieldDeclaration>],
    encoding: TextEncoding,
) -> Result<Option<Vec<(Arc<FieldDeclaration>, Value)>>> {
    let needed = 1 + fields.iter().map(|f| f.width as usize).sum::<usize>();
    if row.len() < needed {
        return Err(StoreError::format(
            FileKind::Attributes,
            format!("row has {} bytes, fields need {needed}", row.len()),
        ));
    }
    if row[0] == DELETED_MARKER {
        return Ok(None);
    }

    let mut values = Vec::with_capacity(fields.len());
    let mut pos = 1;
    for field in fields {
        let end = pos + field.width as usize;
        values.push((Arc::clone(field), decode_value(field, &row[pos..end], encoding)));
        pos = end;
    }
    Ok(Some(values))
}

/// An open attribute table held in memory.
#[derive(Debug)]
pub struct DbfReader {
    path: Option<PathBuf>,
    data: Bytes,
    header: DbfHeader,
    fields: Vec<Arc<FieldDeclaration>>,
    encoding: TextEncoding,
    rows: usize,
}

impl DbfReader {
    pub fn open<P: AsRef<Path>>(path: P, encoding: TextEncoding) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| StoreError::io_at(path, e))?;
        let mut reader = Self::from_bytes(Bytes::from(data), encoding)?;
        reader.path = Some(path.to_path_buf());
        log::debug!(
            "Opened attribute table {} ({} rows, {} fields)",
            path.display(),
            reader.rows,
            reader.fields.len()
        );
        Ok(reader)
    }

    pub fn from_bytes(data: Bytes, encoding: TextEncoding) -> Result<Self> {
        let (header, fields) = decode_header(&data, encoding)?;

        let available = if header.record_len == 0 {
            0
        } else {
            (data.len() - header.header_len as usize) / header.record_len as usize
        };
        let rows = if (header.record_count as usize) > available {
            log::warn!(
                "Attribute table declares {} rows but holds {}; reading the complete rows only",
                header.record_count,
                available
            );
            available
        } else {
            header.record_count as usize
        };

        Ok(Self {
            path: None,
            data,
            header,
            fields: fields.into_iter().map(Arc::new).collect(),
            encoding,
            rows,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn header(&self) -> &DbfHeader {
        &self.header
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Field declarations in table order.
    pub fn field_declarations(&self) -> &[Arc<FieldDeclaration>] {
        &self.fields
    }

    /// Feature type with these fields plus the implicit geometry field.
    pub fn descriptor(&self, name: &str) -> FeatureTypeDescriptor {
        FeatureTypeDescriptor::new(name, self.fields.clone())
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    fn row(&self, id: RecordId) -> Option<&[u8]> {
        let index = id as usize;
        if index >= self.rows {
            return None;
        }
        let width = self.header.record_len as usize;
        let start = self.header.header_len as usize + index * width;
        self.data.get(start..start + width)
    }

    pub fn is_deleted(&self, id: RecordId) -> bool {
        self.row(id).is_some_and(|row| row.first() == Some(&DELETED_MARKER))
    }

    /// Attribute values of row `id`; `NotFound` when out of range or deleted.
    pub fn fetch(&self, id: RecordId) -> Result<Vec<(Arc<FieldDeclaration>, Value)>> {
        let row = self.row(id).ok_or(StoreError::NotFound(id))?;
        decode_row(row, &self.fields, self.encoding)?.ok_or(StoreError::NotFound(id))
    }
}
