//! Encoding hint companion (`.cpg`): a single code page label.

use super::dbf::TextEncoding;
use crate::error::{Result, StoreError};
use std::path::Path;

/// Read the code page label from `path`. `Ok(None)` means the label is not
/// a supported encoding.
pub fn read_encoding_hint(path: &Path) -> Result<Option<TextEncoding>> {
    let raw = std::fs::read(path).map_err(|e| StoreError::io_at(path, e))?;
    let text = String::from_utf8_lossy(&raw);
    let label = text.lines().next().unwrap_or_default().trim();
    let encoding = TextEncoding::from_label(label);
    if encoding.is_none() {
        log::warn!(
            "Unsupported code page {:?} in {}; falling back to ISO-8859-1",
            label,
            path.display()
        );
    }
    Ok(encoding)
}
