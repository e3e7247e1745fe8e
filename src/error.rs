//! Error types for the feature store.

use shapestore_types::feature::RecordId;
use std::path::PathBuf;
use thiserror::Error;

/// Which on-disk artifact an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Geometry,
    Attributes,
    Index,
    CrsHint,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FileKind::Geometry => "geometry",
            FileKind::Attributes => "attribute",
            FileKind::Index => "index",
            FileKind::CrsHint => "crs hint",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot read {path}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {kind} file: {reason}")]
    Format { kind: FileKind, reason: String },

    #[error("coordinate transform failed: {0}")]
    Transform(String),

    #[error("record {0} not found")]
    NotFound(RecordId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub(crate) fn format(kind: FileKind, reason: impl Into<String>) -> Self {
        StoreError::Format {
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::IoAt {
            path: path.into(),
            source,
        }
    }

    /// Whether this is an I/O failure (as opposed to malformed content).
    pub fn is_io(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::IoAt { .. })
    }

    /// Whether the error means the file does not exist.
    pub fn is_missing_file(&self) -> bool {
        match self {
            StoreError::Io(e) | StoreError::IoAt { source: e, .. } => {
                e.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
