//! File-backed spatial feature store over shape geometry and attribute files.
//!
//! A store opens a geometry file (`.shp`) with its optional companions (an
//! attribute table, CRS and encoding hints), bulk loads a packed R-tree
//! over the record envelopes (cached on disk), and answers bounding-box
//! queries as a lazy stream of features. Source files are watched: a query
//! after a file changed reopens it and rebuilds the index.
//!
//! ```rust,no_run
//! use shapestore::prelude::*;
//!
//! let store = FeatureStore::open("data/cities")?;
//! let query = QueryOptions::within(Envelope::new(-1.0, -1.0, 11.0, 11.0).with_crs(Crs::wgs84()));
//! let names: Vec<String> = store
//!     .query(query, |_| true)
//!     .filter_map(|f| f.get("name").and_then(|v| v.as_str()).map(str::to_string))
//!     .collect();
//! # Ok::<(), shapestore::StoreError>(())
//! ```

pub mod builder;
pub mod compute;
pub mod config;
pub mod error;
pub mod storage;
pub mod store;

pub use builder::StoreBuilder;
pub use config::StoreConfig;
pub use error::{FileKind, Result, StoreError};
pub use store::{FeatureStore, Features, QueryOptions};

pub use compute::spatial::{Bounds, IndexEntry, IndexStats, PackedRTree};
pub use compute::transform::{CoordinateTransform, CrsTransformer};
pub use storage::TextEncoding;

pub use shapestore_types::crs::{Crs, CrsKind, Ellipsoid};
pub use shapestore_types::envelope::Envelope;
pub use shapestore_types::feature::{
    FeatureRecord, FeatureTypeDescriptor, FieldDeclaration, FieldType, RecordId, Value,
};
pub use shapestore_types::geometry::{Geometry, Shape};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{FeatureStore, QueryOptions, Result, StoreBuilder, StoreConfig, StoreError};

    pub use crate::{Crs, Envelope, FeatureRecord, Geometry, Shape, Value};

    pub use crate::TextEncoding;
}
