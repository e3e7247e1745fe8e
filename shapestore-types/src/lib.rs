//! # shapestore-types
//!
//! Data types shared by the shapestore feature store:
//!
//! - **CRS**: `Crs`, `CrsKind`, `Ellipsoid`
//! - **Envelopes**: `Envelope`, a closed axis-aligned bounding box
//! - **Geometry**: `Shape` (point, multipoint, polyline, polygon) and the
//!   CRS-tagged `Geometry`
//! - **Features**: `FieldDeclaration`, `Value`, `FeatureTypeDescriptor`,
//!   `FeatureRecord`
//!
//! All types are serializable with Serde and built on top of the `geo` crate's
//! geometric primitives.
//!
//! ## Examples
//!
//! ```rust
//! use shapestore_types::envelope::Envelope;
//! use shapestore_types::crs::Crs;
//!
//! let bbox = Envelope::new(5.8, 47.2, 15.1, 55.1).with_crs(Crs::wgs84());
//! assert!(bbox.contains_point(13.4, 52.5));
//! ```

pub mod crs;
pub mod envelope;
pub mod feature;
pub mod geometry;
