//! Geometry document built from compute results, plus its serialized forms.

pub mod geometry;
pub mod materialize;
pub mod model;
pub mod stl;

pub use geometry::{decode_item, Geometry, GeometryError, MeshData};
pub use materialize::{materialize, materialize_into, MaterializeError};
pub use model::{Document, DocumentError, DocumentObject, ModelDocument, ObjectId};
pub use stl::document_to_binary_stl;

#[cfg(test)]
#[path = "tests/document_tests.rs"]
mod tests;
