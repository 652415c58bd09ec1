//! Mesh data formats.
//!
//! The scene-description layer registers meshes stored in a compact binary
//! container; [`binary`] parses it into typed vertex/index views.

pub mod binary;

pub use binary::{BinaryMesh, IndexFormat, MeshPrimitiveType, VertexLayout};
