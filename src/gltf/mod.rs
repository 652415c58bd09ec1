//! glTF 2.0 asset assembly pipeline.
//!
//! Ingests a plain-JSON glTF document plus its external buffers and images
//! and produces a renderer-ready [`Content`]: native-byte-order, tightly
//! packed per-usage sub-buffers, rebuilt accessors, and deduplicated
//! texture bindings.
//!
//! The pipeline runs in three phases. During body load the entity tree is
//! built synchronously from the JSON; accessors and texture infos register
//! with the load context as they are constructed, which lazily starts the
//! external fetches. Buffer and image fetches then complete one at a time
//! on the loader task; failures are recorded but never short-circuit the
//! drain. Once the body is finished and nothing is pending, the context
//! settles: endian rewrite, then split-and-rebuild, then image dedupe, and
//! [`Content`] is published (or the single aggregate error).

pub mod accessor;
pub mod content;
pub mod entry;
pub mod json;
pub mod splitter;

mod context;
mod loader;

pub use accessor::{Accessor, AccessorUsage, Buffer, BufferView, ComponentType, ElementType};
pub use content::{
    sampler_consts, AlphaMode, Content, DrawMode, Image, ImageSource, Material, Mesh, Node,
    PbrMetallicRoughness, Primitive, Sampler, Scene, Texture, TextureInfo, TextureInfoKind,
    TextureSlot,
};
pub use entry::{BufferEntry, ImageEntry};
pub use loader::GltfLoader;

/// Options biasing a glTF load.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicitly requested scene index; validated against the document.
    pub index: Option<usize>,
    /// Base URI that relative buffer/image URIs resolve against.
    pub base_uri: Option<String>,
}
