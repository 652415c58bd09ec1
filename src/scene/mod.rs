//! Scene-description layer.
//!
//! A scene document places assets in the geographic frame: it registers
//! binary meshes and textures by id, and lists entities (generic mesh
//! instances, markerlines, text) whose transforms are either explicit
//! matrices or cartographic origins resolved through
//! [`crate::geom::iscs_to_gocs`].

pub mod document;
pub mod entity;

mod loader;

pub use document::SceneDocument;
pub use entity::{
    Entity, GenericEntity, MarkerlineEntity, Param, SceneDescription, TextEntity, TextEntry,
};
pub use loader::SceneLoader;
