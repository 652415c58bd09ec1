//! Resolved scene entities.
//!
//! The scene loader turns the raw document into these: registered resources
//! fetched and decoded, transforms resolved into geocentric frames, and
//! per-entry text defaults applied.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{DMat4, DVec3, Vec3};

use crate::mesh::BinaryMesh;

/// A resolved generic-entity property.
#[derive(Debug, Clone)]
pub enum Param {
    Float(f32),
    Vec3(Vec3),
    /// Decoded image of a registered 2D texture.
    Texture(Arc<image::RgbaImage>),
}

/// A mesh instance placed in the geocentric frame.
#[derive(Debug)]
pub struct GenericEntity {
    /// Local-to-geocentric transform.
    pub transform: DMat4,
    pub mesh: Arc<BinaryMesh>,
    pub properties: BTreeMap<String, Param>,
}

/// A polyline through geocentric points.
#[derive(Debug)]
pub struct MarkerlineEntity {
    pub points: Vec<DVec3>,
    pub line_width: f32,
    pub color: Vec3,
    pub opacity: f32,
}

/// One placed text run with its resolved style.
#[derive(Debug, Clone)]
pub struct TextEntry {
    pub text: String,
    /// Geocentric position.
    pub position: DVec3,
    pub font_style: String,
    pub font_weight: String,
    pub font_size: f32,
    pub font_family: String,
    pub color: Vec3,
}

#[derive(Debug)]
pub struct TextEntity {
    pub entries: Vec<TextEntry>,
}

/// A resolved scene entity.
#[derive(Debug)]
pub enum Entity {
    Generic(GenericEntity),
    Markerline(MarkerlineEntity),
    Text(TextEntity),
}

/// The settled result of a scene-description load.
#[derive(Debug, Default)]
pub struct SceneDescription {
    pub entities: Vec<Entity>,
}
