//! Raw scene-description document.
//!
//! Typed serde mirror of the scene JSON: resource registers mapping ids to
//! URIs, and an entity list. Entities are dispatched on their `type` field
//! by the loader, with `generic` as the default.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct SceneDocument {
    #[serde(default)]
    pub mesh_register: BTreeMap<String, MeshRegisterEntry>,
    #[serde(default)]
    pub texture_register: BTreeMap<String, TextureRegisterEntry>,
    #[serde(default)]
    pub entity_list: Vec<serde_json::Value>,
}

/// A registered mesh: the URI of its binary container.
#[derive(Debug, Deserialize)]
pub struct MeshRegisterEntry {
    pub binary: String,
}

/// A registered texture: the URI of its image.
#[derive(Debug, Deserialize)]
pub struct TextureRegisterEntry {
    pub image: String,
}

/// Entity placement: either a full column-major matrix or a cartographic
/// origin. Exactly one must be set.
#[derive(Debug, Deserialize)]
pub struct TransformDef {
    pub matrix: Option<[f64; 16]>,
    pub cartographic: Option<[f64; 3]>,
}

#[derive(Debug, Deserialize)]
pub struct GenericEntityDef {
    pub transform: TransformDef,
    pub ref_mesh: String,
    #[serde(default)]
    pub properties: BTreeMap<String, ParamDef>,
}

/// A generic-entity property value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ParamDef {
    Float(f64),
    Vec3([f64; 3]),
    Texture(TexParamDef),
}

#[derive(Debug, Deserialize)]
pub struct TexParamDef {
    #[serde(rename = "type")]
    pub kind: String,
    pub ref_texture: String,
}

/// Markerline vertices: flat coordinate triples, either geocentric
/// cartesian or cartographic. Exactly one must be set.
#[derive(Debug, Deserialize)]
pub struct PointsDef {
    pub cartesian: Option<Vec<f64>>,
    pub cartographic: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct MarkerlineDef {
    pub points: PointsDef,
    #[serde(default = "default_line_width")]
    pub line_width: f32,
    #[serde(default = "default_color")]
    pub color: [f32; 3],
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

#[derive(Debug, Deserialize)]
pub struct TextDef {
    #[serde(default)]
    pub entries: Vec<TextEntryDef>,
    pub font_style: Option<String>,
    pub font_weight: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_color")]
    pub color: [f32; 3],
}

/// One text run; unset fields inherit the entity-level values.
#[derive(Debug, Deserialize)]
pub struct TextEntryDef {
    pub text: String,
    pub position: [f64; 3],
    pub font_style: Option<String>,
    pub font_weight: Option<String>,
    pub font_size: Option<f32>,
    pub font_family: Option<String>,
    pub color: Option<[f32; 3]>,
}

fn default_line_width() -> f32 {
    1.0
}

fn default_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_opacity() -> f32 {
    1.0
}

fn default_font_size() -> f32 {
    16.0
}

fn default_font_family() -> String {
    "sans-serif".to_string()
}
