//! Entity tree and load result.
//!
//! The body-load phase builds this tree from the glTF JSON. Entities
//! cross-reference each other through arena indices into [`Content`];
//! the post-load pipeline rewrites accessor views and texture references
//! through those same indices.

use std::collections::BTreeMap;

use glam::{Mat4, Quat, Vec3};

use crate::errors::{GeosceneError, Result};
use crate::gltf::accessor::{Accessor, Buffer, BufferView};

/// glTF sampler filter/wrap constants, passed through verbatim.
pub mod sampler_consts {
    pub const NEAREST: u32 = 9728;
    pub const LINEAR: u32 = 9729;
    pub const NEAREST_MIPMAP_NEAREST: u32 = 9984;
    pub const LINEAR_MIPMAP_NEAREST: u32 = 9985;
    pub const NEAREST_MIPMAP_LINEAR: u32 = 9986;
    pub const LINEAR_MIPMAP_LINEAR: u32 = 9987;
    pub const CLAMP_TO_EDGE: u32 = 33071;
    pub const MIRRORED_REPEAT: u32 = 33648;
    pub const REPEAT: u32 = 10497;
}

/// Filter and wrap modes of a texture, as raw glTF constants.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    pub mag_filter: Option<u32>,
    pub min_filter: Option<u32>,
    pub wrap_s: u32,
    pub wrap_t: u32,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            mag_filter: None,
            min_filter: None,
            wrap_s: sampler_consts::REPEAT,
            wrap_t: sampler_consts::REPEAT,
        }
    }
}

/// Where an image's bytes come from. Exactly one source is set.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// External or `data:` URI.
    Uri(String),
    /// Arena index of a buffer view carrying the encoded bytes.
    View(usize),
}

/// A source image: its byte source and, after the fetch settles, the
/// decoded RGBA bitmap.
#[derive(Debug)]
pub struct Image {
    pub source: ImageSource,
    pub mime_type: Option<String>,
    pub decoded: Option<image::RgbaImage>,
}

/// A sampler/image pairing. Multiple textures may share one source image;
/// the post-load dedupe collapses their references.
#[derive(Debug, Clone)]
pub struct Texture {
    /// Arena index of the sampler, when one is assigned.
    pub sampler: Option<usize>,
    /// Arena index of the source image.
    pub source: usize,
}

/// Slot-specific payload of a texture reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureInfoKind {
    Base,
    Normal { scale: f32 },
    Occlusion { strength: f32 },
}

/// A material slot's reference to a texture.
#[derive(Debug, Clone)]
pub struct TextureInfo {
    /// Arena index of the referenced texture. Rewritten by image dedupe.
    pub texture: usize,
    pub tex_coord_set: usize,
    pub kind: TextureInfoKind,
}

/// The material slots that can carry a texture reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSlot {
    BaseColor,
    MetallicRoughness,
    Normal,
    Occlusion,
    Emissive,
}

/// Alpha rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

impl AlphaMode {
    pub(crate) fn from_gltf(name: &str) -> Result<Self> {
        match name {
            "OPAQUE" => Ok(Self::Opaque),
            "MASK" => Ok(Self::Mask),
            "BLEND" => Ok(Self::Blend),
            other => Err(GeosceneError::MalformedAsset(format!(
                "unknown alpha mode: {other}"
            ))),
        }
    }
}

/// Metallic-roughness parameters of a material.
#[derive(Debug, Clone)]
pub struct PbrMetallicRoughness {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureInfo>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureInfo>,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
        }
    }
}

/// A glTF 2.0 material. [`Material::default`] yields the specification's
/// default material.
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub pbr_metallic_roughness: PbrMetallicRoughness,
    pub normal_texture: Option<TextureInfo>,
    pub occlusion_texture: Option<TextureInfo>,
    pub emissive_texture: Option<TextureInfo>,
    pub emissive_factor: [f32; 3],
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
}

impl Material {
    /// Mutable access to the texture info in `slot`, when present.
    pub fn texture_info_mut(&mut self, slot: TextureSlot) -> Option<&mut TextureInfo> {
        match slot {
            TextureSlot::BaseColor => self.pbr_metallic_roughness.base_color_texture.as_mut(),
            TextureSlot::MetallicRoughness => {
                self.pbr_metallic_roughness.metallic_roughness_texture.as_mut()
            }
            TextureSlot::Normal => self.normal_texture.as_mut(),
            TextureSlot::Occlusion => self.occlusion_texture.as_mut(),
            TextureSlot::Emissive => self.emissive_texture.as_mut(),
        }
    }

    /// Shared access to the texture info in `slot`, when present.
    #[must_use]
    pub fn texture_info(&self, slot: TextureSlot) -> Option<&TextureInfo> {
        match slot {
            TextureSlot::BaseColor => self.pbr_metallic_roughness.base_color_texture.as_ref(),
            TextureSlot::MetallicRoughness => {
                self.pbr_metallic_roughness.metallic_roughness_texture.as_ref()
            }
            TextureSlot::Normal => self.normal_texture.as_ref(),
            TextureSlot::Occlusion => self.occlusion_texture.as_ref(),
            TextureSlot::Emissive => self.emissive_texture.as_ref(),
        }
    }
}

/// Primitive draw mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl DrawMode {
    pub(crate) fn from_gltf(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Self::Points),
            1 => Ok(Self::Lines),
            2 => Ok(Self::LineLoop),
            3 => Ok(Self::LineStrip),
            4 => Ok(Self::Triangles),
            5 => Ok(Self::TriangleStrip),
            6 => Ok(Self::TriangleFan),
            other => Err(GeosceneError::MalformedAsset(format!(
                "unknown primitive mode: {other}"
            ))),
        }
    }
}

/// One drawable unit of a mesh.
#[derive(Debug, Clone)]
pub struct Primitive {
    /// Semantic name to accessor arena index.
    pub attributes: BTreeMap<String, usize>,
    /// Accessor arena index of the index data.
    pub indices: Option<usize>,
    /// Material arena index.
    pub material: Option<usize>,
    pub mode: DrawMode,
}

/// An ordered list of primitives.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
}

/// A node of the scene tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
    /// Local transform, composed from TRS when the JSON gives no matrix.
    pub matrix: Mat4,
    pub name: Option<String>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            mesh: None,
            children: Vec::new(),
            matrix: Mat4::IDENTITY,
            name: None,
        }
    }
}

/// Composes a node's local matrix from its JSON transform fields.
pub(crate) fn compose_node_matrix(raw: &crate::gltf::json::Node) -> Mat4 {
    if let Some(m) = raw.matrix {
        return Mat4::from_cols_array(&m);
    }
    let translation = raw.translation.map_or(Vec3::ZERO, Vec3::from_array);
    let rotation = raw.rotation.map_or(Quat::IDENTITY, Quat::from_array);
    let scale = raw.scale.map_or(Vec3::ONE, Vec3::from_array);
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// A scene: its root node indices.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub nodes: Vec<usize>,
    pub name: Option<String>,
}

/// The settled result of a glTF load.
///
/// All arenas are index-stable with respect to the source JSON; buffers and
/// buffer views created by splitting are appended past the originals.
#[derive(Debug, Default)]
pub struct Content {
    pub buffers: Vec<Buffer>,
    pub buffer_views: Vec<BufferView>,
    pub accessors: Vec<Accessor>,
    pub images: Vec<Image>,
    pub samplers: Vec<Sampler>,
    pub textures: Vec<Texture>,
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub nodes: Vec<Node>,
    pub scenes: Vec<Scene>,
    /// Index of the document's default scene, or −1 when unset.
    pub default_scene_index: i32,
}

impl Content {
    /// Picks the scene to present: an explicit index (validated), else the
    /// document default, else scene 0.
    pub fn resolve_scene(&self, index: Option<usize>) -> Result<usize> {
        let resolved = match index {
            Some(i) => i,
            None if self.default_scene_index >= 0 => self.default_scene_index as usize,
            None => 0,
        };
        if resolved >= self.scenes.len() {
            return Err(GeosceneError::SceneIndexOutOfRange {
                index: resolved,
                count: self.scenes.len(),
            });
        }
        Ok(resolved)
    }
}
