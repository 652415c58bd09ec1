//! Renderer-facing output types.
//!
//! The loader hands the renderer opaque resource wrappers built from byte
//! blobs and decoded bitmaps, plus per-primitive records carrying
//! everything a draw call needs. No GPU device is touched here; uploading
//! is the consumer's concern.

mod builder;

pub use builder::PrimitiveBuilder;

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::gltf::{sampler_consts, ComponentType, DrawMode, ElementType, Sampler};

/// What a mesh buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Attribute,
    /// Index data.
    Index,
}

/// An uploadable vertex or index buffer, wrapping one split sub-buffer.
#[derive(Debug)]
pub struct MeshBuffer {
    pub target: BufferTarget,
    pub bytes: Arc<Vec<u8>>,
}

impl MeshBuffer {
    #[must_use]
    pub fn new(target: BufferTarget, bytes: Vec<u8>) -> Self {
        Self {
            target,
            bytes: Arc::new(bytes),
        }
    }
}

/// An uploadable texture: the decoded bitmap plus resolved sampler state.
///
/// Filters default to linear / linear-mipmap-linear when the sampler leaves
/// them unset; textures are never flipped on upload.
#[derive(Debug)]
pub struct GpuTexture {
    pub image: image::RgbaImage,
    pub mag_filter: u32,
    pub min_filter: u32,
    pub wrap_s: u32,
    pub wrap_t: u32,
    pub flip_y: bool,
}

impl GpuTexture {
    #[must_use]
    pub fn new(image: image::RgbaImage, sampler: Option<&Sampler>) -> Self {
        let sampler = sampler.copied().unwrap_or_default();
        Self {
            image,
            mag_filter: sampler.mag_filter.unwrap_or(sampler_consts::LINEAR),
            min_filter: sampler
                .min_filter
                .unwrap_or(sampler_consts::LINEAR_MIPMAP_LINEAR),
            wrap_s: sampler.wrap_s,
            wrap_t: sampler.wrap_t,
            flip_y: false,
        }
    }
}

/// A texture bound to a material slot.
#[derive(Debug, Clone)]
pub struct TextureBinding {
    pub texture: Arc<GpuTexture>,
    pub tex_coord_set: usize,
}

/// Flattened material state for one primitive.
///
/// When the glTF primitive has no material this carries the glTF 2.0
/// default material.
#[derive(Debug, Clone)]
pub struct MaterialProps {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureBinding>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<TextureBinding>,
    pub normal_texture: Option<TextureBinding>,
    pub normal_scale: f32,
    pub occlusion_texture: Option<TextureBinding>,
    pub occlusion_strength: f32,
    pub emissive_texture: Option<TextureBinding>,
    pub emissive_factor: [f32; 3],
    pub alpha_mode: crate::gltf::AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
}

impl Default for MaterialProps {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            normal_texture: None,
            normal_scale: 1.0,
            occlusion_texture: None,
            occlusion_strength: 1.0,
            emissive_texture: None,
            emissive_factor: [0.0, 0.0, 0.0],
            alpha_mode: crate::gltf::AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
        }
    }
}

/// One vertex attribute stream of a primitive.
#[derive(Debug, Clone)]
pub struct VertexBinding {
    /// Renderer attribute id (`a_position`, `a_normal`, ...).
    pub name: String,
    pub buffer: Arc<MeshBuffer>,
    pub byte_offset: usize,
    pub byte_stride: Option<usize>,
    pub component_type: ComponentType,
    pub element_type: ElementType,
    pub normalized: bool,
    pub count: usize,
}

/// The index stream of a primitive.
#[derive(Debug, Clone)]
pub struct IndexBinding {
    pub buffer: Arc<MeshBuffer>,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub count: usize,
}

/// Axis-aligned bounds of a primitive, from the POSITION accessor min/max.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// One renderer-ready draw unit.
#[derive(Debug)]
pub struct RenderPrimitive {
    /// Node-to-scene transform accumulated along the node path.
    pub transform: Mat4,
    pub draw_mode: DrawMode,
    /// Minimum count across the attribute accessors.
    pub vertex_count: usize,
    pub attributes: Vec<VertexBinding>,
    pub indices: Option<IndexBinding>,
    pub material: MaterialProps,
    pub bounding_box: Option<BoundingBox>,
    /// Midpoint of the bounding box, when bounds are known.
    pub pivot: Option<Vec3>,
}

/// Maps a glTF attribute semantic to the renderer's attribute id. Unknown
/// semantics pass through unchanged.
#[must_use]
pub fn attribute_name(semantic: &str) -> &str {
    match semantic {
        "POSITION" => "a_position",
        "NORMAL" => "a_normal",
        "TANGENT" => "a_tangent",
        "TEXCOORD_0" => "a_texcoord",
        "TEXCOORD_1" => "a_texcoord1",
        "COLOR_0" => "a_color",
        other => other,
    }
}
