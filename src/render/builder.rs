//! Primitive emission.
//!
//! Consumes a settled [`Content`], walks one resolved scene depth-first
//! while accumulating node-to-scene transforms, and emits renderer-ready
//! primitives. Mesh buffers are created once per split sub-buffer and GPU
//! textures once per texture, both cached by arena index.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use crate::errors::{GeosceneError, Result};
use crate::gltf::{Content, Material, Primitive, TextureInfo};
use crate::render::{
    attribute_name, BoundingBox, BufferTarget, GpuTexture, IndexBinding, MaterialProps,
    MeshBuffer, RenderPrimitive, TextureBinding, VertexBinding,
};

/// Builds draw primitives from loaded content.
pub struct PrimitiveBuilder<'a> {
    content: &'a Content,
    mesh_buffers: FxHashMap<usize, Arc<MeshBuffer>>,
    textures: FxHashMap<usize, Arc<GpuTexture>>,
}

impl<'a> PrimitiveBuilder<'a> {
    #[must_use]
    pub fn new(content: &'a Content) -> Self {
        Self {
            content,
            mesh_buffers: FxHashMap::default(),
            textures: FxHashMap::default(),
        }
    }

    /// Emits the primitives of one scene, in node traversal order.
    pub fn build(&mut self, scene_index: usize) -> Result<Vec<RenderPrimitive>> {
        let scene = self.content.scenes.get(scene_index).ok_or(
            GeosceneError::SceneIndexOutOfRange {
                index: scene_index,
                count: self.content.scenes.len(),
            },
        )?;
        let mut primitives = Vec::new();
        for &root in &scene.nodes {
            self.walk(root, Mat4::IDENTITY, &mut primitives)?;
        }
        Ok(primitives)
    }

    fn walk(
        &mut self,
        node_index: usize,
        parent_to_scene: Mat4,
        out: &mut Vec<RenderPrimitive>,
    ) -> Result<()> {
        let content = self.content;
        let node = &content.nodes[node_index];
        let node_to_scene = parent_to_scene * node.matrix;

        if let Some(mesh) = node.mesh {
            for primitive in &content.meshes[mesh].primitives {
                let emitted = self.emit(primitive, node_to_scene)?;
                out.push(emitted);
            }
        }
        for &child in &node.children {
            self.walk(child, node_to_scene, out)?;
        }
        Ok(())
    }

    fn emit(&mut self, primitive: &Primitive, transform: Mat4) -> Result<RenderPrimitive> {
        let content = self.content;
        let mut attributes = Vec::with_capacity(primitive.attributes.len());
        let mut vertex_count = usize::MAX;
        let mut bounding_box = None;

        for (semantic, &accessor_index) in &primitive.attributes {
            let accessor = &content.accessors[accessor_index];
            let view = &content.buffer_views[accessor.buffer_view];
            let buffer = self.mesh_buffer(view.buffer, BufferTarget::Attribute);

            vertex_count = vertex_count.min(accessor.count);
            if semantic == "POSITION" {
                bounding_box = position_bounds(accessor.min.as_deref(), accessor.max.as_deref());
            }

            attributes.push(VertexBinding {
                name: attribute_name(semantic).to_string(),
                buffer,
                byte_offset: view.byte_offset + accessor.byte_offset,
                byte_stride: view.byte_stride,
                component_type: accessor.component_type,
                element_type: accessor.element_type,
                normalized: accessor.normalized,
                count: accessor.count,
            });
        }
        if vertex_count == usize::MAX {
            vertex_count = 0;
        }

        let indices = match primitive.indices {
            Some(accessor_index) => {
                let accessor = &content.accessors[accessor_index];
                let view = &content.buffer_views[accessor.buffer_view];
                Some(IndexBinding {
                    buffer: self.mesh_buffer(view.buffer, BufferTarget::Index),
                    byte_offset: view.byte_offset + accessor.byte_offset,
                    component_type: accessor.component_type,
                    count: accessor.count,
                })
            }
            None => None,
        };

        let material = match primitive.material {
            Some(index) => self.material_props(&content.materials[index])?,
            None => MaterialProps::default(),
        };

        Ok(RenderPrimitive {
            transform,
            draw_mode: primitive.mode,
            vertex_count,
            attributes,
            indices,
            material,
            pivot: bounding_box.map(|b: BoundingBox| b.center()),
            bounding_box,
        })
    }

    fn mesh_buffer(&mut self, buffer: usize, target: BufferTarget) -> Arc<MeshBuffer> {
        if let Some(existing) = self.mesh_buffers.get(&buffer) {
            return existing.clone();
        }
        let created = Arc::new(MeshBuffer::new(
            target,
            self.content.buffers[buffer].binary.clone(),
        ));
        self.mesh_buffers.insert(buffer, created.clone());
        created
    }

    fn gpu_texture(&mut self, texture_index: usize) -> Result<Arc<GpuTexture>> {
        if let Some(existing) = self.textures.get(&texture_index) {
            return Ok(existing.clone());
        }
        let content = self.content;
        let texture = &content.textures[texture_index];
        let image = &content.images[texture.source];
        let decoded = image.decoded.clone().ok_or_else(|| {
            GeosceneError::MalformedAsset(format!("image {} was not decoded", texture.source))
        })?;
        let sampler = texture.sampler.map(|s| &content.samplers[s]);
        let created = Arc::new(GpuTexture::new(decoded, sampler));
        self.textures.insert(texture_index, created.clone());
        Ok(created)
    }

    fn texture_binding(&mut self, info: &TextureInfo) -> Result<TextureBinding> {
        Ok(TextureBinding {
            texture: self.gpu_texture(info.texture)?,
            tex_coord_set: info.tex_coord_set,
        })
    }

    fn material_props(&mut self, material: &Material) -> Result<MaterialProps> {
        let pbr = &material.pbr_metallic_roughness;
        let mut props = MaterialProps {
            base_color_factor: pbr.base_color_factor,
            metallic_factor: pbr.metallic_factor,
            roughness_factor: pbr.roughness_factor,
            emissive_factor: material.emissive_factor,
            alpha_mode: material.alpha_mode,
            alpha_cutoff: material.alpha_cutoff,
            double_sided: material.double_sided,
            ..MaterialProps::default()
        };

        if let Some(info) = &pbr.base_color_texture {
            props.base_color_texture = Some(self.texture_binding(info)?);
        }
        if let Some(info) = &pbr.metallic_roughness_texture {
            props.metallic_roughness_texture = Some(self.texture_binding(info)?);
        }
        if let Some(info) = &material.normal_texture {
            props.normal_texture = Some(self.texture_binding(info)?);
            if let crate::gltf::TextureInfoKind::Normal { scale } = info.kind {
                props.normal_scale = scale;
            }
        }
        if let Some(info) = &material.occlusion_texture {
            props.occlusion_texture = Some(self.texture_binding(info)?);
            if let crate::gltf::TextureInfoKind::Occlusion { strength } = info.kind {
                props.occlusion_strength = strength;
            }
        }
        if let Some(info) = &material.emissive_texture {
            props.emissive_texture = Some(self.texture_binding(info)?);
        }

        Ok(props)
    }
}

fn position_bounds(min: Option<&[f64]>, max: Option<&[f64]>) -> Option<BoundingBox> {
    let (min, max) = (min?, max?);
    if min.len() < 3 || max.len() < 3 {
        return None;
    }
    Some(BoundingBox {
        min: Vec3::new(min[0] as f32, min[1] as f32, min[2] as f32),
        max: Vec3::new(max[0] as f32, max[1] as f32, max[2] as f32),
    })
}
