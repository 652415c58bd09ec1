//! The load context.
//!
//! One [`Context`] coordinates a single load: it owns every entity arena,
//! the per-buffer/per-image entries, the pending-fetch counter, and the
//! failure state. The body-load phase builds the entity tree synchronously
//! (registering accessors and texture infos as a side effect of
//! construction); fetch completions are applied one at a time by the
//! loader; when the body is finished and no fetch is outstanding the
//! context settles exactly once, running the post-load pipeline
//! endian rewrite, then split-and-rebuild, then image dedupe.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::errors::{GeosceneError, Result};
use crate::gltf::accessor::{
    Accessor, AccessorUsage, Buffer, BufferView, ComponentType, ElementType,
};
use crate::gltf::content::{
    compose_node_matrix, AlphaMode, Content, DrawMode, Image, ImageSource, Material, Mesh, Node,
    PbrMetallicRoughness, Primitive, Sampler, Scene, Texture, TextureInfo, TextureInfoKind,
    TextureSlot,
};
use crate::gltf::entry::{BufferEntry, ExtentInfo, ImageEntry};
use crate::gltf::json;
use crate::gltf::LoadOptions;

/// A queued resource fetch, recorded when an entry is first constructed.
#[derive(Debug)]
pub(crate) enum FetchRequest {
    /// External or `data:` bytes for a buffer.
    Buffer { buffer: usize, uri: String },
    /// External or `data:` bytes for an image.
    Image { image: usize, uri: String },
    /// Image bytes embedded in a buffer view; decode waits for the buffer.
    ImageFromView { image: usize, view: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Unbuilt,
    Building,
    Built,
}

pub(crate) struct Context {
    // Entity arenas, index-stable with the source JSON.
    buffers: Vec<Buffer>,
    buffer_uris: Vec<Option<String>>,
    buffer_views: Vec<BufferView>,
    accessors: Vec<Accessor>,
    images: Vec<Image>,
    samplers: Vec<Sampler>,
    textures: Vec<Texture>,
    materials: Vec<Option<Material>>,
    meshes: Vec<Option<Mesh>>,
    nodes: Vec<Option<Node>>,
    scenes: Vec<Scene>,
    default_scene_index: i32,

    // Raw definitions consumed by reachability-driven construction.
    raw_nodes: Vec<json::Node>,
    raw_meshes: Vec<Option<json::Mesh>>,
    raw_materials: Vec<Option<json::Material>>,
    node_state: Vec<NodeState>,

    // Load-state machine.
    buffer_entries: Vec<Option<BufferEntry>>,
    image_entries: Vec<Option<ImageEntry>>,
    fetch_queue: Vec<FetchRequest>,
    pending_count: u32,
    body_finished: bool,
    failed: bool,
    first_error: Option<GeosceneError>,
}

impl Context {
    /// Runs the body-load phase: validates the document, builds the entity
    /// tree reachable from the scenes' roots, and queues every external
    /// fetch. Body-phase errors abort immediately.
    pub fn build(doc: json::Document, opts: &LoadOptions) -> Result<Self> {
        check_version(doc.asset.as_ref())?;

        let buffers: Vec<Buffer> = doc
            .buffers
            .iter()
            .map(|b| Buffer {
                byte_length: b.byte_length,
                binary: Vec::new(),
            })
            .collect();
        let buffer_uris: Vec<Option<String>> =
            doc.buffers.into_iter().map(|b| b.uri).collect();

        let mut buffer_views = Vec::with_capacity(doc.buffer_views.len());
        for (i, raw) in doc.buffer_views.into_iter().enumerate() {
            if raw.buffer >= buffers.len() {
                return Err(GeosceneError::MalformedAsset(format!(
                    "buffer view {i} references missing buffer {}",
                    raw.buffer
                )));
            }
            buffer_views.push(BufferView {
                buffer: raw.buffer,
                byte_offset: raw.byte_offset,
                byte_length: raw.byte_length,
                byte_stride: raw.byte_stride,
            });
        }

        let mut accessors = Vec::with_capacity(doc.accessors.len());
        for (i, raw) in doc.accessors.into_iter().enumerate() {
            let component_type = ComponentType::from_gltf(raw.component_type).ok_or_else(|| {
                GeosceneError::MalformedAsset(format!(
                    "accessor {i} has unknown component type {}",
                    raw.component_type
                ))
            })?;
            let element_type = ElementType::from_gltf(&raw.element_type).ok_or_else(|| {
                GeosceneError::MalformedAsset(format!(
                    "accessor {i} has unknown type {:?}",
                    raw.element_type
                ))
            })?;
            let view_index = raw.buffer_view.ok_or_else(|| {
                GeosceneError::MalformedAsset(format!("accessor {i} has no buffer view"))
            })?;
            let view = buffer_views.get(view_index).ok_or_else(|| {
                GeosceneError::MalformedAsset(format!(
                    "accessor {i} references missing buffer view {view_index}"
                ))
            })?;
            let accessor = Accessor {
                buffer_view: view_index,
                byte_offset: raw.byte_offset,
                component_type,
                element_type,
                count: raw.count,
                normalized: raw.normalized,
                min: raw.min,
                max: raw.max,
                original_index: i,
            };
            accessor.validate(view, buffers[view.buffer].byte_length)?;
            accessors.push(accessor);
        }

        let samplers: Vec<Sampler> = doc
            .samplers
            .into_iter()
            .map(|raw| Sampler {
                mag_filter: raw.mag_filter,
                min_filter: raw.min_filter,
                wrap_s: raw.wrap_s,
                wrap_t: raw.wrap_t,
            })
            .collect();

        let mut images = Vec::with_capacity(doc.images.len());
        for (i, raw) in doc.images.into_iter().enumerate() {
            let source = match (raw.uri, raw.buffer_view) {
                (Some(uri), None) => ImageSource::Uri(uri),
                (None, Some(view)) => {
                    let v = buffer_views.get(view).ok_or_else(|| {
                        GeosceneError::MalformedAsset(format!(
                            "image {i} references missing buffer view {view}"
                        ))
                    })?;
                    if v.byte_offset + v.byte_length > buffers[v.buffer].byte_length {
                        return Err(GeosceneError::MalformedAsset(format!(
                            "image {i} buffer view exceeds buffer bounds"
                        )));
                    }
                    ImageSource::View(view)
                }
                _ => {
                    return Err(GeosceneError::MalformedAsset(format!(
                        "image {i} must have exactly one of uri or bufferView"
                    )))
                }
            };
            images.push(Image {
                source,
                mime_type: raw.mime_type,
                decoded: None,
            });
        }

        let mut textures = Vec::with_capacity(doc.textures.len());
        for (i, raw) in doc.textures.into_iter().enumerate() {
            let source = raw.source.ok_or_else(|| {
                GeosceneError::MalformedAsset(format!("texture {i} has no source image"))
            })?;
            if source >= images.len() {
                return Err(GeosceneError::MalformedAsset(format!(
                    "texture {i} references missing image {source}"
                )));
            }
            if let Some(s) = raw.sampler {
                if s >= samplers.len() {
                    return Err(GeosceneError::MalformedAsset(format!(
                        "texture {i} references missing sampler {s}"
                    )));
                }
            }
            textures.push(Texture {
                sampler: raw.sampler,
                source,
            });
        }

        let node_count = doc.nodes.len();
        let mut scenes = Vec::with_capacity(doc.scenes.len());
        for (i, raw) in doc.scenes.into_iter().enumerate() {
            for &root in &raw.nodes {
                if root >= node_count {
                    return Err(GeosceneError::MalformedAsset(format!(
                        "scene {i} references missing node {root}"
                    )));
                }
            }
            scenes.push(Scene {
                nodes: raw.nodes,
                name: raw.name,
            });
        }

        let default_scene_index = match doc.scene {
            Some(s) => {
                if s >= scenes.len() {
                    return Err(GeosceneError::MalformedAsset(format!(
                        "default scene {s} does not exist"
                    )));
                }
                s as i32
            }
            None => -1,
        };

        if let Some(index) = opts.index {
            if index >= scenes.len() {
                return Err(GeosceneError::SceneIndexOutOfRange {
                    index,
                    count: scenes.len(),
                });
            }
        }

        let buffer_count = buffers.len();
        let image_count = images.len();
        let mesh_count = doc.meshes.len();
        let material_count = doc.materials.len();

        let mut ctx = Self {
            buffers,
            buffer_uris,
            buffer_views,
            accessors,
            images,
            samplers,
            textures,
            materials: (0..material_count).map(|_| None).collect(),
            meshes: (0..mesh_count).map(|_| None).collect(),
            nodes: (0..node_count).map(|_| None).collect(),
            scenes,
            default_scene_index,
            raw_nodes: doc.nodes,
            raw_meshes: doc.meshes.into_iter().map(Some).collect(),
            raw_materials: doc.materials.into_iter().map(Some).collect(),
            node_state: vec![NodeState::Unbuilt; node_count],
            buffer_entries: (0..buffer_count).map(|_| None).collect(),
            image_entries: (0..image_count).map(|_| None).collect(),
            fetch_queue: Vec::new(),
            pending_count: 0,
            body_finished: false,
            failed: false,
            first_error: None,
        };

        for scene_index in 0..ctx.scenes.len() {
            let roots = ctx.scenes[scene_index].nodes.clone();
            for root in roots {
                ctx.build_node(root)?;
            }
        }

        ctx.body_finished = true;
        Ok(ctx)
    }

    // ========================================================================
    // Entity construction (body phase)
    // ========================================================================

    fn build_node(&mut self, index: usize) -> Result<()> {
        match self.node_state[index] {
            NodeState::Built => return Ok(()),
            NodeState::Building => {
                return Err(GeosceneError::MalformedAsset(format!(
                    "node {index} is part of a cycle"
                )))
            }
            NodeState::Unbuilt => {}
        }
        self.node_state[index] = NodeState::Building;

        let raw = &self.raw_nodes[index];
        let matrix = compose_node_matrix(raw);
        let children = raw.children.clone();
        let mesh = raw.mesh;
        let name = raw.name.clone();

        if let Some(m) = mesh {
            if m >= self.raw_meshes.len() {
                return Err(GeosceneError::MalformedAsset(format!(
                    "node {index} references missing mesh {m}"
                )));
            }
            self.build_mesh(m)?;
        }
        for &child in &children {
            if child >= self.raw_nodes.len() {
                return Err(GeosceneError::MalformedAsset(format!(
                    "node {index} references missing child {child}"
                )));
            }
            self.build_node(child)?;
        }

        self.nodes[index] = Some(Node {
            mesh,
            children,
            matrix,
            name,
        });
        self.node_state[index] = NodeState::Built;
        Ok(())
    }

    fn build_mesh(&mut self, index: usize) -> Result<()> {
        if self.meshes[index].is_some() {
            return Ok(());
        }
        let Some(raw) = self.raw_meshes[index].take() else {
            return Ok(());
        };

        let mut primitives = Vec::with_capacity(raw.primitives.len());
        for raw_primitive in raw.primitives {
            let mode = match raw_primitive.mode {
                Some(code) => DrawMode::from_gltf(code)?,
                None => DrawMode::Triangles,
            };

            let mut attributes = BTreeMap::new();
            for (semantic, accessor) in raw_primitive.attributes {
                self.add_accessor(index, accessor, AccessorUsage::Attribute)?;
                attributes.insert(semantic, accessor);
            }

            let indices = raw_primitive.indices;
            if let Some(accessor) = indices {
                self.add_accessor(index, accessor, AccessorUsage::Index)?;
            }

            let material = raw_primitive.material;
            if let Some(m) = material {
                if m >= self.raw_materials.len() {
                    return Err(GeosceneError::MalformedAsset(format!(
                        "mesh {index} references missing material {m}"
                    )));
                }
                self.build_material(m)?;
            }

            primitives.push(Primitive {
                attributes,
                indices,
                material,
                mode,
            });
        }

        self.meshes[index] = Some(Mesh { primitives });
        Ok(())
    }

    /// Registers an accessor with the entry of its backing buffer, lazily
    /// constructing the entry (and queuing its fetch) on first reference.
    fn add_accessor(&mut self, mesh: usize, accessor: usize, usage: AccessorUsage) -> Result<()> {
        if accessor >= self.accessors.len() {
            return Err(GeosceneError::MalformedAsset(format!(
                "mesh {mesh} references missing accessor {accessor}"
            )));
        }
        let view = self.accessors[accessor].buffer_view;
        let buffer = self.buffer_views[view].buffer;
        self.find_buffer_entry(buffer)?.register(usage, accessor);
        Ok(())
    }

    fn build_material(&mut self, index: usize) -> Result<()> {
        if self.materials[index].is_some() {
            return Ok(());
        }
        let Some(raw) = self.raw_materials[index].take() else {
            return Ok(());
        };

        let raw_pbr = raw.pbr_metallic_roughness.unwrap_or_default();
        let mut material = Material {
            pbr_metallic_roughness: PbrMetallicRoughness {
                base_color_factor: raw_pbr.base_color_factor,
                base_color_texture: None,
                metallic_factor: raw_pbr.metallic_factor,
                roughness_factor: raw_pbr.roughness_factor,
                metallic_roughness_texture: None,
            },
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: raw.emissive_factor,
            alpha_mode: AlphaMode::from_gltf(&raw.alpha_mode)?,
            alpha_cutoff: raw.alpha_cutoff,
            double_sided: raw.double_sided,
        };

        if let Some(info) = raw_pbr.base_color_texture {
            material.pbr_metallic_roughness.base_color_texture = Some(self.add_texture_info(
                index,
                TextureSlot::BaseColor,
                info.index,
                info.tex_coord,
                TextureInfoKind::Base,
            )?);
        }
        if let Some(info) = raw_pbr.metallic_roughness_texture {
            material.pbr_metallic_roughness.metallic_roughness_texture =
                Some(self.add_texture_info(
                    index,
                    TextureSlot::MetallicRoughness,
                    info.index,
                    info.tex_coord,
                    TextureInfoKind::Base,
                )?);
        }
        if let Some(info) = raw.normal_texture {
            material.normal_texture = Some(self.add_texture_info(
                index,
                TextureSlot::Normal,
                info.index,
                info.tex_coord,
                TextureInfoKind::Normal { scale: info.scale },
            )?);
        }
        if let Some(info) = raw.occlusion_texture {
            material.occlusion_texture = Some(self.add_texture_info(
                index,
                TextureSlot::Occlusion,
                info.index,
                info.tex_coord,
                TextureInfoKind::Occlusion {
                    strength: info.strength,
                },
            )?);
        }
        if let Some(info) = raw.emissive_texture {
            material.emissive_texture = Some(self.add_texture_info(
                index,
                TextureSlot::Emissive,
                info.index,
                info.tex_coord,
                TextureInfoKind::Base,
            )?);
        }

        self.materials[index] = Some(material);
        Ok(())
    }

    /// Builds a texture info and registers it with the entry of its source
    /// image, lazily constructing the entry (and queuing its fetch).
    fn add_texture_info(
        &mut self,
        material: usize,
        slot: TextureSlot,
        texture: usize,
        tex_coord_set: usize,
        kind: TextureInfoKind,
    ) -> Result<TextureInfo> {
        if texture >= self.textures.len() {
            return Err(GeosceneError::MalformedAsset(format!(
                "material {material} references missing texture {texture}"
            )));
        }
        let image = self.textures[texture].source;
        self.find_image_entry(image)?.register(material, slot);
        Ok(TextureInfo {
            texture,
            tex_coord_set,
            kind,
        })
    }

    fn find_buffer_entry(&mut self, buffer: usize) -> Result<&mut BufferEntry> {
        if self.buffer_entries[buffer].is_none() {
            let uri = self.buffer_uris[buffer].clone().ok_or_else(|| {
                GeosceneError::MalformedAsset(format!("buffer {buffer} has no uri"))
            })?;
            self.fetch_queue.push(FetchRequest::Buffer { buffer, uri });
            self.pending_count += 1;
            self.buffer_entries[buffer] = Some(BufferEntry::new(buffer));
        }
        Ok(self.buffer_entries[buffer]
            .as_mut()
            .expect("buffer entry just ensured"))
    }

    fn find_image_entry(&mut self, image: usize) -> Result<&mut ImageEntry> {
        if self.image_entries[image].is_none() {
            let source = self.images[image].source.clone();
            let request = match source {
                ImageSource::Uri(uri) => FetchRequest::Image { image, uri },
                ImageSource::View(view) => {
                    // The carrier buffer must be fetched before the decode.
                    let buffer = self.buffer_views[view].buffer;
                    self.find_buffer_entry(buffer)?;
                    FetchRequest::ImageFromView { image, view }
                }
            };
            self.fetch_queue.push(request);
            self.pending_count += 1;
            self.image_entries[image] = Some(ImageEntry::new(image));
        }
        Ok(self.image_entries[image]
            .as_mut()
            .expect("image entry just ensured"))
    }

    // ========================================================================
    // Fetch completion (applied one at a time by the loader)
    // ========================================================================

    pub fn take_fetch_queue(&mut self) -> Vec<FetchRequest> {
        std::mem::take(&mut self.fetch_queue)
    }

    pub fn on_buffer_fetched(&mut self, buffer: usize, result: Result<Vec<u8>>) {
        match result {
            Ok(mut bytes) => {
                let declared = self.buffers[buffer].byte_length;
                if bytes.len() < declared {
                    self.record_failure(GeosceneError::MalformedAsset(format!(
                        "buffer {buffer} delivered {} bytes, {declared} declared",
                        bytes.len()
                    )));
                } else {
                    bytes.truncate(declared);
                    self.buffers[buffer].binary = bytes;
                }
            }
            Err(error) => self.record_failure(error),
        }
        self.pending_count -= 1;
    }

    pub fn on_image_decoded(&mut self, image: usize, result: Result<image::RgbaImage>) {
        match result {
            Ok(decoded) => self.images[image].decoded = Some(decoded),
            Err(error) => self.record_failure(error),
        }
        self.pending_count -= 1;
    }

    pub fn record_failure(&mut self, error: GeosceneError) {
        log::warn!("asset resource failed: {error}");
        self.failed = true;
        if self.first_error.is_none() {
            self.first_error = Some(error);
        }
    }

    pub fn is_settled(&self) -> bool {
        self.body_finished && self.pending_count == 0
    }

    pub fn buffer_has_binary(&self, buffer: usize) -> bool {
        !self.buffers[buffer].binary.is_empty()
    }

    pub fn view_buffer(&self, view: usize) -> usize {
        self.buffer_views[view].buffer
    }

    /// Copies the bytes a view addresses, for deferred image decoding.
    pub fn view_bytes(&self, view: usize) -> Result<Vec<u8>> {
        let v = &self.buffer_views[view];
        let binary = &self.buffers[v.buffer].binary;
        let end = v.byte_offset + v.byte_length;
        if end > binary.len() {
            return Err(GeosceneError::MalformedAsset(format!(
                "image buffer view exceeds fetched buffer {}",
                v.buffer
            )));
        }
        Ok(binary[v.byte_offset..end].to_vec())
    }

    // ========================================================================
    // Settlement
    // ========================================================================

    /// Consumes the settled context: surfaces the aggregate failure, or runs
    /// the post-load pipeline and publishes the content.
    pub fn finish(mut self) -> Result<Content> {
        debug_assert!(self.is_settled());
        if self.failed {
            return Err(self
                .first_error
                .take()
                .unwrap_or_else(|| GeosceneError::FetchFailed("asset load failed".to_string())));
        }

        // Stage 1: endian rewrite, entries in buffer declaration order.
        // Buffers arrive little-endian; on a little-endian host the rewrite
        // is skipped entirely.
        let mut snapshots: Vec<Option<FxHashMap<usize, ExtentInfo>>> =
            (0..self.buffer_entries.len()).map(|_| None).collect();
        for i in 0..self.buffer_entries.len() {
            let Some(mut entry) = self.buffer_entries[i].take() else {
                continue;
            };
            snapshots[i] = Some(entry.snapshot_extents(&self.accessors, &self.buffer_views));
            if cfg!(target_endian = "big") {
                entry.rewrite_endianness(&mut self.buffers, &self.buffer_views, &self.accessors);
            }
            self.buffer_entries[i] = Some(entry);
        }

        // Stage 2: split each buffer into packed attribute/index sub-buffers
        // and rebuild the accessors over them.
        for i in 0..self.buffer_entries.len() {
            let Some(entry) = self.buffer_entries[i].take() else {
                continue;
            };
            let extents = snapshots[i].take().unwrap_or_default();
            entry.split_and_rebuild(
                AccessorUsage::Attribute,
                &extents,
                &mut self.buffers,
                &mut self.buffer_views,
                &mut self.accessors,
            );
            entry.split_and_rebuild(
                AccessorUsage::Index,
                &extents,
                &mut self.buffers,
                &mut self.buffer_views,
                &mut self.accessors,
            );
            if entry.has_accessors() {
                entry.release_source(&mut self.buffers);
            }
            self.buffer_entries[i] = Some(entry);
        }

        // Stage 3: collapse textures sharing a source image.
        let mut materials: Vec<Material> = self
            .materials
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        for entry in self.image_entries.iter().flatten() {
            entry.dedupe_textures(&mut materials);
        }

        Ok(Content {
            buffers: self.buffers,
            buffer_views: self.buffer_views,
            accessors: self.accessors,
            images: self.images,
            samplers: self.samplers,
            textures: self.textures,
            materials,
            meshes: self
                .meshes
                .into_iter()
                .map(Option::unwrap_or_default)
                .collect(),
            nodes: self
                .nodes
                .into_iter()
                .map(Option::unwrap_or_default)
                .collect(),
            scenes: self.scenes,
            default_scene_index: self.default_scene_index,
        })
    }
}

fn check_version(asset: Option<&json::Asset>) -> Result<()> {
    let Some(version) = asset.and_then(|a| a.version.as_deref()) else {
        return Err(GeosceneError::VersionUnsupported(
            "asset.version is missing".to_string(),
        ));
    };
    match json::parse_version(version) {
        Some((major, _)) if major >= 2 => Ok(()),
        _ => Err(GeosceneError::VersionUnsupported(version.to_string())),
    }
}
