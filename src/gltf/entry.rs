//! Per-buffer and per-image bookkeeping.
//!
//! A [`BufferEntry`] tracks which accessors read a shared buffer as vertex
//! attributes vs indices, rewrites the buffer to native byte order, and
//! drives the split-and-rebuild passes. An [`ImageEntry`] tracks the
//! texture-info instances referencing a shared image and collapses their
//! textures after loading.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::gltf::accessor::{Accessor, AccessorUsage, Buffer, BufferView};
use crate::gltf::content::{Material, TextureSlot};
use crate::gltf::splitter::{self, SplitInput};

/// Snapshot of one accessor's layout over the source buffer, taken before
/// any rebuild pass touches it.
#[derive(Debug, Clone, Copy)]
pub struct ExtentInfo {
    pub src_start: usize,
    pub src_end: usize,
    pub byte_stride: Option<usize>,
}

/// Marks 2-byte groups of a buffer that have already been byte-swapped.
///
/// Bit `k` covers the group at byte offset `2k`; a 4-byte group covers two
/// consecutive bits. Groups swap at most once even when addressed by
/// several overlapping accessors, and a second rewrite pass is a no-op.
#[derive(Debug)]
struct SwapMarks {
    bits: Vec<u64>,
}

impl SwapMarks {
    fn new(byte_length: usize) -> Self {
        let groups = byte_length.div_ceil(2);
        Self {
            bits: vec![0; groups.div_ceil(64)],
        }
    }

    fn test(&self, group: usize) -> bool {
        self.bits[group / 64] & (1 << (group % 64)) != 0
    }

    fn set(&mut self, group: usize) {
        self.bits[group / 64] |= 1 << (group % 64);
    }
}

/// State attached to one shared binary buffer.
#[derive(Debug)]
pub struct BufferEntry {
    /// Arena index of the buffer this entry owns.
    pub buffer: usize,
    attribute_accessors: Vec<usize>,
    index_accessors: Vec<usize>,
    swap_marks: Option<SwapMarks>,
}

impl BufferEntry {
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer,
            attribute_accessors: Vec::new(),
            index_accessors: Vec::new(),
            swap_marks: None,
        }
    }

    /// Registers an accessor under one usage, in registration order.
    pub fn register(&mut self, usage: AccessorUsage, accessor: usize) {
        match usage {
            AccessorUsage::Attribute => self.attribute_accessors.push(accessor),
            AccessorUsage::Index => self.index_accessors.push(accessor),
        }
    }

    #[must_use]
    pub fn has_accessors(&self) -> bool {
        !self.attribute_accessors.is_empty() || !self.index_accessors.is_empty()
    }

    /// Original accessors of one usage, deduplicated by their JSON index.
    fn unique_accessors(&self, usage: AccessorUsage, accessors: &[Accessor]) -> Vec<usize> {
        let list = match usage {
            AccessorUsage::Attribute => &self.attribute_accessors,
            AccessorUsage::Index => &self.index_accessors,
        };
        let mut seen = FxHashSet::default();
        let mut unique = Vec::with_capacity(list.len());
        for &a in list {
            if seen.insert(accessors[a].original_index) {
                unique.push(a);
            }
        }
        unique
    }

    /// Original accessors across both usages, deduplicated by JSON index.
    fn all_unique_accessors(&self, accessors: &[Accessor]) -> Vec<usize> {
        let mut seen = FxHashSet::default();
        let mut unique = Vec::new();
        for &a in self.attribute_accessors.iter().chain(&self.index_accessors) {
            if seen.insert(accessors[a].original_index) {
                unique.push(a);
            }
        }
        unique
    }

    /// Captures every registered accessor's source extent and stride before
    /// the rebuild passes replace its view.
    #[must_use]
    pub fn snapshot_extents(
        &self,
        accessors: &[Accessor],
        views: &[BufferView],
    ) -> FxHashMap<usize, ExtentInfo> {
        let mut extents = FxHashMap::default();
        for a in self.all_unique_accessors(accessors) {
            let accessor = &accessors[a];
            let view = &views[accessor.buffer_view];
            let (src_start, src_end) = accessor.source_extent(view);
            extents.insert(
                a,
                ExtentInfo {
                    src_start,
                    src_end,
                    byte_stride: view.byte_stride,
                },
            );
        }
        extents
    }

    /// Swaps the component bytes of every addressed element to native order.
    ///
    /// Buffers arrive little-endian; on a big-endian host every 2-byte
    /// component swaps `[b0,b1] -> [b1,b0]` and every 4-byte component
    /// `[b0..b3] -> [b3..b0]`. The swap-mark bit vector guarantees each group
    /// swaps at most once across aliased accessors, and makes a repeated
    /// invocation a no-op.
    pub fn rewrite_endianness(
        &mut self,
        buffers: &mut [Buffer],
        views: &[BufferView],
        accessors: &[Accessor],
    ) {
        let unique = self.all_unique_accessors(accessors);
        let binary = &mut buffers[self.buffer].binary;
        let marks = self
            .swap_marks
            .get_or_insert_with(|| SwapMarks::new(binary.len()));

        for a in unique {
            let accessor = &accessors[a];
            let comp_size = accessor.component_type.size();
            if comp_size == 1 {
                continue;
            }
            let view = &views[accessor.buffer_view];
            let base = view.byte_offset + accessor.byte_offset;
            let stride = accessor.effective_stride(view);
            let components = accessor.element_type.component_count();

            for i in 0..accessor.count {
                let element = base + i * stride;
                for c in 0..components {
                    let offset = element + c * comp_size;
                    let group = offset / 2;
                    if comp_size == 2 {
                        if !marks.test(group) {
                            marks.set(group);
                            binary.swap(offset, offset + 1);
                        }
                    } else if !marks.test(group) && !marks.test(group + 1) {
                        marks.set(group);
                        marks.set(group + 1);
                        binary[offset..offset + 4].reverse();
                    }
                }
            }
        }
    }

    /// Packs one usage class into a fresh sub-buffer and rebuilds the
    /// accessors over it.
    ///
    /// Each rebuilt accessor receives a new view on the sub-buffer with its
    /// snapshot stride preserved and the accessor-level offset folded into
    /// the view. Returns the arena index of the new buffer, or `None` when
    /// no accessor uses this buffer under `usage`.
    pub fn split_and_rebuild(
        &self,
        usage: AccessorUsage,
        extents: &FxHashMap<usize, ExtentInfo>,
        buffers: &mut Vec<Buffer>,
        views: &mut Vec<BufferView>,
        accessors: &mut [Accessor],
    ) -> Option<usize> {
        let ids = self.unique_accessors(usage, accessors);
        if ids.is_empty() {
            return None;
        }

        let inputs: Vec<SplitInput> = ids
            .iter()
            .map(|&a| {
                let info = &extents[&a];
                SplitInput {
                    accessor: a,
                    src_start: info.src_start,
                    src_end: info.src_end,
                    alignment: accessors[a].component_type.size(),
                }
            })
            .collect();

        let output = splitter::split(&buffers[self.buffer].binary, &inputs);

        let new_buffer = buffers.len();
        buffers.push(Buffer {
            byte_length: output.bytes.len(),
            binary: output.bytes,
        });

        for placement in &output.placements {
            let info = &extents[&placement.accessor];
            let new_view = views.len();
            views.push(BufferView {
                buffer: new_buffer,
                byte_offset: placement.dst_offset,
                byte_length: placement.byte_length,
                byte_stride: info.byte_stride,
            });
            let accessor = &mut accessors[placement.accessor];
            accessor.buffer_view = new_view;
            accessor.byte_offset = 0;
        }

        Some(new_buffer)
    }

    /// Drops the source bytes once both rebuild passes have consumed them.
    pub fn release_source(&self, buffers: &mut [Buffer]) {
        let buffer = &mut buffers[self.buffer];
        buffer.binary = Vec::new();
        buffer.byte_length = 0;
    }
}

/// One texture-info reference: the owning material and the slot within it.
#[derive(Debug, Clone, Copy)]
pub struct TextureInfoRef {
    pub material: usize,
    pub slot: TextureSlot,
}

/// State attached to one shared source image.
#[derive(Debug)]
pub struct ImageEntry {
    /// Arena index of the image this entry owns.
    pub image: usize,
    texture_infos: Vec<TextureInfoRef>,
}

impl ImageEntry {
    #[must_use]
    pub fn new(image: usize) -> Self {
        Self {
            image,
            texture_infos: Vec::new(),
        }
    }

    /// Registers a texture-info reference, in registration order.
    pub fn register(&mut self, material: usize, slot: TextureSlot) {
        self.texture_infos.push(TextureInfoRef { material, slot });
    }

    /// Re-points every registered texture info at the first texture seen
    /// for this image. The representative's sampler is authoritative;
    /// sampler-only variants collapse.
    pub fn dedupe_textures(&self, materials: &mut [Material]) {
        if self.texture_infos.len() < 2 {
            return;
        }
        let first = self.texture_infos[0];
        let Some(representative) = materials[first.material]
            .texture_info(first.slot)
            .map(|info| info.texture)
        else {
            return;
        };
        for reference in &self.texture_infos[1..] {
            if let Some(info) = materials[reference.material].texture_info_mut(reference.slot) {
                info.texture = representative;
            }
        }
    }
}
