//! Buffers, buffer views, and accessors.
//!
//! An [`Accessor`] is a typed view over a region of a shared binary
//! [`Buffer`]: component type, vector width, count, and stride. During the
//! post-load pipeline accessors are rebuilt over packed sub-buffers; their
//! original JSON index is retained as the deduplication key.

use crate::errors::{GeosceneError, Result};

/// Scalar component type of an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    /// Maps a glTF `componentType` code.
    #[must_use]
    pub fn from_gltf(code: u32) -> Option<Self> {
        match code {
            5120 => Some(Self::I8),
            5121 => Some(Self::U8),
            5122 => Some(Self::I16),
            5123 => Some(Self::U16),
            5125 => Some(Self::U32),
            5126 => Some(Self::F32),
            _ => None,
        }
    }

    /// Size of one component in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }
}

/// Vector width of an accessor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementType {
    /// Maps a glTF `type` string.
    #[must_use]
    pub fn from_gltf(name: &str) -> Option<Self> {
        match name {
            "SCALAR" => Some(Self::Scalar),
            "VEC2" => Some(Self::Vec2),
            "VEC3" => Some(Self::Vec3),
            "VEC4" => Some(Self::Vec4),
            "MAT2" => Some(Self::Mat2),
            "MAT3" => Some(Self::Mat3),
            "MAT4" => Some(Self::Mat4),
            _ => None,
        }
    }

    /// Number of components per element.
    #[must_use]
    pub fn component_count(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
            Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }
}

/// How an accessor reads its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorUsage {
    /// Vertex attribute data.
    Attribute,
    /// Index data.
    Index,
}

/// One raw byte blob.
///
/// `binary` is empty until the fetch completes, mutable during the post-load
/// pipeline (endian rewrite, splitting), and immutable afterwards.
#[derive(Debug, Default)]
pub struct Buffer {
    pub byte_length: usize,
    pub binary: Vec<u8>,
}

/// A contiguous slice of a buffer. Pure descriptor; owns no bytes.
#[derive(Debug, Clone)]
pub struct BufferView {
    /// Arena index of the owning buffer.
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
}

/// A typed region of a buffer, addressed through a view.
#[derive(Debug, Clone)]
pub struct Accessor {
    /// Arena index of the buffer view. Replaced when the accessor is rebuilt
    /// over a split sub-buffer.
    pub buffer_view: usize,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub element_type: ElementType,
    pub count: usize,
    pub normalized: bool,
    pub min: Option<Vec<f64>>,
    pub max: Option<Vec<f64>>,
    /// The accessor's index in the source JSON, kept as a stable identity
    /// across rebuilding.
    pub original_index: usize,
}

impl Accessor {
    /// Packed size of one element in bytes.
    #[must_use]
    pub fn element_size(&self) -> usize {
        self.component_type.size() * self.element_type.component_count()
    }

    /// Distance between consecutive elements: the view's stride when set,
    /// the packed element size otherwise.
    #[must_use]
    pub fn effective_stride(&self, view: &BufferView) -> usize {
        view.byte_stride.unwrap_or_else(|| self.element_size())
    }

    /// Total byte span addressed by this accessor within its view.
    #[must_use]
    pub fn addressed_size(&self, view: &BufferView) -> usize {
        debug_assert!(self.count > 0);
        (self.count - 1) * self.effective_stride(view) + self.element_size()
    }

    /// Extent `[start, end)` of this accessor in buffer coordinates.
    #[must_use]
    pub fn source_extent(&self, view: &BufferView) -> (usize, usize) {
        let start = view.byte_offset + self.byte_offset;
        (start, start + self.addressed_size(view))
    }

    /// Checks the accessor against its view and the owning buffer length.
    pub fn validate(&self, view: &BufferView, buffer_byte_length: usize) -> Result<()> {
        if self.count == 0 {
            return Err(GeosceneError::MalformedAsset(format!(
                "accessor {} has zero count",
                self.original_index
            )));
        }
        if let Some(stride) = view.byte_stride {
            if stride == 0 || stride < self.element_size() {
                return Err(GeosceneError::MalformedAsset(format!(
                    "buffer view stride {stride} is invalid for accessor {}",
                    self.original_index
                )));
            }
        }
        let addressed = self.addressed_size(view);
        if self.byte_offset + addressed > view.byte_length {
            return Err(GeosceneError::MalformedAsset(format!(
                "accessor {} exceeds its buffer view",
                self.original_index
            )));
        }
        if view.byte_offset + view.byte_length > buffer_byte_length {
            return Err(GeosceneError::MalformedAsset(format!(
                "buffer view of accessor {} exceeds buffer bounds",
                self.original_index
            )));
        }
        Ok(())
    }
}
