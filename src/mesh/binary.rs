//! Binary mesh container.
//!
//! Layout, all multi-byte fields little-endian:
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0      | 1    | vertex layout (0 P, 1 PN, 2 PT, 3 PNT) |
//! | 1      | 1    | index format (0 u16, 1 u32) |
//! | 2      | 1    | primitive type (0 triangles, 1 lines) |
//! | 3      | 1    | padding, zero |
//! | 4      | 4    | vertex count |
//! | 8      | 4    | index count |
//! | 12     | n·V  | vertex data |
//! | ...    | m·I  | index data |
//!
//! Attribute order within a vertex is position, then normal, then texture
//! coordinates, each as f32 components.

use crate::errors::{GeosceneError, Result};

const HEADER_SIZE: usize = 12;

/// Which attributes a vertex carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexLayout {
    /// Position only.
    P,
    /// Position and normal.
    Pn,
    /// Position and texture coordinates.
    Pt,
    /// Position, normal, and texture coordinates.
    Pnt,
}

impl VertexLayout {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::P),
            1 => Some(Self::Pn),
            2 => Some(Self::Pt),
            3 => Some(Self::Pnt),
            _ => None,
        }
    }

    /// Byte stride of one vertex.
    #[must_use]
    pub fn stride(self) -> usize {
        match self {
            Self::P => 12,
            Self::Pn => 24,
            Self::Pt => 20,
            Self::Pnt => 32,
        }
    }

    #[must_use]
    pub fn has_normal(self) -> bool {
        matches!(self, Self::Pn | Self::Pnt)
    }

    #[must_use]
    pub fn has_texcoord(self) -> bool {
        matches!(self, Self::Pt | Self::Pnt)
    }

    /// Byte offset of the normal within a vertex, when present.
    #[must_use]
    pub fn normal_offset(self) -> Option<usize> {
        self.has_normal().then_some(12)
    }

    /// Byte offset of the texture coordinates within a vertex, when present.
    #[must_use]
    pub fn texcoord_offset(self) -> Option<usize> {
        match self {
            Self::Pt => Some(12),
            Self::Pnt => Some(24),
            Self::P | Self::Pn => None,
        }
    }
}

/// Width of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::U16),
            1 => Some(Self::U32),
            _ => None,
        }
    }

    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// What the index list describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshPrimitiveType {
    Triangles,
    Lines,
}

impl MeshPrimitiveType {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Triangles),
            1 => Some(Self::Lines),
            _ => None,
        }
    }
}

/// A parsed binary mesh: header fields plus the raw vertex/index blocks.
#[derive(Debug)]
pub struct BinaryMesh {
    pub vertex_layout: VertexLayout,
    pub index_format: IndexFormat,
    pub primitive_type: MeshPrimitiveType,
    pub vertex_count: u32,
    pub index_count: u32,
    vertex_data: Vec<u8>,
    index_data: Vec<u8>,
}

impl BinaryMesh {
    /// Parses a binary mesh container. An invalid or truncated header, or a
    /// body shorter than the header promises, is a malformed asset.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(GeosceneError::MalformedAsset(
                "binary mesh header is truncated".to_string(),
            ));
        }

        let vertex_layout = VertexLayout::from_code(bytes[0]).ok_or_else(|| {
            GeosceneError::MalformedAsset(format!("unknown vertex layout code {}", bytes[0]))
        })?;
        let index_format = IndexFormat::from_code(bytes[1]).ok_or_else(|| {
            GeosceneError::MalformedAsset(format!("unknown index format code {}", bytes[1]))
        })?;
        let primitive_type = MeshPrimitiveType::from_code(bytes[2]).ok_or_else(|| {
            GeosceneError::MalformedAsset(format!("unknown primitive type code {}", bytes[2]))
        })?;
        if bytes[3] != 0 {
            return Err(GeosceneError::MalformedAsset(
                "binary mesh header padding is not zero".to_string(),
            ));
        }

        let vertex_count = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let index_count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

        let vertex_bytes = vertex_count as usize * vertex_layout.stride();
        let index_bytes = index_count as usize * index_format.size();
        let needed = HEADER_SIZE + vertex_bytes + index_bytes;
        if bytes.len() < needed {
            return Err(GeosceneError::MalformedAsset(format!(
                "binary mesh is truncated: {} bytes, {needed} needed",
                bytes.len()
            )));
        }

        let vertex_data = bytes[HEADER_SIZE..HEADER_SIZE + vertex_bytes].to_vec();
        let index_data =
            bytes[HEADER_SIZE + vertex_bytes..HEADER_SIZE + vertex_bytes + index_bytes].to_vec();

        Ok(Self {
            vertex_layout,
            index_format,
            primitive_type,
            vertex_count,
            index_count,
            vertex_data,
            index_data,
        })
    }

    /// Raw interleaved vertex bytes.
    #[must_use]
    pub fn vertex_data(&self) -> &[u8] {
        &self.vertex_data
    }

    /// Raw index bytes.
    #[must_use]
    pub fn index_data(&self) -> &[u8] {
        &self.index_data
    }

    /// Vertex positions in declaration order.
    #[must_use]
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.read_vec3_at(0)
    }

    /// Vertex normals, when the layout carries them.
    #[must_use]
    pub fn normals(&self) -> Option<Vec<[f32; 3]>> {
        self.vertex_layout
            .normal_offset()
            .map(|offset| self.read_vec3_at(offset))
    }

    /// Vertex texture coordinates, when the layout carries them.
    #[must_use]
    pub fn texcoords(&self) -> Option<Vec<[f32; 2]>> {
        let offset = self.vertex_layout.texcoord_offset()?;
        let stride = self.vertex_layout.stride();
        let mut out = Vec::with_capacity(self.vertex_count as usize);
        for i in 0..self.vertex_count as usize {
            let at = i * stride + offset;
            out.push([
                read_f32_le(&self.vertex_data, at),
                read_f32_le(&self.vertex_data, at + 4),
            ]);
        }
        Some(out)
    }

    /// Indices widened to u32.
    #[must_use]
    pub fn indices(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.index_count as usize);
        match self.index_format {
            IndexFormat::U16 => {
                for chunk in self.index_data.chunks_exact(2) {
                    out.push(u32::from(u16::from_le_bytes([chunk[0], chunk[1]])));
                }
            }
            IndexFormat::U32 => {
                for chunk in self.index_data.chunks_exact(4) {
                    out.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
                }
            }
        }
        out
    }

    fn read_vec3_at(&self, offset: usize) -> Vec<[f32; 3]> {
        let stride = self.vertex_layout.stride();
        let mut out = Vec::with_capacity(self.vertex_count as usize);
        for i in 0..self.vertex_count as usize {
            let at = i * stride + offset;
            out.push([
                read_f32_le(&self.vertex_data, at),
                read_f32_le(&self.vertex_data, at + 4),
                read_f32_le(&self.vertex_data, at + 8),
            ]);
        }
        out
    }
}

fn read_f32_le(bytes: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
