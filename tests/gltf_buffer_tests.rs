//! glTF Buffer Pipeline Tests
//!
//! Tests for:
//! - Minimal single-accessor loads (packed sub-buffer emission)
//! - Interleaved attribute coalescing and stride preservation
//! - Attribute/index usage separation into distinct sub-buffers
//! - Native-order component readback after loading
//! - Overlap handling and packing invariants
//! - Determinism across repeated loads

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;

use geoscene::assets::{AssetReaderVariant, MemoryAssetReader};
use geoscene::gltf::{Content, GltfLoader, LoadOptions};

fn empty_reader() -> AssetReaderVariant {
    AssetReaderVariant::Memory(Arc::new(MemoryAssetReader::new()))
}

fn data_uri(bytes: &[u8]) -> String {
    format!("data:application/octet-stream;base64,{}", BASE64.encode(bytes))
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn read_f32(bytes: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

async fn load(doc: serde_json::Value) -> geoscene::Result<Content> {
    GltfLoader::load_value(doc, &empty_reader(), LoadOptions::default()).await
}

// ============================================================================
// Minimal triangle
// ============================================================================

#[tokio::test]
async fn minimal_triangle_produces_one_packed_sub_buffer() {
    let positions = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let doc = json!({
        "asset": {"version": "2.0"},
        "scene": 0,
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "mode": 4}]}],
        "accessors": [{
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
            "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
        }],
        "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 36}],
        "buffers": [{"uri": data_uri(&positions), "byteLength": 36}],
    });

    let content = load(doc).await.unwrap();

    // One sub-buffer appended past the released original.
    assert_eq!(content.buffers.len(), 2);
    assert_eq!(content.buffers[1].byte_length, 36);
    assert_eq!(content.buffers[1].binary, positions);
    assert!(content.buffers[0].binary.is_empty());

    let accessor = &content.accessors[0];
    assert_eq!(accessor.byte_offset, 0);
    let view = &content.buffer_views[accessor.buffer_view];
    assert_eq!(view.buffer, 1);
    assert_eq!(view.byte_offset, 0);
    assert_eq!(view.byte_length, 36);

    let mut builder = geoscene::PrimitiveBuilder::new(&content);
    let primitives = builder.build(content.resolve_scene(None).unwrap()).unwrap();
    assert_eq!(primitives.len(), 1);
    assert_eq!(primitives[0].vertex_count, 3);
}

// ============================================================================
// Interleaved attributes
// ============================================================================

fn interleaved_pn_doc() -> serde_json::Value {
    // 6 vertices, 24-byte stride: position at 0, normal at 12.
    let mut vertices = Vec::new();
    for i in 0..6 {
        vertices.extend_from_slice(&[i as f32, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }
    let bytes = f32_bytes(&vertices);
    json!({
        "asset": {"version": "2.0"},
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0, "NORMAL": 1}}]}],
        "accessors": [
            {"bufferView": 0, "byteOffset": 0, "componentType": 5126, "count": 6, "type": "VEC3"},
            {"bufferView": 0, "byteOffset": 12, "componentType": 5126, "count": 6, "type": "VEC3"}
        ],
        "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 144, "byteStride": 24}],
        "buffers": [{"uri": data_uri(&bytes), "byteLength": 144}],
    })
}

#[tokio::test]
async fn interleaved_attributes_coalesce_into_one_run() {
    let content = load(interleaved_pn_doc()).await.unwrap();

    assert_eq!(content.buffers.len(), 2);
    assert_eq!(content.buffers[1].byte_length, 144);

    let position_view = &content.buffer_views[content.accessors[0].buffer_view];
    let normal_view = &content.buffer_views[content.accessors[1].buffer_view];
    assert_eq!(position_view.buffer, 1);
    assert_eq!(normal_view.buffer, 1);
    assert_eq!(position_view.byte_offset, 0);
    assert_eq!(normal_view.byte_offset, 12);
    assert_eq!(position_view.byte_stride, Some(24));
    assert_eq!(normal_view.byte_stride, Some(24));
    assert_eq!(content.accessors[0].byte_offset, 0);
    assert_eq!(content.accessors[1].byte_offset, 0);
}

// ============================================================================
// Attribute vs index usage
// ============================================================================

#[tokio::test]
async fn attribute_and_index_data_split_into_separate_sub_buffers() {
    let mut bytes = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    for index in [0u16, 1, 2] {
        bytes.extend_from_slice(&index.to_le_bytes());
    }
    let doc = json!({
        "asset": {"version": "2.0"},
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"},
            {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}
        ],
        "bufferViews": [
            {"buffer": 0, "byteOffset": 0, "byteLength": 36},
            {"buffer": 0, "byteOffset": 36, "byteLength": 6}
        ],
        "buffers": [{"uri": data_uri(&bytes), "byteLength": 42}],
    });

    let content = load(doc).await.unwrap();

    // Original released, one attribute sub-buffer, one index sub-buffer.
    assert_eq!(content.buffers.len(), 3);
    let position_view = &content.buffer_views[content.accessors[0].buffer_view];
    let index_view = &content.buffer_views[content.accessors[1].buffer_view];
    assert_ne!(position_view.buffer, index_view.buffer);
    assert_eq!(content.buffers[position_view.buffer].byte_length, 36);
    assert_eq!(content.buffers[index_view.buffer].byte_length, 6);
    assert_eq!(
        content.buffers[index_view.buffer].binary,
        vec![0u8, 0, 1, 0, 2, 0]
    );
}

// ============================================================================
// Native-order readback
// ============================================================================

#[tokio::test]
async fn float_components_read_back_natively_after_load() {
    let positions = f32_bytes(&[1.0, 2.0, 3.0]);
    let doc = json!({
        "asset": {"version": "2.0"},
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
        "accessors": [{"bufferView": 0, "componentType": 5126, "count": 1, "type": "VEC3"}],
        "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 12}],
        "buffers": [{"uri": data_uri(&positions), "byteLength": 12}],
    });

    let content = load(doc).await.unwrap();
    let accessor = &content.accessors[0];
    let view = &content.buffer_views[accessor.buffer_view];
    let bytes = &content.buffers[view.buffer].binary;
    assert_eq!(read_f32(bytes, view.byte_offset), 1.0);
    assert_eq!(read_f32(bytes, view.byte_offset + 4), 2.0);
    assert_eq!(read_f32(bytes, view.byte_offset + 8), 3.0);
}

// ============================================================================
// Overlap
// ============================================================================

#[tokio::test]
async fn identical_extents_rebuild_to_the_same_range() {
    let positions = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let doc = json!({
        "asset": {"version": "2.0"},
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0, "_SHADOW": 1}}]}],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"},
            {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"}
        ],
        "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 36}],
        "buffers": [{"uri": data_uri(&positions), "byteLength": 36}],
    });

    let content = load(doc).await.unwrap();
    let view_a = &content.buffer_views[content.accessors[0].buffer_view];
    let view_b = &content.buffer_views[content.accessors[1].buffer_view];
    assert_eq!(view_a.buffer, view_b.buffer);
    assert_eq!(view_a.byte_offset, view_b.byte_offset);
    assert_eq!(view_a.byte_length, view_b.byte_length);
    // One coalesced run only.
    assert_eq!(content.buffers[view_a.buffer].byte_length, 36);
}

// ============================================================================
// Packing invariants
// ============================================================================

#[tokio::test]
async fn rebuilt_accessors_stay_inside_their_buffers() {
    let content = load(interleaved_pn_doc()).await.unwrap();
    for accessor in &content.accessors {
        let view = &content.buffer_views[accessor.buffer_view];
        let stride = accessor.effective_stride(view);
        let end = view.byte_offset + (accessor.count - 1) * stride + accessor.element_size();
        assert!(end <= content.buffers[view.buffer].byte_length);
    }
}

#[tokio::test]
async fn packing_never_inflates() {
    let positions = f32_bytes(&[0.0; 18]);
    // Two disjoint accessors covering half the buffer each, with a gap.
    let doc = json!({
        "asset": {"version": "2.0"},
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0}],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0, "NORMAL": 1}}]}],
        "accessors": [
            {"bufferView": 0, "byteOffset": 0, "componentType": 5126, "count": 2, "type": "VEC3"},
            {"bufferView": 0, "byteOffset": 48, "componentType": 5126, "count": 2, "type": "VEC3"}
        ],
        "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 72}],
        "buffers": [{"uri": data_uri(&positions), "byteLength": 72}],
    });

    let content = load(doc).await.unwrap();
    let input_total = 72;
    let output_total: usize = content.buffers[1..].iter().map(|b| b.byte_length).sum();
    // The 24-byte gap between the extents is dropped.
    assert_eq!(output_total, 48);
    assert!(output_total <= input_total);
}

// ============================================================================
// Determinism and synchronous completion
// ============================================================================

#[tokio::test]
async fn repeated_loads_are_bytewise_identical() {
    let a = load(interleaved_pn_doc()).await.unwrap();
    let b = load(interleaved_pn_doc()).await.unwrap();

    assert_eq!(a.buffers.len(), b.buffers.len());
    for (ba, bb) in a.buffers.iter().zip(&b.buffers) {
        assert_eq!(ba.binary, bb.binary);
    }
    for (aa, ab) in a.accessors.iter().zip(&b.accessors) {
        assert_eq!(aa.buffer_view, ab.buffer_view);
        assert_eq!(aa.byte_offset, ab.byte_offset);
    }
    for (va, vb) in a.buffer_views.iter().zip(&b.buffer_views) {
        assert_eq!(va.buffer, vb.buffer);
        assert_eq!(va.byte_offset, vb.byte_offset);
        assert_eq!(va.byte_length, vb.byte_length);
    }
}

#[tokio::test]
async fn document_without_external_resources_completes() {
    let doc = json!({
        "asset": {"version": "2.0"},
        "scenes": [{"nodes": [0]}],
        "nodes": [{}],
    });
    let content = load(doc).await.unwrap();
    assert_eq!(content.scenes.len(), 1);
    assert_eq!(content.default_scene_index, -1);
}
