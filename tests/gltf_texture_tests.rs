//! glTF Image and Texture Tests
//!
//! Tests for:
//! - Texture deduplication across sampler-only variants of one image
//! - Embedded (buffer-view) image decoding
//! - GPU texture caching and sampler defaults in the primitive builder
//! - Decode failure surfacing

use std::io::Cursor;
use std::sync::Arc;

use serde_json::json;

use geoscene::assets::{AssetReaderVariant, MemoryAssetReader};
use geoscene::gltf::{sampler_consts, GltfLoader, LoadOptions, TextureSlot};
use geoscene::{GeosceneError, PrimitiveBuilder};

fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(color));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn reader_with(entries: &[(&str, Vec<u8>)]) -> AssetReaderVariant {
    let mut reader = MemoryAssetReader::new();
    for (uri, bytes) in entries {
        reader.insert(*uri, bytes.clone());
    }
    AssetReaderVariant::Memory(Arc::new(reader))
}

fn shared_image_doc() -> serde_json::Value {
    // Two materials whose textures differ only in sampler, one source image.
    json!({
        "asset": {"version": "2.0"},
        "scenes": [{"nodes": [0, 1]}],
        "nodes": [{"mesh": 0}, {"mesh": 1}],
        "meshes": [
            {"primitives": [{"attributes": {}, "material": 0}]},
            {"primitives": [{"attributes": {}, "material": 1}]}
        ],
        "materials": [
            {"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}},
            {"pbrMetallicRoughness": {"baseColorTexture": {"index": 1}}}
        ],
        "textures": [
            {"sampler": 0, "source": 0},
            {"sampler": 1, "source": 0}
        ],
        "samplers": [
            {"magFilter": sampler_consts::NEAREST, "wrapS": sampler_consts::CLAMP_TO_EDGE},
            {"magFilter": sampler_consts::LINEAR}
        ],
        "images": [{"uri": "tex.png"}],
    })
}

// ============================================================================
// Deduplication
// ============================================================================

#[tokio::test]
async fn texture_infos_sharing_an_image_collapse_onto_the_first_texture() {
    let reader = reader_with(&[("tex.png", png_bytes(2, 2, [255, 0, 0, 255]))]);
    let content = GltfLoader::load_value(shared_image_doc(), &reader, LoadOptions::default())
        .await
        .unwrap();

    let first = content.materials[0]
        .texture_info(TextureSlot::BaseColor)
        .unwrap();
    let second = content.materials[1]
        .texture_info(TextureSlot::BaseColor)
        .unwrap();
    assert_eq!(first.texture, 0);
    assert_eq!(second.texture, 0, "sampler-only variant must collapse");
}

#[tokio::test]
async fn builder_emits_one_gpu_texture_for_a_shared_image() {
    let reader = reader_with(&[("tex.png", png_bytes(2, 2, [0, 255, 0, 255]))]);
    let content = GltfLoader::load_value(shared_image_doc(), &reader, LoadOptions::default())
        .await
        .unwrap();

    let mut builder = PrimitiveBuilder::new(&content);
    let primitives = builder.build(0).unwrap();
    assert_eq!(primitives.len(), 2);

    let tex_a = &primitives[0]
        .material
        .base_color_texture
        .as_ref()
        .unwrap()
        .texture;
    let tex_b = &primitives[1]
        .material
        .base_color_texture
        .as_ref()
        .unwrap()
        .texture;
    assert!(Arc::ptr_eq(tex_a, tex_b));
    // The representative's sampler is authoritative.
    assert_eq!(tex_a.mag_filter, sampler_consts::NEAREST);
    assert_eq!(tex_a.wrap_s, sampler_consts::CLAMP_TO_EDGE);
    // Unset filters fall back to the linear defaults.
    assert_eq!(tex_a.min_filter, sampler_consts::LINEAR_MIPMAP_LINEAR);
    assert!(!tex_a.flip_y);
}

// ============================================================================
// Embedded images
// ============================================================================

#[tokio::test]
async fn buffer_view_image_decodes_after_its_carrier_buffer() {
    let png = png_bytes(3, 2, [0, 0, 255, 255]);
    let mut reader = MemoryAssetReader::new();
    reader.insert("blob.bin", png.clone());
    let reader = AssetReaderVariant::Memory(Arc::new(reader));

    let doc = json!({
        "asset": {"version": "2.0"},
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0}],
        "meshes": [{"primitives": [{"attributes": {}, "material": 0}]}],
        "materials": [{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}],
        "textures": [{"source": 0}],
        "images": [{"bufferView": 0, "mimeType": "image/png"}],
        "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": png.len()}],
        "buffers": [{"uri": "blob.bin", "byteLength": png.len()}],
    });

    let content = GltfLoader::load_value(doc, &reader, LoadOptions::default())
        .await
        .unwrap();
    let decoded = content.images[0].decoded.as_ref().unwrap();
    assert_eq!(decoded.width(), 3);
    assert_eq!(decoded.height(), 2);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn undecodable_image_surfaces_decode_failed() {
    let reader = reader_with(&[("tex.png", vec![0xde, 0xad, 0xbe, 0xef])]);
    let err = GltfLoader::load_value(shared_image_doc(), &reader, LoadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GeosceneError::DecodeFailed(_)), "got {err:?}");
}

#[tokio::test]
async fn missing_image_surfaces_fetch_failed() {
    let reader = reader_with(&[]);
    let err = GltfLoader::load_value(shared_image_doc(), &reader, LoadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GeosceneError::FetchFailed(_)), "got {err:?}");
}
