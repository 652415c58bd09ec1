//! Scene Description Tests
//!
//! Tests for:
//! - Generic entities: registered mesh/texture resolution, parameters
//! - Transform resolution (explicit matrix vs cartographic origin)
//! - Markerline point resolution (cartesian and cartographic)
//! - Text entities and per-entry style inheritance
//! - Register and entity-type validation

use std::io::Cursor;
use std::sync::Arc;

use glam::DVec3;
use serde_json::json;

use geoscene::assets::{AssetReaderVariant, MemoryAssetReader};
use geoscene::scene::{Entity, Param, SceneLoader};
use geoscene::{GeosceneError, EARTH_RADIUS};

fn triangle_mesh_bytes() -> Vec<u8> {
    // P layout, u16 indices, triangles; 3 vertices.
    let mut bytes = vec![0u8, 0, 0, 0];
    bytes.extend_from_slice(&3u32.to_le_bytes());
    bytes.extend_from_slice(&3u32.to_le_bytes());
    for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    for index in [0u16, 1, 2] {
        bytes.extend_from_slice(&index.to_le_bytes());
    }
    bytes
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([128, 128, 128, 255]));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn reader() -> AssetReaderVariant {
    let mut reader = MemoryAssetReader::new();
    reader.insert("tri.mesh", triangle_mesh_bytes());
    reader.insert("checker.png", png_bytes());
    AssetReaderVariant::Memory(Arc::new(reader))
}

// ============================================================================
// Generic entities
// ============================================================================

#[tokio::test]
async fn generic_entity_resolves_mesh_texture_and_parameters() {
    let doc = json!({
        "mesh_register": {"tri": {"binary": "tri.mesh"}},
        "texture_register": {"checker": {"image": "checker.png"}},
        "entity_list": [{
            "transform": {"cartographic": [135.0, 35.0, 10.0]},
            "ref_mesh": "tri",
            "properties": {
                "u_opacity": 0.5,
                "u_color": [1.0, 0.0, 0.0],
                "u_tex": {"type": "tex-2d", "ref_texture": "checker"}
            }
        }],
    });

    let scene = SceneLoader::load_value(doc, &reader(), None).await.unwrap();
    assert_eq!(scene.entities.len(), 1);
    let Entity::Generic(entity) = &scene.entities[0] else {
        panic!("expected a generic entity");
    };

    assert_eq!(entity.mesh.vertex_count, 3);
    assert!(matches!(entity.properties["u_opacity"], Param::Float(v) if (v - 0.5).abs() < 1e-6));
    assert!(matches!(entity.properties["u_color"], Param::Vec3(v) if v.x == 1.0 && v.y == 0.0));
    let Param::Texture(image) = &entity.properties["u_tex"] else {
        panic!("expected a texture parameter");
    };
    assert_eq!(image.width(), 2);

    // The cartographic origin lands on the sphere at the given height.
    let origin = entity.transform.col(3).truncate();
    assert!((origin.length() - (EARTH_RADIUS + 10.0)).abs() < 1e-3);
}

#[tokio::test]
async fn matrix_transform_is_applied_verbatim() {
    let doc = json!({
        "mesh_register": {"tri": {"binary": "tri.mesh"}},
        "entity_list": [{
            "transform": {"matrix": [
                1.0, 0.0, 0.0, 0.0,
                0.0, 1.0, 0.0, 0.0,
                0.0, 0.0, 1.0, 0.0,
                100.0, 200.0, 300.0, 1.0
            ]},
            "ref_mesh": "tri"
        }],
    });

    let scene = SceneLoader::load_value(doc, &reader(), None).await.unwrap();
    let Entity::Generic(entity) = &scene.entities[0] else {
        panic!("expected a generic entity");
    };
    assert_eq!(
        entity.transform.col(3).truncate(),
        DVec3::new(100.0, 200.0, 300.0)
    );
}

// ============================================================================
// Markerlines
// ============================================================================

#[tokio::test]
async fn markerline_cartesian_points_pass_through() {
    let doc = json!({
        "entity_list": [{
            "type": "markerline",
            "points": {"cartesian": [0.0, 0.0, 0.0, 10.0, 20.0, 30.0]},
            "line_width": 2.5,
            "color": [0.0, 1.0, 0.0],
            "opacity": 0.75
        }],
    });

    let scene = SceneLoader::load_value(doc, &reader(), None).await.unwrap();
    let Entity::Markerline(line) = &scene.entities[0] else {
        panic!("expected a markerline");
    };
    assert_eq!(line.points.len(), 2);
    assert_eq!(line.points[1], DVec3::new(10.0, 20.0, 30.0));
    assert_eq!(line.line_width, 2.5);
    assert_eq!(line.opacity, 0.75);
}

#[tokio::test]
async fn markerline_cartographic_points_land_on_the_sphere() {
    let doc = json!({
        "entity_list": [{
            "type": "markerline",
            "points": {"cartographic": [0.0, 0.0, 0.0, 90.0, 0.0, 0.0]},
        }],
    });

    let scene = SceneLoader::load_value(doc, &reader(), None).await.unwrap();
    let Entity::Markerline(line) = &scene.entities[0] else {
        panic!("expected a markerline");
    };
    assert!((line.points[0] - DVec3::new(EARTH_RADIUS, 0.0, 0.0)).length() < 1e-3);
    assert!((line.points[1] - DVec3::new(0.0, EARTH_RADIUS, 0.0)).length() < 1e-3);
    // Defaults apply when fields are omitted.
    assert_eq!(line.line_width, 1.0);
    assert_eq!(line.opacity, 1.0);
}

#[tokio::test]
async fn markerline_with_ragged_points_is_malformed() {
    let doc = json!({
        "entity_list": [{
            "type": "markerline",
            "points": {"cartesian": [0.0, 0.0]},
        }],
    });
    let err = SceneLoader::load_value(doc, &reader(), None).await.unwrap_err();
    assert!(matches!(err, GeosceneError::MalformedAsset(_)));
}

// ============================================================================
// Text
// ============================================================================

#[tokio::test]
async fn text_entries_inherit_entity_level_style() {
    let doc = json!({
        "entity_list": [{
            "type": "text",
            "font_style": "italic",
            "font_size": 24.0,
            "color": [1.0, 1.0, 0.0],
            "entries": [
                {"text": "Tokyo", "position": [139.77, 35.68, 0.0]},
                {"text": "Osaka", "position": [135.5, 34.7, 0.0],
                 "font_size": 12.0, "color": [0.0, 0.0, 1.0]}
            ]
        }],
    });

    let scene = SceneLoader::load_value(doc, &reader(), None).await.unwrap();
    let Entity::Text(text) = &scene.entities[0] else {
        panic!("expected a text entity");
    };
    assert_eq!(text.entries.len(), 2);

    let tokyo = &text.entries[0];
    assert_eq!(tokyo.font_style, "italic");
    assert_eq!(tokyo.font_weight, "normal");
    assert_eq!(tokyo.font_size, 24.0);
    assert_eq!(tokyo.font_family, "sans-serif");
    assert_eq!(tokyo.color.y, 1.0);

    let osaka = &text.entries[1];
    assert_eq!(osaka.font_size, 12.0);
    assert_eq!(osaka.color.z, 1.0);
    assert!((osaka.position.length() - EARTH_RADIUS).abs() < 1e-3);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn unknown_entity_type_is_malformed() {
    let doc = json!({"entity_list": [{"type": "hologram"}]});
    let err = SceneLoader::load_value(doc, &reader(), None).await.unwrap_err();
    assert!(matches!(err, GeosceneError::MalformedAsset(_)));
}

#[tokio::test]
async fn unregistered_mesh_reference_is_malformed() {
    let doc = json!({
        "entity_list": [{
            "transform": {"cartographic": [0.0, 0.0, 0.0]},
            "ref_mesh": "ghost"
        }],
    });
    let err = SceneLoader::load_value(doc, &reader(), None).await.unwrap_err();
    assert!(matches!(err, GeosceneError::MalformedAsset(_)));
}

#[tokio::test]
async fn unknown_parameter_type_is_malformed() {
    let doc = json!({
        "mesh_register": {"tri": {"binary": "tri.mesh"}},
        "entity_list": [{
            "transform": {"cartographic": [0.0, 0.0, 0.0]},
            "ref_mesh": "tri",
            "properties": {"u_tex": {"type": "tex-3d", "ref_texture": "checker"}}
        }],
    });
    let err = SceneLoader::load_value(doc, &reader(), None).await.unwrap_err();
    assert!(matches!(err, GeosceneError::MalformedAsset(_)));
}

#[tokio::test]
async fn transform_with_both_forms_is_malformed() {
    let doc = json!({
        "mesh_register": {"tri": {"binary": "tri.mesh"}},
        "entity_list": [{
            "transform": {
                "cartographic": [0.0, 0.0, 0.0],
                "matrix": [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0,
                           0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]
            },
            "ref_mesh": "tri"
        }],
    });
    let err = SceneLoader::load_value(doc, &reader(), None).await.unwrap_err();
    assert!(matches!(err, GeosceneError::MalformedAsset(_)));
}

#[tokio::test]
async fn missing_mesh_file_fails_the_load() {
    let doc = json!({
        "mesh_register": {"tri": {"binary": "nope.mesh"}},
        "entity_list": [{
            "transform": {"cartographic": [0.0, 0.0, 0.0]},
            "ref_mesh": "tri"
        }],
    });
    let err = SceneLoader::load_value(doc, &reader(), None).await.unwrap_err();
    assert!(matches!(err, GeosceneError::FetchFailed(_)));
}
