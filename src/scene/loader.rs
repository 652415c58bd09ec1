//! The scene-description loader.
//!
//! Parses the scene JSON, fetches every registered resource the entities
//! actually reference (binary meshes, images) with the same single-task
//! drain discipline as the glTF loader, and resolves the entity list into
//! geocentric placements.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use glam::{DMat4, DVec3, Vec3};
use rustc_hash::FxHashMap;

use crate::assets::{decode_image_bytes, uri, AssetReaderVariant};
use crate::errors::{GeosceneError, Result};
use crate::geom::{iscs_to_gocs, Cartographic};
use crate::mesh::BinaryMesh;
use crate::scene::document::{
    GenericEntityDef, MarkerlineDef, ParamDef, PointsDef, SceneDocument, TextDef, TransformDef,
};
use crate::scene::entity::{
    Entity, GenericEntity, MarkerlineEntity, Param, SceneDescription, TextEntity, TextEntry,
};

enum ParsedEntity {
    Generic(GenericEntityDef),
    Markerline(MarkerlineDef),
    Text(TextDef),
}

enum ResourceOutcome {
    Mesh {
        id: String,
        result: Result<BinaryMesh>,
    },
    Texture {
        id: String,
        result: Result<image::RgbaImage>,
    },
}

type ResourceFuture = BoxFuture<'static, ResourceOutcome>;

/// Loads scene-description documents into a [`SceneDescription`].
pub struct SceneLoader;

impl SceneLoader {
    /// Loads a scene document given as JSON text.
    pub async fn load_str(
        body: &str,
        reader: &AssetReaderVariant,
        base_uri: Option<&str>,
    ) -> Result<SceneDescription> {
        let doc: SceneDocument = serde_json::from_str(body)
            .map_err(|e| GeosceneError::MalformedAsset(e.to_string()))?;
        Self::load_document(doc, reader, base_uri).await
    }

    /// Loads a scene document given as a parsed JSON value.
    pub async fn load_value(
        body: serde_json::Value,
        reader: &AssetReaderVariant,
        base_uri: Option<&str>,
    ) -> Result<SceneDescription> {
        let doc: SceneDocument = serde_json::from_value(body)
            .map_err(|e| GeosceneError::MalformedAsset(e.to_string()))?;
        Self::load_document(doc, reader, base_uri).await
    }

    async fn load_document(
        doc: SceneDocument,
        reader: &AssetReaderVariant,
        base_uri: Option<&str>,
    ) -> Result<SceneDescription> {
        // Body phase: dispatch entities on their type and collect the
        // registered resources they reference. Malformed input aborts here.
        let mut parsed = Vec::with_capacity(doc.entity_list.len());
        for value in doc.entity_list {
            let entity_type = value
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("generic")
                .to_string();
            let entity = match entity_type.as_str() {
                "generic" => ParsedEntity::Generic(
                    serde_json::from_value(value)
                        .map_err(|e| GeosceneError::MalformedAsset(format!("generic entity: {e}")))?,
                ),
                "markerline" => ParsedEntity::Markerline(
                    serde_json::from_value(value).map_err(|e| {
                        GeosceneError::MalformedAsset(format!("markerline entity: {e}"))
                    })?,
                ),
                "text" => ParsedEntity::Text(
                    serde_json::from_value(value)
                        .map_err(|e| GeosceneError::MalformedAsset(format!("text entity: {e}")))?,
                ),
                other => {
                    return Err(GeosceneError::MalformedAsset(format!(
                        "unknown entity type: {other}"
                    )))
                }
            };
            parsed.push(entity);
        }

        let mut mesh_uris: BTreeMap<String, String> = BTreeMap::new();
        let mut texture_uris: BTreeMap<String, String> = BTreeMap::new();
        for entity in &parsed {
            let ParsedEntity::Generic(def) = entity else {
                continue;
            };
            if !mesh_uris.contains_key(&def.ref_mesh) {
                let entry = doc.mesh_register.get(&def.ref_mesh).ok_or_else(|| {
                    GeosceneError::MalformedAsset(format!(
                        "ref_mesh {:?} is not in mesh_register",
                        def.ref_mesh
                    ))
                })?;
                mesh_uris.insert(def.ref_mesh.clone(), entry.binary.clone());
            }
            for param in def.properties.values() {
                let ParamDef::Texture(tex) = param else {
                    continue;
                };
                if tex.kind != "tex-2d" {
                    return Err(GeosceneError::MalformedAsset(format!(
                        "unknown parameter type: {}",
                        tex.kind
                    )));
                }
                if !texture_uris.contains_key(&tex.ref_texture) {
                    let entry = doc.texture_register.get(&tex.ref_texture).ok_or_else(|| {
                        GeosceneError::MalformedAsset(format!(
                            "ref_texture {:?} is not in texture_register",
                            tex.ref_texture
                        ))
                    })?;
                    texture_uris.insert(tex.ref_texture.clone(), entry.image.clone());
                }
            }
        }

        // Fetch phase: every referenced resource, drained to completion
        // even after a failure; the first-seen error is surfaced once.
        let base = base_uri.unwrap_or_default();
        let mut fetches: FuturesUnordered<ResourceFuture> = FuturesUnordered::new();
        for (id, u) in mesh_uris {
            let resolved = uri::resolve(&u, base);
            let reader = reader.clone();
            fetches.push(Box::pin(async move {
                let result = match reader.fetch(&resolved).await {
                    Ok(bytes) => BinaryMesh::parse(&bytes),
                    Err(e) => Err(GeosceneError::FetchFailed(e.to_string())),
                };
                ResourceOutcome::Mesh { id, result }
            }));
        }
        for (id, u) in texture_uris {
            let resolved = uri::resolve(&u, base);
            let reader = reader.clone();
            fetches.push(Box::pin(async move {
                let result = match reader.fetch(&resolved).await {
                    Ok(bytes) => decode_image_bytes(bytes).await,
                    Err(e) => Err(GeosceneError::FetchFailed(e.to_string())),
                };
                ResourceOutcome::Texture { id, result }
            }));
        }

        let mut meshes: FxHashMap<String, Arc<BinaryMesh>> = FxHashMap::default();
        let mut textures: FxHashMap<String, Arc<image::RgbaImage>> = FxHashMap::default();
        let mut first_error: Option<GeosceneError> = None;
        while let Some(outcome) = fetches.next().await {
            let failure = match outcome {
                ResourceOutcome::Mesh { id, result } => match result {
                    Ok(mesh) => {
                        meshes.insert(id, Arc::new(mesh));
                        None
                    }
                    Err(e) => Some(e),
                },
                ResourceOutcome::Texture { id, result } => match result {
                    Ok(image) => {
                        textures.insert(id, Arc::new(image));
                        None
                    }
                    Err(e) => Some(e),
                },
            };
            if let Some(error) = failure {
                log::warn!("scene resource failed: {error}");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
        if let Some(error) = first_error {
            return Err(error);
        }

        // Resolution phase: pure and synchronous.
        let mut entities = Vec::with_capacity(parsed.len());
        for entity in parsed {
            entities.push(match entity {
                ParsedEntity::Generic(def) => resolve_generic(def, &meshes, &textures)?,
                ParsedEntity::Markerline(def) => resolve_markerline(def)?,
                ParsedEntity::Text(def) => resolve_text(def),
            });
        }

        Ok(SceneDescription { entities })
    }
}

fn resolve_transform(def: &TransformDef) -> Result<DMat4> {
    match (&def.matrix, &def.cartographic) {
        (Some(matrix), None) => Ok(DMat4::from_cols_array(matrix)),
        (None, Some([lon, lat, height])) => Ok(iscs_to_gocs(*lon, *lat, *height)),
        _ => Err(GeosceneError::MalformedAsset(
            "transform must have exactly one of matrix or cartographic".to_string(),
        )),
    }
}

fn resolve_generic(
    def: GenericEntityDef,
    meshes: &FxHashMap<String, Arc<BinaryMesh>>,
    textures: &FxHashMap<String, Arc<image::RgbaImage>>,
) -> Result<Entity> {
    let transform = resolve_transform(&def.transform)?;
    let mesh = meshes
        .get(&def.ref_mesh)
        .cloned()
        .ok_or_else(|| GeosceneError::MalformedAsset(format!("mesh {:?} missing", def.ref_mesh)))?;

    let mut properties = BTreeMap::new();
    for (id, param) in def.properties {
        let resolved = match param {
            ParamDef::Float(v) => Param::Float(v as f32),
            ParamDef::Vec3(v) => Param::Vec3(Vec3::new(v[0] as f32, v[1] as f32, v[2] as f32)),
            ParamDef::Texture(tex) => {
                let image = textures.get(&tex.ref_texture).cloned().ok_or_else(|| {
                    GeosceneError::MalformedAsset(format!("texture {:?} missing", tex.ref_texture))
                })?;
                Param::Texture(image)
            }
        };
        properties.insert(id, resolved);
    }

    Ok(Entity::Generic(GenericEntity {
        transform,
        mesh,
        properties,
    }))
}

fn resolve_points(def: &PointsDef) -> Result<Vec<DVec3>> {
    let (coords, cartographic) = match (&def.cartesian, &def.cartographic) {
        (Some(c), None) => (c, false),
        (None, Some(c)) => (c, true),
        _ => {
            return Err(GeosceneError::MalformedAsset(
                "points must have exactly one of cartesian or cartographic".to_string(),
            ))
        }
    };
    if coords.len() % 3 != 0 {
        return Err(GeosceneError::MalformedAsset(format!(
            "point list length {} is not a multiple of 3",
            coords.len()
        )));
    }
    Ok(coords
        .chunks_exact(3)
        .map(|triple| {
            if cartographic {
                Cartographic::new(triple[0], triple[1], triple[2]).to_gocs()
            } else {
                DVec3::new(triple[0], triple[1], triple[2])
            }
        })
        .collect())
}

fn resolve_markerline(def: MarkerlineDef) -> Result<Entity> {
    Ok(Entity::Markerline(MarkerlineEntity {
        points: resolve_points(&def.points)?,
        line_width: def.line_width,
        color: Vec3::from_array(def.color),
        opacity: def.opacity,
    }))
}

fn resolve_text(def: TextDef) -> Entity {
    let base_style = def.font_style.unwrap_or_else(|| "normal".to_string());
    let base_weight = def.font_weight.unwrap_or_else(|| "normal".to_string());

    let entries = def
        .entries
        .into_iter()
        .map(|entry| {
            let [lon, lat, height] = entry.position;
            TextEntry {
                text: entry.text,
                position: Cartographic::new(lon, lat, height).to_gocs(),
                font_style: entry.font_style.unwrap_or_else(|| base_style.clone()),
                font_weight: entry.font_weight.unwrap_or_else(|| base_weight.clone()),
                font_size: entry.font_size.unwrap_or(def.font_size),
                font_family: entry.font_family.unwrap_or_else(|| def.font_family.clone()),
                color: Vec3::from_array(entry.color.unwrap_or(def.color)),
            }
        })
        .collect();

    Entity::Text(TextEntity { entries })
}
