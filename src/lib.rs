#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod assets;
pub mod errors;
pub mod geom;
pub mod gltf;
pub mod mesh;
pub mod render;
pub mod scene;

pub use assets::{AssetReader, AssetReaderVariant, FileAssetReader, MemoryAssetReader};
pub use errors::{GeosceneError, Result};
pub use geom::{iscs_to_gocs, Cartographic, EARTH_RADIUS};
pub use gltf::{Content, GltfLoader, LoadOptions};
pub use mesh::BinaryMesh;
pub use render::{GpuTexture, MeshBuffer, PrimitiveBuilder, RenderPrimitive};
pub use scene::{SceneDescription, SceneLoader};

#[cfg(feature = "http")]
pub use assets::HttpAssetReader;
