//! Asset Fetching
//!
//! This module provides the transport layer the loaders pull external
//! resources through:
//!
//! - [`AssetReader`]: asynchronous byte source trait
//! - [`AssetReaderVariant`]: enum dispatch over the available readers
//! - [`uri`]: URI classification, base resolution, and `data:` payloads
//!
//! Readers cover local files, preloaded in-memory archives, and (behind the
//! `http` feature) HTTP endpoints.

pub mod io;
pub mod uri;

pub use io::{AssetReader, AssetReaderVariant, FileAssetReader, MemoryAssetReader};

#[cfg(feature = "http")]
pub use io::HttpAssetReader;

use crate::errors::{GeosceneError, Result};

/// Decodes image bytes to RGBA8 on the blocking pool.
pub(crate) async fn decode_image_bytes(bytes: Vec<u8>) -> Result<image::RgbaImage> {
    let decoded = tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes).map(image::DynamicImage::into_rgba8)
    })
    .await?;
    decoded.map_err(|e| GeosceneError::DecodeFailed(e.to_string()))
}
