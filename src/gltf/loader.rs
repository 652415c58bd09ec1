//! The glTF loader entry point.
//!
//! Drives one load end to end: body parse, concurrent resource fetching,
//! and settlement. All context mutation happens on the calling task; the
//! fetch futures only ever resolve to completion messages that the drain
//! loop applies one at a time.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use rustc_hash::FxHashMap;

use crate::assets::{uri, AssetReaderVariant};
use crate::errors::{GeosceneError, Result};
use crate::gltf::context::{Context, FetchRequest};
use crate::gltf::json;
use crate::gltf::{Content, LoadOptions};

/// A completed fetch, delivered to the drain loop.
enum FetchOutcome {
    Buffer {
        buffer: usize,
        result: Result<Vec<u8>>,
    },
    Image {
        image: usize,
        result: Result<image::RgbaImage>,
    },
}

type FetchFuture = BoxFuture<'static, FetchOutcome>;

/// Loads glTF model assets into [`Content`].
pub struct GltfLoader;

impl GltfLoader {
    /// Loads a glTF document given as JSON text.
    pub async fn load_str(
        body: &str,
        reader: &AssetReaderVariant,
        opts: LoadOptions,
    ) -> Result<Content> {
        let doc: json::Document = serde_json::from_str(body)
            .map_err(|e| GeosceneError::MalformedAsset(e.to_string()))?;
        Self::load_document(doc, reader, opts).await
    }

    /// Loads a glTF document given as a parsed JSON value.
    pub async fn load_value(
        body: serde_json::Value,
        reader: &AssetReaderVariant,
        opts: LoadOptions,
    ) -> Result<Content> {
        let doc: json::Document = serde_json::from_value(body)
            .map_err(|e| GeosceneError::MalformedAsset(e.to_string()))?;
        Self::load_document(doc, reader, opts).await
    }

    async fn load_document(
        doc: json::Document,
        reader: &AssetReaderVariant,
        opts: LoadOptions,
    ) -> Result<Content> {
        let mut ctx = Context::build(doc, &opts)?;
        let base = opts.base_uri.unwrap_or_default();

        let mut fetches: FuturesUnordered<FetchFuture> = FuturesUnordered::new();
        // Buffer-view images wait for their carrier buffer, keyed by buffer.
        let mut deferred: FxHashMap<usize, Vec<(usize, usize)>> = FxHashMap::default();

        for request in ctx.take_fetch_queue() {
            match request {
                FetchRequest::Buffer { buffer, uri: u } => {
                    let resolved = uri::resolve(&u, &base);
                    let reader = reader.clone();
                    fetches.push(Box::pin(async move {
                        FetchOutcome::Buffer {
                            buffer,
                            result: fetch_bytes(&reader, &resolved).await,
                        }
                    }));
                }
                FetchRequest::Image { image, uri: u } => {
                    let resolved = uri::resolve(&u, &base);
                    let reader = reader.clone();
                    fetches.push(Box::pin(async move {
                        let result = match fetch_bytes(&reader, &resolved).await {
                            Ok(bytes) => decode_image(bytes).await,
                            Err(error) => Err(error),
                        };
                        FetchOutcome::Image { image, result }
                    }));
                }
                FetchRequest::ImageFromView { image, view } => {
                    deferred
                        .entry(ctx.view_buffer(view))
                        .or_default()
                        .push((image, view));
                }
            }
        }

        // Drain every outstanding fetch; failures are recorded on the
        // context but the remaining I/O still settles. A document with no
        // external resources never enters the loop and completes on the
        // body-parse tick.
        while let Some(outcome) = fetches.next().await {
            match outcome {
                FetchOutcome::Buffer { buffer, result } => {
                    ctx.on_buffer_fetched(buffer, result);
                    if let Some(waiters) = deferred.remove(&buffer) {
                        for (image, view) in waiters {
                            if ctx.buffer_has_binary(buffer) {
                                match ctx.view_bytes(view) {
                                    Ok(bytes) => {
                                        fetches.push(Box::pin(async move {
                                            FetchOutcome::Image {
                                                image,
                                                result: decode_image(bytes).await,
                                            }
                                        }));
                                    }
                                    Err(error) => ctx.on_image_decoded(image, Err(error)),
                                }
                            } else {
                                ctx.on_image_decoded(
                                    image,
                                    Err(GeosceneError::FetchFailed(format!(
                                        "carrier buffer {buffer} was not loaded"
                                    ))),
                                );
                            }
                        }
                    }
                }
                FetchOutcome::Image { image, result } => {
                    ctx.on_image_decoded(image, result);
                }
            }
        }

        ctx.finish()
    }
}

/// Fetches the bytes behind a resolved URI, folding every failure into the
/// aggregate fetch-failure kind.
async fn fetch_bytes(reader: &AssetReaderVariant, resolved: &str) -> Result<Vec<u8>> {
    reader
        .fetch(resolved)
        .await
        .map_err(|e| GeosceneError::FetchFailed(e.to_string()))
}

/// Decodes image bytes to RGBA8 on the blocking pool.
async fn decode_image(bytes: Vec<u8>) -> Result<image::RgbaImage> {
    crate::assets::decode_image_bytes(bytes).await
}
