//! Asset readers.
//!
//! External resources referenced by an asset (binary buffers, images,
//! registered meshes) are fetched through an [`AssetReader`]. Local files
//! and preloaded in-memory archives are always available; HTTP fetching is
//! gated behind the `http` feature.
//!
//! Readers receive URIs that already went through [`uri::resolve`], so they
//! only deal with lookup: a file reader maps URIs beneath its root
//! directory, the HTTP reader joins them onto its base URL with the same
//! resolution rule the loaders use.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::assets::uri;
use crate::errors::{GeosceneError, Result};

/// Asynchronous byte source for external resources.
pub trait AssetReader: Send + Sync {
    /// Reads the full byte content of `uri`.
    fn read_bytes(&self, uri: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

/// Reads assets from a directory on the local filesystem.
///
/// URIs are looked up beneath the root; segments that would escape it are
/// refused, so a hostile document cannot read outside its own directory.
pub struct FileAssetReader {
    root: PathBuf,
}

impl FileAssetReader {
    /// Creates a reader rooted at `root`. Use
    /// [`AssetReaderVariant::from_source`] to root one at the directory of
    /// a document path instead.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetReader for FileAssetReader {
    async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>> {
        if uri.split('/').any(|segment| segment == "..") {
            return Err(GeosceneError::FetchFailed(format!(
                "refusing parent traversal in {uri:?}"
            )));
        }
        let data = tokio::fs::read(self.root.join(uri)).await?;
        Ok(data)
    }
}

/// Serves assets from a preloaded in-memory map.
///
/// Used for bundled archives and tests; a missing entry reports as a fetch
/// failure, like a 404 would.
#[derive(Default)]
pub struct MemoryAssetReader {
    entries: FxHashMap<String, Vec<u8>>,
}

impl MemoryAssetReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(uri.into(), bytes);
    }

    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }
}

impl AssetReader for MemoryAssetReader {
    async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>> {
        self.entries
            .get(uri)
            .cloned()
            .ok_or_else(|| GeosceneError::FetchFailed(format!("no such entry: {uri}")))
    }
}

/// Fetches assets over HTTP.
///
/// The base may be a directory URL or the URL of the document itself;
/// request URLs are derived from it with [`uri::resolve`], so a relative
/// URI lands next to the document exactly as the loaders resolve it.
#[cfg(feature = "http")]
pub struct HttpAssetReader {
    base: String,
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpAssetReader {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let base = base.into();
        // Fail at construction rather than on the first fetch.
        reqwest::Url::parse(&base)?;
        Ok(Self {
            base,
            client: reqwest::Client::new(),
        })
    }

    #[inline]
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }
}

#[cfg(feature = "http")]
impl AssetReader for HttpAssetReader {
    async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>> {
        let url = reqwest::Url::parse(&uri::resolve(uri, &self.base))?;
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(GeosceneError::HttpResponseError {
                status: resp.status().as_u16(),
            });
        }
        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Reader variant dispatch, avoiding trait objects on the fetch path.
#[derive(Clone)]
pub enum AssetReaderVariant {
    File(Arc<FileAssetReader>),
    Memory(Arc<MemoryAssetReader>),
    #[cfg(feature = "http")]
    Http(Arc<HttpAssetReader>),
}

impl AssetReaderVariant {
    /// Picks a reader for a document location, dispatching on the URI
    /// class: absolute URIs get the network reader, anything unschemed is
    /// treated as a filesystem path and rooted at the document's directory.
    pub fn from_source(source: &str) -> Result<Self> {
        match uri::classify(source) {
            uri::UriKind::Data => Err(GeosceneError::FetchFailed(
                "cannot root a reader at a data URI".to_string(),
            )),
            uri::UriKind::Absolute => {
                #[cfg(feature = "http")]
                {
                    Ok(Self::Http(Arc::new(HttpAssetReader::new(source)?)))
                }
                #[cfg(not(feature = "http"))]
                {
                    Err(GeosceneError::FetchFailed(format!(
                        "no reader for {source}; enable the `http` feature for network sources"
                    )))
                }
            }
            uri::UriKind::Relative => {
                let dir = Path::new(source).parent().unwrap_or_else(|| Path::new("."));
                Ok(Self::File(Arc::new(FileAssetReader::new(dir))))
            }
        }
    }

    pub async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>> {
        match self {
            Self::File(r) => r.read_bytes(uri).await,
            Self::Memory(r) => r.read_bytes(uri).await,
            #[cfg(feature = "http")]
            Self::Http(r) => r.read_bytes(uri).await,
        }
    }

    /// Fetches a resolved URI: `data:` payloads decode inline, everything
    /// else reads through the reader.
    pub async fn fetch(&self, resolved: &str) -> Result<Vec<u8>> {
        if uri::classify(resolved) == uri::UriKind::Data {
            let (_, bytes) = uri::decode_data_uri(resolved)?;
            return Ok(bytes);
        }
        self.read_bytes(resolved).await
    }
}
