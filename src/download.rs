//! Save-as-file delivery for generated images
//!
//! A download is an [`Anchor`]: an href plus a target filename, activated
//! exactly once against a [`DownloadSink`]. Hrefs are either data URLs or
//! object URLs minted by a [`BlobRegistry`]. Object URLs are held by an
//! [`ObjectUrl`] guard that revokes the registry entry when dropped, so the
//! blob never outlives the download that needed it.

use crate::error::{Error, Result};
use crate::qr::DataUrl;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const OBJECT_URL_PREFIX: &str = "blob:qrgen/";

/// In-memory file contents with a MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// MIME type, e.g. `image/svg+xml`
    pub mime: String,
    /// Raw contents
    pub bytes: Vec<u8>,
}

impl Blob {
    /// Wrap bytes under the given MIME type
    pub fn new(mime: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: AtomicU64,
    blobs: Mutex<HashMap<String, Blob>>,
}

/// Issues and resolves `blob:` object URLs
#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
    inner: Arc<RegistryInner>,
}

impl BlobRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `blob` and return a guard for its object URL.
    pub fn create_object_url(&self, blob: Blob) -> ObjectUrl {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let href = format!("{OBJECT_URL_PREFIX}{id}");
        self.inner
            .blobs
            .lock()
            .expect("blob registry mutex poisoned")
            .insert(href.clone(), blob);
        debug!(%href, "Created object URL");

        ObjectUrl {
            href,
            registry: self.clone(),
        }
    }

    /// Look up the blob behind a live object URL.
    pub fn resolve(&self, href: &str) -> Option<Blob> {
        self.inner
            .blobs
            .lock()
            .expect("blob registry mutex poisoned")
            .get(href)
            .cloned()
    }

    /// Number of object URLs that have not been revoked.
    pub fn live_count(&self) -> usize {
        self.inner
            .blobs
            .lock()
            .expect("blob registry mutex poisoned")
            .len()
    }

    fn revoke(&self, href: &str) {
        let removed = self
            .inner
            .blobs
            .lock()
            .expect("blob registry mutex poisoned")
            .remove(href);
        if removed.is_some() {
            debug!(%href, "Revoked object URL");
        }
    }
}

/// A live object URL; revoked when dropped
#[derive(Debug)]
pub struct ObjectUrl {
    href: String,
    registry: BlobRegistry,
}

impl ObjectUrl {
    /// The `blob:` href
    pub fn href(&self) -> &str {
        &self.href
    }

    /// Revoke now instead of at end of scope.
    pub fn revoke(self) {
        drop(self);
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.href);
    }
}

/// A transient download link: where the bytes live and what to call the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Data URL or object URL
    pub href: String,
    /// Suggested filename
    pub download: String,
}

/// Receives activated anchors and persists their contents
pub trait DownloadSink: Send + Sync {
    /// Deliver the anchor's contents under its filename.
    fn activate(&self, anchor: &Anchor) -> Result<()>;
}

/// Resolve an anchor href to bytes, from a data URL or a live object URL.
pub fn resolve_href(href: &str, blobs: &BlobRegistry) -> Result<Vec<u8>> {
    if href.starts_with(OBJECT_URL_PREFIX) {
        return blobs
            .resolve(href)
            .map(|blob| blob.bytes)
            .ok_or_else(|| Error::Download(format!("object URL {href} has been revoked")));
    }
    DataUrl::parse(href)?.decode()
}

/// Builds anchors and hands them to a sink
#[derive(Debug, Clone)]
pub struct Downloader<S> {
    sink: S,
    blobs: BlobRegistry,
}

impl<S: DownloadSink> Downloader<S> {
    /// Pair a sink with the registry it resolves object URLs against
    pub fn new(sink: S, blobs: BlobRegistry) -> Self {
        Self { sink, blobs }
    }

    /// The sink downloads are delivered to
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The object URL registry
    pub fn blobs(&self) -> &BlobRegistry {
        &self.blobs
    }

    /// Save an already-encoded data URL as `filename`.
    pub fn save_data_url(&self, url: &DataUrl, filename: &str) -> Result<()> {
        let anchor = Anchor {
            href: url.as_str().to_owned(),
            download: filename.to_owned(),
        };
        self.sink.activate(&anchor)
    }

    /// Save `blob` as `filename` through a short-lived object URL.
    ///
    /// The object URL is revoked before returning, whether or not the sink
    /// accepted the download.
    pub fn save_blob(&self, blob: Blob, filename: &str) -> Result<()> {
        let object_url = self.blobs.create_object_url(blob);
        let anchor = Anchor {
            href: object_url.href().to_owned(),
            download: filename.to_owned(),
        };
        let result = self.sink.activate(&anchor);
        object_url.revoke();
        result
    }
}

/// Writes downloads into a directory on disk
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    blobs: BlobRegistry,
}

impl DirectorySink {
    /// Save into `dir`, resolving object URLs against `blobs`
    pub fn new(dir: impl Into<PathBuf>, blobs: BlobRegistry) -> Self {
        Self {
            dir: dir.into(),
            blobs,
        }
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn activate(&self, anchor: &Anchor) -> Result<()> {
        let bytes = resolve_href(&anchor.href, &self.blobs)?;

        let name = Path::new(&anchor.download)
            .file_name()
            .ok_or_else(|| Error::Download(format!("invalid filename '{}'", anchor.download)))?;

        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Download(format!(
                "Failed to create output directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.dir.join(name);
        std::fs::write(&path, &bytes)
            .map_err(|e| Error::Download(format!("Failed to write {}: {e}", path.display())))?;

        info!(path = %path.display(), bytes = bytes.len(), "Saved download");
        Ok(())
    }
}

/// A delivered download captured by [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    /// The anchor that was activated
    pub anchor: Anchor,
    /// Contents resolved at activation time
    pub bytes: Vec<u8>,
}

/// Keeps downloads in memory; handy for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    blobs: BlobRegistry,
    saved: Arc<Mutex<Vec<SavedFile>>>,
}

impl MemorySink {
    /// Resolve object URLs against `blobs`
    pub fn new(blobs: BlobRegistry) -> Self {
        Self {
            blobs,
            saved: Arc::default(),
        }
    }

    /// Everything delivered so far, oldest first
    pub fn saved(&self) -> Vec<SavedFile> {
        self.saved.lock().expect("memory sink mutex poisoned").clone()
    }
}

impl DownloadSink for MemorySink {
    fn activate(&self, anchor: &Anchor) -> Result<()> {
        let bytes = resolve_href(&anchor.href, &self.blobs)?;
        self.saved
            .lock()
            .expect("memory sink mutex poisoned")
            .push(SavedFile {
                anchor: anchor.clone(),
                bytes,
            });
        Ok(())
    }
}
