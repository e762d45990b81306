//! Media blob storage.
//!
//! Uploads consume a local temporary file and return a public URL; deletes
//! are addressed by that URL. Blob failures never roll back entity changes.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use log::{debug, info, warn};
use tokio::fs;
use url::Url;

use crate::{errors::BlobError, id::generate_entity_id};

/// A stored blob.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedBlob {
    pub url: String,
    /// Media duration in seconds, when the store can determine it.
    pub duration: Option<f64>,
}

#[allow(async_fn_in_trait)]
pub trait BlobStore {
    /// Stores the file at `local_path` and removes the local file whether or
    /// not the upload succeeded.
    async fn upload(&self, local_path: &Path) -> Result<UploadedBlob, BlobError>;

    /// Deletes the blob behind `url`. Deleting an absent blob succeeds.
    async fn delete_by_url(&self, url: &str) -> Result<(), BlobError>;
}

/// Blob store rooted at a local directory, addressed with `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root_dir: PathBuf,
}

impl LocalBlobStore {
    /// Create a new blob store at the given directory
    pub async fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self, BlobError> {
        fs::create_dir_all(root_dir.as_ref()).await?;
        let root_dir = fs::canonicalize(root_dir.as_ref()).await?;
        info!("initialized blob store at {}", root_dir.display());
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn blob_path(&self, source: &Path) -> PathBuf {
        let name = generate_entity_id();
        match source.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => self.root_dir.join(format!("{name}.{ext}")),
            None => self.root_dir.join(name),
        }
    }

    /// Maps a URL back to a file under the root, rejecting anything else.
    fn resolve(&self, url: &str) -> Result<PathBuf, BlobError> {
        let foreign = || BlobError::ForeignUrl { url: url.to_string() };
        let parsed = Url::parse(url).map_err(|_| foreign())?;
        if parsed.scheme() != "file" {
            return Err(foreign());
        }
        let path = parsed.to_file_path().map_err(|_| foreign())?;
        if path.parent() != Some(self.root_dir.as_path()) {
            return Err(foreign());
        }
        Ok(path)
    }

    async fn copy_in(&self, local_path: &Path) -> Result<UploadedBlob, BlobError> {
        let metadata = fs::metadata(local_path).await?;
        if !metadata.is_file() {
            return Err(BlobError::Rejected {
                message: format!("{} is not a file", local_path.display()),
            });
        }
        let target = self.blob_path(local_path);
        fs::copy(local_path, &target).await?;
        let url = Url::from_file_path(&target).map_err(|_| BlobError::Rejected {
            message: format!("cannot address {}", target.display()),
        })?;
        debug!("stored blob {} ({} bytes)", url, metadata.len());
        Ok(UploadedBlob {
            url: url.to_string(),
            duration: None,
        })
    }
}

impl BlobStore for LocalBlobStore {
    async fn upload(&self, local_path: &Path) -> Result<UploadedBlob, BlobError> {
        let result = self.copy_in(local_path).await;
        if let Err(err) = fs::remove_file(local_path).await {
            warn!("failed to remove local upload {}: {err}", local_path.display());
        }
        result
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), BlobError> {
        let path = self.resolve(url)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("deleted blob {url}");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryBlobState {
    blobs: HashSet<String>,
    deleted: Vec<String>,
    fail_uploads: bool,
    rejected_sources: HashSet<PathBuf>,
    fail_deletes: bool,
    duration: Option<f64>,
}

/// In-process blob store with failure injection.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    state: Mutex<MemoryBlobState>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryBlobState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Duration reported for subsequent uploads.
    pub fn report_duration(&self, seconds: f64) {
        self.lock().duration = Some(seconds);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.lock().fail_uploads = fail;
    }

    /// Refuses uploads of `local_path` only.
    pub fn reject_upload_of(&self, local_path: impl Into<PathBuf>) {
        self.lock().rejected_sources.insert(local_path.into());
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.lock().fail_deletes = fail;
    }

    /// URLs successfully deleted so far, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().blobs.contains(url)
    }
}

impl BlobStore for MemoryBlobStore {
    async fn upload(&self, local_path: &Path) -> Result<UploadedBlob, BlobError> {
        let mut state = self.lock();
        if state.fail_uploads || state.rejected_sources.contains(local_path) {
            return Err(BlobError::Rejected {
                message: format!("upload of {} refused", local_path.display()),
            });
        }
        let url = format!("memory://blobs/{}", generate_entity_id());
        state.blobs.insert(url.clone());
        Ok(UploadedBlob {
            url,
            duration: state.duration,
        })
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), BlobError> {
        let mut state = self.lock();
        if state.fail_deletes {
            return Err(BlobError::Rejected {
                message: format!("delete of {url} refused"),
            });
        }
        state.blobs.remove(url);
        state.deleted.push(url.to_string());
        Ok(())
    }
}
