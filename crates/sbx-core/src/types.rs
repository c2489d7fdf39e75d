use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An absolute, slash-rooted path naming a file or directory inside the mount.
///
/// The leading `/` is stripped to form the remote object key. Paths are
/// byte-transparent except for normalization of leading slashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath(String);

impl VirtualPath {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref();
        let normalized = if raw.starts_with('/') {
            raw.to_string()
        } else {
            format!("/{raw}")
        };
        VirtualPath(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The object key: the virtual path with its leading slash removed.
    pub fn object_key(&self) -> &str {
        self.0.trim_start_matches('/')
    }

    /// Resolve the on-disk cache path for this virtual path under `cache_root`.
    pub fn cache_path(&self, cache_root: &Path) -> PathBuf {
        cache_root.join(self.object_key())
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }
}

impl std::fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VirtualPath {
    fn from(s: &str) -> Self {
        VirtualPath::new(s)
    }
}

impl From<String> for VirtualPath {
    fn from(s: String) -> Self {
        VirtualPath::new(s)
    }
}

/// Per-path record in the metadata sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadataRecord {
    /// SHA-256 hex of the cleartext cache bytes at last sync.
    pub content_hash: String,
    /// Cleartext byte count at last sync.
    pub size: u64,
    /// Cache file mtime (Unix seconds) at last sync.
    pub mtime: u64,
    /// Wall-clock seconds of the last successful upload, if any.
    #[serde(default)]
    pub uploaded_at: Option<u64>,
    /// Wall-clock seconds of the last successful download, if any.
    #[serde(default)]
    pub downloaded_at: Option<u64>,
}

/// A tagged sync operation with dispatch priority.
///
/// Higher priority value dispatches earlier. See `PRIORITY_*` constants for
/// the canonical values used by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOperation {
    Upload(VirtualPath),
    Download(VirtualPath),
    Delete(VirtualPath),
}

impl SyncOperation {
    pub fn path(&self) -> &VirtualPath {
        match self {
            SyncOperation::Upload(p) | SyncOperation::Download(p) | SyncOperation::Delete(p) => p,
        }
    }
}

/// Priority assigned to a newly-created local file's upload.
pub const PRIORITY_NEW_FILE: u8 = 2;
/// Priority assigned to a modified local file's upload, a delete, or a
/// poller-driven download.
pub const PRIORITY_MODIFIED: u8 = 1;
/// Priority assigned to initial-sync downloads (fill-missing-only pass).
pub const PRIORITY_INITIAL_SYNC: u8 = 0;

/// Mount specification passed from the CLI into the FUSE driver.
#[derive(Debug, Clone)]
pub struct MountSpec {
    pub mountpoint: PathBuf,
    pub cache_root: PathBuf,
    pub foreground: bool,
    pub allow_other: bool,
    pub allow_root: bool,
    pub default_permissions: bool,
}
