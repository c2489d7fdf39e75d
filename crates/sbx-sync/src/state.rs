//! Metadata store: the `.sharebox_metadata.json` sidecar mapping virtual
//! paths to their last-known content hash, size, mtime, and sync timestamps.
//!
//! Loaded into memory once at sync-engine start and flushed atomically
//! (temp file + rename) on stop or whenever a mutation marks it dirty. There
//! is no incremental durability — a crash between flushes loses updates
//! since the last one.

use anyhow::{Context, Result};
use sbx_core::types::{FileMetadataRecord, VirtualPath};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const METADATA_FILE_NAME: &str = ".sharebox_metadata.json";

pub struct MetadataStore {
    path: PathBuf,
    entries: HashMap<String, FileMetadataRecord>,
    dirty: bool,
}

impl MetadataStore {
    /// Open the sidecar under `cache_root`, creating an empty store if it
    /// does not exist yet.
    pub fn open(cache_root: &Path) -> Result<Self> {
        let path = cache_root.join(METADATA_FILE_NAME);
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading metadata store: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing metadata store: {}", path.display()))?
        } else {
            HashMap::new()
        };

        Ok(MetadataStore {
            path,
            entries,
            dirty: false,
        })
    }

    pub fn get(&self, vpath: &VirtualPath) -> Option<&FileMetadataRecord> {
        self.entries.get(vpath.as_str())
    }

    pub fn set(&mut self, vpath: &VirtualPath, record: FileMetadataRecord) {
        self.entries.insert(vpath.as_str().to_string(), record);
        self.dirty = true;
    }

    pub fn remove(&mut self, vpath: &VirtualPath) {
        if self.entries.remove(vpath.as_str()).is_some() {
            self.dirty = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Atomically persist the store if there are unsaved changes.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating cache root: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.entries).context("serializing metadata store")?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)
            .with_context(|| format!("writing metadata store temp: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming metadata store: {}", self.path.display()))?;

        self.dirty = false;
        Ok(())
    }
}

impl Drop for MetadataStore {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.flush() {
                tracing::warn!("failed to flush metadata store on drop: {e}");
            }
        }
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str) -> FileMetadataRecord {
        FileMetadataRecord {
            content_hash: hash.to_string(),
            size: 5,
            mtime: 1000,
            uploaded_at: Some(1001),
            downloaded_at: None,
        }
    }

    #[test]
    fn open_nonexistent_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn set_get_flush_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MetadataStore::open(dir.path()).unwrap();
        let vpath = VirtualPath::new("/docs/report.pdf");
        store.set(&vpath, record("abc123"));
        store.flush().unwrap();

        let reloaded = MetadataStore::open(dir.path()).unwrap();
        assert_eq!(reloaded.get(&vpath).unwrap().content_hash, "abc123");
    }

    #[test]
    fn remove_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MetadataStore::open(dir.path()).unwrap();
        let vpath = VirtualPath::new("/to-delete.txt");
        store.set(&vpath, record("hash1"));
        assert_eq!(store.len(), 1);

        store.remove(&vpath);
        assert_eq!(store.len(), 0);
        assert!(store.get(&vpath).is_none());
    }

    #[test]
    fn flush_is_idempotent_and_skips_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MetadataStore::open(dir.path()).unwrap();
        store.flush().unwrap();
        store.flush().unwrap();
        assert!(!dir.path().join(METADATA_FILE_NAME).exists());
    }

    #[test]
    fn drop_flushes_dirty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        {
            let mut store = MetadataStore::open(&path).unwrap();
            store.set(&VirtualPath::new("/a.txt"), record("h"));
        }
        let reloaded = MetadataStore::open(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
    }
}
