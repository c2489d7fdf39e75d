//! Sync engine: the priority-queue-driven worker that reconciles the local
//! cache with the remote bucket.
//!
//! A single background worker drains [`crate::queue::SyncQueue`] under the
//! engine's own lock, so two operations (even on different paths) never run
//! concurrently against the same engine. Dedicated async methods implement
//! the upload, download, and delete algorithms; the worker and the remote
//! poller are thin loops calling into them.

use anyhow::{Context, Result};
use glob::Pattern;
use sbx_core::types::{
    FileMetadataRecord, SyncOperation, VirtualPath, PRIORITY_INITIAL_SYNC, PRIORITY_MODIFIED,
};
use sbx_crypto::CryptoEnvelope;
use sbx_store::{ObjectStore, PutMetadata};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::queue::SyncQueue;
use crate::state::{now_secs, MetadataStore};

/// Point-in-time counters surfaced by the CLI `status` subcommand.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    pub queue_depth: usize,
    pub tracked_files: usize,
    pub last_poll_unix: Option<u64>,
}

pub struct SyncEngine {
    store: ObjectStore,
    crypto: Option<CryptoEnvelope>,
    metadata: Mutex<MetadataStore>,
    dispatch_lock: tokio::sync::Mutex<()>,
    queue: SyncQueue,
    cache_root: std::path::PathBuf,
    device_name: String,
    max_file_size: u64,
    excluded_patterns: Vec<String>,
    sync_interval: Duration,
    last_poll_unix: Mutex<Option<u64>>,
    shutdown: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        store: ObjectStore,
        crypto: Option<CryptoEnvelope>,
        cache_root: std::path::PathBuf,
        device_name: String,
        max_file_size: u64,
        excluded_patterns: Vec<String>,
        sync_interval: Duration,
    ) -> Result<Self> {
        let metadata = MetadataStore::open(&cache_root)?;
        Ok(Self {
            store,
            crypto,
            metadata: Mutex::new(metadata),
            dispatch_lock: tokio::sync::Mutex::new(()),
            queue: SyncQueue::new(),
            cache_root,
            device_name,
            max_file_size,
            excluded_patterns,
            sync_interval,
            last_poll_unix: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        })
    }

    fn is_excluded(&self, vpath: &VirtualPath) -> bool {
        let basename = Path::new(vpath.as_str())
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(vpath.as_str());
        self.excluded_patterns.iter().any(|pattern| {
            Pattern::new(pattern)
                .map(|p| p.matches(basename))
                .unwrap_or(false)
        })
    }

    /// Enqueue an upload unless `vpath` matches an exclusion pattern.
    pub fn enqueue_upload(&self, vpath: VirtualPath, priority: u8) {
        if self.is_excluded(&vpath) {
            debug!(path = %vpath, "excluded from sync, dropping enqueue");
            return;
        }
        self.queue.push(SyncOperation::Upload(vpath), priority);
    }

    pub fn enqueue_download(&self, vpath: VirtualPath, priority: u8) {
        self.queue.push(SyncOperation::Download(vpath), priority);
    }

    pub fn enqueue_delete(&self, vpath: VirtualPath) {
        self.queue
            .push(SyncOperation::Delete(vpath), PRIORITY_MODIFIED);
    }

    /// Upload the cache file at `vpath`, deduping against the last recorded
    /// content hash. Returns `true` if an upload (or a no-op dedup skip)
    /// completed, `false` if the file was gone by dispatch time.
    pub async fn upload_file(&self, vpath: &VirtualPath) -> Result<bool> {
        let cache_path = vpath.cache_path(&self.cache_root);

        let bytes = match tokio::fs::read(&cache_path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %vpath, "upload skipped: file deleted before dispatch");
                return Ok(false);
            }
            Err(e) => return Err(e).context("reading cache file for upload"),
        };

        if bytes.len() as u64 > self.max_file_size {
            warn!(path = %vpath, size = bytes.len(), max = self.max_file_size, "upload skipped: exceeds max_file_size");
            return Ok(false);
        }

        let content_hash = sha256_hex(&bytes);
        if let Some(existing) = self.metadata.lock().unwrap().get(vpath) {
            if existing.content_hash == content_hash {
                debug!(path = %vpath, "upload skipped: content unchanged");
                return Ok(true);
            }
        }

        let mtime = mtime_of(&cache_path).unwrap_or_else(now_secs);
        let encrypted = self.crypto.is_some();
        let payload = match &self.crypto {
            Some(crypto) => crypto.encrypt(&bytes),
            None => bytes.clone(),
        };

        self.store
            .put(
                vpath.object_key(),
                payload,
                PutMetadata {
                    device: self.device_name.clone(),
                    encrypted,
                    original_size: bytes.len() as u64,
                },
            )
            .await
            .context("uploading to object store")?;

        self.metadata.lock().unwrap().set(
            vpath,
            FileMetadataRecord {
                content_hash,
                size: bytes.len() as u64,
                mtime,
                uploaded_at: Some(now_secs()),
                downloaded_at: None,
            },
        );

        info!(path = %vpath, bytes = bytes.len(), "uploaded");
        Ok(true)
    }

    /// Download `vpath` from the remote bucket into the cache, decrypting
    /// if the stored object was encrypted. Returns `false` if the key does
    /// not exist remotely.
    pub async fn download_file(&self, vpath: &VirtualPath) -> Result<bool> {
        let key = vpath.object_key();
        let remote_bytes = match self.store.get(key).await.context("fetching from object store")? {
            Some(b) => b,
            None => return Ok(false),
        };

        let head = self.store.head(key).await.context("fetching object metadata")?;
        let is_encrypted = head
            .as_ref()
            .and_then(|h| h.user_metadata.get("encrypted"))
            .map(|v| v == "true")
            .unwrap_or(false);

        let plaintext = if is_encrypted {
            let crypto = self
                .crypto
                .as_ref()
                .context("object is encrypted but no password is configured")?;
            crypto.decrypt(&remote_bytes)?
        } else {
            remote_bytes
        };

        let cache_path = vpath.cache_path(&self.cache_root);
        if let Some(parent) = cache_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating cache dir: {}", parent.display()))?;
        }
        let tmp = cache_path.with_extension("sharebox_tmp");
        tokio::fs::write(&tmp, &plaintext)
            .await
            .with_context(|| format!("writing tmp: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &cache_path)
            .await
            .with_context(|| format!("renaming into place: {}", cache_path.display()))?;

        let content_hash = sha256_hex(&plaintext);
        let mtime = mtime_of(&cache_path).unwrap_or_else(now_secs);
        self.metadata.lock().unwrap().set(
            vpath,
            FileMetadataRecord {
                content_hash,
                size: plaintext.len() as u64,
                mtime,
                uploaded_at: None,
                downloaded_at: Some(now_secs()),
            },
        );

        info!(path = %vpath, bytes = plaintext.len(), "downloaded");
        Ok(true)
    }

    /// Delete the remote object and drop its metadata record. Deleting a
    /// key that does not exist remotely is not an error.
    pub async fn delete_file(&self, vpath: &VirtualPath) -> Result<()> {
        self.store
            .delete(vpath.object_key())
            .await
            .context("deleting from object store")?;
        self.metadata.lock().unwrap().remove(vpath);
        info!(path = %vpath, "deleted remote object");
        Ok(())
    }

    async fn dispatch(&self, op: SyncOperation) {
        let _guard = self.dispatch_lock.lock().await;
        let result = match &op {
            SyncOperation::Upload(p) => self.upload_file(p).await.map(|_| ()),
            SyncOperation::Download(p) => self.download_file(p).await.map(|_| ()),
            SyncOperation::Delete(p) => self.delete_file(p).await,
        };
        if let Err(e) = result {
            warn!(op = ?op, "sync operation failed: {e}");
        }
    }

    /// List all remote objects once and enqueue a `Download` for any whose
    /// cache file is missing. Never overwrites an existing cache file.
    pub async fn run_initial_sync(&self) -> Result<()> {
        let objects = self.store.list("", 10_000).await.context("listing remote objects for initial sync")?;
        for obj in objects {
            let vpath = VirtualPath::new(format!("/{}", obj.key));
            if !vpath.cache_path(&self.cache_root).exists() {
                self.enqueue_download(vpath, PRIORITY_INITIAL_SYNC);
            }
        }
        Ok(())
    }

    /// Compare remote `last_modified` against local cache mtime; enqueue a
    /// `Download` when the remote copy is newer, or at the fill-missing
    /// priority when the cache file is absent entirely.
    pub async fn check_remote_changes(&self) -> Result<()> {
        let objects = self.store.list("", 10_000).await.context("listing remote objects for poll")?;
        for obj in objects {
            let vpath = VirtualPath::new(format!("/{}", obj.key));
            let cache_path = vpath.cache_path(&self.cache_root);

            if !cache_path.exists() {
                self.enqueue_download(vpath, PRIORITY_INITIAL_SYNC);
                continue;
            }

            let head = match self.store.head(obj.key.as_str()).await {
                Ok(Some(h)) => h,
                _ => continue,
            };
            let Some(remote_modified) = head.last_modified else {
                continue;
            };
            let local_modified = std::fs::metadata(&cache_path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            if remote_modified > local_modified {
                self.enqueue_download(vpath, PRIORITY_MODIFIED);
            }
        }
        *self.last_poll_unix.lock().unwrap() = Some(now_secs());
        Ok(())
    }

    /// Run the background worker loop until [`SyncEngine::shutdown`] is
    /// called. Drains the queue item by item; roughly every `sync_interval`
    /// invokes a remote poll; sleeps briefly when the queue is idle.
    pub async fn run_worker(&self) {
        let mut last_poll = Instant::now() - self.sync_interval;
        loop {
            if self.shutdown.load(AtomicOrdering::Relaxed) {
                break;
            }

            self.queue.wait_for_item(Duration::from_secs(1)).await;

            while let Some(op) = self.queue.pop() {
                self.dispatch(op).await;
                if self.shutdown.load(AtomicOrdering::Relaxed) {
                    return;
                }
            }

            if last_poll.elapsed() >= self.sync_interval {
                if let Err(e) = self.check_remote_changes().await {
                    warn!("remote poll failed: {e}");
                }
                last_poll = Instant::now();
            }
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, AtomicOrdering::Relaxed);
    }

    /// Flush the metadata sidecar to disk. Called on a clean `stop`.
    pub fn flush_metadata(&self) -> Result<()> {
        self.metadata.lock().unwrap().flush()
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            queue_depth: self.queue.len(),
            tracked_files: self.metadata.lock().unwrap().len(),
            last_poll_unix: *self.last_poll_unix.lock().unwrap(),
        }
    }

    /// Synchronously download `vpath`, waiting up to `timeout`. On timeout,
    /// returns `false` without cancelling the in-flight download — it
    /// completes on its own and its result is discarded.
    pub async fn download_file_blocking(&self, vpath: &VirtualPath, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.download_file(vpath)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(path = %vpath, "synchronous download failed: {e}");
                false
            }
            Err(_) => {
                warn!(path = %vpath, timeout_secs = timeout.as_secs(), "synchronous download timed out");
                false
            }
        }
    }

    /// Cheap existence check, independent of `download_file_blocking`: a
    /// `head` request rather than a full body fetch, so `getattr` can tell a
    /// merely-slow download apart from a genuinely absent object even after
    /// the bounded download attempt above has given up.
    pub async fn remote_object_exists(&self, vpath: &VirtualPath) -> bool {
        matches!(self.store.head(vpath.object_key()).await, Ok(Some(_)))
    }

    /// List the immediate remote children of `prefix`, grouping keys by
    /// their first path component so the FUSE `readdir` callback can render
    /// entries that haven't been pulled into the cache yet.
    pub async fn list_remote_children(&self, prefix: &str) -> Result<Vec<RemoteChild>> {
        let norm_prefix = prefix.trim_start_matches('/');
        let list_prefix = if norm_prefix.is_empty() {
            String::new()
        } else {
            format!("{norm_prefix}/")
        };
        let objects = self
            .store
            .list(&list_prefix, 10_000)
            .await
            .context("listing remote directory")?;

        let mut seen_dirs = std::collections::HashSet::new();
        let mut children = Vec::new();
        for obj in objects {
            let rel = obj.key.strip_prefix(&list_prefix).unwrap_or(&obj.key);
            if rel.is_empty() {
                continue;
            }
            match rel.split_once('/') {
                Some((dir, _rest)) => {
                    if seen_dirs.insert(dir.to_string()) {
                        children.push(RemoteChild {
                            name: dir.to_string(),
                            is_dir: true,
                        });
                    }
                }
                None => children.push(RemoteChild {
                    name: rel.to_string(),
                    is_dir: false,
                }),
            }
        }
        Ok(children)
    }
}

/// One entry in a one-level remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChild {
    pub name: String,
    pub is_dir: bool,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut s = String::with_capacity(digest.len() * 2);
    use std::fmt::Write;
    for b in digest {
        write!(s, "{b:02x}").unwrap();
    }
    s
}

fn mtime_of(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()?
        .modified()
        .ok()?
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
