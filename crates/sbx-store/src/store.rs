//! ObjectStore adapter: a typed facade over an S3-compatible bucket.
//!
//! Wraps an OpenDAL `Operator` and enforces the put/get/head/delete/list
//! contract: missing keys are `Ok(None)`, not errors; every `put` attaches
//! the required user metadata; construction probes the bucket once and
//! distinguishes a missing bucket from bad credentials.

use chrono::Utc;
use opendal::{ErrorKind, Operator};
use sbx_core::error::StoreError;
use std::collections::HashMap;
use std::time::SystemTime;

/// Metadata attached to every object this crate uploads.
pub struct PutMetadata {
    pub device: String,
    pub encrypted: bool,
    pub original_size: u64,
}

impl PutMetadata {
    fn into_map(self, content_hash: &str) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("upload-time".into(), Utc::now().to_rfc3339());
        map.insert("content-hash".into(), content_hash.to_string());
        map.insert("device".into(), self.device);
        map.insert(
            "encrypted".into(),
            if self.encrypted { "true" } else { "false" }.into(),
        );
        map.insert("original_size".into(), self.original_size.to_string());
        map
    }
}

#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub size: u64,
    pub last_modified: Option<SystemTime>,
    pub etag: Option<String>,
    pub user_metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub key: String,
}

pub struct ObjectStore {
    op: Operator,
}

impl ObjectStore {
    /// Wrap an already-constructed operator and probe the bucket once.
    ///
    /// Probe failure classified as `NotFound` (bucket missing) or
    /// `Unauthorized` (credentials rejected); any other failure is
    /// `StoreError::Network`.
    pub async fn connect(op: Operator) -> Result<Self, StoreError> {
        if let Err(e) = op.list("/").await {
            return Err(classify(e));
        }
        Ok(ObjectStore { op })
    }

    /// Re-probe connectivity and credentials without mutating any state.
    /// Backs the CLI `test` subcommand.
    pub async fn test_connection(&self) -> Result<(), StoreError> {
        self.op.list("/").await.map(|_| ()).map_err(classify)
    }

    pub async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        metadata: PutMetadata,
    ) -> Result<(), StoreError> {
        let content_hash = sha256_hex(&bytes);
        let user_metadata = metadata.into_map(&content_hash);
        self.op
            .write_with(key, bytes)
            .user_metadata(user_metadata)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.op.read(key).await {
            Ok(buf) => Ok(Some(buf.to_vec())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(classify(e)),
        }
    }

    pub async fn head(&self, key: &str) -> Result<Option<ObjectInfo>, StoreError> {
        match self.op.stat(key).await {
            Ok(meta) => Ok(Some(ObjectInfo {
                size: meta.content_length(),
                last_modified: meta.last_modified().map(Into::into),
                etag: meta.etag().map(str::to_string),
                user_metadata: meta.user_metadata().cloned().unwrap_or_default(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(classify(e)),
        }
    }

    /// Idempotent: deleting a key that does not exist remotely is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.op.delete(key).await.map_err(classify)
    }

    /// Recursive flat listing of every object under `prefix` (not just its
    /// immediate children) — callers that need one-level grouping do it
    /// themselves from the returned keys, since a recursive listing never
    /// yields synthetic directory entries to group by in the first place.
    pub async fn list(&self, prefix: &str, max: usize) -> Result<Vec<ObjectSummary>, StoreError> {
        let entries = self
            .op
            .list_with(prefix)
            .recursive(true)
            .await
            .map_err(classify)?;
        Ok(entries
            .into_iter()
            .filter(|e| !e.path().ends_with('/'))
            .take(max)
            .map(|e| ObjectSummary {
                key: e.path().to_string(),
            })
            .collect())
    }
}

fn classify(e: opendal::Error) -> StoreError {
    match e.kind() {
        ErrorKind::NotFound => StoreError::NotFound,
        ErrorKind::PermissionDenied => StoreError::Unauthorized,
        ErrorKind::Unexpected | ErrorKind::RateLimited => StoreError::Network(e.to_string()),
        _ => StoreError::Other(e.to_string()),
    }
}

/// SHA-256 hex of `bytes` — used for the `content-hash` user-metadata field,
/// which is computed over the stored (ciphertext, if encryption is enabled)
/// bytes, not the cleartext.
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").unwrap();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn put_metadata_map_has_required_keys() {
        let meta = PutMetadata {
            device: "laptop-1".into(),
            encrypted: true,
            original_size: 6,
        };
        let map = meta.into_map("deadbeef");
        assert_eq!(map["device"], "laptop-1");
        assert_eq!(map["encrypted"], "true");
        assert_eq!(map["original_size"], "6");
        assert_eq!(map["content-hash"], "deadbeef");
        assert!(map.contains_key("upload-time"));
    }
}
