//! Composition root: builds every long-lived component from the loaded
//! config and hands commands an [`AppContext`] instead of letting them reach
//! for ambient global state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sbx_core::config::AppConfig;
use sbx_core::pidfile::PidFile;
use sbx_crypto::CryptoEnvelope;
use sbx_store::ObjectStore;
use sbx_sync::SyncEngine;
use secrecy::SecretString;

pub struct AppContext {
    pub config: AppConfig,
    pub engine: Arc<SyncEngine>,
    pub pid_file: PidFile,
}

impl AppContext {
    /// Load the config, connect to the bucket, derive the crypto envelope
    /// (if encryption is enabled), and build the sync engine. Does not
    /// start the watcher or worker loop — callers decide whether that's
    /// needed (`mount` does; `status`/`test`/`fix` don't).
    pub async fn build(config: AppConfig) -> Result<Self> {
        let op = sbx_store::build_from_r2_config(&config.r2).context("building storage operator")?;
        let store = ObjectStore::connect(op)
            .await
            .context("connecting to object store")?;

        let crypto = if config.encryption.enabled {
            Some(CryptoEnvelope::new(
                &resolve_password(&config.encryption.password)?,
                true,
            ))
        } else {
            None
        };

        std::fs::create_dir_all(&config.sync.local_cache_dir).with_context(|| {
            format!(
                "creating cache directory: {}",
                config.sync.local_cache_dir.display()
            )
        })?;

        let engine = SyncEngine::new(
            store,
            crypto,
            config.sync.local_cache_dir.clone(),
            config.app.device_name.clone(),
            config.sync.max_file_size,
            config.sync.excluded_patterns.clone(),
            Duration::from_secs(config.sync.sync_interval),
        )
        .context("constructing sync engine")?;

        let pid_file = PidFile::new(config.app.pid_file.clone());

        Ok(AppContext {
            config,
            engine: Arc::new(engine),
            pid_file,
        })
    }
}

/// Resolve the encryption passphrase: use the configured value verbatim, or
/// prompt interactively when the config leaves it blank (so a passphrase
/// never has to sit in plaintext in `config.yaml`).
fn resolve_password(configured: &str) -> Result<SecretString> {
    if !configured.is_empty() {
        return Ok(SecretString::from(configured.to_string()));
    }
    let prompted =
        rpassword::prompt_password("ShareBox passphrase: ").context("reading passphrase")?;
    Ok(SecretString::from(prompted))
}
