//! OpenDAL Operator factory for the R2 (S3-compatible) backend.

use anyhow::{Context, Result};
use opendal::Operator;

/// Minimal config needed to build an operator (the full schema lives in
/// `sbx_core::config::R2Config`; this is the flattened, credential-resolved
/// form the adapter actually consumes).
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Build an OpenDAL Operator for an S3-compatible endpoint (Cloudflare R2,
/// MinIO, etc). Uses path-style addressing, the opendal 0.55 default.
pub fn build_operator(cfg: &StorageConfig) -> Result<Operator> {
    let builder = opendal::services::S3::default()
        .endpoint(&cfg.endpoint)
        .region(&cfg.region)
        .bucket(&cfg.bucket)
        .access_key_id(&cfg.access_key_id)
        .secret_access_key(&cfg.secret_access_key);

    let op = Operator::new(builder)
        .context("creating OpenDAL S3 operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}

/// Build an operator from the R2 section of the app config.
pub fn build_from_r2_config(r2: &sbx_core::config::R2Config) -> Result<Operator> {
    if r2.endpoint_url.starts_with("http://") {
        tracing::warn!(
            endpoint = %r2.endpoint_url,
            "R2 endpoint uses plaintext HTTP — credentials are transmitted unencrypted"
        );
    }

    build_operator(&StorageConfig {
        endpoint: r2.endpoint_url.clone(),
        region: r2.region.clone(),
        bucket: r2.bucket_name.clone(),
        access_key_id: r2.access_key_id.clone(),
        secret_access_key: r2.secret_access_key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_operator_valid() {
        let cfg = StorageConfig {
            endpoint: "http://localhost:8333".to_string(),
            region: "auto".to_string(),
            bucket: "test-bucket".to_string(),
            access_key_id: "test-key".to_string(),
            secret_access_key: "test-secret".to_string(),
        };
        let op = build_operator(&cfg);
        assert!(op.is_ok(), "operator construction should succeed");
    }

    #[test]
    fn build_from_r2_config_https() {
        let r2 = sbx_core::config::R2Config {
            access_key_id: "key".into(),
            secret_access_key: "secret".into(),
            endpoint_url: "https://s3.example.com".into(),
            bucket_name: "bkt".into(),
            region: "auto".into(),
        };
        assert!(build_from_r2_config(&r2).is_ok());
    }
}
