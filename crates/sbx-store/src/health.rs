//! Storage health check, used by the CLI `test` subcommand.

use crate::store::ObjectStore;

pub async fn check_health(store: &ObjectStore) -> anyhow::Result<()> {
    store
        .test_connection()
        .await
        .map_err(|e| anyhow::anyhow!("storage health check failed: {e}"))
}

pub async fn is_healthy(store: &ObjectStore) -> bool {
    check_health(store).await.is_ok()
}
