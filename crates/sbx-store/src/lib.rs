//! sbx-store: OpenDAL-backed ObjectStore adapter for the R2 bucket.

pub mod health;
pub mod operator;
pub mod store;

pub use health::check_health;
pub use operator::{build_from_r2_config, build_operator, StorageConfig};
pub use store::{sha256_hex, ObjectInfo, ObjectStore, ObjectSummary, PutMetadata};
