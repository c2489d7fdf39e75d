pub mod config;
pub mod error;
pub mod logging;
pub mod pidfile;
pub mod types;

pub use error::{CryptoError, FsError, StoreError};
