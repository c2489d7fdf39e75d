//! sbx-fuse: async FUSE driver mounting the local sync cache as a
//! read-write POSIX filesystem, backed by fuse3 (Linux kernel FUSE).

pub mod driver;

pub use driver::{mount, MountConfig, ShareBoxFs};
