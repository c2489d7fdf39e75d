use thiserror::Error;

/// Errors surfaced by the ObjectStore adapter.
///
/// `NotFound`/`Unauthorized` are reserved for the construction-time
/// `head_bucket` probe; ordinary missing-key lookups are `Ok(None)`, never
/// an error variant (see the ObjectStore contract).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket not found")]
    NotFound,

    #[error("unauthorized: invalid credentials")]
    Unauthorized,

    #[error("network error: {0}")]
    Network(String),

    #[error("object store error: {0}")]
    Other(String),
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CryptoError {
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("authentication failed")]
    AuthenticationFailed,
}

/// POSIX-facing error, carried up through the VFS layer and mapped to an
/// errno at the FUSE boundary. Only the variants the VFS contract needs to
/// distinguish get a case here (ENOENT vs EIO vs ENOSPC vs EBADF); anything
/// else folds into `Io`.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("no space left on device")]
    NoSpace,

    #[error("bad file descriptor")]
    BadFd,
}

impl From<std::io::Error> for FsError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound,
            _ => match e.raw_os_error() {
                Some(code) if code == libc::ENOSPC => FsError::NoSpace,
                _ => FsError::Io(e.to_string()),
            },
        }
    }
}

impl FsError {
    /// The errno this maps to at the FUSE boundary.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::Io(_) => libc::EIO,
            FsError::NoSpace => libc::ENOSPC,
            FsError::BadFd => libc::EBADF,
        }
    }
}
