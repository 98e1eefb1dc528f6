use thiserror::Error;

/// Unified error type for the mimir cache core
#[derive(Debug, Clone, Error)]
pub enum MimirError {
    /// Benign miss; callers continue upstream.
    #[error("entry not found")]
    NotFound,

    /// An entry failed a length or consistency check. Treated as a miss;
    /// the faulty entry may be deleted on sight.
    #[error("corrupt cache entry: {0}")]
    Corrupt(&'static str),

    /// I/O or transaction failure in the backing store.
    #[error("backend error: {0}")]
    Backend(String),

    /// Rejected input: metatype, non-IN class, name with a zero label byte.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// Stored cache version does not match CACHE_VERSION; only seen at open.
    #[error("cache version mismatch")]
    VersionMismatch,

    /// Name failed validation (too long, empty label, bad presentation form).
    #[error("invalid domain name: {0}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MimirError {
    fn from(err: std::io::Error) -> Self {
        MimirError::Io(err.to_string())
    }
}

impl From<sled::Error> for MimirError {
    fn from(err: sled::Error) -> Self {
        MimirError::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MimirError>;
