//! Error type shared by every fake in the crate.
//!
//! None of these errors are fatal: they report a caller mistake (writing to a
//! committed response, slicing past the end of a buffer, mutating a read-only
//! view) and the caller may retry with corrected input.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StubError {
    /// The response (or another collaborator) is in a state that forbids the call,
    /// usually because it has already been committed.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A body write addressed bytes outside of the source slice.
    #[error("range {offset}..{offset}+{length} out of bounds for slice of {len} bytes")]
    OutOfBounds {
        offset: usize,
        length: usize,
        len: usize,
    },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, StubError>;

impl From<StubError> for std::io::Error {
    fn from(err: StubError) -> Self {
        match err {
            StubError::Io(err) => err,
            StubError::OutOfBounds { .. } | StubError::InvalidArgument(_) => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, err)
            }
            other => std::io::Error::other(other),
        }
    }
}
