//! Spec Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Failures from the storage and cache
//! crates are raised into this tree rather than flattened into strings.

use crate::models::Kind;
use derive_more::{Display, Error};

/// A spec error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for spec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a failure.
///
/// Absence is never an error: accessors report it as `Ok(None)`.
///
/// ### Dependency Errors
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::Cache`]
/// - [`ErrorKind::Store`] - raised by the cache layer around anything the
///   wrapped store reported.
///
/// ### Data Errors
/// - [`ErrorKind::Decode`]
/// - [`ErrorKind::InvalidEntry`]
/// - [`ErrorKind::Evicted`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The blob store couldn't hand over an artifact.
    #[display("blob store request failed")]
    Storage,
    /// An artifact body couldn't be decoded.
    #[display("malformed {_0} artifact")]
    Decode(#[error(not(source))] Kind),
    /// The cache backend failed.
    #[display("cache backend request failed")]
    Cache,
    /// A cache entry couldn't be encoded or decoded.
    #[display("invalid cache entry: {_0}")]
    InvalidEntry(#[error(not(source))] String),
    /// An entry written moments ago was gone on read-back (usually a
    /// concurrent flush).
    #[display("cache entry disappeared after write: {_0}")]
    Evicted(#[error(not(source))] String),
    /// The wrapped store failed.
    #[display("spec store request failed")]
    Store,
    /// Construction parameters were rejected.
    #[display("invalid store configuration: {_0}")]
    Config(#[error(not(source))] String),
    #[display("unknown artifact kind: {_0}")]
    UnknownKind(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Cache | Self::Evicted(_) | Self::Store)
    }
}
