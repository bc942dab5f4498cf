//! CLI Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A CLI error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not set up the blob store")]
    Storage,
    #[display("could not set up the cache")]
    Cache,
    #[display("could not read the document")]
    Spec,
    #[display("could not write output")]
    Output,
    #[display("support for the {_0} backend was not compiled in")]
    Unsupported(#[error(not(source))] &'static str),
}
