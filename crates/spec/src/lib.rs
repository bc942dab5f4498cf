//! API specifications and documentation bundles, read from a blob store.
//!
//! [`Store`] fetches an artifact and decodes it into one of the document
//! types in [`models`]. [`SpecCache`] sits in front of any [`SpecSource`]
//! (usually a `Store`), keeping encoded documents in a
//! [`CacheBackend`](speccy_cache::CacheBackend) and throwing the lot away
//! whenever the source says something changed.
//!
//! ```no_run
//! use speccy_spec::{SpecCache, SpecSource, Store};
//! use speccy_storage::backend::LocalBackend;
//! use speccy_cache::MemoryCache;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(LocalBackend::new("local", "/srv/specs")?);
//! let store = Store::new(backend, "test", "https://test.ninja", "assets")?;
//! let cache = SpecCache::new(Arc::new(store), Arc::new(MemoryCache::default()));
//! cache.initialize(CancellationToken::new()).await;
//!
//! if let Some(spec) = cache.api_spec("valid").await? {
//!     println!("{:?}", spec.raw);
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod codec;
pub mod error;
mod links;
pub mod models;
mod source;
mod store;
#[cfg(test)]
mod testing;

pub use crate::cache::SpecCache;
pub use crate::links::{LinkRewriter, PLACEHOLDER};
pub use crate::models::{Artifact, Kind};
pub use crate::source::{SourceHandle, SpecSource};
pub use crate::store::Store;
