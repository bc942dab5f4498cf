//! Blob store clients for specification artifacts.
//!
//! Every artifact lives in a bucket under a `/`-separated object key. Backends
//! only know how to hand out object bodies and, where the underlying service
//! supports it, a feed of change notifications for a bucket. Decoding is
//! somebody else's problem.

pub mod backend;
pub mod error;
mod key;
pub mod notify;

pub use crate::backend::StorageBackend;
pub use crate::key::validate as validate_key;
pub use crate::notify::{Notification, NotificationStream};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
