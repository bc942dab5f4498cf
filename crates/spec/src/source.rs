use crate::error::Result;
use crate::models::{ApiSpec, AsyncApiSpec, Content, ODataSpec, OpenApiSpec};
use async_trait::async_trait;
use speccy_storage::NotificationStream;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type SourceHandle = Arc<dyn SpecSource + Send + Sync>;

/// Anything that can answer "give me document X for identifier Y".
///
/// Every accessor returns `Ok(None)` when the document doesn't exist; errors
/// are reserved for transport, backend and decode failures.
#[async_trait]
pub trait SpecSource: Send + Sync {
    async fn api_spec(&self, id: &str) -> Result<Option<ApiSpec>>;

    async fn open_api_spec(&self, id: &str) -> Result<Option<OpenApiSpec>>;

    async fn odata_spec(&self, id: &str) -> Result<Option<ODataSpec>>;

    async fn async_api_spec(&self, id: &str) -> Result<Option<AsyncApiSpec>>;

    async fn content(&self, id: &str) -> Result<Option<Content>>;

    /// Feed of "something changed" events, ending when `stop` is cancelled.
    fn notifications(&self, stop: CancellationToken) -> NotificationStream;
}
