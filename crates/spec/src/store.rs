use crate::error::{ErrorKind, Result};
use crate::links::LinkRewriter;
use crate::models::{ApiSpec, Artifact, AsyncApiSpec, Content, ODataSpec, OpenApiSpec};
use crate::source::SpecSource;
use async_trait::async_trait;
use exn::ResultExt;
use speccy_storage::{BackendHandle, NotificationStream};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Reads and decodes specification artifacts straight from a blob store.
///
/// Artifacts for an identifier live at `<bucket>/<id>/<file name>`. Nothing
/// is cached and nothing is retried: a missing object is `Ok(None)`, anything
/// else the backend or the decoder complains about is an error.
pub struct Store {
    backend: BackendHandle,
    bucket: String,
    links: LinkRewriter,
}

impl Store {
    /// Create a store reading from `bucket`.
    ///
    /// `external_address` and `assets_folder` are only used to rewrite asset
    /// links in [`Content`] documents.
    pub fn new(
        backend: BackendHandle,
        bucket: impl Into<String>,
        external_address: &str,
        assets_folder: &str,
    ) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() {
            exn::bail!(ErrorKind::Config("bucket name must not be empty".to_string()));
        }
        let links = LinkRewriter::new(external_address, &bucket, assets_folder)?;
        Ok(Self { backend, bucket, links })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Fetch and decode one artifact.
    #[instrument(skip(self), fields(kind = %A::KIND, backend = self.backend.name()))]
    pub async fn fetch<A: Artifact>(&self, id: &str) -> Result<Option<A>> {
        let key = format!("{id}/{}", A::KIND.file_name());
        let body = match self.backend.read(&self.bucket, &key).await {
            Ok(body) => body,
            Err(e) if e.is_not_found() => {
                tracing::debug!(bucket = %self.bucket, key, "Artifact does not exist");
                return Ok(None);
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Storage),
        };
        A::decode(&body, id, &self.links).map(Some)
    }
}

#[async_trait]
impl SpecSource for Store {
    async fn api_spec(&self, id: &str) -> Result<Option<ApiSpec>> {
        self.fetch(id).await
    }

    async fn open_api_spec(&self, id: &str) -> Result<Option<OpenApiSpec>> {
        self.fetch(id).await
    }

    async fn odata_spec(&self, id: &str) -> Result<Option<ODataSpec>> {
        self.fetch(id).await
    }

    async fn async_api_spec(&self, id: &str) -> Result<Option<AsyncApiSpec>> {
        self.fetch(id).await
    }

    async fn content(&self, id: &str) -> Result<Option<Content>> {
        self.fetch(id).await
    }

    fn notifications(&self, stop: CancellationToken) -> NotificationStream {
        self.backend.notifications(&self.bucket, stop)
    }
}
