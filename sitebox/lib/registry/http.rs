use async_trait::async_trait;
use getset::Getters;
use reqwest::{Client, Response, StatusCode, Url};

use crate::{
    config::{Credentials, SiteboxConfig},
    models::{CreateRuntimeRequest, RuntimeRecord, UpdateRuntimeRequest},
    SiteboxError, SiteboxResult,
};

use super::RuntimeRegistry;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Path segment of the runtime record collection, relative to the API base URL.
const RUNTIME_COLLECTION: &str = "webcontainers";

/// Query parameter used to filter records by project.
const PROJECT_ID_QUERY: &str = "projectId";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A [`RuntimeRegistry`] backed by the backend's REST API.
///
/// | Method | Path | Operation |
/// |---|---|---|
/// | POST | `/webcontainers` | [`create`](RuntimeRegistry::create) |
/// | PUT | `/webcontainers/{id}` | [`update`](RuntimeRegistry::update) |
/// | GET | `/webcontainers/{id}` | [`get`](RuntimeRegistry::get) |
/// | GET | `/webcontainers?projectId=` | [`list_by_project`](RuntimeRegistry::list_by_project) |
/// | DELETE | `/webcontainers/{id}` | [`delete`](RuntimeRegistry::delete) |
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct HttpRegistry {
    /// The HTTP client, preloaded with the credential headers.
    client: Client,

    /// The API base URL.
    base_url: Url,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl HttpRegistry {
    /// Creates a registry client for `base_url` that sends `credentials` with every request.
    pub fn new(base_url: &str, credentials: &Credentials) -> SiteboxResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SiteboxError::InvalidConfig(format!("invalid api base url: {e}")))?;

        if base_url.cannot_be_a_base() {
            return Err(SiteboxError::InvalidConfig(format!(
                "api base url cannot be a base: {base_url}"
            )));
        }

        let client = Client::builder()
            .default_headers(credentials.to_headers()?)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Creates a registry client from the configured base URL and credentials.
    pub fn from_config(config: &SiteboxConfig) -> SiteboxResult<Self> {
        Self::new(config.get_api_base_url(), config.get_credentials())
    }

    /// Returns the URL of the record collection.
    fn collection_url(&self) -> Url {
        self.url_with_segments(&[RUNTIME_COLLECTION])
    }

    /// Returns the URL of a single record. The id is percent-encoded as one path segment.
    fn record_url(&self, id: &str) -> Url {
        self.url_with_segments(&[RUNTIME_COLLECTION, id])
    }

    fn url_with_segments(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs, so the segments are always available.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Converts a non-success response into a [`SiteboxError::Transport`].
///
/// The message is the response body when there is one, otherwise the canonical status text.
async fn error_for_status(response: Response) -> SiteboxResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        body
    };

    Err(SiteboxError::Transport {
        status: status.as_u16(),
        message,
    })
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl RuntimeRegistry for HttpRegistry {
    async fn create(&self, request: &CreateRuntimeRequest) -> SiteboxResult<RuntimeRecord> {
        tracing::debug!(project_id = %request.project_id, "creating runtime record");

        let response = self
            .client
            .post(self.collection_url())
            .json(request)
            .send()
            .await?;

        let record: RuntimeRecord = error_for_status(response).await?.json().await?;
        tracing::info!(id = %record.id, "runtime record created");

        Ok(record)
    }

    async fn update(
        &self,
        id: &str,
        request: &UpdateRuntimeRequest,
    ) -> SiteboxResult<RuntimeRecord> {
        tracing::debug!(%id, "updating runtime record");

        let response = self
            .client
            .put(self.record_url(id))
            .json(request)
            .send()
            .await?;

        let record: RuntimeRecord = error_for_status(response).await?.json().await?;
        tracing::debug!(id = %record.id, "runtime record updated");

        Ok(record)
    }

    async fn get(&self, id: &str) -> SiteboxResult<Option<RuntimeRecord>> {
        let response = self.client.get(self.record_url(id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let record = error_for_status(response).await?.json().await?;
        Ok(Some(record))
    }

    async fn delete(&self, id: &str) -> SiteboxResult<()> {
        tracing::debug!(%id, "deleting runtime record");

        let response = self.client.delete(self.record_url(id)).send().await?;
        error_for_status(response).await?;
        tracing::info!(%id, "runtime record deleted");

        Ok(())
    }

    async fn list_by_project(&self, project_id: &str) -> SiteboxResult<Vec<RuntimeRecord>> {
        let response = self
            .client
            .get(self.collection_url())
            .query(&[(PROJECT_ID_QUERY, project_id)])
            .send()
            .await?;

        let records = error_for_status(response).await?.json().await?;
        Ok(records)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
