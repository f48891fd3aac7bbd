use async_trait::async_trait;

use crate::{
    models::{CreateRuntimeRequest, RuntimeRecord, UpdateRuntimeRequest},
    SiteboxResult,
};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A backend collection of runtime records keyed by runtime id.
///
/// Every operation maps to exactly one backend call. Implementations do not retry and do not
/// time out; failures are returned to the caller as they happen.
#[async_trait]
pub trait RuntimeRegistry: Send + Sync {
    /// Creates a new runtime record.
    async fn create(&self, request: &CreateRuntimeRequest) -> SiteboxResult<RuntimeRecord>;

    /// Applies a partial update to the record with the given id.
    async fn update(&self, id: &str, request: &UpdateRuntimeRequest)
        -> SiteboxResult<RuntimeRecord>;

    /// Fetches a record.
    ///
    /// ## Returns
    ///
    /// * `Ok(Some(record))` if the record exists
    /// * `Ok(None)` if the backend reports it as not found
    /// * `Err` for any other failure
    async fn get(&self, id: &str) -> SiteboxResult<Option<RuntimeRecord>>;

    /// Deletes a record.
    async fn delete(&self, id: &str) -> SiteboxResult<()>;

    /// Lists every record belonging to a project.
    async fn list_by_project(&self, project_id: &str) -> SiteboxResult<Vec<RuntimeRecord>>;
}
