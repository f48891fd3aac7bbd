use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    models::{CreateRuntimeRequest, RuntimeMetadata, RuntimeRecord, RuntimeStatus, UpdateRuntimeRequest},
    SiteboxError, SiteboxResult,
};

use super::RuntimeRegistry;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A [`RuntimeRegistry`] that keeps records in memory and journals every call made to it.
///
/// Clones share the same records and journal. Useful as a stand-in backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    inner: Arc<Mutex<MemoryRegistryState>>,
}

#[derive(Debug, Default)]
struct MemoryRegistryState {
    records: BTreeMap<String, RuntimeRecord>,
    calls: Vec<RegistryCall>,
    next_id: u64,
    fail_creates: bool,
    fail_updates: bool,
}

/// One call received by a [`MemoryRegistry`].
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryCall {
    /// A `create` call and its request.
    Create(CreateRuntimeRequest),

    /// An `update` call, with the target id and the request.
    Update(String, UpdateRuntimeRequest),

    /// A `get` call for an id.
    Get(String),

    /// A `delete` call for an id.
    Delete(String),

    /// A `list_by_project` call for a project id.
    List(String),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MemoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `create` fail with a 500 transport error, or succeed again.
    pub async fn fail_creates(&self, fail: bool) {
        self.inner.lock().await.fail_creates = fail;
    }

    /// Makes every following `update` fail with a 500 transport error, or succeed again.
    pub async fn fail_updates(&self, fail: bool) {
        self.inner.lock().await.fail_updates = fail;
    }

    /// Returns every call received so far, oldest first.
    pub async fn calls(&self) -> Vec<RegistryCall> {
        self.inner.lock().await.calls.clone()
    }

    /// Returns how many `create` calls were received.
    pub async fn create_count(&self) -> usize {
        self.calls()
            .await
            .iter()
            .filter(|call| matches!(call, RegistryCall::Create(_)))
            .count()
    }

    /// Returns every `update` call received, oldest first.
    pub async fn updates(&self) -> Vec<(String, UpdateRuntimeRequest)> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                RegistryCall::Update(id, request) => Some((id, request)),
                _ => None,
            })
            .collect()
    }

    /// Returns the stored record without journaling a call.
    pub async fn record(&self, id: &str) -> Option<RuntimeRecord> {
        self.inner.lock().await.records.get(id).cloned()
    }

    /// Stores `record` as is, replacing any record with the same id.
    pub async fn insert(&self, record: RuntimeRecord) {
        self.inner
            .lock()
            .await
            .records
            .insert(record.id.clone(), record);
    }
}

fn server_error() -> SiteboxError {
    SiteboxError::Transport {
        status: 500,
        message: "Internal Server Error".to_string(),
    }
}

fn not_found(id: &str) -> SiteboxError {
    SiteboxError::Transport {
        status: 404,
        message: format!("runtime {id} not found"),
    }
}

/// Applies a partial update. Every field that is set replaces the stored one.
fn apply_update(record: &mut RuntimeRecord, request: &UpdateRuntimeRequest) {
    if let Some(status) = request.status {
        record.status = status;
    }

    if let Some(patch) = &request.metadata {
        let metadata = record.metadata.get_or_insert_with(RuntimeMetadata::default);
        if let Some(workdir_name) = &patch.workdir_name {
            metadata.workdir_name = workdir_name.clone();
        }
        if let Some(ports) = &patch.ports {
            metadata.ports = ports.clone();
        }
        if let Some(files) = &patch.files {
            metadata.files = files.clone();
        }
        if let Some(url) = &patch.url {
            metadata.url = Some(url.clone());
        }
    }

    record.updated_at = Some(Utc::now());
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl RuntimeRegistry for MemoryRegistry {
    async fn create(&self, request: &CreateRuntimeRequest) -> SiteboxResult<RuntimeRecord> {
        let mut state = self.inner.lock().await;
        state.calls.push(RegistryCall::Create(request.clone()));
        if state.fail_creates {
            return Err(server_error());
        }

        state.next_id += 1;
        let now = Utc::now();
        let record = RuntimeRecord {
            id: format!("wc_{}", state.next_id),
            project_id: request.project_id.clone(),
            name: request.name.clone(),
            description: request.description.clone(),
            status: RuntimeStatus::Creating,
            metadata: request.metadata.clone(),
            user_id: None,
            created_at: Some(now),
            updated_at: Some(now),
        };

        state.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: &str,
        request: &UpdateRuntimeRequest,
    ) -> SiteboxResult<RuntimeRecord> {
        let mut state = self.inner.lock().await;
        state
            .calls
            .push(RegistryCall::Update(id.to_string(), request.clone()));
        if state.fail_updates {
            return Err(server_error());
        }

        let record = state.records.get_mut(id).ok_or_else(|| not_found(id))?;
        apply_update(record, request);
        Ok(record.clone())
    }

    async fn get(&self, id: &str) -> SiteboxResult<Option<RuntimeRecord>> {
        let mut state = self.inner.lock().await;
        state.calls.push(RegistryCall::Get(id.to_string()));
        Ok(state.records.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> SiteboxResult<()> {
        let mut state = self.inner.lock().await;
        state.calls.push(RegistryCall::Delete(id.to_string()));
        state.records.remove(id).map(|_| ()).ok_or_else(|| not_found(id))
    }

    async fn list_by_project(&self, project_id: &str) -> SiteboxResult<Vec<RuntimeRecord>> {
        let mut state = self.inner.lock().await;
        state.calls.push(RegistryCall::List(project_id.to_string()));
        Ok(state
            .records
            .values()
            .filter(|record| record.project_id == project_id)
            .cloned()
            .collect())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
