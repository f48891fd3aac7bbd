use std::{
    collections::BTreeSet,
    fmt,
    sync::{Arc, Weak},
    time::{SystemTime, UNIX_EPOCH},
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        Mutex,
    },
    task::JoinHandle,
};

use crate::{
    config::{SiteboxConfig, DEFAULT_RUNTIME_DESCRIPTION, RUNTIME_NAME_PREFIX},
    models::{
        CreateRuntimeRequest, MetadataPatch, RuntimeMetadata, RuntimeStatus, UpdateRuntimeRequest,
    },
    registry::RuntimeRegistry,
    sandbox::{PortEvent, PortEventKind, SandboxBoot},
    SiteboxError, SiteboxResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Where the current generation cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationPhase {
    /// Nothing registered yet.
    Idle,

    /// A registration is in flight.
    Registering,

    /// The runtime is registered and its files have not been saved since.
    Registered,

    /// A snapshot is being exported and pushed.
    Exporting,

    /// The last snapshot was saved.
    Saved,
}

/// Owns the registration of one sandboxed runtime with the backend.
///
/// Construct one per process and clone it into every call site; clones share all state. The
/// sandbox is registered at most once no matter how many callers race on
/// [`ensure_registered`](Self::ensure_registered).
#[derive(Clone)]
pub struct RuntimeCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    registry: Arc<dyn RuntimeRegistry>,
    boot: SandboxBoot,
    config: SiteboxConfig,
    state: Mutex<CoordinatorState>,
}

/// Never held across a network or filesystem call.
struct CoordinatorState {
    registered_id: Option<String>,
    status: Option<RuntimeStatus>,
    ports: BTreeSet<u16>,
    url: Option<String>,
    pending: Option<PendingRegistration>,
    phase: GenerationPhase,
    port_listener: Option<JoinHandle<()>>,
}

type PendingRegistration = Shared<BoxFuture<'static, Option<String>>>;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RuntimeCoordinator {
    /// Creates a coordinator for the sandbox behind `boot`.
    pub fn new(
        registry: Arc<dyn RuntimeRegistry>,
        boot: SandboxBoot,
        config: SiteboxConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                registry,
                boot,
                config,
                state: Mutex::new(CoordinatorState {
                    registered_id: None,
                    status: None,
                    ports: BTreeSet::new(),
                    url: None,
                    pending: None,
                    phase: GenerationPhase::Idle,
                    port_listener: None,
                }),
            }),
        }
    }

    /// Returns the registry records are written to.
    pub fn registry(&self) -> &Arc<dyn RuntimeRegistry> {
        &self.inner.registry
    }

    /// Returns the sandbox boot handle.
    pub fn boot(&self) -> &SandboxBoot {
        &self.inner.boot
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SiteboxConfig {
        &self.inner.config
    }

    /// Returns `true` once the sandbox has booted.
    pub fn is_loaded(&self) -> bool {
        self.inner.boot.is_loaded()
    }

    /// Returns the backend id of the registered runtime, if any. Never starts a registration.
    pub async fn registered_id(&self) -> Option<String> {
        self.inner.state.lock().await.registered_id.clone()
    }

    /// Returns the last status known for the registered runtime.
    pub async fn status(&self) -> Option<RuntimeStatus> {
        self.inner.state.lock().await.status
    }

    /// Returns the ports reported so far, in ascending order.
    pub async fn ports(&self) -> Vec<u16> {
        self.inner.state.lock().await.ports.iter().copied().collect()
    }

    /// Returns the last externally reachable address reported by the sandbox.
    pub async fn url(&self) -> Option<String> {
        self.inner.state.lock().await.url.clone()
    }

    /// Returns the current generation phase.
    pub async fn phase(&self) -> GenerationPhase {
        self.inner.state.lock().await.phase
    }

    pub(crate) async fn set_phase(&self, phase: GenerationPhase) {
        self.inner.state.lock().await.phase = phase;
    }

    /// Registers the sandbox with the backend unless that already happened, and returns its id.
    ///
    /// Concurrent callers share one registration, so exactly one record is created. The first
    /// caller's `project_id` is the one used. Returns `None` if the sandbox does not boot in
    /// time or the backend rejects the record; a later call will try again.
    pub async fn ensure_registered(&self, project_id: Option<&str>) -> Option<String> {
        let pending = {
            let mut state = self.inner.state.lock().await;
            if let Some(id) = &state.registered_id {
                return Some(id.clone());
            }

            if let Some(pending) = state.pending.clone() {
                tracing::debug!("joining in-flight registration");
                pending
            } else {
                let project_id = self.inner.config.resolve_project_id(project_id);
                let pending = self.spawn_registration(project_id);
                state.pending = Some(pending.clone());
                state.phase = GenerationPhase::Registering;
                pending
            }
        };

        pending.await
    }

    /// Adopts an existing backend record instead of creating one.
    ///
    /// ## Errors
    ///
    /// Returns [`SiteboxError::RuntimeNotFound`] if the backend has no record with `id`.
    pub async fn attach(&self, id: &str) -> SiteboxResult<()> {
        let record = self
            .inner
            .registry
            .get(id)
            .await?
            .ok_or_else(|| SiteboxError::RuntimeNotFound(id.to_string()))?;

        {
            let mut state = self.inner.state.lock().await;
            state.registered_id = Some(record.id.clone());
            state.status = Some(record.status);
            if let Some(metadata) = &record.metadata {
                state.ports.extend(metadata.ports.iter().copied());
                state.url = metadata.url.clone();
            }
            state.phase = GenerationPhase::Registered;
        }

        tracing::info!(id = %record.id, status = %record.status, "attached to runtime record");
        self.start_port_listener().await;
        Ok(())
    }

    /// Moves the registered runtime to `status`.
    ///
    /// ## Errors
    ///
    /// * [`SiteboxError::NotRegistered`] if nothing is registered
    /// * [`SiteboxError::InvalidStatusTransition`] if the lifecycle forbids the move, in which
    ///   case no request is made
    /// * any error returned by the registry
    pub async fn transition(&self, status: RuntimeStatus) -> SiteboxResult<()> {
        let (id, from) = {
            let state = self.inner.state.lock().await;
            let id = state.registered_id.clone().ok_or(SiteboxError::NotRegistered)?;
            (id, state.status.unwrap_or(RuntimeStatus::Creating))
        };

        if !from.can_transition_to(status) {
            return Err(SiteboxError::InvalidStatusTransition { from, to: status });
        }

        self.inner
            .registry
            .update(&id, &UpdateRuntimeRequest::status(status))
            .await?;

        self.inner.state.lock().await.status = Some(status);
        tracing::info!(%id, %from, to = %status, "runtime status changed");
        Ok(())
    }

    /// Pushes a metadata patch for the registered runtime. A missing workdir name is filled in.
    ///
    /// Does nothing but warn when nothing is registered. Backend failures are logged.
    pub async fn update_metadata(&self, mut patch: MetadataPatch) {
        let Some(id) = self.registered_id().await else {
            tracing::warn!("no registered runtime, metadata update dropped");
            return;
        };

        if patch.workdir_name.is_none() {
            patch.workdir_name = Some(self.inner.config.get_workdir_name().clone());
        }

        match self
            .inner
            .registry
            .update(&id, &UpdateRuntimeRequest::metadata(patch))
            .await
        {
            Ok(_) => tracing::debug!(%id, "runtime metadata updated"),
            Err(e) => tracing::error!(%id, "failed to update runtime metadata: {}", e),
        }
    }

    /// Records that the sandbox opened `port` at `url` and mirrors the port set into the record.
    ///
    /// Does nothing but record the port when nothing is registered. Backend failures are logged.
    pub async fn on_port_opened(&self, port: u16, url: &str) {
        let (id, patch) = {
            let mut state = self.inner.state.lock().await;
            state.ports.insert(port);
            state.url = Some(url.to_string());

            let Some(id) = state.registered_id.clone() else {
                tracing::debug!(port, "port opened before registration");
                return;
            };

            let patch = MetadataPatch {
                workdir_name: Some(self.inner.config.get_workdir_name().clone()),
                ports: Some(state.ports.iter().copied().collect()),
                url: Some(url.to_string()),
                ..Default::default()
            };

            (id, patch)
        };

        match self
            .inner
            .registry
            .update(&id, &UpdateRuntimeRequest::metadata(patch))
            .await
        {
            Ok(_) => tracing::debug!(%id, port, url, "runtime port info updated"),
            Err(e) => tracing::error!(%id, port, "failed to update port info: {}", e),
        }
    }

    /// Waits for the boot in the background and marks the registered runtime as failed if the
    /// boot is rejected.
    pub fn watch_boot(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let Err(error) = coordinator.inner.boot.wait().await else {
                return;
            };

            if coordinator.registered_id().await.is_none() {
                return;
            }

            tracing::warn!("sandbox failed to boot, marking runtime as failed: {}", error);
            if let Err(e) = coordinator.transition(RuntimeStatus::Error).await {
                tracing::error!("failed to update error status: {}", e);
            }
        })
    }

    fn spawn_registration(&self, project_id: String) -> PendingRegistration {
        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.register(project_id).await });

        async move {
            match handle.await {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!("registration task failed: {}", e);
                    None
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Runs one registration and clears the in-flight marker whatever the outcome.
    async fn register(self, project_id: String) -> Option<String> {
        let id = self.try_register(&project_id).await;

        let mut state = self.inner.state.lock().await;
        state.pending = None;
        state.phase = match id {
            Some(_) => GenerationPhase::Registered,
            None => GenerationPhase::Idle,
        };

        id
    }

    async fn try_register(&self, project_id: &str) -> Option<String> {
        if let Err(e) = self
            .inner
            .boot
            .wait_timeout(*self.inner.config.get_boot_timeout())
            .await
        {
            tracing::warn!("sandbox not loaded, skipping registration: {}", e);
            return None;
        }

        let request = CreateRuntimeRequest::builder()
            .project_id(project_id)
            .name(runtime_name())
            .description(DEFAULT_RUNTIME_DESCRIPTION)
            .metadata(RuntimeMetadata::new(self.inner.config.get_workdir_name()))
            .build();

        let record = match self.inner.registry.create(&request).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(project_id, "failed to register runtime: {}", e);
                return None;
            }
        };

        tracing::info!(id = %record.id, project_id, "runtime registered");
        {
            let mut state = self.inner.state.lock().await;
            state.registered_id = Some(record.id.clone());
            state.status = Some(record.status);
        }

        self.start_port_listener().await;

        // A record stuck in `creating` is still a registered runtime.
        if let Err(e) = self.transition(RuntimeStatus::Active).await {
            tracing::error!(id = %record.id, "failed to mark runtime as active: {}", e);
        }

        Some(record.id)
    }

    /// Mirrors port-open events into the record. Idempotent.
    async fn start_port_listener(&self) {
        let mut state = self.inner.state.lock().await;
        if state.port_listener.is_some() {
            return;
        }

        let boot = self.inner.boot.clone();
        let weak = Arc::downgrade(&self.inner);
        state.port_listener = Some(tokio::spawn(async move {
            let Ok(sandbox) = boot.wait().await else {
                return;
            };

            listen_for_ports(sandbox.subscribe_ports(), weak).await;
        }));
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

async fn listen_for_ports(
    mut events: broadcast::Receiver<PortEvent>,
    coordinator: Weak<CoordinatorInner>,
) {
    loop {
        match events.recv().await {
            Ok(event) if event.kind == PortEventKind::Open => {
                let Some(inner) = coordinator.upgrade() else {
                    return;
                };

                RuntimeCoordinator { inner }
                    .on_port_opened(event.port, &event.url)
                    .await;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "port listener fell behind, events dropped");
            }
            Err(RecvError::Closed) => return,
        }
    }
}

fn runtime_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();

    format!("{RUNTIME_NAME_PREFIX}-{millis}")
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Debug for RuntimeCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeCoordinator")
            .field("boot", &self.inner.boot)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        if let Some(listener) = self.state.get_mut().port_listener.take() {
            listener.abort();
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
