use crate::{
    export::FileTreeExporter,
    models::{MetadataPatch, UpdateRuntimeRequest},
    utils::SANDBOX_ROOT,
    SiteboxResult,
};

use super::{GenerationPhase, RuntimeCoordinator};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Pushes full file snapshots of the registered sandbox to the backend.
#[derive(Debug, Clone)]
pub struct ContentSaver {
    coordinator: RuntimeCoordinator,
    exporter: FileTreeExporter,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ContentSaver {
    /// Creates a saver using the default ignore lists.
    pub fn new(coordinator: RuntimeCoordinator) -> Self {
        Self::with_exporter(coordinator, FileTreeExporter::new())
    }

    /// Creates a saver with a custom exporter.
    pub fn with_exporter(coordinator: RuntimeCoordinator, exporter: FileTreeExporter) -> Self {
        Self {
            coordinator,
            exporter,
        }
    }

    /// Returns the coordinator whose runtime is saved.
    pub fn coordinator(&self) -> &RuntimeCoordinator {
        &self.coordinator
    }

    /// Exports the sandbox file tree and stores it in the registered record, replacing the
    /// previous snapshot.
    ///
    /// Never registers. Returns `false` without contacting the backend when nothing is
    /// registered, and `false` on any export or backend failure. `project_id` only labels logs.
    pub async fn save_content(&self, project_id: Option<&str>) -> bool {
        let project_id = self.coordinator.config().resolve_project_id(project_id);
        let Some(id) = self.coordinator.registered_id().await else {
            tracing::warn!(%project_id, "no registered runtime, nothing saved");
            return false;
        };

        self.coordinator.set_phase(GenerationPhase::Exporting).await;
        match self.push_snapshot(&id).await {
            Ok(count) => {
                self.coordinator.set_phase(GenerationPhase::Saved).await;
                tracing::info!(%id, %project_id, "saved {} files to backend", count);
                true
            }
            Err(e) => {
                self.coordinator.set_phase(GenerationPhase::Registered).await;
                tracing::error!(%id, %project_id, "failed to save runtime content: {}", e);
                false
            }
        }
    }

    async fn push_snapshot(&self, id: &str) -> SiteboxResult<usize> {
        let config = self.coordinator.config();
        let sandbox = self
            .coordinator
            .boot()
            .wait_timeout(*config.get_boot_timeout())
            .await?;

        tracing::info!(%id, "reading sandbox content");
        let snapshot = self.exporter.export(sandbox.as_ref(), SANDBOX_ROOT).await?;
        let count = snapshot.len();
        tracing::debug!(%id, "found {} files to save", count);

        let patch = MetadataPatch::files(config.get_workdir_name(), snapshot);
        self.coordinator
            .registry()
            .update(id, &UpdateRuntimeRequest::metadata(patch))
            .await?;

        Ok(count)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
