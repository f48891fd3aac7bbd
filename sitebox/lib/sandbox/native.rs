use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::sync::broadcast;
use typed_path::{Utf8UnixComponent, Utf8UnixPath};

use crate::{utils, SiteboxError, SiteboxResult};

use super::{DirEntry, EntryKind, PortEvent, PortEvents, Sandbox};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A sandbox backed by a directory on the host filesystem.
///
/// The sandbox root `/` maps to `root_path`. Paths are normalized before they are joined and
/// resolved paths must stay under the canonical root, so nothing outside `root_path` is
/// reachable. Symlinks to files inside the root are followed. Symlinks to directories are left
/// out of listings, which keeps tree walks finite.
#[derive(Debug, Clone)]
pub struct NativeSandbox {
    /// The canonical host directory the sandbox root maps to.
    root_path: PathBuf,

    /// Port events announced through [`announce_port`](Self::announce_port).
    ports: PortEvents,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl NativeSandbox {
    /// Boots a sandbox over an existing host directory.
    ///
    /// ## Errors
    ///
    /// Returns an error if `root_path` does not exist or is not a directory.
    pub async fn boot(root_path: impl Into<PathBuf>) -> SiteboxResult<Self> {
        let root_path = root_path.into();
        let metadata = tokio::fs::metadata(&root_path)
            .await
            .map_err(|e| map_io_error(e, &root_path))?;

        if !metadata.is_dir() {
            return Err(SiteboxError::NotADirectory(root_path));
        }

        let root_path = tokio::fs::canonicalize(&root_path)
            .await
            .map_err(|e| map_io_error(e, &root_path))?;

        tracing::debug!("native sandbox rooted at {}", root_path.display());

        Ok(Self {
            root_path,
            ports: PortEvents::new(),
        })
    }

    /// Returns the host directory the sandbox root maps to.
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Announces a port change to subscribers.
    pub fn announce_port(&self, event: PortEvent) -> usize {
        self.ports.announce(event)
    }

    /// Converts a sandbox path to the host path it maps to.
    fn to_native_path(&self, path: &Utf8UnixPath) -> SiteboxResult<PathBuf> {
        let normalized = utils::normalize_sandbox_path(path.as_str())?;
        let mut native = self.root_path.clone();
        for component in normalized.components() {
            if let Utf8UnixComponent::Normal(segment) = component {
                native.push(segment);
            }
        }

        Ok(native)
    }

    /// Resolves a host path through any symlinks and checks that it stays under the root.
    async fn resolve_inside_root(&self, native_path: &Path) -> SiteboxResult<PathBuf> {
        let resolved = tokio::fs::canonicalize(native_path)
            .await
            .map_err(|e| map_io_error(e, native_path))?;

        if !resolved.starts_with(&self.root_path) {
            return Err(SiteboxError::InvalidPath(format!(
                "{} resolves outside the sandbox root",
                native_path.display()
            )));
        }

        Ok(resolved)
    }

    /// Classifies one listing entry. `None` means the entry is left out of the listing.
    async fn classify_entry(
        &self,
        entry: &tokio::fs::DirEntry,
    ) -> SiteboxResult<Option<EntryKind>> {
        let file_type = entry.file_type().await?;
        if !file_type.is_symlink() {
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            return Ok(Some(kind));
        }

        let target = self.resolve_inside_root(&entry.path()).await?;
        if tokio::fs::metadata(&target).await?.is_dir() {
            tracing::debug!("skipping symlinked directory {}", entry.path().display());
            return Ok(None);
        }

        Ok(Some(EntryKind::File))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn map_io_error(error: io::Error, path: &Path) -> SiteboxError {
    match error.kind() {
        io::ErrorKind::NotFound => SiteboxError::NotFound(path.to_path_buf()),
        _ => SiteboxError::Io(error),
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Sandbox for NativeSandbox {
    async fn read_directory(&self, path: &Utf8UnixPath) -> SiteboxResult<Vec<DirEntry>> {
        let native_path = self.resolve_inside_root(&self.to_native_path(path)?).await?;
        let mut read_dir = tokio::fs::read_dir(&native_path)
            .await
            .map_err(|e| map_io_error(e, &native_path))?;

        let mut entries = Vec::new();
        loop {
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("stopped listing {} early: {}", native_path.display(), e);
                    break;
                }
            };

            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!("skipping non utf-8 entry in {}", native_path.display());
                continue;
            };

            match self.classify_entry(&entry).await {
                Ok(Some(kind)) => entries.push(DirEntry { name, kind }),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("skipping entry {}: {}", entry.path().display(), e);
                }
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_file(&self, path: &Utf8UnixPath) -> SiteboxResult<String> {
        let native_path = self.resolve_inside_root(&self.to_native_path(path)?).await?;
        let metadata = tokio::fs::metadata(&native_path)
            .await
            .map_err(|e| map_io_error(e, &native_path))?;

        if metadata.is_dir() {
            return Err(SiteboxError::NotAFile(native_path));
        }

        tokio::fs::read_to_string(&native_path)
            .await
            .map_err(|e| map_io_error(e, &native_path))
    }

    fn subscribe_ports(&self) -> broadcast::Receiver<PortEvent> {
        self.ports.subscribe()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
