//! Flattening a sandbox file tree into a [`FileSnapshot`].

use async_recursion::async_recursion;
use typed_path::Utf8UnixPath;

use crate::{
    models::FileSnapshot,
    sandbox::{DirEntry, Sandbox},
    utils, SiteboxResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Directory names that exclude every root-relative path starting with them.
pub const IGNORED_DIRECTORIES: &[&str] = &[
    "node_modules",
    ".git",
    ".vscode",
    "__pycache__",
    "dist",
    "build",
    ".cache",
    "tmp",
    ".tmp",
];

/// Path suffixes that never end up in a snapshot.
pub const IGNORED_EXTENSIONS: &[&str] = &[".log", ".tmp", ".cache", ".lock"];

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Walks a sandbox filesystem and collects the text content of every file that is not ignored.
#[derive(Debug, Clone)]
pub struct FileTreeExporter {
    ignored_directories: Vec<String>,
    ignored_extensions: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FileTreeExporter {
    /// Creates an exporter with the default ignore lists.
    pub fn new() -> Self {
        Self {
            ignored_directories: IGNORED_DIRECTORIES.iter().map(|s| s.to_string()).collect(),
            ignored_extensions: IGNORED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Exports every non-ignored file under `root`.
    ///
    /// Keys of the returned snapshot are absolute sandbox paths. A file that cannot be read is
    /// skipped, and so is a subdirectory that cannot be listed. Both are logged.
    ///
    /// ## Errors
    ///
    /// Returns an error if `root` is not a valid sandbox path or cannot be listed.
    pub async fn export(
        &self,
        sandbox: &dyn Sandbox,
        root: impl AsRef<str>,
    ) -> SiteboxResult<FileSnapshot> {
        let root = utils::normalize_sandbox_path(root)?;
        let entries = sandbox.read_directory(&root).await?;

        let mut snapshot = FileSnapshot::new();
        self.export_entries(sandbox, &root, &root, entries, &mut snapshot)
            .await;

        tracing::debug!(root = %root, files = snapshot.len(), "exported file tree");
        Ok(snapshot)
    }

    /// Returns `true` if `path` is excluded from snapshots taken from `root`.
    ///
    /// A listed directory matches as a plain string prefix of the root-relative path, so
    /// `dist` also excludes `/distribution/a.ts` and `build` excludes `/build.gradle`.
    pub fn is_ignored(&self, path: &Utf8UnixPath, root: &Utf8UnixPath) -> bool {
        if let Some(relative) = utils::relative_to(path, root) {
            let relative = format!("/{}", relative.as_str());
            if self
                .ignored_directories
                .iter()
                .any(|dir| relative.starts_with(&format!("/{dir}")))
            {
                return true;
            }
        }

        self.ignored_extensions
            .iter()
            .any(|ext| path.as_str().ends_with(ext.as_str()))
    }

    #[async_recursion]
    async fn export_entries(
        &self,
        sandbox: &dyn Sandbox,
        root: &Utf8UnixPath,
        dir: &Utf8UnixPath,
        entries: Vec<DirEntry>,
        snapshot: &mut FileSnapshot,
    ) {
        for entry in entries {
            let path = dir.join(entry.name.as_str());
            if self.is_ignored(&path, root) {
                tracing::trace!(path = %path, "ignored");
                continue;
            }

            if entry.is_directory() {
                match sandbox.read_directory(&path).await {
                    Ok(children) => {
                        self.export_entries(sandbox, root, &path, children, snapshot)
                            .await
                    }
                    Err(e) => tracing::warn!(path = %path, "skipping unreadable directory: {}", e),
                }
            } else {
                match sandbox.read_file(&path).await {
                    Ok(content) => {
                        snapshot.insert(path.as_str().to_string(), content);
                    }
                    Err(e) => tracing::warn!(path = %path, "skipping unreadable file: {}", e),
                }
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for FileTreeExporter {
    fn default() -> Self {
        Self::new()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
