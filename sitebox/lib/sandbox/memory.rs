use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use typed_path::{Utf8UnixComponent, Utf8UnixPath, Utf8UnixPathBuf};

use crate::{utils, SiteboxError, SiteboxResult};

use super::{DirEntry, PortEvent, PortEvents, Sandbox};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A sandbox whose filesystem lives entirely in memory.
///
/// Clones share the same tree and the same port channel. Parent directories are created
/// implicitly by [`write_file`](Self::write_file).
#[derive(Debug, Clone)]
pub struct MemorySandbox {
    /// Normalized absolute path -> node.
    tree: Arc<RwLock<BTreeMap<String, Node>>>,
    ports: PortEvents,
}

#[derive(Debug, Clone)]
enum Node {
    File(String),
    Directory,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MemorySandbox {
    /// Creates a sandbox containing only the root directory.
    pub fn new() -> Self {
        let mut tree = BTreeMap::new();
        tree.insert(utils::SANDBOX_ROOT.to_string(), Node::Directory);

        Self {
            tree: Arc::new(RwLock::new(tree)),
            ports: PortEvents::new(),
        }
    }

    /// Writes `content` to `path`, creating the file and any missing parent directories.
    ///
    /// ## Errors
    ///
    /// Returns an error if the path is invalid, names the root, or an ancestor is a file.
    pub async fn write_file(
        &self,
        path: impl AsRef<str>,
        content: impl Into<String>,
    ) -> SiteboxResult<()> {
        let path = utils::normalize_sandbox_path(path)?;
        let mut tree = self.tree.write().await;

        if let Some(Node::Directory) = tree.get(path.as_str()) {
            return Err(SiteboxError::NotAFile(native(&path)));
        }

        if let Some(parent) = path.parent() {
            create_ancestors(&mut tree, parent)?;
        }

        tree.insert(path.as_str().to_string(), Node::File(content.into()));
        Ok(())
    }

    /// Creates the directory at `path` and any missing parents.
    pub async fn create_directory(&self, path: impl AsRef<str>) -> SiteboxResult<()> {
        let path = utils::normalize_sandbox_path(path)?;
        let mut tree = self.tree.write().await;
        create_ancestors(&mut tree, &path)
    }

    /// Removes the file or directory at `path` along with everything beneath it.
    pub async fn remove(&self, path: impl AsRef<str>) -> SiteboxResult<()> {
        let path = utils::normalize_sandbox_path(path)?;
        let mut tree = self.tree.write().await;

        if path.as_str() == utils::SANDBOX_ROOT {
            return Err(SiteboxError::InvalidPath("cannot remove the sandbox root".to_string()));
        }

        if tree.remove(path.as_str()).is_none() {
            return Err(SiteboxError::NotFound(native(&path)));
        }

        tree.retain(|candidate, _| !Utf8UnixPath::new(candidate).starts_with(&path));
        Ok(())
    }

    /// Announces that the sandbox opened `port`, reachable at `url`.
    pub fn open_port(&self, port: u16, url: impl Into<String>) -> usize {
        self.ports.announce(PortEvent::open(port, url))
    }

    /// Announces that the sandbox closed `port`.
    pub fn close_port(&self, port: u16, url: impl Into<String>) -> usize {
        self.ports.announce(PortEvent::close(port, url))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn native(path: &Utf8UnixPath) -> PathBuf {
    PathBuf::from(path.as_str())
}

/// Makes sure `dir` and all of its ancestors exist as directories.
fn create_ancestors(tree: &mut BTreeMap<String, Node>, dir: &Utf8UnixPath) -> SiteboxResult<()> {
    let mut current = Utf8UnixPathBuf::from(utils::SANDBOX_ROOT);
    for component in dir.components() {
        let Utf8UnixComponent::Normal(segment) = component else {
            continue;
        };

        current.push(segment);
        match tree.get(current.as_str()) {
            Some(Node::Directory) => {}
            Some(Node::File(_)) => return Err(SiteboxError::NotADirectory(native(&current))),
            None => {
                tree.insert(current.as_str().to_string(), Node::Directory);
            }
        }
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for MemorySandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sandbox for MemorySandbox {
    async fn read_directory(&self, path: &Utf8UnixPath) -> SiteboxResult<Vec<DirEntry>> {
        let path = utils::normalize_sandbox_path(path.as_str())?;
        let tree = self.tree.read().await;

        match tree.get(path.as_str()) {
            Some(Node::Directory) => {}
            Some(Node::File(_)) => return Err(SiteboxError::NotADirectory(native(&path))),
            None => return Err(SiteboxError::NotFound(native(&path))),
        }

        let entries = tree
            .iter()
            .filter_map(|(candidate, node)| {
                let candidate = Utf8UnixPath::new(candidate);
                if candidate.parent()?.as_str() != path.as_str() {
                    return None;
                }

                let name = candidate.file_name()?;
                Some(match node {
                    Node::File(_) => DirEntry::file(name),
                    Node::Directory => DirEntry::directory(name),
                })
            })
            .collect();

        Ok(entries)
    }

    async fn read_file(&self, path: &Utf8UnixPath) -> SiteboxResult<String> {
        let path = utils::normalize_sandbox_path(path.as_str())?;
        let tree = self.tree.read().await;

        match tree.get(path.as_str()) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(Node::Directory) => Err(SiteboxError::NotAFile(native(&path))),
            None => Err(SiteboxError::NotFound(native(&path))),
        }
    }

    fn subscribe_ports(&self) -> broadcast::Receiver<PortEvent> {
        self.ports.subscribe()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
