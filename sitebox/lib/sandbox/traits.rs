use async_trait::async_trait;
use tokio::sync::broadcast;
use typed_path::Utf8UnixPath;

use crate::SiteboxResult;

use super::PortEvent;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A regular file.
    File,

    /// A directory.
    Directory,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirEntry {
    /// The entry name, a single path segment.
    pub name: String,

    /// Whether the entry is a file or a directory.
    pub kind: EntryKind,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A booted sandbox whose filesystem and network events sitebox can observe.
///
/// Paths are absolute unix paths rooted at the sandbox root `/`.
#[async_trait]
pub trait Sandbox: Send + Sync + 'static {
    /// Lists the entries of the directory at `path`.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - The path doesn't exist
    /// - The path is not a directory
    async fn read_directory(&self, path: &Utf8UnixPath) -> SiteboxResult<Vec<DirEntry>>;

    /// Reads the file at `path` as UTF-8 text.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - The path doesn't exist
    /// - The path is a directory
    /// - The content is not valid UTF-8
    async fn read_file(&self, path: &Utf8UnixPath) -> SiteboxResult<String>;

    /// Subscribes to port open and close events raised by the sandbox.
    fn subscribe_ports(&self) -> broadcast::Receiver<PortEvent>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DirEntry {
    /// Creates a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    /// Creates a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }

    /// Returns `true` if the entry is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}
