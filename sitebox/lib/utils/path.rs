use typed_path::{Utf8UnixComponent, Utf8UnixPath, Utf8UnixPathBuf};

use crate::{SiteboxError, SiteboxResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The root of every sandbox filesystem.
pub const SANDBOX_ROOT: &str = "/";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Normalizes a sandbox path into an absolute path under [`SANDBOX_ROOT`].
///
/// Rules:
/// - Relative paths are resolved against the root
/// - `.` components and redundant separators are dropped
/// - `..` components pop the previous component, but never above the root
///
/// ## Errors
///
/// Returns [`SiteboxError::InvalidPath`] if the path is empty or climbs above the root.
pub fn normalize_sandbox_path(path: impl AsRef<str>) -> SiteboxResult<Utf8UnixPathBuf> {
    let raw = path.as_ref();
    if raw.is_empty() {
        return Err(SiteboxError::InvalidPath("path cannot be empty".to_string()));
    }

    let mut segments: Vec<&str> = Vec::new();
    for component in Utf8UnixPath::new(raw).components() {
        match component {
            Utf8UnixComponent::RootDir | Utf8UnixComponent::CurDir => continue,
            Utf8UnixComponent::ParentDir => {
                if segments.pop().is_none() {
                    return Err(SiteboxError::InvalidPath(format!(
                        "cannot traverse above the sandbox root: {raw}"
                    )));
                }
            }
            Utf8UnixComponent::Normal(segment) => segments.push(segment),
        }
    }

    let mut normalized = Utf8UnixPathBuf::from(SANDBOX_ROOT);
    for segment in segments {
        normalized.push(segment);
    }

    Ok(normalized)
}

/// Returns the path of `path` relative to `root`, or `None` if `path` is not under `root`.
pub fn relative_to<'a>(path: &'a Utf8UnixPath, root: &Utf8UnixPath) -> Option<&'a Utf8UnixPath> {
    path.strip_prefix(root).ok()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
