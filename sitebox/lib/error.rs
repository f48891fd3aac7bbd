use std::{
    error::Error,
    fmt::{self, Display},
    path::PathBuf,
    time::Duration,
};

use thiserror::Error;

use crate::models::RuntimeStatus;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a sitebox-related operation.
pub type SiteboxResult<T> = Result<T, SiteboxError>;

/// An error that occurred while registering, updating or exporting a sandboxed runtime.
#[derive(pretty_error_debug::Debug, Error)]
pub enum SiteboxError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] AnyError),

    /// An error that occurred while sending an HTTP request or reading its response.
    #[error("http request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The backend answered with a non-success status code.
    #[error("transport error: {status} {message}")]
    Transport {
        /// The HTTP status code returned by the backend.
        status: u16,

        /// The status text or body returned by the backend.
        message: String,
    },

    /// A JSON payload could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The sandbox failed to boot.
    #[error("sandbox failed to boot: {0}")]
    BootFailed(#[from] BootError),

    /// The sandbox did not finish booting in time.
    #[error("sandbox did not boot within {0:?}")]
    BootTimeout(Duration),

    /// A status change that the runtime lifecycle does not allow.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        /// The current status.
        from: RuntimeStatus,

        /// The requested status.
        to: RuntimeStatus,
    },

    /// No runtime has been registered with the backend yet.
    #[error("no registered runtime")]
    NotRegistered,

    /// The backend has no record with the given id.
    #[error("runtime record not found: {0}")]
    RuntimeNotFound(String),

    /// The path does not exist in the sandbox.
    #[error("path does not exist: {0}")]
    NotFound(PathBuf),

    /// The path is not a directory.
    #[error("path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The path is not a file.
    #[error("path is not a file: {0}")]
    NotAFile(PathBuf),

    /// A sandbox path that cannot be resolved inside the sandbox root.
    #[error("invalid sandbox path: {0}")]
    InvalidPath(String),

    /// The configured credentials cannot be sent as an HTTP header.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A status string did not name a known runtime status.
    #[error("invalid runtime status: {0}")]
    InvalidStatus(String),
}

/// The reason a sandbox boot was rejected.
///
/// Boot outcomes are shared between every waiter, so the error is kept as its rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BootError {
    message: String,
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SiteboxError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> SiteboxError {
        SiteboxError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// Returns the HTTP status code carried by a transport error.
    pub fn status(&self) -> Option<u16> {
        match self {
            SiteboxError::Transport { status, .. } => Some(*status),
            SiteboxError::HttpRequest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl BootError {
    /// Creates a boot error from anything that can be displayed.
    pub fn new(message: impl Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `SiteboxResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> SiteboxResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
