//! Registration and persistence of the running sandbox.
//!
//! [`RuntimeCoordinator`] registers the sandbox with the backend once per process and mirrors
//! its lifecycle into the record. [`ContentSaver`] pushes file snapshots after each generation.

mod coordinator;
mod save;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use coordinator::*;
pub use save::*;
