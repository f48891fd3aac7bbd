//! Clients for the runtime registration backend.

mod http;
mod memory;
mod traits;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use http::*;
pub use memory::*;
pub use traits::*;
