//! Configuration types and helpers.

mod credentials;
mod defaults;
mod sitebox;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use credentials::*;
pub use defaults::*;
pub use sitebox::*;
