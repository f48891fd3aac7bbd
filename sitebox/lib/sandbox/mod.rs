//! The sandboxed runtime boundary.
//!
//! A [`Sandbox`] is the isolated environment running a generated project. Sitebox only needs three
//! things from it: list a directory, read a file as text, and hear about ports it opens. Booting
//! is modelled by [`SandboxBoot`], a cloneable handle every caller can await.

mod boot;
mod memory;
mod native;
mod ports;
mod traits;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use boot::*;
pub use memory::*;
pub use native::*;
pub use ports::*;
pub use traits::*;
