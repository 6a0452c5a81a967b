// This module re-exports important pieces for convenience,
// so we can "use crate::config::*" easily.
pub mod logging;
pub mod security;
pub mod settings;
pub mod store;

pub use logging::*;
pub use security::*;
pub use settings::*;
pub use store::*;
