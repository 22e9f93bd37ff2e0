//! Core data structures for Crank.
//!
//! - The project context every command runs against
//! - The registry of external programs by alias

pub mod context;
pub mod registry;

pub use context::{default_home, BuildConfig, BuildOverrides, DefaultKey, ProjectContext};
pub use registry::{ProgramRegistry, RegistryError};
