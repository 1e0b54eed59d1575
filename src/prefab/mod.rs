//! Prefab templates and placed instances
//!
//! Templates are loaded from RON and never mutated; instances are the
//! per-run placed copies the generator links together.

pub mod template;
pub mod instance;
pub mod library;

pub use template::{Port, Prefab, PrefabDefinition, PrefabMetadata, Tagged};
pub use instance::{ConnectionId, InstanceId, PrefabConnection, PrefabInstance};
pub use library::{PrefabLibrary, PrefabLibraryFile};
