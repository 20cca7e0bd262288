//! Services orchestrating storage, extensions and hooks for one entity type

pub mod builder;
pub mod composer;
pub mod crud;
pub mod read_only;
pub mod registry;

pub use builder::ServiceBuilder;
pub use composer::{QueryComposer, validate_filters};
pub use crud::CrudService;
pub use read_only::ReadOnlyService;
pub use registry::{ExtensionRegistry, ExtensionRegistryBuilder};
