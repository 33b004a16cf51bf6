// src/registry/mod.rs

//! Branch registry.
//!
//! - [`model`] defines the registry file format and the immutable
//!   [`BranchTable`] built from it.
//! - [`loader`] reads the registry file.
//! - [`plugins`] is the explicit handler reference → factory table.
//! - [`branch_registry`] combines both into [`BranchRegistry`], which loads
//!   handlers lazily and caches them until reloaded.

pub mod branch_registry;
pub mod loader;
pub mod model;
pub mod plugins;

pub use branch_registry::{BranchRegistry, ResolvedBranch};
pub use loader::load_registry;
pub use model::{BranchDescriptor, BranchTable, RawBranch, RawRegistryFile};
pub use plugins::{HandlerFactory, HandlerTable, BUILTIN_COMMAND, BUILTIN_LOG};
