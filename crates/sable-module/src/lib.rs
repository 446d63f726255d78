//! Module lifecycle management for the Sable bot host.
//!
//! Modules are loadable units contributing commands to the host. Each module
//! package carries a `module.json` descriptor; the handler indexes
//! descriptors, loads modules in dependency order (detecting cycles
//! explicitly), and drives the enable/disable lifecycle. Loading failures are
//! per-module and never fatal to the host.
//!
//! - [`ModuleDescription`] -- parsed and validated `module.json` metadata
//! - [`Module`] / [`ModuleContext`] / [`ModuleState`] -- runtime instances
//! - [`ModuleHandler`] -- discovery, indexing, dependency-ordered load,
//!   enable/disable/unload

pub mod descriptor;
pub mod handler;
pub mod module;

pub use descriptor::{parse_description, parse_description_file, ModuleDescription};
pub use handler::{LoadReport, ModuleHandler, ModuleInfo};
pub use module::{Module, ModuleContext, ModuleFactory, ModuleState};
