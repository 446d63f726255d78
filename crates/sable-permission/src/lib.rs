//! Layered permission model for the Sable bot host.
//!
//! Permission nodes are dot-delimited lowercase paths (`module.command.action`),
//! optionally ending in a `*` segment that covers the node and everything
//! beneath it. Holders (users, roles, groups) own ordered lists of allow/deny
//! entries; [`PermissionHandler`] resolves an effective decision by walking the
//! actor's inheritance chain.
//!
//! - [`PermissionEntry`] / [`PermissionSet`] -- node entries and per-level matching
//! - [`User`] / [`Role`] / [`Group`] / [`HolderRef`] -- permission holders
//! - [`PermissionStore`] -- async persistence adapter, with [`MemoryStore`]
//! - [`PermissionHandler`] -- cache + resolution + persist-then-apply mutation

pub mod entry;
pub mod handler;
pub mod holder;
pub mod store;

pub use entry::{validate_node, PermissionEntry, PermissionSet};
pub use handler::PermissionHandler;
pub use holder::{Group, HolderRef, Role, User};
pub use store::{MemoryStore, PermissionStore};
