//! The Sable bot host.
//!
//! Wires the command, permission, and module handlers to a chat [`Gateway`]
//! and a persistence backend, ships the built-in `base` module (help, module
//! listing, permission administration), and drives the per-message dispatch
//! loop.

pub mod base;
pub mod gateway;
pub mod host;
pub mod persistence;

pub use base::{base_description, BaseModule};
pub use gateway::{ConsoleGateway, Gateway, InProcessGateway, OutboundEvent};
pub use host::Host;
pub use persistence::JsonFileStore;
