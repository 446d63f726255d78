//! Shared types for the Sable bot host.
//!
//! - [`SableError`] -- error taxonomy used across every crate
//! - [`BotConfig`] / [`load_config`] -- bootstrap configuration from `config.json`
//! - [`MessageEvent`] -- an inbound chat message delivered by the gateway
//! - [`Alert`] -- the structured response a command produces

pub mod alert;
pub mod config;
pub mod error;
pub mod message;

pub use alert::{Alert, AlertField, AlertKind};
pub use config::{load_config, BotConfig};
pub use error::SableError;
pub use message::MessageEvent;
