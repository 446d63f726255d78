//! Command parsing, routing, and dispatch for the Sable bot host.
//!
//! - [`tokenize`] / [`Arguments`] -- quote-aware tokenization with one-token
//!   backtracking
//! - [`ArgumentInfo`] / [`BoundArguments`] -- required/optional/variadic
//!   argument binding
//! - [`Command`] -- a named, aliasable tree node with declared argument shape
//! - [`CommandMap`] -- flat name/alias index over registered root commands
//! - [`CommandHandler`] -- per-message dispatch: prefix strip, tree walk,
//!   argument binding, permission check, execution

pub mod argument;
pub mod command;
pub mod handler;
pub mod map;
pub mod tokenizer;

pub use argument::{ArgumentInfo, ArgumentKind, ArgumentSpec, BoundArguments};
pub use command::{Command, CommandContext, CommandExecutor, CommandPermission};
pub use handler::CommandHandler;
pub use map::CommandMap;
pub use tokenizer::{tokenize, Arguments};
