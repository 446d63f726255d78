//! Per-message command dispatch.
//!
//! [`CommandHandler`] owns the prefix and the root [`CommandMap`]. For each
//! inbound message it strips the prefix, tokenizes, resolves the deepest
//! matching command path (peeking one token at a time and backtracking when a
//! token is not a sub-command), binds the remaining tokens to the command's
//! argument shape, consults the permission handler, and executes.
//!
//! Messages without the prefix, and prefixed messages whose first token
//! resolves to no command, are silently ignored. Every other failure is
//! rendered back to the channel as an error alert.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error};

use sable_permission::{HolderRef, PermissionHandler};
use sable_types::{Alert, MessageEvent, SableError};

use crate::command::{Command, CommandContext, CommandPermission};
use crate::map::CommandMap;
use crate::tokenizer::Arguments;

/// Resolves and dispatches inbound command invocations.
///
/// The command map is read-mostly: dispatch takes a read lock, module
/// registration takes the write lock and inserts a module's whole command set
/// in one critical section, so the dispatcher never observes a
/// partially-registered module.
pub struct CommandHandler {
    prefix: String,
    map: RwLock<CommandMap>,
    permissions: Arc<PermissionHandler>,
}

impl CommandHandler {
    pub fn new(prefix: impl Into<String>, permissions: Arc<PermissionHandler>) -> Self {
        Self {
            prefix: prefix.into(),
            map: RwLock::new(CommandMap::new()),
            permissions,
        }
    }

    /// The configured command prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register a module's root commands atomically.
    ///
    /// On any registration error the commands inserted so far for this batch
    /// are rolled back before the error is returned.
    pub fn register_commands(
        &self,
        module: &str,
        commands: Vec<Command>,
    ) -> Result<(), SableError> {
        let mut map = self.map.write();
        let mut inserted: Vec<String> = Vec::new();
        for command in commands {
            match map.register(module, command) {
                Ok(registered) => inserted.push(registered.name().to_string()),
                Err(e) => {
                    // Roll back only this batch; commands the module
                    // registered earlier stay in place.
                    for name in &inserted {
                        map.remove(name);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Remove every command a module registered. Returns how many were removed.
    pub fn unregister_module(&self, module: &str) -> usize {
        self.map.write().unregister_module(module)
    }

    /// Look up a root command by name or alias.
    pub fn get_command(&self, identifier: &str) -> Option<Arc<Command>> {
        self.map.read().get(identifier)
    }

    /// Root commands registered by one module, sorted by name.
    pub fn get_commands(&self, module: &str) -> Vec<Arc<Command>> {
        self.map.read().commands_of(module)
    }

    /// All registered root commands, sorted by name.
    pub fn root_commands(&self) -> Vec<Arc<Command>> {
        self.map.read().roots()
    }

    /// Render the usage string for a root-to-node command path, e.g.
    /// `!permissions grant <holder> <id> <node>`.
    pub fn syntax_of(&self, path: &[Arc<Command>]) -> String {
        let names: Vec<&str> = path.iter().map(|c| c.name()).collect();
        let mut rendered = format!("{}{}", self.prefix, names.join(" "));
        if let Some(last) = path.last() {
            let usage = last.argument_info().usage();
            if !usage.is_empty() {
                rendered.push(' ');
                rendered.push_str(&usage);
            }
        }
        rendered
    }

    /// Handle one inbound message.
    ///
    /// Returns `None` when the message is not a command invocation (no
    /// prefix, empty invocation, or unknown root command -- the latter is
    /// deliberately silent). Otherwise returns the alert to deliver.
    pub async fn on_message(&self, message: &MessageEvent) -> Option<Alert> {
        let content = message.content.strip_prefix(&self.prefix)?;

        let mut args = match Arguments::parse(content) {
            Ok(args) => args,
            Err(e) => return Some(tokenization_alert(&e)),
        };
        let root = {
            let label = args.next()?.to_string();
            match self.map.read().get(&label) {
                Some(command) => command,
                None => {
                    debug!(command = %label, author = %message.author, "unknown command ignored");
                    return None;
                }
            }
        };

        // Descend while the next token names a child; leave anything else for
        // argument binding.
        let mut path = vec![root];
        while let Some(token) = args.peek() {
            let Some(child) = path
                .last()
                .and_then(|c| c.get_child(token))
                .cloned()
            else {
                break;
            };
            args.next();
            path.push(child);
        }
        let command = path.last().cloned()?;

        let bound = match command.argument_info().bind(&mut args) {
            Ok(bound) => bound,
            Err(SableError::MissingArgument(name)) => {
                return Some(
                    Alert::error(
                        "Missing Argument",
                        format!("required argument `{name}` was not provided"),
                    )
                    .field("Usage", self.syntax_of(&path)),
                );
            }
            Err(e) => return Some(tokenization_alert(&e)),
        };

        let actor = HolderRef::user(message.author.clone());
        if let Some(node) = permission_node(&path) {
            match self.permissions.has_permission(&actor, &node).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(node = %node, actor = %actor, "permission denied");
                    return Some(Alert::error(
                        "Permission Denied",
                        format!("you are not permitted to use this command (`{node}`)"),
                    ));
                }
                Err(e) => {
                    error!(node = %node, error = %e, "permission resolution failed");
                    return Some(generic_failure());
                }
            }
        }

        let Some(executor) = command.executor_ref().cloned() else {
            return Some(self.subcommand_listing(&path));
        };

        let ctx = CommandContext {
            message: message.clone(),
            actor,
            permissions: self.permissions.clone(),
        };
        match executor.execute(&ctx, bound).await {
            Ok(alert) => Some(alert),
            Err(e) => {
                error!(command = %command.name(), error = %e, "command execution failed");
                Some(generic_failure())
            }
        }
    }

    /// The alert for invoking a parent command that has no executor of its
    /// own: list its sub-commands with usage.
    fn subcommand_listing(&self, path: &[Arc<Command>]) -> Alert {
        let command = match path.last() {
            Some(c) => c,
            None => return generic_failure(),
        };
        let mut alert = Alert::error(
            "Invalid Syntax",
            format!("`{}` expects a sub-command.", self.syntax_of(path)),
        );
        for child in command.children() {
            let mut child_path = path.to_vec();
            child_path.push(child.clone());
            alert = alert.field(self.syntax_of(&child_path), child.description());
        }
        alert
    }
}

/// Derive the permission node guarding the resolved command, if any.
fn permission_node(path: &[Arc<Command>]) -> Option<String> {
    let command = path.last()?;
    match command.permission_mode() {
        CommandPermission::Open => None,
        CommandPermission::Node(node) => Some(node.clone()),
        CommandPermission::Inherit => Some(
            path.iter()
                .map(|c| c.name().to_lowercase())
                .collect::<Vec<_>>()
                .join("."),
        ),
    }
}

fn tokenization_alert(error: &SableError) -> Alert {
    Alert::error("Invalid Input", error.to_string())
}

fn generic_failure() -> Alert {
    Alert::error("Command Failed", "something went wrong executing that command")
}
