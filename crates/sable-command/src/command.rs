//! The command tree node.
//!
//! A [`Command`] is a tagged tree node: name, aliases, description, declared
//! argument shape, permission mode, child commands, and an optional executor.
//! A root command is simply a node registered directly into the
//! [`CommandMap`](crate::CommandMap); children are the same type one level
//! down. There is no inheritance hierarchy -- execution goes through the
//! single [`CommandExecutor`] capability.

use std::sync::Arc;

use async_trait::async_trait;

use sable_permission::{HolderRef, PermissionHandler};
use sable_types::{Alert, MessageEvent, SableError};

use crate::argument::{ArgumentInfo, BoundArguments};

/// Maximum allowed length for a command name or alias.
const MAX_NAME_LEN: usize = 64;

/// Everything an executor gets to see for one invocation.
pub struct CommandContext {
    /// The triggering message.
    pub message: MessageEvent,
    /// The actor permissions are resolved for (the message author).
    pub actor: HolderRef,
    /// Shared permission handler, for commands that read or mutate grants.
    pub permissions: Arc<PermissionHandler>,
}

/// The single execution capability behind every command node.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, ctx: &CommandContext, args: BoundArguments)
        -> anyhow::Result<Alert>;
}

/// How a command derives its guarding permission node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPermission {
    /// No permission check. The default, so a fresh install with an empty
    /// (default-deny) permission store can still run `help`.
    Open,
    /// Derive the node from the qualified command path, e.g. the child `set`
    /// of root `config` guards `config.set`.
    Inherit,
    /// Guard an explicit node.
    Node(String),
}

/// A named, aliasable node of the dispatch tree.
pub struct Command {
    name: String,
    aliases: Vec<String>,
    description: String,
    argument_info: ArgumentInfo,
    permission: CommandPermission,
    children: Vec<Arc<Command>>,
    executor: Option<Arc<dyn CommandExecutor>>,
}

impl Command {
    /// Start a command definition. Further shape is added with the chaining
    /// methods; validation happens at registration.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: description.into(),
            argument_info: ArgumentInfo::none(),
            permission: CommandPermission::Open,
            children: Vec::new(),
            executor: None,
        }
    }

    /// Add an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Declare the argument shape.
    pub fn arguments(mut self, info: ArgumentInfo) -> Self {
        self.argument_info = info;
        self
    }

    /// Set the permission mode.
    pub fn permission(mut self, permission: CommandPermission) -> Self {
        self.permission = permission;
        self
    }

    /// Attach a child command (a sub-command one level down).
    pub fn child(mut self, child: Command) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    /// Attach the executor invoked after binding and permission checks.
    pub fn executor(mut self, executor: impl CommandExecutor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn argument_info(&self) -> &ArgumentInfo {
        &self.argument_info
    }

    pub fn permission_mode(&self) -> &CommandPermission {
        &self.permission
    }

    pub fn children(&self) -> &[Arc<Command>] {
        &self.children
    }

    pub fn executor_ref(&self) -> Option<&Arc<dyn CommandExecutor>> {
        self.executor.as_ref()
    }

    /// Look up a direct child by name or alias, case-insensitively.
    pub fn get_child(&self, identifier: &str) -> Option<&Arc<Command>> {
        let id = identifier.to_lowercase();
        self.children.iter().find(|c| {
            c.name.eq_ignore_ascii_case(&id)
                || c.aliases.iter().any(|a| a.eq_ignore_ascii_case(&id))
        })
    }

    /// Validate this node and its whole sub-tree. Called at registration.
    ///
    /// Checks name/alias charset and length, and that sibling names and
    /// aliases do not collide within one parent.
    pub fn validate(&self) -> Result<(), SableError> {
        validate_name(&self.name)?;
        for alias in &self.aliases {
            validate_name(alias)?;
        }

        let mut seen = std::collections::HashSet::new();
        for child in &self.children {
            for id in std::iter::once(child.name.as_str())
                .chain(child.aliases.iter().map(String::as_str))
            {
                if !seen.insert(id.to_lowercase()) {
                    return Err(SableError::InvalidCommand(format!(
                        "duplicate sub-command identifier '{id}' under '{}'",
                        self.name
                    )));
                }
            }
            child.validate()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("children", &self.children.len())
            .finish()
    }
}

fn validate_name(name: &str) -> Result<(), SableError> {
    if name.is_empty() {
        return Err(SableError::InvalidCommand("command name must not be empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(SableError::InvalidCommand(format!(
            "command name exceeds maximum length of {MAX_NAME_LEN}: {name}"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(SableError::InvalidCommand(format!(
            "command name must be lowercase alphanumeric plus '-'/'_': {name}"
        )));
    }
    Ok(())
}
