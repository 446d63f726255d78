//! The built-in `base` module: help, module listing, and permission
//! administration.
//!
//! `base` goes through the same lifecycle as any discovered module; the host
//! registers its factory and indexes its descriptor before discovery runs.
//! `help` and `modules` are open so a fresh install with an empty
//! (default-deny) permission store can orient itself; the `permissions`
//! sub-commands inherit their nodes (`permissions.grant`, ...) and are
//! covered by the `permissions.*` grant the host gives the configured admin.

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use sable_command::{
    ArgumentInfo, ArgumentSpec, BoundArguments, Command, CommandContext, CommandExecutor,
    CommandHandler, CommandPermission,
};
use sable_module::{Module, ModuleContext, ModuleDescription, ModuleHandler, ModuleState};
use sable_permission::HolderRef;
use sable_types::{Alert, SableError};

/// Descriptor for the built-in module.
pub fn base_description() -> ModuleDescription {
    ModuleDescription {
        name: "base".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        description: "Built-in help and administration commands.".into(),
        authors: vec!["Sable Maintainers".into()],
        dependencies: Vec::new(),
        entry_point: None,
    }
}

/// The built-in module. Holds a weak handle to the module handler so the
/// `help` and `modules` commands can list modules without an ownership cycle.
pub struct BaseModule {
    modules: Weak<ModuleHandler>,
}

impl BaseModule {
    pub fn new(modules: Weak<ModuleHandler>) -> Self {
        Self { modules }
    }
}

impl Module for BaseModule {
    fn enable(&self, ctx: &ModuleContext) -> anyhow::Result<Vec<Command>> {
        let help = Command::new("help", "Shows module and command information.")
            .alias("h")
            .arguments(ArgumentInfo::new(vec![
                ArgumentSpec::optional("topic", "a root command to describe"),
                ArgumentSpec::variadic("path", "sub-command path beneath the topic"),
            ])?)
            .executor(HelpExecutor {
                commands: ctx.commands.clone(),
                modules: self.modules.clone(),
            });

        let modules = Command::new("modules", "Lists modules and their states.")
            .executor(ModulesExecutor {
                modules: self.modules.clone(),
            });

        let holder_args = || {
            ArgumentInfo::new(vec![
                ArgumentSpec::required("holder", "one of `user`, `role`, `group`"),
                ArgumentSpec::required("id", "the holder's identifier"),
                ArgumentSpec::required("node", "the permission node"),
            ])
        };
        let permissions = Command::new("permissions", "Permission administration.")
            .alias("perms")
            .child(
                Command::new("check", "Resolves a holder's effective permission.")
                    .permission(CommandPermission::Inherit)
                    .arguments(holder_args()?)
                    .executor(PermissionsExecutor::new(PermissionAction::Check)),
            )
            .child(
                Command::new("grant", "Adds an allow entry to a holder.")
                    .permission(CommandPermission::Inherit)
                    .arguments(holder_args()?)
                    .executor(PermissionsExecutor::new(PermissionAction::Grant)),
            )
            .child(
                Command::new("deny", "Adds an explicit deny entry to a holder.")
                    .permission(CommandPermission::Inherit)
                    .arguments(holder_args()?)
                    .executor(PermissionsExecutor::new(PermissionAction::Deny)),
            )
            .child(
                Command::new("revoke", "Removes a holder's entry for a node.")
                    .permission(CommandPermission::Inherit)
                    .arguments(holder_args()?)
                    .executor(PermissionsExecutor::new(PermissionAction::Revoke)),
            )
            .child(
                Command::new("assign", "Assigns a role to a user.")
                    .permission(CommandPermission::Inherit)
                    .arguments(ArgumentInfo::new(vec![
                        ArgumentSpec::required("user", "the user to assign to"),
                        ArgumentSpec::required("role", "the role to assign"),
                    ])?)
                    .executor(PermissionsExecutor::new(PermissionAction::Assign)),
            )
            .child(
                Command::new("group", "Sets or clears a user's group membership.")
                    .permission(CommandPermission::Inherit)
                    .arguments(ArgumentInfo::new(vec![
                        ArgumentSpec::required("user", "the user to update"),
                        ArgumentSpec::optional("group", "the group; omit to clear"),
                    ])?)
                    .executor(PermissionsExecutor::new(PermissionAction::SetGroup)),
            );

        Ok(vec![help, modules, permissions])
    }
}

struct HelpExecutor {
    commands: Arc<CommandHandler>,
    modules: Weak<ModuleHandler>,
}

impl HelpExecutor {
    fn module_listing(&self) -> Alert {
        let prefix = self.commands.prefix();
        let mut alert = Alert::info(
            "Help",
            format!("Run `{prefix}help (topic) (path...)` for details on a command."),
        );

        let Some(modules) = self.modules.upgrade() else {
            // Module handler gone; fall back to a flat command listing.
            for command in self.commands.root_commands() {
                alert = alert.field(format!("{prefix}{}", command.name()), command.description());
            }
            return alert;
        };

        for module in modules.modules() {
            let title = format!("{} ({})", module.description.name, module.description.version);
            let value = if module.state == ModuleState::Enabled {
                let commands = self.commands.get_commands(&module.description.name);
                if commands.is_empty() {
                    module.description.description.clone()
                } else {
                    commands
                        .iter()
                        .map(|c| format!("`{prefix}{}`", c.name()))
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            } else {
                format!("{}", module.state)
            };
            alert = alert.field(title, value);
        }
        alert
    }

    /// Describe an enabled module: description, authors, and its root
    /// commands sorted by name.
    fn module_information(&self, name: &str) -> Option<Alert> {
        let modules = self.modules.upgrade()?;
        let module = modules.get(name)?;

        let mut alert = Alert::info(
            "Module Information",
            format!("`{}` ({})", module.description.name, module.description.version),
        )
        .field("Description", module.description.description.clone())
        .field("State", format!("{}", module.state));
        if !module.description.authors.is_empty() {
            alert = alert.field("Authors", module.description.authors.join(", "));
        }

        let commands = self.commands.get_commands(name);
        if !commands.is_empty() {
            let prefix = self.commands.prefix();
            alert = alert.field(
                "Commands",
                commands
                    .iter()
                    .map(|c| format!("`{prefix}{}`", c.name()))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }
        Some(alert)
    }

    fn command_information(&self, topic: &str, path_tokens: &[String]) -> Alert {
        let Some(root) = self.commands.get_command(topic) else {
            // A topic that names no command may still name a module.
            if path_tokens.is_empty() {
                if let Some(alert) = self.module_information(topic) {
                    return alert;
                }
            }
            return invalid_topic(topic);
        };

        let mut path = vec![root.clone()];
        let mut current = root;
        for token in path_tokens {
            match current.get_child(token).cloned() {
                Some(child) => {
                    path.push(child.clone());
                    current = child;
                }
                None => {
                    return invalid_topic(&format!("{topic} {}", path_tokens.join(" ")));
                }
            }
        }

        let qualified: Vec<&str> = path.iter().map(|c| c.name()).collect();
        let mut alert = Alert::info(
            "Command Information",
            format!("`{}`", qualified.join(" ")),
        )
        .field("Description", current.description())
        .field("Usage", self.commands.syntax_of(&path))
        .field("Arguments", current.argument_info().parameter_detail());

        if !current.aliases().is_empty() {
            alert = alert.field("Aliases", current.aliases().join(", "));
        }
        if !current.children().is_empty() {
            let children: Vec<&str> = current.children().iter().map(|c| c.name()).collect();
            alert = alert.field("Sub-Commands", children.join(", "));
        }
        alert
    }
}

fn invalid_topic(topic: &str) -> Alert {
    Alert::error("Invalid Topic", format!("no command matches `{topic}`"))
}

#[async_trait]
impl CommandExecutor for HelpExecutor {
    async fn execute(
        &self,
        _ctx: &CommandContext,
        args: BoundArguments,
    ) -> anyhow::Result<Alert> {
        match args.get("topic") {
            None => Ok(self.module_listing()),
            Some(topic) => Ok(self.command_information(topic, args.get_all("path"))),
        }
    }
}

struct ModulesExecutor {
    modules: Weak<ModuleHandler>,
}

#[async_trait]
impl CommandExecutor for ModulesExecutor {
    async fn execute(
        &self,
        _ctx: &CommandContext,
        _args: BoundArguments,
    ) -> anyhow::Result<Alert> {
        let Some(modules) = self.modules.upgrade() else {
            anyhow::bail!("module handler is gone");
        };
        let mut alert = Alert::info("Modules", "Indexed modules and their states.");
        for module in modules.modules() {
            alert = alert.field(
                format!("{} ({})", module.description.name, module.description.version),
                format!("{}", module.state),
            );
        }
        Ok(alert)
    }
}

#[derive(Debug, Clone, Copy)]
enum PermissionAction {
    Check,
    Grant,
    Deny,
    Revoke,
    Assign,
    SetGroup,
}

struct PermissionsExecutor {
    action: PermissionAction,
}

impl PermissionsExecutor {
    fn new(action: PermissionAction) -> Self {
        Self { action }
    }
}

fn parse_holder(kind: &str, id: &str) -> Option<HolderRef> {
    match kind.to_lowercase().as_str() {
        "user" => Some(HolderRef::user(id)),
        "role" => Some(HolderRef::role(id)),
        "group" => Some(HolderRef::group(id)),
        _ => None,
    }
}

/// Render node-validation failures back to the user; everything else (store
/// failures, ...) propagates into the generic failure path.
fn render_permission_error(err: SableError) -> anyhow::Result<Alert> {
    match err {
        SableError::InvalidNode(_) => Ok(Alert::error("Invalid Node", err.to_string())),
        other => Err(other.into()),
    }
}

#[async_trait]
impl CommandExecutor for PermissionsExecutor {
    async fn execute(
        &self,
        ctx: &CommandContext,
        args: BoundArguments,
    ) -> anyhow::Result<Alert> {
        let permissions = &ctx.permissions;

        match self.action {
            PermissionAction::Assign => {
                let (Some(user), Some(role)) = (args.get("user"), args.get("role")) else {
                    anyhow::bail!("argument binding broke the required shape");
                };
                permissions.assign_role(user, role).await?;
                Ok(Alert::success(
                    "Role Assigned",
                    format!("`{user}` now has role `{role}`"),
                ))
            }
            PermissionAction::SetGroup => {
                let Some(user) = args.get("user") else {
                    anyhow::bail!("argument binding broke the required shape");
                };
                let group = args.get("group");
                permissions.set_user_group(user, group).await?;
                Ok(match group {
                    Some(group) => Alert::success(
                        "Group Set",
                        format!("`{user}` is now in group `{group}`"),
                    ),
                    None => Alert::success("Group Cleared", format!("`{user}` has no group")),
                })
            }
            PermissionAction::Check
            | PermissionAction::Grant
            | PermissionAction::Deny
            | PermissionAction::Revoke => {
                let (Some(kind), Some(id), Some(node)) =
                    (args.get("holder"), args.get("id"), args.get("node"))
                else {
                    anyhow::bail!("argument binding broke the required shape");
                };
                let Some(holder) = parse_holder(kind, id) else {
                    return Ok(Alert::error(
                        "Invalid Holder",
                        format!("`{kind}` is not a holder kind; use `user`, `role`, or `group`"),
                    ));
                };

                match self.action {
                    PermissionAction::Check => {
                        match permissions.has_permission(&holder, node).await {
                            Ok(allowed) => Ok(Alert::info(
                                "Permission Check",
                                format!(
                                    "`{holder}` is {} `{node}`",
                                    if allowed { "allowed" } else { "denied" }
                                ),
                            )),
                            Err(e) => render_permission_error(e),
                        }
                    }
                    PermissionAction::Grant => match permissions.grant(&holder, node).await {
                        Ok(()) => Ok(Alert::success(
                            "Permission Granted",
                            format!("`{holder}` may now use `{node}`"),
                        )),
                        Err(e) => render_permission_error(e),
                    },
                    PermissionAction::Deny => match permissions.deny(&holder, node).await {
                        Ok(()) => Ok(Alert::success(
                            "Permission Denied Entry Added",
                            format!("`{holder}` is now denied `{node}`"),
                        )),
                        Err(e) => render_permission_error(e),
                    },
                    PermissionAction::Revoke => match permissions.revoke(&holder, node).await {
                        Ok(()) => Ok(Alert::success(
                            "Permission Revoked",
                            format!("`{holder}` no longer has an entry for `{node}`"),
                        )),
                        Err(e) => render_permission_error(e),
                    },
                    // Narrowed by the outer match arm.
                    PermissionAction::Assign | PermissionAction::SetGroup => {
                        anyhow::bail!("unreachable permission action")
                    }
                }
            }
        }
    }
}
