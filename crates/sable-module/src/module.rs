//! The runtime module interface and lifecycle states.

use std::fmt;
use std::sync::Arc;

use sable_command::{Command, CommandHandler};
use sable_permission::PermissionHandler;
use sable_types::BotConfig;

use crate::descriptor::ModuleDescription;

/// Lifecycle state of an indexed module.
///
/// Transitions are driven only by the
/// [`ModuleHandler`](crate::handler::ModuleHandler):
/// `Indexed -> Loaded -> Enabled <-> Disabled`, with `Errored` reachable from
/// any state when a load or lifecycle hook fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleState {
    /// Descriptor read and validated; no module code has run.
    Indexed,
    /// Constructed through its factory, dependencies satisfied.
    Loaded,
    /// Enable hook ran and the module's commands are registered.
    Enabled,
    /// Disable hook ran and the module's commands were removed.
    Disabled,
    /// A load or lifecycle hook failed; the module is excluded from dispatch.
    Errored(String),
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indexed => write!(f, "Indexed"),
            Self::Loaded => write!(f, "Loaded"),
            Self::Enabled => write!(f, "Enabled"),
            Self::Disabled => write!(f, "Disabled"),
            Self::Errored(msg) => write!(f, "Errored({msg})"),
        }
    }
}

/// Shared host facilities handed to lifecycle hooks.
#[derive(Clone)]
pub struct ModuleContext {
    /// Host configuration, read-only after bootstrap.
    pub config: Arc<BotConfig>,
    /// The command handler, for lookups (registration is done by the module
    /// handler with the commands returned from [`Module::enable`]).
    pub commands: Arc<CommandHandler>,
    /// The shared permission handler.
    pub permissions: Arc<PermissionHandler>,
}

/// A runtime module instance.
///
/// `enable` returns the module's root commands; the module handler registers
/// them in one atomic batch, so the dispatcher never sees a partial set. Hook
/// failures are fatal to the module only, never to the host.
pub trait Module: Send + Sync {
    /// Called when the module is enabled. Returns the root commands to
    /// register on the module's behalf.
    fn enable(&self, ctx: &ModuleContext) -> anyhow::Result<Vec<Command>>;

    /// Called when the module is disabled, before its commands are removed.
    fn disable(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Constructor for a module, registered in the handler's plugin registry
/// keyed by module name. The concrete loading mechanism behind a factory
/// (static link, dynamic library, subprocess) is the factory's business.
pub type ModuleFactory =
    Box<dyn Fn(&ModuleDescription) -> anyhow::Result<Box<dyn Module>> + Send + Sync>;
