//! Host wiring and the message loop.
//!
//! Bootstrap order matters: the admin grant lands first so permission
//! administration is usable from the start, then the built-in `base` module
//! is indexed, loaded, and enabled on its own, and only then does discovery
//! index the module packages on disk for a second load pass. Base is always
//! up before any discovered module runs its enable hook.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use sable_command::CommandHandler;
use sable_module::{LoadReport, ModuleContext, ModuleHandler};
use sable_permission::{HolderRef, PermissionHandler, PermissionStore};
use sable_types::{BotConfig, MessageEvent, SableError};

use crate::base::{base_description, BaseModule};
use crate::gateway::Gateway;

/// A fully wired bot host.
///
/// Owns the gateway and the three handlers. Each inbound message is handled
/// on its own task, so one slow command never stalls the intake loop.
pub struct Host {
    config: Arc<BotConfig>,
    gateway: Arc<dyn Gateway>,
    commands: Arc<CommandHandler>,
    permissions: Arc<PermissionHandler>,
    modules: Arc<ModuleHandler>,
}

impl Host {
    /// Wire a host from its three pluggable pieces: configuration, the
    /// permission store, and the gateway.
    pub fn new(
        config: BotConfig,
        store: Arc<dyn PermissionStore>,
        gateway: Arc<dyn Gateway>,
    ) -> Arc<Self> {
        let config = Arc::new(config);
        let permissions = Arc::new(PermissionHandler::new(store));
        let commands = Arc::new(CommandHandler::new(
            config.command_prefix.clone(),
            permissions.clone(),
        ));
        let modules = Arc::new(ModuleHandler::new(ModuleContext {
            config: config.clone(),
            commands: commands.clone(),
            permissions: permissions.clone(),
        }));

        // The base module holds a weak handle back to the module handler so
        // help can list modules without an ownership cycle.
        let weak = Arc::downgrade(&modules);
        modules.register_factory(
            "base",
            Box::new(move |_d| Ok(Box::new(BaseModule::new(weak.clone())))),
        );

        Arc::new(Self {
            config,
            gateway,
            commands,
            permissions,
            modules,
        })
    }

    /// Index the built-in module, discover packages, and load everything.
    pub async fn bootstrap(&self) -> Result<LoadReport, SableError> {
        if let Some(admin) = &self.config.admin_user {
            self.permissions
                .grant(&HolderRef::user(admin.clone()), "permissions.*")
                .await?;
            info!(user = %admin, "granted permission administration to the configured admin");
        }

        // Base enables before any discovered package, regardless of how the
        // packages sort by name.
        self.modules.index_description(base_description())?;
        let mut report = self.modules.load_all();

        let discovered = self.modules.discover(&self.config.modules_dir);
        info!(count = discovered.len(), "discovered module packages");

        let packages = self.modules.load_all();
        report.loaded.extend(packages.loaded);
        report.enabled.extend(packages.enabled);
        report.errors.extend(packages.errors);
        for (module, error) in &report.errors {
            warn!(module = %module, error = %error, "module failed during bootstrap");
        }
        info!(
            loaded = report.loaded.len(),
            enabled = report.enabled.len(),
            failed = report.errors.len(),
            "bootstrap complete"
        );
        Ok(report)
    }

    /// Consume the gateway until it shuts down, dispatching each message on
    /// its own task.
    pub async fn run(self: Arc<Self>) {
        info!(prefix = %self.config.command_prefix, "host running");
        while let Some(message) = self.gateway.next_message().await {
            let host = self.clone();
            tokio::spawn(async move {
                host.handle_message(message).await;
            });
        }
        info!("gateway closed, shutting down");
    }

    /// Dispatch one message and deliver the resulting alert, scheduling
    /// deletion of the exchange when configured.
    pub async fn handle_message(&self, message: MessageEvent) {
        let Some(alert) = self.commands.on_message(&message).await else {
            return;
        };

        match self.gateway.send_alert(&message.channel, &alert).await {
            Ok(response_id) => {
                if let Some(seconds) = self.config.delete_after_seconds {
                    self.schedule_deletion(message, response_id, seconds);
                }
            }
            Err(e) => error!(channel = %message.channel, error = %e, "failed to deliver alert"),
        }
    }

    /// Delete the triggering message and the response after a delay. Deletion
    /// failures are expected (either message may already be gone) and only
    /// logged.
    fn schedule_deletion(&self, message: MessageEvent, response_id: String, seconds: u64) {
        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            for id in [message.id.as_str(), response_id.as_str()] {
                if let Err(e) = gateway.delete_message(&message.channel, id).await {
                    debug!(message = %id, error = %e, "scheduled deletion failed");
                }
            }
        });
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn commands(&self) -> &Arc<CommandHandler> {
        &self.commands
    }

    pub fn permissions(&self) -> &Arc<PermissionHandler> {
        &self.permissions
    }

    pub fn modules(&self) -> &Arc<ModuleHandler> {
        &self.modules
    }
}
