//! Module discovery, dependency-ordered loading, and lifecycle transitions.
//!
//! Loading walks the dependency graph depth-first with an explicit
//! in-progress stack, so a cycle of any length is reported as a
//! [`SableError::CyclicDependency`] naming the exact cycle instead of
//! exhausting the stack. Every indexing and loading failure is per-module:
//! the offending module is recorded, unloaded, and excluded from the enable
//! pass while the rest of the graph proceeds.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use sable_types::SableError;

use crate::descriptor::{
    parse_description_file, validate_description, ModuleDescription, DESCRIPTOR_FILENAME,
};
use crate::module::{Module, ModuleContext, ModuleFactory, ModuleState};

struct ModuleEntry {
    description: ModuleDescription,
    state: ModuleState,
    module: Option<Arc<dyn Module>>,
    loaded_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Registry {
    index: HashMap<String, ModuleEntry>,
    load_order: Vec<String>,
}

/// Snapshot of one module's indexed state.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub description: ModuleDescription,
    pub state: ModuleState,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Outcome of a [`ModuleHandler::load_all`] pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Modules loaded in this pass, in load order.
    pub loaded: Vec<String>,
    /// Modules enabled in this pass, in load order.
    pub enabled: Vec<String>,
    /// Per-module failures. Never fatal to the host.
    pub errors: Vec<(String, SableError)>,
}

/// Discovers module packages, loads them in dependency order, and drives the
/// enable/disable/unload lifecycle.
///
/// Module construction goes through a plugin registry of factories keyed by
/// module name; descriptors are indexed and validated before any factory
/// runs. Lifecycle transitions are serialized behind one registry lock.
pub struct ModuleHandler {
    context: ModuleContext,
    factories: Mutex<HashMap<String, ModuleFactory>>,
    registry: Mutex<Registry>,
}

impl ModuleHandler {
    pub fn new(context: ModuleContext) -> Self {
        Self {
            context,
            factories: Mutex::new(HashMap::new()),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Register the factory that constructs the module named `name`.
    pub fn register_factory(&self, name: impl Into<String>, factory: ModuleFactory) {
        self.factories.lock().insert(name.into(), factory);
    }

    /// Read and validate a module package's descriptor without running any
    /// module code, and add it to the index.
    pub fn index_module(&self, package_dir: &Path) -> Result<ModuleDescription, SableError> {
        let description = parse_description_file(&package_dir.join(DESCRIPTOR_FILENAME))?;
        self.index_description(description.clone())?;
        Ok(description)
    }

    /// Index an already-parsed descriptor (used for built-in modules).
    pub fn index_description(&self, description: ModuleDescription) -> Result<(), SableError> {
        validate_description(&description)?;
        let mut registry = self.registry.lock();
        if registry.index.contains_key(&description.name) {
            return Err(SableError::InvalidModule(format!(
                "module '{}' is already indexed",
                description.name
            )));
        }
        debug!(module = %description.name, version = %description.version, "indexed module");
        registry.index.insert(
            description.name.clone(),
            ModuleEntry {
                description,
                state: ModuleState::Indexed,
                module: None,
                loaded_at: None,
            },
        );
        Ok(())
    }

    /// Scan a directory for module packages (subdirectories containing
    /// `module.json`), sorted by name for determinism, and index each one
    /// independently. A package that fails to index is logged and skipped; it
    /// never blocks the others.
    pub fn discover(&self, modules_dir: &Path) -> Vec<String> {
        if !modules_dir.is_dir() {
            info!(path = %modules_dir.display(), "no modules directory, skipping discovery");
            return Vec::new();
        }

        let mut packages: Vec<std::path::PathBuf> = match std::fs::read_dir(modules_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir() && p.join(DESCRIPTOR_FILENAME).exists())
                .collect(),
            Err(e) => {
                warn!(path = %modules_dir.display(), error = %e, "cannot read modules directory");
                return Vec::new();
            }
        };
        packages.sort();

        let mut indexed = Vec::new();
        for package in packages {
            match self.index_module(&package) {
                Ok(description) => indexed.push(description.name),
                Err(e) => warn!(path = %package.display(), error = %e, "skipping module package"),
            }
        }
        indexed
    }

    /// Load every indexed module in dependency order, then enable the ones
    /// that loaded, in load order.
    ///
    /// The enable pass only starts after the full load pass, so a later
    /// module's load failure never prevents earlier, independent modules from
    /// being enabled. Errored modules are unloaded and excluded.
    pub fn load_all(&self) -> LoadReport {
        let mut report = LoadReport::default();

        let loaded = {
            let mut registry = self.registry.lock();
            let mut pending: Vec<String> = registry
                .index
                .iter()
                .filter(|(_, entry)| entry.state == ModuleState::Indexed)
                .map(|(name, _)| name.clone())
                .collect();
            pending.sort();

            let order_start = registry.load_order.len();
            for name in &pending {
                // A previous root's traversal may have already settled this one.
                match registry.index.get(name).map(|e| &e.state) {
                    Some(ModuleState::Indexed) => {}
                    _ => continue,
                }
                let mut stack = Vec::new();
                if let Err(e) = self.load_recursive(&mut registry, name, &mut stack) {
                    report.errors.push((name.clone(), e));
                }
            }

            // Unload every module that errored during the pass.
            let errored: Vec<String> = registry
                .index
                .iter()
                .filter(|(_, entry)| matches!(entry.state, ModuleState::Errored(_)))
                .map(|(name, _)| name.clone())
                .collect();
            for name in &errored {
                warn!(module = %name, "unloading errored module");
                registry.index.remove(name);
            }

            registry.load_order[order_start..].to_vec()
        };
        report.loaded = loaded;

        for name in report.loaded.clone() {
            match self.enable_module(&name) {
                Ok(()) => report.enabled.push(name),
                Err(e) => report.errors.push((name, e)),
            }
        }
        report
    }

    fn load_recursive(
        &self,
        registry: &mut Registry,
        name: &str,
        stack: &mut Vec<String>,
    ) -> Result<(), SableError> {
        match registry.index.get(name).map(|e| e.state.clone()) {
            None => {
                return Err(SableError::MissingDependency {
                    module: stack.last().cloned().unwrap_or_else(|| name.to_string()),
                    missing: name.to_string(),
                })
            }
            Some(ModuleState::Indexed) => {}
            Some(ModuleState::Errored(reason)) => {
                return Err(SableError::ModuleLoad {
                    module: name.to_string(),
                    reason,
                })
            }
            // Already loaded (or further along) by an earlier traversal.
            Some(_) => return Ok(()),
        }

        if let Some(pos) = stack.iter().position(|n| n == name) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(name.to_string());
            let err = SableError::CyclicDependency { cycle: cycle.clone() };
            mark_errored(registry, name, &err);
            return Err(SableError::CyclicDependency { cycle });
        }

        stack.push(name.to_string());
        let dependencies = registry
            .index
            .get(name)
            .map(|e| e.description.dependencies.clone())
            .unwrap_or_default();

        for dep in &dependencies {
            if !registry.index.contains_key(dep) {
                stack.pop();
                let err = SableError::MissingDependency {
                    module: name.to_string(),
                    missing: dep.clone(),
                };
                mark_errored(registry, name, &err);
                return Err(err);
            }
            if let Err(e) = self.load_recursive(registry, dep, stack) {
                stack.pop();
                // Keep the cycle error intact for every participant; anything
                // else surfaces to the dependent as a missing dependency.
                let err = match &e {
                    SableError::CyclicDependency { cycle }
                        if cycle.iter().any(|n| n == name) =>
                    {
                        SableError::CyclicDependency { cycle: cycle.clone() }
                    }
                    _ => SableError::MissingDependency {
                        module: name.to_string(),
                        missing: dep.clone(),
                    },
                };
                mark_errored(registry, name, &err);
                return Err(err);
            }
        }
        stack.pop();

        let description = match registry.index.get(name) {
            Some(entry) => entry.description.clone(),
            None => {
                return Err(SableError::ModuleLoad {
                    module: name.to_string(),
                    reason: "module disappeared from index during load".into(),
                })
            }
        };

        let constructed = {
            let factories = self.factories.lock();
            match factories.get(name) {
                Some(factory) => factory(&description).map_err(|e| SableError::ModuleLoad {
                    module: name.to_string(),
                    reason: e.to_string(),
                }),
                None => Err(SableError::ModuleLoad {
                    module: name.to_string(),
                    reason: "no factory registered".into(),
                }),
            }
        };

        match constructed {
            Ok(module) => {
                if let Some(entry) = registry.index.get_mut(name) {
                    entry.module = Some(Arc::from(module));
                    entry.state = ModuleState::Loaded;
                    entry.loaded_at = Some(Utc::now());
                }
                registry.load_order.push(name.to_string());
                info!(module = %name, "loaded module");
                Ok(())
            }
            Err(err) => {
                mark_errored(registry, name, &err);
                Err(err)
            }
        }
    }

    /// Run a module's enable hook and register its commands atomically.
    ///
    /// A hook or registration failure marks the module errored and removes
    /// any commands it managed to register; other modules are unaffected.
    pub fn enable_module(&self, name: &str) -> Result<(), SableError> {
        let mut registry = self.registry.lock();
        let module = {
            let entry = registry.index.get(name).ok_or_else(|| SableError::ModuleLoad {
                module: name.to_string(),
                reason: "module is not loaded".into(),
            })?;
            match entry.state {
                ModuleState::Loaded | ModuleState::Disabled => {}
                ref state => {
                    return Err(SableError::ModuleLoad {
                        module: name.to_string(),
                        reason: format!("cannot enable from state {state}"),
                    })
                }
            }
            entry.module.clone().ok_or_else(|| SableError::ModuleLoad {
                module: name.to_string(),
                reason: "module instance missing".into(),
            })?
        };

        let commands = match module.enable(&self.context) {
            Ok(commands) => commands,
            Err(e) => {
                let err = SableError::ModuleLoad {
                    module: name.to_string(),
                    reason: format!("enable hook failed: {e}"),
                };
                mark_errored(&mut registry, name, &err);
                return Err(err);
            }
        };

        if let Err(e) = self.context.commands.register_commands(name, commands) {
            self.context.commands.unregister_module(name);
            mark_errored(&mut registry, name, &e);
            return Err(e);
        }

        if let Some(entry) = registry.index.get_mut(name) {
            entry.state = ModuleState::Enabled;
        }
        info!(module = %name, "enabled module");
        Ok(())
    }

    /// Run a module's disable hook and remove its commands.
    ///
    /// The commands are removed even when the hook fails; the failure is
    /// fatal to this module only.
    pub fn disable_module(&self, name: &str) -> Result<(), SableError> {
        let mut registry = self.registry.lock();
        let module = {
            let entry = registry.index.get(name).ok_or_else(|| SableError::ModuleLoad {
                module: name.to_string(),
                reason: "module is not loaded".into(),
            })?;
            if entry.state != ModuleState::Enabled {
                return Err(SableError::ModuleLoad {
                    module: name.to_string(),
                    reason: format!("cannot disable from state {}", entry.state),
                });
            }
            entry.module.clone()
        };

        let hook_result = module.map(|m| m.disable()).unwrap_or(Ok(()));
        self.context.commands.unregister_module(name);

        match hook_result {
            Ok(()) => {
                if let Some(entry) = registry.index.get_mut(name) {
                    entry.state = ModuleState::Disabled;
                }
                info!(module = %name, "disabled module");
                Ok(())
            }
            Err(e) => {
                let err = SableError::ModuleLoad {
                    module: name.to_string(),
                    reason: format!("disable hook failed: {e}"),
                };
                mark_errored(&mut registry, name, &err);
                Err(err)
            }
        }
    }

    /// Remove a module from the index, disabling it first when enabled.
    pub fn unload_module(&self, name: &str) -> Result<(), SableError> {
        let enabled = {
            let registry = self.registry.lock();
            match registry.index.get(name) {
                None => {
                    return Err(SableError::ModuleLoad {
                        module: name.to_string(),
                        reason: "module is not loaded".into(),
                    })
                }
                Some(entry) => entry.state == ModuleState::Enabled,
            }
        };
        if enabled {
            // A failing disable hook must not keep the module resident.
            if let Err(e) = self.disable_module(name) {
                warn!(module = %name, error = %e, "disable hook failed during unload");
            }
        }

        let mut registry = self.registry.lock();
        registry.index.remove(name);
        registry.load_order.retain(|n| n != name);
        info!(module = %name, "unloaded module");
        Ok(())
    }

    /// Snapshot of one module, if indexed.
    pub fn get(&self, name: &str) -> Option<ModuleInfo> {
        let registry = self.registry.lock();
        registry.index.get(name).map(|entry| ModuleInfo {
            description: entry.description.clone(),
            state: entry.state.clone(),
            loaded_at: entry.loaded_at,
        })
    }

    /// Snapshots of every indexed module, sorted by name.
    pub fn modules(&self) -> Vec<ModuleInfo> {
        let registry = self.registry.lock();
        let mut modules: Vec<ModuleInfo> = registry
            .index
            .values()
            .map(|entry| ModuleInfo {
                description: entry.description.clone(),
                state: entry.state.clone(),
                loaded_at: entry.loaded_at,
            })
            .collect();
        modules.sort_by(|a, b| a.description.name.cmp(&b.description.name));
        modules
    }

    /// Whether a module is currently enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        matches!(
            self.get(name).map(|m| m.state),
            Some(ModuleState::Enabled)
        )
    }
}

fn mark_errored(registry: &mut Registry, name: &str, err: &SableError) {
    if let Some(entry) = registry.index.get_mut(name) {
        entry.state = ModuleState::Errored(err.to_string());
        entry.module = None;
    }
}
