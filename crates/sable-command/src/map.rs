//! The flat root-command index.
//!
//! Two mappings share every registered root: `labels` (name -> command) and
//! `aliases` (alias -> command), so lookup by either is O(1) and resolves to
//! the same instance. Root names are unique; a colliding alias is taken over
//! by the last registration, which is logged rather than silent.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use sable_types::SableError;

use crate::command::Command;

/// Flat index mapping every root-command name and alias to its command.
#[derive(Debug, Default)]
pub struct CommandMap {
    labels: HashMap<String, Arc<Command>>,
    aliases: HashMap<String, Arc<Command>>,
    /// label -> owning module name, for per-module unregistration.
    owners: HashMap<String, String>,
}

impl CommandMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a root command on behalf of a module.
    ///
    /// The command's whole sub-tree is validated first. Duplicate root names
    /// are rejected; an alias colliding with an existing alias is re-pointed
    /// at the new command (last registration wins).
    pub fn register(&mut self, module: &str, command: Command) -> Result<Arc<Command>, SableError> {
        command.validate()?;

        let label = command.name().to_lowercase();
        if self.labels.contains_key(&label) {
            return Err(SableError::InvalidCommand(format!(
                "command '{label}' is already registered"
            )));
        }

        let command = Arc::new(command);
        self.labels.insert(label.clone(), command.clone());
        self.owners.insert(label, module.to_string());

        for alias in command.aliases() {
            let alias = alias.to_lowercase();
            if self.aliases.insert(alias.clone(), command.clone()).is_some() {
                warn!(alias = %alias, command = %command.name(), "alias re-registered, last wins");
            }
        }
        Ok(command)
    }

    /// Look up a root command by name or alias, case-insensitively.
    /// Names shadow aliases.
    pub fn get(&self, identifier: &str) -> Option<Arc<Command>> {
        let id = identifier.to_lowercase();
        self.labels
            .get(&id)
            .or_else(|| self.aliases.get(&id))
            .cloned()
    }

    /// Root commands registered by one module, sorted by name.
    pub fn commands_of(&self, module: &str) -> Vec<Arc<Command>> {
        let mut commands: Vec<Arc<Command>> = self
            .owners
            .iter()
            .filter(|(_, owner)| owner.as_str() == module)
            .filter_map(|(label, _)| self.labels.get(label).cloned())
            .collect();
        commands.sort_by(|a, b| a.name().cmp(b.name()));
        commands
    }

    /// All root commands, sorted by name.
    pub fn roots(&self) -> Vec<Arc<Command>> {
        let mut commands: Vec<Arc<Command>> = self.labels.values().cloned().collect();
        commands.sort_by(|a, b| a.name().cmp(b.name()));
        commands
    }

    /// Remove one root command by name, along with its owner entry and any
    /// aliases still pointing at it. Returns the removed command.
    pub fn remove(&mut self, name: &str) -> Option<Arc<Command>> {
        let label = name.to_lowercase();
        let command = self.labels.remove(&label)?;
        self.owners.remove(&label);
        self.aliases.retain(|_, target| !Arc::ptr_eq(&command, target));
        Some(command)
    }

    /// Remove every command a module registered, including aliases that still
    /// point at those commands. Returns how many roots were removed.
    pub fn unregister_module(&mut self, module: &str) -> usize {
        let labels: Vec<String> = self
            .owners
            .iter()
            .filter(|(_, owner)| owner.as_str() == module)
            .map(|(label, _)| label.clone())
            .collect();

        let mut removed = Vec::new();
        for label in &labels {
            if let Some(command) = self.labels.remove(label) {
                removed.push(command);
            }
            self.owners.remove(label);
        }
        self.aliases
            .retain(|_, target| !removed.iter().any(|c| Arc::ptr_eq(c, target)));
        removed.len()
    }

    /// Number of registered root commands.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_alias_resolves_to_the_same_instance() {
        let mut map = CommandMap::new();
        map.register(
            "base",
            Command::new("teleport", "t").alias("tp").alias("warp"),
        )
        .unwrap();

        let by_name = map.get("teleport").unwrap();
        for alias in ["tp", "warp", "TP", "Teleport"] {
            let resolved = map.get(alias).unwrap();
            assert!(
                Arc::ptr_eq(&by_name, &resolved),
                "alias {alias} must resolve to the same instance"
            );
        }
        assert!(map.get("unknown").is_none());
    }

    #[test]
    fn duplicate_root_name_rejected() {
        let mut map = CommandMap::new();
        map.register("a", Command::new("ping", "p")).unwrap();
        let err = map.register("b", Command::new("ping", "p")).unwrap_err();
        assert!(
            err.to_string().contains("already registered"),
            "expected duplicate error, got: {err}"
        );
    }

    #[test]
    fn colliding_alias_last_registration_wins() {
        let mut map = CommandMap::new();
        map.register("a", Command::new("first", "f").alias("x")).unwrap();
        map.register("b", Command::new("second", "s").alias("x")).unwrap();

        let resolved = map.get("x").unwrap();
        assert_eq!(resolved.name(), "second");
    }

    #[test]
    fn unregister_module_removes_labels_and_aliases() {
        let mut map = CommandMap::new();
        map.register("mod-a", Command::new("one", "1").alias("o")).unwrap();
        map.register("mod-a", Command::new("two", "2")).unwrap();
        map.register("mod-b", Command::new("three", "3")).unwrap();

        assert_eq!(map.unregister_module("mod-a"), 2);
        assert!(map.get("one").is_none());
        assert!(map.get("o").is_none());
        assert!(map.get("two").is_none());
        assert!(map.get("three").is_some());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn remove_drops_one_root_and_its_aliases() {
        let mut map = CommandMap::new();
        map.register("m", Command::new("one", "1").alias("o")).unwrap();
        map.register("m", Command::new("two", "2")).unwrap();

        let removed = map.remove("ONE").unwrap();
        assert_eq!(removed.name(), "one");
        assert!(map.get("one").is_none());
        assert!(map.get("o").is_none());
        assert!(map.get("two").is_some());
        assert!(map.remove("one").is_none());
    }

    #[test]
    fn commands_of_lists_sorted() {
        let mut map = CommandMap::new();
        map.register("m", Command::new("zebra", "z")).unwrap();
        map.register("m", Command::new("apple", "a")).unwrap();
        map.register("other", Command::new("middle", "m")).unwrap();

        let commands = map.commands_of("m");
        let names: Vec<&str> = commands.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["apple", "zebra"]);
    }
}
