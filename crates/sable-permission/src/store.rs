//! Persistence adapter for permission entities.
//!
//! The handler talks to storage only through [`PermissionStore`]: one typed
//! load/save pair per entity kind, keyed by the entity's stable id. The
//! concrete backend (document database, JSON files, memory) is outside this
//! crate's concern.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use sable_types::SableError;

use crate::holder::{Group, Role, User};

/// Typed load/save interface for permission entities.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn load_user(&self, id: &str) -> Result<Option<User>, SableError>;
    async fn save_user(&self, user: &User) -> Result<(), SableError>;

    async fn load_role(&self, id: &str) -> Result<Option<Role>, SableError>;
    async fn save_role(&self, role: &Role) -> Result<(), SableError>;

    async fn load_group(&self, id: &str) -> Result<Option<Group>, SableError>;
    async fn save_group(&self, group: &Group) -> Result<(), SableError>;
}

/// An in-memory store. The default for tests and ephemeral hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, User>>,
    roles: Mutex<HashMap<String, Role>>,
    groups: Mutex<HashMap<String, Group>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn load_user(&self, id: &str) -> Result<Option<User>, SableError> {
        Ok(self.users.lock().get(id).cloned())
    }

    async fn save_user(&self, user: &User) -> Result<(), SableError> {
        self.users.lock().insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn load_role(&self, id: &str) -> Result<Option<Role>, SableError> {
        Ok(self.roles.lock().get(id).cloned())
    }

    async fn save_role(&self, role: &Role) -> Result<(), SableError> {
        self.roles.lock().insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn load_group(&self, id: &str) -> Result<Option<Group>, SableError> {
        Ok(self.groups.lock().get(id).cloned())
    }

    async fn save_group(&self, group: &Group) -> Result<(), SableError> {
        self.groups.lock().insert(group.id.clone(), group.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_entities() {
        let store = MemoryStore::new();

        let mut user = User::new("u1");
        user.permissions.grant("module.cmd");
        store.save_user(&user).await.unwrap();

        let loaded = store.load_user("u1").await.unwrap().unwrap();
        assert_eq!(loaded, user);
        assert!(store.load_user("absent").await.unwrap().is_none());

        let role = Role::new("mods");
        store.save_role(&role).await.unwrap();
        assert_eq!(store.load_role("mods").await.unwrap().unwrap(), role);

        let group = Group::new("staff");
        store.save_group(&group).await.unwrap();
        assert_eq!(store.load_group("staff").await.unwrap().unwrap(), group);
    }
}
