//! JSON-file persistence for permission entities.
//!
//! One file per holder, under `<root>/users`, `<root>/roles`, and
//! `<root>/groups`. Saves write to a temporary file and rename it into place,
//! so a crash mid-write never leaves a truncated record behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use sable_permission::{Group, PermissionStore, Role, User};
use sable_types::SableError;

/// A [`PermissionStore`] backed by a directory of JSON files.
pub struct JsonFileStore {
    users: PathBuf,
    roles: PathBuf,
    groups: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SableError> {
        let root = root.into();
        let store = Self {
            users: root.join("users"),
            roles: root.join("roles"),
            groups: root.join("groups"),
        };
        for dir in [&store.users, &store.roles, &store.groups] {
            std::fs::create_dir_all(dir).map_err(|e| {
                SableError::Persistence(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        Ok(store)
    }

    fn record_path(dir: &Path, id: &str) -> Result<PathBuf, SableError> {
        // Ids become filenames, so restrict them to a safe charset.
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(SableError::Persistence(format!(
                "holder id is not storable as a filename: {id:?}"
            )));
        }
        Ok(dir.join(format!("{id}.json")))
    }

    async fn load<T: DeserializeOwned>(dir: &Path, id: &str) -> Result<Option<T>, SableError> {
        let path = Self::record_path(dir, id)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SableError::Persistence(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        let record = serde_json::from_str(&raw).map_err(|e| {
            SableError::Persistence(format!("malformed record {}: {e}", path.display()))
        })?;
        Ok(Some(record))
    }

    async fn save<T: Serialize>(dir: &Path, id: &str, record: &T) -> Result<(), SableError> {
        let path = Self::record_path(dir, id)?;
        let raw = serde_json::to_vec_pretty(record)
            .map_err(|e| SableError::Persistence(format!("cannot serialize {id}: {e}")))?;

        let tmp = dir.join(format!("{id}.json.tmp"));
        tokio::fs::write(&tmp, &raw).await.map_err(|e| {
            SableError::Persistence(format!("cannot write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            SableError::Persistence(format!("cannot rename into {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl PermissionStore for JsonFileStore {
    async fn load_user(&self, id: &str) -> Result<Option<User>, SableError> {
        Self::load(&self.users, id).await
    }

    async fn save_user(&self, user: &User) -> Result<(), SableError> {
        Self::save(&self.users, &user.id, user).await
    }

    async fn load_role(&self, id: &str) -> Result<Option<Role>, SableError> {
        Self::load(&self.roles, id).await
    }

    async fn save_role(&self, role: &Role) -> Result<(), SableError> {
        Self::save(&self.roles, &role.id, role).await
    }

    async fn load_group(&self, id: &str) -> Result<Option<Group>, SableError> {
        Self::load(&self.groups, id).await
    }

    async fn save_group(&self, group: &Group) -> Result<(), SableError> {
        Self::save(&self.groups, &group.id, group).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn round_trips_each_entity_kind() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path()).unwrap();

        let mut user = User::new("alice");
        user.permissions.grant("tags.use");
        user.roles.push("mods".into());
        store.save_user(&user).await.unwrap();
        assert_eq!(store.load_user("alice").await.unwrap().unwrap(), user);

        let mut role = Role::new("mods");
        role.parent = Some("staff".into());
        store.save_role(&role).await.unwrap();
        assert_eq!(store.load_role("mods").await.unwrap().unwrap(), role);

        let group = Group::new("staff");
        store.save_group(&group).await.unwrap();
        assert_eq!(store.load_group("staff").await.unwrap().unwrap(), group);
    }

    #[tokio::test]
    async fn absent_record_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path()).unwrap();
        assert!(store.load_user("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_survives_reopening_the_store() {
        let tmp = TempDir::new().unwrap();
        {
            let store = JsonFileStore::new(tmp.path()).unwrap();
            store.save_user(&User::new("bob")).await.unwrap();
        }
        let reopened = JsonFileStore::new(tmp.path()).unwrap();
        assert!(reopened.load_user("bob").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupt_record_is_a_persistence_error() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path()).unwrap();
        std::fs::write(tmp.path().join("users/evil.json"), "not json [[[").unwrap();

        let err = store.load_user("evil").await.unwrap_err();
        assert!(matches!(err, SableError::Persistence(_)));
    }

    #[tokio::test]
    async fn unsafe_ids_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path()).unwrap();
        for id in ["", "../escape", "a/b", "dot.dot"] {
            assert!(
                store.load_user(id).await.is_err(),
                "id {id:?} should be rejected"
            );
        }
    }
}
