//! Effective-permission resolution and mutation.
//!
//! [`PermissionHandler`] owns an in-memory cache of holders (the single
//! source of truth during a session) backed by a [`PermissionStore`].
//! Resolution walks the actor's inheritance chain outward: the actor's own
//! entries, then each assigned role in assignment order, then the group
//! parent chain to its root. The first level with any matching entry decides;
//! no match anywhere is a deny.
//!
//! Cache hits only take the read lock, so resolution for one actor never
//! waits on another holder's persistence I/O. Mutations are serialized per
//! holder and persist before touching the cache, so a failed save never
//! leaves the two inconsistent.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use sable_types::SableError;

use crate::entry::{validate_node, PermissionSet};
use crate::holder::{Group, HolderRef, Role, User};
use crate::store::PermissionStore;

#[derive(Default)]
struct Cache {
    users: HashMap<String, User>,
    roles: HashMap<String, Role>,
    groups: HashMap<String, Group>,
}

enum Mutation<'a> {
    Grant(&'a str),
    Deny(&'a str),
    Revoke(&'a str),
}

impl Mutation<'_> {
    fn apply(&self, set: &mut PermissionSet) {
        match self {
            Mutation::Grant(node) => set.grant(node),
            Mutation::Deny(node) => set.deny(node),
            Mutation::Revoke(node) => {
                set.revoke(node);
            }
        }
    }
}

/// Computes effective allow/deny decisions and applies permission mutations.
pub struct PermissionHandler {
    store: Arc<dyn PermissionStore>,
    cache: RwLock<Cache>,
    /// One lock per holder, keyed by the holder's display form. Serializes
    /// read-modify-persist for that holder without stalling anyone else.
    holder_locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PermissionHandler {
    /// Create a handler over a persistence adapter with an empty cache.
    /// Holders are loaded through the cache on first use.
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(Cache::default()),
            holder_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the effective decision for `actor` on `node`.
    ///
    /// Default is deny: an actor with no record, or no matching entry at any
    /// level, is not permitted.
    pub async fn has_permission(
        &self,
        actor: &HolderRef,
        node: &str,
    ) -> Result<bool, SableError> {
        validate_node(node)?;

        let mut levels: Vec<PermissionSet> = Vec::new();
        let mut chain_seeds: Vec<String> = Vec::new();

        match actor {
            HolderRef::User(id) => {
                let Some(user) = self.cached_user(id).await? else {
                    return Ok(false);
                };
                levels.push(user.permissions.clone());
                for role_id in &user.roles {
                    match self.cached_role(role_id).await? {
                        Some(role) => {
                            levels.push(role.permissions.clone());
                            if user.group.is_none() {
                                if let Some(parent) = &role.parent {
                                    chain_seeds.push(parent.clone());
                                }
                            }
                        }
                        None => warn!(user = %id, role = %role_id, "assigned role not found"),
                    }
                }
                if let Some(group) = &user.group {
                    chain_seeds.clear();
                    chain_seeds.push(group.clone());
                }
            }
            HolderRef::Role(id) => {
                let Some(role) = self.cached_role(id).await? else {
                    return Ok(false);
                };
                levels.push(role.permissions.clone());
                if let Some(parent) = &role.parent {
                    chain_seeds.push(parent.clone());
                }
            }
            HolderRef::Group(id) => {
                chain_seeds.push(id.clone());
            }
        }

        // Walk group parent chains outward. A visited set keeps a malformed
        // parent cycle from looping.
        let mut visited: HashSet<String> = HashSet::new();
        for seed in chain_seeds {
            let mut next = Some(seed);
            while let Some(group_id) = next.take() {
                if !visited.insert(group_id.clone()) {
                    warn!(group = %group_id, "group parent chain contains a cycle");
                    break;
                }
                match self.cached_group(&group_id).await? {
                    Some(group) => {
                        levels.push(group.permissions.clone());
                        next = group.parent.clone();
                    }
                    None => warn!(group = %group_id, "referenced group not found"),
                }
            }
        }

        for level in &levels {
            if let Some(allowed) = level.resolve(node) {
                return Ok(allowed);
            }
        }
        Ok(false)
    }

    /// Grant `node` to a holder, creating the holder record on first grant.
    pub async fn grant(&self, holder: &HolderRef, node: &str) -> Result<(), SableError> {
        self.mutate(holder, Mutation::Grant(node)).await
    }

    /// Add an explicit deny entry for `node` on a holder.
    pub async fn deny(&self, holder: &HolderRef, node: &str) -> Result<(), SableError> {
        self.mutate(holder, Mutation::Deny(node)).await
    }

    /// Remove any entry for `node` from a holder.
    pub async fn revoke(&self, holder: &HolderRef, node: &str) -> Result<(), SableError> {
        self.mutate(holder, Mutation::Revoke(node)).await
    }

    async fn mutate(&self, holder: &HolderRef, op: Mutation<'_>) -> Result<(), SableError> {
        let node = match &op {
            Mutation::Grant(n) | Mutation::Deny(n) | Mutation::Revoke(n) => *n,
        };
        validate_node(node)?;

        match holder {
            HolderRef::User(id) => {
                self.update_user(id, |user| op.apply(&mut user.permissions)).await
            }
            HolderRef::Role(id) => {
                self.update_role(id, |role| op.apply(&mut role.permissions)).await
            }
            HolderRef::Group(id) => {
                self.update_group(id, |group| op.apply(&mut group.permissions)).await
            }
        }
    }

    /// Assign a role to a user, appending to the user's assignment order.
    pub async fn assign_role(&self, user_id: &str, role_id: &str) -> Result<(), SableError> {
        self.update_user(user_id, |user| {
            if !user.roles.iter().any(|r| r == role_id) {
                user.roles.push(role_id.to_string());
            }
        })
        .await
    }

    /// Set or clear a user's group membership.
    pub async fn set_user_group(
        &self,
        user_id: &str,
        group_id: Option<&str>,
    ) -> Result<(), SableError> {
        self.update_user(user_id, |user| user.group = group_id.map(String::from))
            .await
    }

    /// Set or clear a role's parent group.
    pub async fn set_role_parent(
        &self,
        role_id: &str,
        group_id: Option<&str>,
    ) -> Result<(), SableError> {
        self.update_role(role_id, |role| role.parent = group_id.map(String::from))
            .await
    }

    /// Set or clear a group's parent group.
    pub async fn set_group_parent(
        &self,
        group_id: &str,
        parent_id: Option<&str>,
    ) -> Result<(), SableError> {
        self.update_group(group_id, |group| group.parent = parent_id.map(String::from))
            .await
    }

    /// Snapshot of a user record, loading through the cache.
    pub async fn user(&self, id: &str) -> Result<Option<User>, SableError> {
        self.cached_user(id).await
    }

    /// Snapshot of a role record, loading through the cache.
    pub async fn role(&self, id: &str) -> Result<Option<Role>, SableError> {
        self.cached_role(id).await
    }

    /// Snapshot of a group record, loading through the cache.
    pub async fn group(&self, id: &str) -> Result<Option<Group>, SableError> {
        self.cached_group(id).await
    }

    fn holder_lock(&self, key: String) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.holder_locks.lock();
        locks.entry(key).or_default().clone()
    }

    /// Read-modify-persist one user record: clone the current record, apply
    /// the change, save, and only then install into the cache. The per-holder
    /// lock serializes concurrent updates of the same user; the cache write
    /// lock is held only for the final insert.
    async fn update_user(
        &self,
        id: &str,
        apply: impl FnOnce(&mut User),
    ) -> Result<(), SableError> {
        let lock = self.holder_lock(HolderRef::user(id).to_string());
        let _guard = lock.lock().await;

        let mut user = self
            .cached_user(id)
            .await?
            .unwrap_or_else(|| User::new(id));
        apply(&mut user);
        self.store.save_user(&user).await?;
        self.cache.write().await.users.insert(id.to_string(), user);
        Ok(())
    }

    async fn update_role(
        &self,
        id: &str,
        apply: impl FnOnce(&mut Role),
    ) -> Result<(), SableError> {
        let lock = self.holder_lock(HolderRef::role(id).to_string());
        let _guard = lock.lock().await;

        let mut role = self
            .cached_role(id)
            .await?
            .unwrap_or_else(|| Role::new(id));
        apply(&mut role);
        self.store.save_role(&role).await?;
        self.cache.write().await.roles.insert(id.to_string(), role);
        Ok(())
    }

    async fn update_group(
        &self,
        id: &str,
        apply: impl FnOnce(&mut Group),
    ) -> Result<(), SableError> {
        let lock = self.holder_lock(HolderRef::group(id).to_string());
        let _guard = lock.lock().await;

        let mut group = self
            .cached_group(id)
            .await?
            .unwrap_or_else(|| Group::new(id));
        apply(&mut group);
        self.store.save_group(&group).await?;
        self.cache.write().await.groups.insert(id.to_string(), group);
        Ok(())
    }

    /// Load a user through the cache. A hit holds only the read lock; a miss
    /// loads from the store with no lock held, then installs under the write
    /// lock without clobbering a record a concurrent mutation put there.
    async fn cached_user(&self, id: &str) -> Result<Option<User>, SableError> {
        if let Some(user) = self.cache.read().await.users.get(id) {
            return Ok(Some(user.clone()));
        }
        match self.store.load_user(id).await? {
            Some(user) => {
                let mut cache = self.cache.write().await;
                Ok(Some(cache.users.entry(id.to_string()).or_insert(user).clone()))
            }
            None => Ok(None),
        }
    }

    async fn cached_role(&self, id: &str) -> Result<Option<Role>, SableError> {
        if let Some(role) = self.cache.read().await.roles.get(id) {
            return Ok(Some(role.clone()));
        }
        match self.store.load_role(id).await? {
            Some(role) => {
                let mut cache = self.cache.write().await;
                Ok(Some(cache.roles.entry(id.to_string()).or_insert(role).clone()))
            }
            None => Ok(None),
        }
    }

    async fn cached_group(&self, id: &str) -> Result<Option<Group>, SableError> {
        if let Some(group) = self.cache.read().await.groups.get(id) {
            return Ok(Some(group.clone()));
        }
        match self.store.load_group(id).await? {
            Some(group) => {
                let mut cache = self.cache.write().await;
                Ok(Some(cache.groups.entry(id.to_string()).or_insert(group).clone()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::Instant;

    fn handler() -> PermissionHandler {
        PermissionHandler::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn default_is_deny() {
        let handler = handler();
        assert!(!handler
            .has_permission(&HolderRef::user("nobody"), "module.cmd")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn grant_allows_and_revoke_restores() {
        let handler = handler();
        let actor = HolderRef::user("alice");

        handler.grant(&actor, "module.cmd").await.unwrap();
        assert!(handler.has_permission(&actor, "module.cmd").await.unwrap());

        handler.revoke(&actor, "module.cmd").await.unwrap();
        assert!(!handler.has_permission(&actor, "module.cmd").await.unwrap());
    }

    #[tokio::test]
    async fn role_level_beats_more_specific_group_entry() {
        // User has no entries, role denies module.*, group allows module.cmd.
        // The role is closer to the actor, so the deny wins even though the
        // group's match is more specific.
        let handler = handler();
        handler.deny(&HolderRef::role("mods"), "module.*").await.unwrap();
        handler
            .grant(&HolderRef::group("staff"), "module.cmd")
            .await
            .unwrap();
        handler.assign_role("alice", "mods").await.unwrap();
        handler.set_user_group("alice", Some("staff")).await.unwrap();

        assert!(!handler
            .has_permission(&HolderRef::user("alice"), "module.cmd")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn user_entry_overrides_role_deny() {
        let handler = handler();
        handler.deny(&HolderRef::role("mods"), "module.*").await.unwrap();
        handler
            .grant(&HolderRef::user("alice"), "module.cmd")
            .await
            .unwrap();
        handler.assign_role("alice", "mods").await.unwrap();

        let actor = HolderRef::user("alice");
        assert!(handler.has_permission(&actor, "module.cmd").await.unwrap());
        // The role still decides nodes the user has no entry for.
        assert!(!handler.has_permission(&actor, "module.other").await.unwrap());
    }

    #[tokio::test]
    async fn specificity_and_deny_tie_break_within_one_level() {
        let handler = handler();
        let actor = HolderRef::user("bob");
        handler.grant(&actor, "module.*").await.unwrap();
        handler.deny(&actor, "module.cmd").await.unwrap();

        assert!(!handler.has_permission(&actor, "module.cmd").await.unwrap());
        assert!(handler.has_permission(&actor, "module.other").await.unwrap());
    }

    #[tokio::test]
    async fn group_parent_chain_is_walked_to_root() {
        let handler = handler();
        handler
            .grant(&HolderRef::group("root"), "module.*")
            .await
            .unwrap();
        handler.set_group_parent("team", Some("root")).await.unwrap();
        handler.set_user_group("carol", Some("team")).await.unwrap();

        assert!(handler
            .has_permission(&HolderRef::user("carol"), "module.cmd")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn role_parent_group_used_when_user_has_no_group() {
        let handler = handler();
        handler
            .grant(&HolderRef::group("staff"), "module.cmd")
            .await
            .unwrap();
        handler.set_role_parent("mods", Some("staff")).await.unwrap();
        handler.assign_role("dave", "mods").await.unwrap();

        assert!(handler
            .has_permission(&HolderRef::user("dave"), "module.cmd")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn group_parent_cycle_terminates() {
        let handler = handler();
        handler.set_group_parent("a", Some("b")).await.unwrap();
        handler.set_group_parent("b", Some("a")).await.unwrap();
        handler.set_user_group("erin", Some("a")).await.unwrap();

        // Must terminate and fall through to default deny.
        assert!(!handler
            .has_permission(&HolderRef::user("erin"), "module.cmd")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn invalid_node_rejected() {
        let handler = handler();
        let err = handler
            .grant(&HolderRef::user("x"), "Bad.Node")
            .await
            .unwrap_err();
        assert!(matches!(err, SableError::InvalidNode(_)));
    }

    /// Store whose user saves always fail, for persist-then-apply checks.
    struct FailingStore(MemoryStore);

    #[async_trait]
    impl PermissionStore for FailingStore {
        async fn load_user(&self, id: &str) -> Result<Option<User>, SableError> {
            self.0.load_user(id).await
        }
        async fn save_user(&self, _user: &User) -> Result<(), SableError> {
            Err(SableError::Persistence("disk on fire".into()))
        }
        async fn load_role(&self, id: &str) -> Result<Option<Role>, SableError> {
            self.0.load_role(id).await
        }
        async fn save_role(&self, role: &Role) -> Result<(), SableError> {
            self.0.save_role(role).await
        }
        async fn load_group(&self, id: &str) -> Result<Option<Group>, SableError> {
            self.0.load_group(id).await
        }
        async fn save_group(&self, group: &Group) -> Result<(), SableError> {
            self.0.save_group(group).await
        }
    }

    #[tokio::test]
    async fn failed_persist_leaves_cache_unchanged() {
        let handler = PermissionHandler::new(Arc::new(FailingStore(MemoryStore::new())));
        let actor = HolderRef::user("frank");

        let err = handler.grant(&actor, "module.cmd").await.unwrap_err();
        assert!(matches!(err, SableError::Persistence(_)));

        // The grant never reached the cache.
        assert!(!handler.has_permission(&actor, "module.cmd").await.unwrap());
        assert!(handler.user("frank").await.unwrap().is_none());
    }

    /// Store whose user saves stall, to observe what blocks behind them.
    struct SlowStore(MemoryStore);

    #[async_trait]
    impl PermissionStore for SlowStore {
        async fn load_user(&self, id: &str) -> Result<Option<User>, SableError> {
            self.0.load_user(id).await
        }
        async fn save_user(&self, user: &User) -> Result<(), SableError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            self.0.save_user(user).await
        }
        async fn load_role(&self, id: &str) -> Result<Option<Role>, SableError> {
            self.0.load_role(id).await
        }
        async fn save_role(&self, role: &Role) -> Result<(), SableError> {
            self.0.save_role(role).await
        }
        async fn load_group(&self, id: &str) -> Result<Option<Group>, SableError> {
            self.0.load_group(id).await
        }
        async fn save_group(&self, group: &Group) -> Result<(), SableError> {
            self.0.save_group(group).await
        }
    }

    #[tokio::test]
    async fn cache_hit_check_does_not_wait_on_unrelated_save() {
        let handler = Arc::new(PermissionHandler::new(Arc::new(SlowStore(MemoryStore::new()))));
        // Warm bob into the cache.
        handler
            .grant(&HolderRef::user("bob"), "module.cmd")
            .await
            .unwrap();

        // Start a grant for alice; its save stalls in the store.
        let background = handler.clone();
        let in_flight = tokio::spawn(async move {
            background
                .grant(&HolderRef::user("alice"), "module.cmd")
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Bob's cache-hit check must resolve while alice's save is still
        // in flight.
        let start = Instant::now();
        assert!(handler
            .has_permission(&HolderRef::user("bob"), "module.cmd")
            .await
            .unwrap());
        assert!(
            start.elapsed() < Duration::from_millis(250),
            "cache-hit check blocked for {:?} behind an unrelated save",
            start.elapsed()
        );

        in_flight.await.unwrap().unwrap();
        assert!(handler
            .has_permission(&HolderRef::user("alice"), "module.cmd")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn concurrent_mutations_of_one_holder_both_land() {
        let handler = Arc::new(PermissionHandler::new(Arc::new(SlowStore(MemoryStore::new()))));
        let actor = HolderRef::user("grace");

        let first = {
            let handler = handler.clone();
            let actor = actor.clone();
            tokio::spawn(async move { handler.grant(&actor, "module.one").await })
        };
        let second = {
            let handler = handler.clone();
            let actor = actor.clone();
            tokio::spawn(async move { handler.grant(&actor, "module.two").await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        // Neither read-modify-persist cycle clobbered the other.
        assert!(handler.has_permission(&actor, "module.one").await.unwrap());
        assert!(handler.has_permission(&actor, "module.two").await.unwrap());
    }
}
