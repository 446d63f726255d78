//! Permission entries and per-level resolution.
//!
//! An entry pairs a node path with an allow/deny state. Matching is by exact
//! path or by a trailing `*` wildcard covering the prefix node and everything
//! beneath it. Within one level (one holder's entry list) the most specific
//! match wins, and a deny beats an allow at equal specificity.

use serde::{Deserialize, Serialize};

use sable_types::SableError;

/// Validate a permission node path.
///
/// Nodes are dot-delimited, lowercase segments of `[a-z0-9_-]`. A `*` is only
/// valid as a complete, final segment.
pub fn validate_node(node: &str) -> Result<(), SableError> {
    if node.is_empty() {
        return Err(SableError::InvalidNode(node.into()));
    }
    let segments: Vec<&str> = node.split('.').collect();
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(SableError::InvalidNode(node.into()));
        }
        if *segment == "*" {
            if i != last {
                return Err(SableError::InvalidNode(node.into()));
            }
            continue;
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(SableError::InvalidNode(node.into()));
        }
    }
    Ok(())
}

/// A single permission entry: a node path and an allow/deny state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    /// Dot-delimited node path, possibly ending in `*`.
    pub node: String,
    /// `true` grants the node, `false` explicitly denies it.
    pub allowed: bool,
}

impl PermissionEntry {
    /// Match this entry against a queried node.
    ///
    /// Returns a specificity rank when the entry applies: ranks order matches
    /// so that longer paths beat shorter ones and an exact match beats a
    /// wildcard rooted at the same depth. `None` means the entry does not
    /// cover the node.
    pub fn matches(&self, node: &str) -> Option<u32> {
        if self.node == node {
            return Some(segment_count(&self.node) * 2 + 1);
        }
        let prefix = match self.node.strip_suffix('*') {
            Some("") => "", // bare "*" covers everything
            Some(p) => p.strip_suffix('.')?,
            None => return None,
        };
        if prefix.is_empty() || node == prefix || node.starts_with(&format!("{prefix}.")) {
            return Some(segment_count(prefix) * 2);
        }
        None
    }
}

fn segment_count(node: &str) -> u32 {
    if node.is_empty() {
        0
    } else {
        node.split('.').count() as u32
    }
}

/// An ordered list of permission entries owned by one holder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    entries: Vec<PermissionEntry>,
}

impl PermissionSet {
    /// Add an allow entry for `node`, replacing any existing entry for it.
    pub fn grant(&mut self, node: &str) {
        self.put(node, true);
    }

    /// Add an explicit deny entry for `node`, replacing any existing entry.
    pub fn deny(&mut self, node: &str) {
        self.put(node, false);
    }

    /// Remove any entry for `node`. Returns whether one was removed.
    pub fn revoke(&mut self, node: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.node != node);
        self.entries.len() != before
    }

    fn put(&mut self, node: &str, allowed: bool) {
        self.entries.retain(|e| e.node != node);
        self.entries.push(PermissionEntry {
            node: node.to_string(),
            allowed,
        });
    }

    /// Resolve `node` against this level's entries.
    ///
    /// Returns `Some(allowed)` when any entry matches: the most specific match
    /// decides, and a deny wins over an allow at equal specificity. `None`
    /// means this level has no opinion and resolution falls through to the
    /// next level in the inheritance chain.
    pub fn resolve(&self, node: &str) -> Option<bool> {
        let mut best: Option<(u32, bool)> = None;
        for entry in &self.entries {
            let Some(rank) = entry.matches(node) else {
                continue;
            };
            best = match best {
                None => Some((rank, entry.allowed)),
                Some((b, _)) if rank > b => Some((rank, entry.allowed)),
                Some((b, allowed)) if rank == b => Some((b, allowed && entry.allowed)),
                keep => keep,
            };
        }
        best.map(|(_, allowed)| allowed)
    }

    /// All entries, in insertion order.
    pub fn entries(&self) -> &[PermissionEntry] {
        &self.entries
    }

    /// Whether this set has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_plain_and_wildcard_nodes() {
        validate_node("module").unwrap();
        validate_node("module.command.action").unwrap();
        validate_node("module.*").unwrap();
        validate_node("*").unwrap();
        validate_node("mod-ule.sub_cmd2").unwrap();
    }

    #[test]
    fn validate_rejects_bad_nodes() {
        for node in ["", ".", "a..b", "Module.cmd", "a.*.b", "a.b ", "a b"] {
            assert!(
                validate_node(node).is_err(),
                "node {node:?} should be rejected"
            );
        }
    }

    #[test]
    fn exact_match_outranks_wildcard_at_same_depth() {
        let exact = PermissionEntry {
            node: "module.cmd".into(),
            allowed: true,
        };
        let wild = PermissionEntry {
            node: "module.*".into(),
            allowed: true,
        };
        let e = exact.matches("module.cmd").unwrap();
        let w = wild.matches("module.cmd").unwrap();
        assert!(e > w, "exact rank {e} should beat wildcard rank {w}");
    }

    #[test]
    fn wildcard_covers_node_and_descendants() {
        let entry = PermissionEntry {
            node: "module.*".into(),
            allowed: true,
        };
        assert!(entry.matches("module").is_some());
        assert!(entry.matches("module.cmd").is_some());
        assert!(entry.matches("module.cmd.action").is_some());
        assert!(entry.matches("other").is_none());
        assert!(entry.matches("modulex").is_none());
    }

    #[test]
    fn bare_star_covers_everything() {
        let entry = PermissionEntry {
            node: "*".into(),
            allowed: true,
        };
        assert!(entry.matches("anything").is_some());
        assert!(entry.matches("a.b.c").is_some());
    }

    #[test]
    fn resolve_prefers_specific_deny_over_wildcard_allow() {
        let mut set = PermissionSet::default();
        set.grant("module.*");
        set.deny("module.cmd");

        assert_eq!(set.resolve("module.cmd"), Some(false));
        assert_eq!(set.resolve("module.other"), Some(true));
        assert_eq!(set.resolve("unrelated"), None);
    }

    #[test]
    fn resolve_deny_wins_at_equal_specificity() {
        let mut set = PermissionSet::default();
        set.grant("module.cmd");
        // Re-adding replaces, so force the tie through two wildcard entries
        // rooted at the same depth.
        set.grant("module.*");
        set.deny("other.*");
        assert_eq!(set.resolve("module.cmd"), Some(true));

        let tie = PermissionSet {
            entries: vec![
                PermissionEntry {
                    node: "module.cmd".into(),
                    allowed: true,
                },
                PermissionEntry {
                    node: "module.cmd".into(),
                    allowed: false,
                },
            ],
        };
        assert_eq!(tie.resolve("module.cmd"), Some(false));
    }

    #[test]
    fn grant_then_revoke_restores_prior_state() {
        let mut set = PermissionSet::default();
        let before = set.clone();
        set.grant("module.cmd");
        assert_eq!(set.resolve("module.cmd"), Some(true));
        assert!(set.revoke("module.cmd"));
        assert_eq!(set, before);
        assert_eq!(set.resolve("module.cmd"), None);
    }

    #[test]
    fn grant_replaces_existing_deny() {
        let mut set = PermissionSet::default();
        set.deny("module.cmd");
        set.grant("module.cmd");
        assert_eq!(set.resolve("module.cmd"), Some(true));
        assert_eq!(set.entries().len(), 1);
    }
}
