//! Permission holders: users, roles, and groups.
//!
//! Each holder owns a [`PermissionSet`]. Users may reference roles (in
//! assignment order) and at most one group; roles and groups may reference a
//! parent group. Parent references are plain ids resolved through the
//! handler's cache, never owned links.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entry::PermissionSet;

/// A user: the actor most command dispatches resolve permissions for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub permissions: PermissionSet,
    /// Assigned role ids, in assignment order.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Optional group membership.
    #[serde(default)]
    pub group: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// A role: a reusable bag of permissions assignable to users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    #[serde(default)]
    pub permissions: PermissionSet,
    /// Optional parent group id.
    #[serde(default)]
    pub parent: Option<String>,
}

impl Role {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// A group: the outermost layer of the inheritance chain. Groups may nest
/// through `parent`, forming a chain walked to its root during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub permissions: PermissionSet,
    /// Optional parent group id.
    #[serde(default)]
    pub parent: Option<String>,
}

impl Group {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// A reference to any permission holder, used for resolution and mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HolderRef {
    User(String),
    Role(String),
    Group(String),
}

impl HolderRef {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    pub fn role(id: impl Into<String>) -> Self {
        Self::Role(id.into())
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::Group(id.into())
    }

    /// The holder's stable identifier.
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Role(id) | Self::Group(id) => id,
        }
    }
}

impl fmt::Display for HolderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Role(id) => write!(f, "role:{id}"),
            Self::Group(id) => write!(f, "group:{id}"),
        }
    }
}
