//! Domain entities for the Roster users domain
//!
//! Users and groups are plain data holders with a time-ordered identity.
//! Constructors validate fields; uniqueness is enforced by the store.

use roster_common::RepositoryError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::ValidateEmail;

/// Maximum length of user names, group names and emails (column width)
pub const MAX_FIELD_LENGTH: usize = 255;

type Result<T> = std::result::Result<T, RepositoryError>;

/// User entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl User {
    /// Create a new user with a freshly generated UUIDv7 identity
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        Self::with_id(Uuid::now_v7(), name, email)
    }

    /// Build a user around an existing identity
    pub fn with_id(id: Uuid, name: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let user = User {
            id,
            name: name.into(),
            email: email.into(),
        };
        user.validate()?;
        Ok(user)
    }

    pub fn validate(&self) -> Result<()> {
        validate_name("Name", &self.name)?;

        if self.email.chars().count() > MAX_FIELD_LENGTH || !self.email.validate_email() {
            return Err(RepositoryError::InvalidData(
                "Invalid email format".to_string(),
            ));
        }

        Ok(())
    }

    /// Full replacement of the mutable fields, keeping the identity
    pub fn apply(&self, changes: UserChanges) -> Result<Self> {
        Self::with_id(
            self.id,
            changes.name.unwrap_or_else(|| self.name.clone()),
            changes.email.unwrap_or_else(|| self.email.clone()),
        )
    }
}

/// Group entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
}

impl Group {
    /// Create a new group with a freshly generated UUIDv7 identity
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::with_id(Uuid::now_v7(), name)
    }

    pub fn with_id(id: Uuid, name: impl Into<String>) -> Result<Self> {
        let group = Group {
            id,
            name: name.into(),
        };
        group.validate()?;
        Ok(group)
    }

    pub fn validate(&self) -> Result<()> {
        validate_name("Group name", &self.name)
    }

    pub fn apply(&self, changes: GroupChanges) -> Result<Self> {
        Self::with_id(self.id, changes.name.unwrap_or_else(|| self.name.clone()))
    }
}

/// Row of the user/group join relation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct Membership {
    pub user_id: Uuid,
    pub group_id: Uuid,
}

/// Input for creating a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Input for creating a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
}

impl NewGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Partial update of a user; absent fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Partial update of a group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChanges {
    pub name: Option<String>,
}

/// A group together with its current members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupWithUsers {
    pub group: Group,
    pub users: Vec<User>,
}

fn validate_name(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() || value.chars().count() > MAX_FIELD_LENGTH {
        return Err(RepositoryError::InvalidData(format!(
            "{} must be 1-{} characters",
            label, MAX_FIELD_LENGTH
        )));
    }
    Ok(())
}
