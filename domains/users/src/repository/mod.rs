//! Repository contracts and implementations for the users domain
//!
//! Two storage families, one trait each. Both the PostgreSQL adapters and the
//! in-memory double report the same error kinds and cascade semantics.

pub mod context;
pub mod groups;
pub mod memory;
pub mod unit_of_work;
pub mod users;

use async_trait::async_trait;
use roster_common::RepositoryError;
use uuid::Uuid;

use crate::domain::entities::{Group, User};

pub use context::RepositoryContext;
pub use groups::PgGroupRepository;
pub use memory::{
    InMemoryGroupRepository, InMemoryStore, InMemoryUnitOfWork, InMemoryUserRepository,
    StoreSnapshot,
};
pub use unit_of_work::{PgUnitOfWork, UnitOfWork};
pub use users::PgUserRepository;

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Storage contract for users and their group memberships
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user; a duplicate email is a `UniqueViolation`.
    async fn create(&self, user: &User) -> RepositoryResult<()>;

    async fn list(&self) -> RepositoryResult<Vec<User>>;

    /// Absence is `Ok(None)`, never an error.
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>>;

    /// Replace name and email by identity. Unknown ids affect zero rows.
    async fn update(&self, user: &User) -> RepositoryResult<()>;

    /// Delete a user; memberships go with it.
    async fn delete_by_id(&self, id: Uuid) -> RepositoryResult<()>;

    async fn add_to_group(&self, user_id: Uuid, group_id: Uuid) -> RepositoryResult<()>;

    async fn remove_from_group(&self, user_id: Uuid, group_id: Uuid) -> RepositoryResult<()>;

    async fn users_in_group(&self, group_id: Uuid) -> RepositoryResult<Vec<User>>;

    async fn group_ids_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Uuid>>;
}

/// Storage contract for groups
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Insert a new group; a duplicate name is a `UniqueViolation`.
    async fn create(&self, group: &Group) -> RepositoryResult<()>;

    async fn list(&self) -> RepositoryResult<Vec<Group>>;

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Group>>;

    async fn update(&self, group: &Group) -> RepositoryResult<()>;

    /// Delete a group; memberships go with it.
    async fn delete_by_id(&self, id: Uuid) -> RepositoryResult<()>;

    async fn groups_for_user(&self, user_id: Uuid) -> RepositoryResult<Vec<Group>>;
}
