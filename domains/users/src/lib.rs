//! Users domain: users, groups, memberships and the unit of work that spans them

pub mod api;
pub mod domain;
pub mod repository;
pub mod service;

// Re-export domain types at the crate root for convenience
pub use domain::entities::*;
// Re-export repository types
pub use repository::{
    GroupRepository, InMemoryGroupRepository, InMemoryStore, InMemoryUnitOfWork,
    InMemoryUserRepository, PgGroupRepository, PgUnitOfWork, PgUserRepository,
    RepositoryContext, RepositoryResult, StoreSnapshot, UnitOfWork, UserRepository,
};
// Re-export service types
pub use service::{GroupQueryService, UserAggregateService, UserQueryService};

// Re-export API types
pub use api::routes;
pub use api::UsersState;

/// Schema migrations for the users, groups and membership tables
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");
