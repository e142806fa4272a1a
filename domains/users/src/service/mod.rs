//! Application services for the users domain

pub mod aggregate;
pub mod queries;

pub use aggregate::UserAggregateService;
pub use queries::{GroupQueryService, UserQueryService};
