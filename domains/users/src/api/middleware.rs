//! Users domain state

use std::sync::Arc;

use crate::repository::{GroupRepository, UnitOfWork, UserRepository};
use crate::service::{GroupQueryService, UserAggregateService, UserQueryService};

/// Application state for the users domain
pub struct UsersState<U> {
    pub service: Arc<UserAggregateService<U>>,
    pub users: UserQueryService,
    pub groups: GroupQueryService,
}

impl<U: UnitOfWork> UsersState<U> {
    /// Build the state from a unit of work for writes and plain
    /// repositories for reads.
    pub fn new(
        unit_of_work: U,
        users: Arc<dyn UserRepository>,
        groups: Arc<dyn GroupRepository>,
    ) -> Self {
        Self {
            service: Arc::new(UserAggregateService::new(unit_of_work)),
            users: UserQueryService::new(users),
            groups: GroupQueryService::new(groups),
        }
    }
}

impl<U> Clone for UsersState<U> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            users: self.users.clone(),
            groups: self.groups.clone(),
        }
    }
}
