//! Repository bundle handed to one unit of work

use std::sync::Arc;

use super::{GroupRepository, UserRepository};

/// One user repository and one group repository bound to the same
/// transaction.
///
/// Built fresh by a [`UnitOfWork`](super::UnitOfWork) for each invocation.
/// Clones share the transaction; once the invocation commits or rolls back,
/// every call through a retained clone fails with `TransactionClosed`.
#[derive(Clone)]
pub struct RepositoryContext {
    users: Arc<dyn UserRepository>,
    groups: Arc<dyn GroupRepository>,
}

impl RepositoryContext {
    pub fn new(users: Arc<dyn UserRepository>, groups: Arc<dyn GroupRepository>) -> Self {
        Self { users, groups }
    }

    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    pub fn groups(&self) -> &dyn GroupRepository {
        self.groups.as_ref()
    }
}

impl std::fmt::Debug for RepositoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryContext").finish_non_exhaustive()
    }
}
