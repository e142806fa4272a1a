//! Read-only lookups outside a unit of work

use std::sync::Arc;

use roster_common::RepositoryError;
use uuid::Uuid;

use super::aggregate::{group_not_found, user_not_found};
use crate::domain::entities::{Group, User};
use crate::repository::{GroupRepository, UserRepository};

type Result<T> = std::result::Result<T, RepositoryError>;

#[derive(Clone)]
pub struct UserQueryService {
    users: Arc<dyn UserRepository>,
}

impl UserQueryService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    pub async fn find_user_by_id(&self, id: Uuid) -> Result<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| user_not_found(id))
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.users.list().await
    }
}

#[derive(Clone)]
pub struct GroupQueryService {
    groups: Arc<dyn GroupRepository>,
}

impl GroupQueryService {
    pub fn new(groups: Arc<dyn GroupRepository>) -> Self {
        Self { groups }
    }

    pub async fn find_group_by_id(&self, id: Uuid) -> Result<Group> {
        self.groups
            .find_by_id(id)
            .await?
            .ok_or_else(|| group_not_found(id))
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        self.groups.list().await
    }
}
