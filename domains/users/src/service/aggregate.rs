//! Cross-entity use cases over users and groups
//!
//! Every operation runs inside exactly one unit of work. Existence checks
//! happen inside the same transaction and before the first write, so a
//! missing user or group never leaves partial writes behind.

use roster_common::RepositoryError;
use uuid::Uuid;

use crate::domain::entities::{
    Group, GroupChanges, GroupWithUsers, NewGroup, NewUser, User, UserChanges,
};
use crate::repository::{RepositoryContext, UnitOfWork};

type Result<T> = std::result::Result<T, RepositoryError>;

pub(crate) fn user_not_found(id: Uuid) -> RepositoryError {
    RepositoryError::NotFound(format!("User with id {} not found", id))
}

pub(crate) fn group_not_found(id: Uuid) -> RepositoryError {
    RepositoryError::NotFound(format!("Group with id {} not found", id))
}

async fn require_user(ctx: &RepositoryContext, id: Uuid) -> Result<User> {
    ctx.users()
        .find_by_id(id)
        .await?
        .ok_or_else(|| user_not_found(id))
}

async fn require_group(ctx: &RepositoryContext, id: Uuid) -> Result<Group> {
    ctx.groups()
        .find_by_id(id)
        .await?
        .ok_or_else(|| group_not_found(id))
}

/// Create each user and attach it to `group_id`, in order.
async fn create_members(
    ctx: &RepositoryContext,
    group_id: Uuid,
    users: Vec<User>,
) -> Result<Vec<User>> {
    for user in &users {
        ctx.users().create(user).await?;
        ctx.users().add_to_group(user.id, group_id).await?;
    }
    Ok(users)
}

fn build_users(data: Vec<NewUser>) -> Result<Vec<User>> {
    data.into_iter()
        .map(|u| User::new(u.name, u.email))
        .collect()
}

/// Orchestration surface consumed by the presentation layer
#[derive(Clone)]
pub struct UserAggregateService<U> {
    unit_of_work: U,
}

impl<U: UnitOfWork> UserAggregateService<U> {
    pub fn new(unit_of_work: U) -> Self {
        Self { unit_of_work }
    }

    pub fn unit_of_work(&self) -> &U {
        &self.unit_of_work
    }

    pub async fn create_user(&self, data: NewUser) -> Result<User> {
        let user = User::new(data.name, data.email)?;

        let user = self
            .unit_of_work
            .execute(move |ctx| async move {
                ctx.users().create(&user).await?;
                Ok::<_, RepositoryError>(user)
            })
            .await?;

        tracing::info!(user_id = %user.id, "User created");
        Ok(user)
    }

    pub async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<User> {
        let user = self
            .unit_of_work
            .execute(move |ctx| async move {
                let existing = require_user(&ctx, id).await?;
                let updated = existing.apply(changes)?;
                ctx.users().update(&updated).await?;
                Ok::<_, RepositoryError>(updated)
            })
            .await?;

        tracing::info!(user_id = %id, "User updated");
        Ok(user)
    }

    pub async fn delete_user(&self, id: Uuid) -> Result<()> {
        self.unit_of_work
            .execute(move |ctx| async move {
                require_user(&ctx, id).await?;
                ctx.users().delete_by_id(id).await?;
                Ok::<_, RepositoryError>(())
            })
            .await?;

        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    pub async fn create_group(&self, data: NewGroup) -> Result<Group> {
        let group = Group::new(data.name)?;

        let group = self
            .unit_of_work
            .execute(move |ctx| async move {
                ctx.groups().create(&group).await?;
                Ok::<_, RepositoryError>(group)
            })
            .await?;

        tracing::info!(group_id = %group.id, "Group created");
        Ok(group)
    }

    pub async fn update_group(&self, id: Uuid, changes: GroupChanges) -> Result<Group> {
        let group = self
            .unit_of_work
            .execute(move |ctx| async move {
                let existing = require_group(&ctx, id).await?;
                let updated = existing.apply(changes)?;
                ctx.groups().update(&updated).await?;
                Ok::<_, RepositoryError>(updated)
            })
            .await?;

        tracing::info!(group_id = %id, "Group updated");
        Ok(group)
    }

    pub async fn delete_group(&self, id: Uuid) -> Result<()> {
        self.unit_of_work
            .execute(move |ctx| async move {
                require_group(&ctx, id).await?;
                ctx.groups().delete_by_id(id).await?;
                Ok::<_, RepositoryError>(())
            })
            .await?;

        tracing::info!(group_id = %id, "Group deleted");
        Ok(())
    }

    /// Create a user and attach it to an existing group.
    ///
    /// Fails with `NotFound("Group with id {id} not found")` before any write
    /// when the group does not exist.
    pub async fn create_user_with_group(&self, data: NewUser, group_id: Uuid) -> Result<User> {
        let user = User::new(data.name, data.email)?;

        let user = self
            .unit_of_work
            .execute(move |ctx| async move {
                require_group(&ctx, group_id).await?;
                ctx.users().create(&user).await?;
                ctx.users().add_to_group(user.id, group_id).await?;
                Ok::<_, RepositoryError>(user)
            })
            .await?;

        tracing::info!(user_id = %user.id, group_id = %group_id, "User created in group");
        Ok(user)
    }

    /// Create a group and its initial members, all or nothing.
    pub async fn create_group_with_users(
        &self,
        group: NewGroup,
        users: Vec<NewUser>,
    ) -> Result<GroupWithUsers> {
        let group = Group::new(group.name)?;
        let users = build_users(users)?;

        let created = self
            .unit_of_work
            .execute(move |ctx| async move {
                ctx.groups().create(&group).await?;
                let users = create_members(&ctx, group.id, users).await?;
                Ok::<_, RepositoryError>(GroupWithUsers { group, users })
            })
            .await?;

        tracing::info!(
            group_id = %created.group.id,
            user_count = created.users.len(),
            "Group created with users"
        );
        Ok(created)
    }

    /// Create new users directly inside an existing group.
    pub async fn add_users_to_group(
        &self,
        group_id: Uuid,
        users: Vec<NewUser>,
    ) -> Result<Vec<User>> {
        let users = build_users(users)?;

        let created = self
            .unit_of_work
            .execute(move |ctx| async move {
                require_group(&ctx, group_id).await?;
                let created = create_members(&ctx, group_id, users).await?;
                Ok::<_, RepositoryError>(created)
            })
            .await?;

        tracing::info!(group_id = %group_id, user_count = created.len(), "Users added to group");
        Ok(created)
    }

    /// Delete a group together with its members.
    ///
    /// Only users holding a membership in this group are deleted. Users
    /// outside the group are untouched.
    pub async fn delete_group_with_users(&self, group_id: Uuid) -> Result<()> {
        let deleted = self
            .unit_of_work
            .execute(move |ctx| async move {
                let group = require_group(&ctx, group_id).await?;
                let members = ctx.users().users_in_group(group.id).await?;
                for member in &members {
                    ctx.users().delete_by_id(member.id).await?;
                }
                ctx.groups().delete_by_id(group.id).await?;
                Ok::<_, RepositoryError>(members.len())
            })
            .await?;

        tracing::info!(group_id = %group_id, deleted_users = deleted, "Group deleted with users");
        Ok(())
    }

    pub async fn get_group_with_users(&self, group_id: Uuid) -> Result<GroupWithUsers> {
        self.unit_of_work
            .execute(move |ctx| async move {
                let group = require_group(&ctx, group_id).await?;
                let users = ctx.users().users_in_group(group_id).await?;
                Ok::<_, RepositoryError>(GroupWithUsers { group, users })
            })
            .await
    }

    /// Attach an existing user to an existing group.
    pub async fn add_member(&self, group_id: Uuid, user_id: Uuid) -> Result<()> {
        self.unit_of_work
            .execute(move |ctx| async move {
                require_group(&ctx, group_id).await?;
                require_user(&ctx, user_id).await?;
                ctx.users().add_to_group(user_id, group_id).await?;
                Ok::<_, RepositoryError>(())
            })
            .await?;

        tracing::info!(group_id = %group_id, user_id = %user_id, "Member added");
        Ok(())
    }

    pub async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> Result<()> {
        self.unit_of_work
            .execute(move |ctx| async move {
                require_group(&ctx, group_id).await?;
                require_user(&ctx, user_id).await?;
                ctx.users().remove_from_group(user_id, group_id).await?;
                Ok::<_, RepositoryError>(())
            })
            .await?;

        tracing::info!(group_id = %group_id, user_id = %user_id, "Member removed");
        Ok(())
    }

    pub async fn get_user_groups(&self, user_id: Uuid) -> Result<Vec<Group>> {
        self.unit_of_work
            .execute(move |ctx| async move {
                require_user(&ctx, user_id).await?;
                let groups = ctx.groups().groups_for_user(user_id).await?;
                Ok::<_, RepositoryError>(groups)
            })
            .await
    }
}
