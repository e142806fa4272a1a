//! Group API handlers
//!
//! Group CRUD plus the aggregate endpoints that touch a group and its
//! members in one transaction.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use roster_common::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::users::{CreateUserRequest, UserResponse};
use crate::api::middleware::UsersState;
use crate::domain::entities::{Group, GroupChanges, GroupWithUsers, NewGroup, NewUser};
use crate::repository::UnitOfWork;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGroupRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupWithUsersRequest {
    #[validate(nested)]
    pub group: CreateGroupRequest,
    #[validate(nested)]
    pub users: Vec<CreateUserRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<Group> for GroupResponse {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            name: group.name,
        }
    }
}

/// A group with its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupWithUsersResponse {
    pub group: GroupResponse,
    pub users: Vec<UserResponse>,
}

impl From<GroupWithUsers> for GroupWithUsersResponse {
    fn from(value: GroupWithUsers) -> Self {
        Self {
            group: value.group.into(),
            users: value.users.into_iter().map(UserResponse::from).collect(),
        }
    }
}

/// **POST /groups**
pub async fn create_group<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupResponse>)> {
    request
        .validate()
        .map_err(|e| Error::Validation(format!("Validation failed: {}", e)))?;

    let group = state
        .service
        .create_group(NewGroup::new(request.name))
        .await?;

    Ok((StatusCode::CREATED, Json(group.into())))
}

/// **GET /groups**
pub async fn list_groups<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
) -> Result<Json<Vec<GroupResponse>>> {
    let groups = state.groups.list_groups().await?;
    Ok(Json(groups.into_iter().map(GroupResponse::from).collect()))
}

/// **GET /groups/{id}**
pub async fn get_group<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupResponse>> {
    let group = state.groups.find_group_by_id(group_id).await?;
    Ok(Json(group.into()))
}

/// **PUT /groups/{id}**
pub async fn update_group<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Path(group_id): Path<Uuid>,
    Json(request): Json<UpdateGroupRequest>,
) -> Result<Json<GroupResponse>> {
    request
        .validate()
        .map_err(|e| Error::Validation(format!("Validation failed: {}", e)))?;

    let group = state
        .service
        .update_group(group_id, GroupChanges { name: request.name })
        .await?;

    Ok(Json(group.into()))
}

/// **DELETE /groups/{id}**
///
/// Members stay; only their memberships in this group go away.
pub async fn delete_group<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service.delete_group(group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// **POST /groups/with-users**
///
/// All or nothing: any invalid or duplicate member leaves no group behind.
pub async fn create_group_with_users<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Json(request): Json<CreateGroupWithUsersRequest>,
) -> Result<(StatusCode, Json<GroupWithUsersResponse>)> {
    request
        .validate()
        .map_err(|e| Error::Validation(format!("Validation failed: {}", e)))?;

    let users = request.users.into_iter().map(NewUser::from).collect();
    let created = state
        .service
        .create_group_with_users(NewGroup::new(request.group.name), users)
        .await?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// **GET /groups/{id}/users**
pub async fn get_group_with_users<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupWithUsersResponse>> {
    let view = state.service.get_group_with_users(group_id).await?;
    Ok(Json(view.into()))
}

/// **DELETE /groups/{id}/with-users**
pub async fn delete_group_with_users<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service.delete_group_with_users(group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// **PUT /groups/{id}/members/{user_id}**
pub async fn add_member<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Path((group_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    state.service.add_member(group_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// **DELETE /groups/{id}/members/{user_id}**
pub async fn remove_member<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Path((group_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    state.service.remove_member(group_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
