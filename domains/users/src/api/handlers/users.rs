//! User API handlers
//!
//! - POST /users, GET /users
//! - GET /users/{id}, PUT /users/{id}, DELETE /users/{id}
//! - GET /users/{id}/groups
//! - POST /users/with-group
//! - POST /users/add-to-group

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use roster_common::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::groups::GroupResponse;
use crate::api::middleware::UsersState;
use crate::domain::entities::{NewUser, User, UserChanges};
use crate::repository::UnitOfWork;

/// User payload shared by the create endpoints
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(email, length(max = 255))]
    pub email: String,
}

impl From<CreateUserRequest> for NewUser {
    fn from(request: CreateUserRequest) -> Self {
        NewUser::new(request.name, request.email)
    }
}

/// Partial update; omitted fields keep their value
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(email, length(max = 255))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserWithGroupRequest {
    #[validate(nested)]
    pub user: CreateUserRequest,
    pub group_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddUsersToGroupRequest {
    pub group_id: Uuid,
    #[validate(nested)]
    pub users: Vec<CreateUserRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

fn validate<T: Validate>(request: &T) -> Result<()> {
    request
        .validate()
        .map_err(|e| Error::Validation(format!("Validation failed: {}", e)))
}

fn into_responses(users: Vec<User>) -> Vec<UserResponse> {
    users.into_iter().map(UserResponse::from).collect()
}

/// **POST /users**
pub async fn create_user<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    validate(&request)?;

    let user = state.service.create_user(request.into()).await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// **GET /users**
pub async fn list_users<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
) -> Result<Json<Vec<UserResponse>>> {
    let users = state.users.list_users().await?;
    Ok(Json(into_responses(users)))
}

/// **GET /users/{id}**
///
/// Unknown ids answer 404.
pub async fn get_user<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>> {
    let user = state.users.find_user_by_id(user_id).await?;
    Ok(Json(user.into()))
}

/// **PUT /users/{id}**
pub async fn update_user<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    validate(&request)?;

    let changes = UserChanges {
        name: request.name,
        email: request.email,
    };
    let user = state.service.update_user(user_id, changes).await?;

    Ok(Json(user.into()))
}

/// **DELETE /users/{id}**
pub async fn delete_user<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service.delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// **GET /users/{id}/groups**
pub async fn get_user_groups<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<GroupResponse>>> {
    let groups = state.service.get_user_groups(user_id).await?;
    Ok(Json(groups.into_iter().map(GroupResponse::from).collect()))
}

/// **POST /users/with-group**
///
/// Creates the user and its membership in one transaction. A missing group
/// answers 404 and creates nothing.
pub async fn create_user_with_group<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Json(request): Json<CreateUserWithGroupRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    validate(&request)?;

    let user = state
        .service
        .create_user_with_group(request.user.into(), request.group_id)
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// **POST /users/add-to-group**
pub async fn add_users_to_group<U: UnitOfWork>(
    State(state): State<UsersState<U>>,
    Json(request): Json<AddUsersToGroupRequest>,
) -> Result<(StatusCode, Json<Vec<UserResponse>>)> {
    validate(&request)?;

    let users = request.users.into_iter().map(NewUser::from).collect();
    let created = state
        .service
        .add_users_to_group(request.group_id, users)
        .await?;

    Ok((StatusCode::CREATED, Json(into_responses(created))))
}
