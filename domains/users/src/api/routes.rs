//! Route definitions for the users domain API

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::handlers::{groups, users};
use super::middleware::UsersState;
use crate::repository::UnitOfWork;

/// Create user routes
fn user_routes<U: UnitOfWork + 'static>() -> Router<UsersState<U>> {
    Router::new()
        .route(
            "/users",
            post(users::create_user::<U>).get(users::list_users::<U>),
        )
        .route("/users/with-group", post(users::create_user_with_group::<U>))
        .route("/users/add-to-group", post(users::add_users_to_group::<U>))
        .route(
            "/users/{id}",
            get(users::get_user::<U>)
                .put(users::update_user::<U>)
                .delete(users::delete_user::<U>),
        )
        .route("/users/{id}/groups", get(users::get_user_groups::<U>))
}

/// Create group routes
fn group_routes<U: UnitOfWork + 'static>() -> Router<UsersState<U>> {
    Router::new()
        .route(
            "/groups",
            post(groups::create_group::<U>).get(groups::list_groups::<U>),
        )
        .route(
            "/groups/with-users",
            post(groups::create_group_with_users::<U>),
        )
        .route(
            "/groups/{id}",
            get(groups::get_group::<U>)
                .put(groups::update_group::<U>)
                .delete(groups::delete_group::<U>),
        )
        .route("/groups/{id}/users", get(groups::get_group_with_users::<U>))
        .route(
            "/groups/{id}/with-users",
            delete(groups::delete_group_with_users::<U>),
        )
        .route(
            "/groups/{id}/members/{user_id}",
            put(groups::add_member::<U>).delete(groups::remove_member::<U>),
        )
}

/// Create all users domain API routes
pub fn routes<U: UnitOfWork + 'static>() -> Router<UsersState<U>> {
    Router::new()
        .merge(user_routes())
        .merge(group_routes())
}
