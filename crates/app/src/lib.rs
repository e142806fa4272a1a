//! Roster application composition root
//!
//! Wires the PostgreSQL unit of work and repositories into the users router.

use std::sync::Arc;

use axum::Router;
use roster_common::Config;
use roster_users::{PgGroupRepository, PgUnitOfWork, PgUserRepository, UsersState};
use sqlx::PgPool;

/// Create the main application router
pub fn create_app(config: &Config, pool: PgPool) -> Router {
    let mut unit_of_work = PgUnitOfWork::new(pool.clone());
    if let Some(limit) = config.unit_of_work_timeout() {
        unit_of_work = unit_of_work.with_timeout(limit);
    }

    // Reads outside a unit of work run straight on the pool
    let users_state = UsersState::new(
        unit_of_work,
        Arc::new(PgUserRepository::new(pool.clone())),
        Arc::new(PgGroupRepository::new(pool)),
    );

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .route(
            "/",
            axum::routing::get(|| async { "Roster API v0.0.1-SNAPSHOT" }),
        )
        .merge(roster_users::routes().with_state(users_state))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
