//! PostgreSQL unit of work and aggregate service integration tests
//!
//! Require a reachable database (`TEST_DATABASE_URL`); run with
//! `cargo test -p roster-integration-tests -- --ignored`.

use std::time::Duration;

use roster_common::RepositoryError;
use roster_users::{
    GroupRepository, NewGroup, NewUser, RepositoryContext, UnitOfWork, User, UserRepository,
};
use serial_test::serial;
use uuid::Uuid;

use crate::common::TestApp;

mod common;

#[derive(Debug)]
enum WorkError {
    Repository(RepositoryError),
    Aborted(&'static str),
}

impl From<RepositoryError> for WorkError {
    fn from(err: RepositoryError) -> Self {
        WorkError::Repository(err)
    }
}

mod test_aggregate_operations {
    use super::*;

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_create_group_with_users_commits_everything() {
        let app = TestApp::new().await.unwrap();
        let service = app.service();

        let created = service
            .create_group_with_users(
                NewGroup::new("G"),
                vec![
                    NewUser::new("U1", "u1@x.com"),
                    NewUser::new("U2", "u2@x.com"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(app.count(r#""group""#).await.unwrap(), 1);
        assert_eq!(app.count(r#""user""#).await.unwrap(), 2);
        assert_eq!(app.count("user_groups").await.unwrap(), 2);

        let members = app.users().users_in_group(created.group.id).await.unwrap();
        assert_eq!(members, created.users);

        app.cleanup().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_create_user_with_missing_group_writes_nothing() {
        let app = TestApp::new().await.unwrap();
        let missing = Uuid::now_v7();

        let err = app
            .service()
            .create_user_with_group(NewUser::new("John", "john@x.com"), missing)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), format!("Group with id {} not found", missing));
        assert_eq!(app.count(r#""user""#).await.unwrap(), 0);

        app.cleanup().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_duplicate_email_rolls_back_group() {
        let app = TestApp::new().await.unwrap();
        let service = app.service();
        service
            .create_user(NewUser::new("Taken", "u2@x.com"))
            .await
            .unwrap();

        let err = service
            .create_group_with_users(
                NewGroup::new("G"),
                vec![
                    NewUser::new("U1", "u1@x.com"),
                    NewUser::new("U2", "u2@x.com"),
                ],
            )
            .await
            .unwrap_err();

        match err {
            RepositoryError::UniqueViolation { constraint } => {
                assert_eq!(constraint.as_deref(), Some("user_email_key"));
            }
            other => panic!("expected unique violation, got {:?}", other),
        }
        assert_eq!(app.count(r#""group""#).await.unwrap(), 0);
        assert_eq!(app.count(r#""user""#).await.unwrap(), 1);
        assert_eq!(app.count("user_groups").await.unwrap(), 0);

        app.cleanup().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_delete_group_with_users_keeps_outsiders() {
        let app = TestApp::new().await.unwrap();
        let service = app.service();
        let created = service
            .create_group_with_users(
                NewGroup::new("G"),
                vec![NewUser::new("A", "a@x.com"), NewUser::new("B", "b@x.com")],
            )
            .await
            .unwrap();
        let outsider = service
            .create_user(NewUser::new("Outsider", "out@x.com"))
            .await
            .unwrap();

        service
            .delete_group_with_users(created.group.id)
            .await
            .unwrap();

        assert_eq!(app.users().list().await.unwrap(), vec![outsider]);
        assert_eq!(app.count(r#""group""#).await.unwrap(), 0);
        assert_eq!(app.count("user_groups").await.unwrap(), 0);

        app.cleanup().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_deleting_user_cascades_memberships() {
        let app = TestApp::new().await.unwrap();
        let service = app.service();
        let group = service.create_group(NewGroup::new("G")).await.unwrap();
        let user = service
            .create_user_with_group(NewUser::new("John", "john@x.com"), group.id)
            .await
            .unwrap();

        service.delete_user(user.id).await.unwrap();

        assert_eq!(app.count("user_groups").await.unwrap(), 0);
        assert!(app.groups().find_by_id(group.id).await.unwrap().is_some());
        assert!(app
            .user_queries()
            .find_user_by_id(user.id)
            .await
            .unwrap_err()
            .is_not_found());

        app.cleanup().await.unwrap();
    }
}

mod test_transaction_semantics {
    use super::*;

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_custom_error_rolls_back_and_passes_through() {
        let app = TestApp::new().await.unwrap();
        let user = User::new("John", "john@x.com").unwrap();

        let err = app
            .unit_of_work()
            .execute(move |ctx| async move {
                ctx.users().create(&user).await?;
                Err::<(), _>(WorkError::Aborted("boom"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WorkError::Aborted("boom")));
        assert_eq!(app.count(r#""user""#).await.unwrap(), 0);

        app.cleanup().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_membership_with_unknown_group_is_foreign_key_violation() {
        let app = TestApp::new().await.unwrap();
        let user = User::new("John", "john@x.com").unwrap();
        let missing = Uuid::now_v7();

        let err = app
            .unit_of_work()
            .execute(move |ctx| async move {
                ctx.users().create(&user).await?;
                ctx.users().add_to_group(user.id, missing).await?;
                Ok::<_, WorkError>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkError::Repository(RepositoryError::ForeignKeyViolation { .. })
        ));
        assert_eq!(app.count(r#""user""#).await.unwrap(), 0);

        app.cleanup().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_uncommitted_writes_are_invisible_outside() {
        let app = TestApp::new().await.unwrap();
        let outside = app.users();
        let user = User::new("John", "john@x.com").unwrap();
        let id = user.id;

        let seen_outside = app
            .unit_of_work()
            .execute(move |ctx| async move {
                ctx.users().create(&user).await?;
                assert!(ctx.users().find_by_id(user.id).await?.is_some());
                let seen = outside.find_by_id(user.id).await?;
                Ok::<_, RepositoryError>(seen)
            })
            .await
            .unwrap();

        assert!(seen_outside.is_none());
        assert!(app.users().find_by_id(id).await.unwrap().is_some());

        app.cleanup().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_retained_context_is_closed_after_commit() {
        let app = TestApp::new().await.unwrap();

        let ctx: RepositoryContext = app
            .unit_of_work()
            .execute(|ctx| async move { Ok::<_, RepositoryError>(ctx.clone()) })
            .await
            .unwrap();

        let err = ctx.users().list().await.unwrap_err();
        assert!(matches!(err, RepositoryError::TransactionClosed));

        app.cleanup().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_timeout_rolls_back() {
        let app = TestApp::new().await.unwrap();
        let unit_of_work = app
            .unit_of_work()
            .with_timeout(Duration::from_millis(100));
        let user = User::new("Slow", "slow@x.com").unwrap();

        let err = unit_of_work
            .execute(move |ctx| async move {
                ctx.users().create(&user).await?;
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok::<_, RepositoryError>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Timeout(_)));
        assert_eq!(app.count(r#""user""#).await.unwrap(), 0);

        app.cleanup().await.unwrap();
    }

    /// Rollback of a dropped transaction completes when its connection
    /// returns to the pool, so give it a moment.
    async fn settled_idle_in_transaction(app: &TestApp) -> i64 {
        let mut idle = app.idle_in_transaction().await.unwrap();
        for _ in 0..20 {
            if idle == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            idle = app.idle_in_transaction().await.unwrap();
        }
        idle
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_cancelled_work_rolls_back() {
        let app = TestApp::new().await.unwrap();
        let user = User::new("John", "john@x.com").unwrap();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(200),
            app.unit_of_work().execute(move |ctx| async move {
                ctx.users().create(&user).await?;
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, RepositoryError>(())
            }),
        )
        .await;

        assert!(cancelled.is_err());
        assert_eq!(settled_idle_in_transaction(&app).await, 0);
        assert_eq!(app.count(r#""user""#).await.unwrap(), 0);

        app.cleanup().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_cancelled_work_with_retained_context_rolls_back() {
        let app = TestApp::new().await.unwrap();
        let user = User::new("John", "john@x.com").unwrap();
        let (task_tx, task_rx) = tokio::sync::oneshot::channel();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(200),
            app.unit_of_work().execute(move |ctx| async move {
                ctx.users().create(&user).await?;
                let retained = ctx.clone();
                let _ = task_tx.send(tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    retained.users().list().await
                }));
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, RepositoryError>(())
            }),
        )
        .await;

        assert!(cancelled.is_err());
        assert_eq!(settled_idle_in_transaction(&app).await, 0);
        assert_eq!(app.count(r#""user""#).await.unwrap(), 0);

        let late = task_rx.await.unwrap().await.unwrap();
        assert!(matches!(late, Err(RepositoryError::TransactionClosed)));

        app.cleanup().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    #[ignore = "requires a PostgreSQL database (TEST_DATABASE_URL)"]
    async fn test_concurrent_units_of_work_commit_independently() {
        let app = TestApp::new().await.unwrap();
        let service = app.service();

        let (a, b) = tokio::join!(
            service.create_user(NewUser::new("A", "a@x.com")),
            service.create_user(NewUser::new("B", "b@x.com")),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(app.count(r#""user""#).await.unwrap(), 2);

        app.cleanup().await.unwrap();
    }
}
