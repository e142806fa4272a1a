//! Simple integration test to verify basic infrastructure works

#[tokio::test]
async fn test_basic_infrastructure() {
    use roster_users::{InMemoryStore, NewUser, UserAggregateService};

    // The in-memory store needs no database
    let store = InMemoryStore::new();
    let service = UserAggregateService::new(store.unit_of_work());

    let user = service
        .create_user(NewUser::new("Ada", "ada@x.com"))
        .await
        .unwrap();

    assert_eq!(store.snapshot().await.users, vec![user]);
}

#[tokio::test]
async fn test_config_loading() {
    use crate::common::TestConfig;

    let config = TestConfig::from_env();
    assert!(!config.database_url.is_empty());
    assert_eq!(config.app_config().database_url, config.database_url);
}

mod common;
