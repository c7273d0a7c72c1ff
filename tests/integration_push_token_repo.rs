#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc)]
#![allow(missing_debug_implementations, unreachable_pub)]
use futures::TryStreamExt;
use post_notifier::adapters::database::{self, DbPool, push_token_repo::PushTokenRepository};
use post_notifier::adapters::token_store::TokenStore;
use post_notifier::domain::push::TokenRecord;
use uuid::Uuid;

mod common;

async fn get_test_pool() -> DbPool {
    common::setup_tracing();
    let config = common::get_test_config(&[]);
    let pool = database::init_pool(&config.database).await.expect("Failed to connect to DB. Is Postgres running?");
    database::run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

async fn list_with_prefix(repo: &PushTokenRepository, prefix: &str) -> Vec<TokenRecord> {
    let all: Vec<TokenRecord> = repo.list_all().try_collect().await.unwrap();
    all.into_iter().filter(|r| r.user_id.starts_with(prefix)).collect()
}

#[tokio::test]
async fn test_upsert_overwrites_token() {
    let repo = PushTokenRepository::new(get_test_pool().await, 100);
    let user_id = format!("repo_user_{}", Uuid::new_v4());

    repo.upsert(&user_id, "token-a").await.unwrap();
    let first = list_with_prefix(&repo, &user_id).await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].token, "token-a");

    repo.upsert(&user_id, "token-b").await.unwrap();
    let second = list_with_prefix(&repo, &user_id).await;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].token, "token-b");
    assert!(second[0].updated_at >= first[0].updated_at);
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let repo = PushTokenRepository::new(get_test_pool().await, 100);
    let user_id = format!("repo_user_{}", Uuid::new_v4());

    repo.upsert(&user_id, "token").await.unwrap();
    repo.remove(&user_id).await.unwrap();
    repo.remove(&user_id).await.unwrap();

    assert!(list_with_prefix(&repo, &user_id).await.is_empty());
}

#[tokio::test]
async fn test_list_all_walks_every_page_in_order() {
    let pool = get_test_pool().await;
    let prefix = format!("page_{}_", Uuid::new_v4().simple());

    let writer = PushTokenRepository::new(pool.clone(), 100);
    for i in 0..5 {
        writer.upsert(&format!("{prefix}{i}"), &format!("token-{i}")).await.unwrap();
    }

    // Page size smaller than the data set forces several round trips
    let repo = PushTokenRepository::new(pool, 2);
    let records = list_with_prefix(&repo, &prefix).await;

    let ids: Vec<String> = records.iter().map(|r| r.user_id.clone()).collect();
    let expected: Vec<String> = (0..5).map(|i| format!("{prefix}{i}")).collect();
    assert_eq!(ids, expected);

    // Listing is restartable
    assert_eq!(list_with_prefix(&repo, &prefix).await.len(), 5);
}

#[tokio::test]
async fn test_list_all_includes_empty_user_id() {
    let repo = PushTokenRepository::new(get_test_pool().await, 1);
    let token = format!("empty-user-{}", Uuid::new_v4());

    // The empty id sorts first and must not be skipped by the first page
    repo.upsert("", &token).await.unwrap();
    let all: Vec<TokenRecord> = repo.list_all().try_collect().await.unwrap();
    repo.remove("").await.unwrap();

    assert!(all.iter().any(|r| r.user_id.is_empty() && r.token == token));
}

#[tokio::test]
async fn test_ping_reports_closed_pool() {
    let pool = get_test_pool().await;
    let repo = PushTokenRepository::new(pool.clone(), 100);

    repo.ping().await.unwrap();

    pool.close().await;
    assert!(repo.ping().await.is_err());
}
