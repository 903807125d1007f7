//! PostgreSQL-backed usage counter tests
//!
//! Need a live database: `DATABASE_URL=... cargo test -p quota -- --ignored`

use chrono::Utc;
use kernel::id::UserId;
use quota::domain::entities::BucketIdentity;
use quota::domain::repository::UsageCounterRepository;
use quota::domain::services::bucket_window;
use quota::domain::value_objects::{ResourceType, SessionHash};
use quota::PgUsageRepository;
use sqlx::postgres::PgPoolOptions;
use std::collections::HashSet;
use std::sync::Arc;

async fn repository() -> PgUsageRepository {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for ignored tests");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("../../database/migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    PgUsageRepository::new(pool)
}

fn fresh_session() -> BucketIdentity {
    BucketIdentity::Session(SessionHash::from_hex(hex::encode(uuid::Uuid::new_v4().as_bytes())))
}

#[tokio::test]
#[ignore]
async fn test_upsert_creates_then_increments() {
    let repo = repository().await;
    let identity = fresh_session();
    let window = bucket_window(Utc::now(), 24);

    assert!(repo
        .find(&identity, &ResourceType::MESSAGE, window.start)
        .await
        .unwrap()
        .is_none());
    assert_eq!(repo.increment(&identity, &ResourceType::MESSAGE, &window).await.unwrap(), 1);
    assert_eq!(repo.increment(&identity, &ResourceType::MESSAGE, &window).await.unwrap(), 2);

    let bucket = repo
        .find(&identity, &ResourceType::MESSAGE, window.start)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bucket.count, 2);
    assert_eq!(bucket.identity, identity);
    assert_eq!(bucket.bucket_end, window.end);
}

#[tokio::test]
#[ignore]
async fn test_user_and_session_buckets_are_disjoint() {
    let repo = repository().await;
    let user = BucketIdentity::User(UserId::new());
    let guest = fresh_session();
    let window = bucket_window(Utc::now(), 24);

    repo.increment(&user, &ResourceType::MESSAGE, &window).await.unwrap();
    repo.increment(&user, &ResourceType::MESSAGE, &window).await.unwrap();
    assert_eq!(repo.increment(&guest, &ResourceType::MESSAGE, &window).await.unwrap(), 1);

    let other_resource = ResourceType::new("image");
    assert_eq!(repo.increment(&user, &other_resource, &window).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_upserts_never_lose_counts() {
    let repo = Arc::new(repository().await);
    let identity = BucketIdentity::User(UserId::new());
    let window = bucket_window(Utc::now(), 24);

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let repo = repo.clone();
            let identity = identity.clone();
            tokio::spawn(async move {
                repo.increment(&identity, &ResourceType::MESSAGE, &window)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        seen.insert(handle.await.unwrap());
    }
    assert_eq!(seen, (1..=20).collect::<HashSet<i64>>());
}
