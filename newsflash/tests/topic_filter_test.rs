use common::{Config, DatabaseConfig, SchedulerConfig, SubscriberConfig};
use newsflash::article::Article;
use newsflash::notify::plan_deliveries;
use newsflash::storage;
use newsflash::subscribers::{SqliteDirectory, SubscriberDirectory};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::time::Duration;

async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory sqlite pool");

    storage::ensure_schema(&pool).await.expect("schema");
    pool
}

fn config_with(subscribers: Vec<SubscriberConfig>) -> Config {
    Config {
        database: DatabaseConfig {
            path: ":memory:".to_string(),
        },
        scheduler: SchedulerConfig {
            interval_seconds: 3600,
        },
        fetch: None,
        telegram: None,
        subscribers,
    }
}

fn subscriber_config(username: &str, display_name: &str, chat_id: i64, topics: &[&str]) -> SubscriberConfig {
    SubscriberConfig {
        username: username.to_string(),
        display_name: Some(display_name.to_string()),
        password_hash: None,
        chat_id: Some(chat_id),
        topics: topics.iter().map(|t| t.to_string()).collect(),
    }
}

/// Integration test that ensures new articles only reach the subscribers whose
/// topic lists contain the article's subject.
///
/// The test syncs a config with two subscribers into an in-memory database:
/// - alice, chat 1111, following Politics
/// - bob, chat 2222, following Sports
///
/// Then it loads the active subscribers through the directory and routes a
/// four-article batch (two Politics, one Sports, one Unknown) through the same
/// planning code the worker uses, asserting that alice receives the two
/// Politics articles, bob the single Sports article, and nobody the Unknown
/// one.
#[tokio::test]
async fn test_topic_subscription_routing() {
    let pool = setup_pool().await;

    let config = config_with(vec![
        subscriber_config("alice", "Alice", 1111, &["Politics"]),
        subscriber_config("bob", "Bob", 2222, &["Sports"]),
    ]);
    common::sync_subscribers(&config, &pool)
        .await
        .expect("sync subscribers");

    let directory = SqliteDirectory::new(pool.clone());
    let subscribers = directory
        .active_subscribers()
        .await
        .expect("load subscribers");
    assert_eq!(subscribers.len(), 2);

    let alice = subscribers
        .iter()
        .find(|s| s.username == "alice")
        .expect("alice present");
    assert_eq!(alice.chat_id, 1111);
    assert_eq!(alice.display_name, "Alice");
    assert!(alice.topics.contains("Politics"));
    assert!(!alice.topics.contains("Sports"));

    let batch = vec![
        Article::new("A", "Politics", "1h", "https://x.test/a"),
        Article::new("B", "Sports", "1h", "https://x.test/b"),
        Article::new("C", "Politics", "1h", "https://x.test/c"),
        Article::new("D", "Unknown", "1h", "https://x.test/d"),
    ];
    let deliveries = plan_deliveries("BBC", batch.len(), &batch, &subscribers);

    let to_alice = deliveries.iter().filter(|d| d.chat_id == 1111).count();
    let to_bob = deliveries.iter().filter(|d| d.chat_id == 2222).count();
    assert_eq!(to_alice, 2, "alice follows Politics and there were two");
    assert_eq!(to_bob, 1, "bob follows Sports and there was one");
    assert_eq!(deliveries.len(), 3, "the Unknown article reaches nobody");

    for delivery in &deliveries {
        if delivery.chat_id == 1111 {
            assert!(delivery.text.starts_with("Alice, "));
        } else {
            assert!(delivery.text.starts_with("Bob, "));
        }
    }
}

/// A session row whose username no longer resolves must be skipped, not fail
/// the whole load.
#[tokio::test]
async fn test_dangling_session_is_skipped() {
    let pool = setup_pool().await;

    let config = config_with(vec![subscriber_config("alice", "Alice", 1111, &["Politics"])]);
    common::sync_subscribers(&config, &pool)
        .await
        .expect("sync subscribers");

    // Orphan session left behind by an out-of-band deletion
    let _ = sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&pool)
        .await;
    sqlx::query("INSERT INTO subscriber_sessions (chat_id, username) VALUES (9999, 'ghost')")
        .execute(&pool)
        .await
        .expect("insert orphan session");

    let directory = SqliteDirectory::new(pool.clone());

    let ids = directory.list_active_chat_ids().await.expect("sessions");
    assert_eq!(ids.len(), 2, "both sessions are listed");

    assert!(
        directory.resolve(9999).await.expect("resolve").is_none(),
        "the orphan resolves to nothing"
    );

    let subscribers = directory
        .active_subscribers()
        .await
        .expect("load subscribers");
    assert_eq!(subscribers.len(), 1);
    assert_eq!(subscribers[0].username, "alice");
}

/// Subscribers configured without a chat_id are registered but get no session,
/// so the delivery fan-out never sees them.
#[tokio::test]
async fn test_subscriber_without_chat_is_unreachable() {
    let pool = setup_pool().await;

    let mut pending = subscriber_config("carol", "Carol", 0, &["Politics"]);
    pending.chat_id = None;
    let config = config_with(vec![pending]);
    common::sync_subscribers(&config, &pool)
        .await
        .expect("sync subscribers");

    let registered: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscribers")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(registered, 1);

    let directory = SqliteDirectory::new(pool);
    let subscribers = directory
        .active_subscribers()
        .await
        .expect("load subscribers");
    assert!(subscribers.is_empty());
}

/// Without a configured display name the greeting falls back to the username.
#[tokio::test]
async fn test_display_name_falls_back_to_username() {
    let pool = setup_pool().await;

    let mut plain = subscriber_config("dave", "", 3333, &["Politics"]);
    plain.display_name = None;
    let config = config_with(vec![plain]);
    common::sync_subscribers(&config, &pool)
        .await
        .expect("sync subscribers");

    let directory = SqliteDirectory::new(pool);
    let resolved = directory
        .resolve(3333)
        .await
        .expect("resolve")
        .expect("dave present");
    assert_eq!(resolved.display_name, "dave");
}
