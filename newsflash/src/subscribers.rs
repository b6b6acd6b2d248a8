use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::collections::HashSet;

/// A subscriber resolved to everything routing needs: where to deliver,
/// how to greet them, and which topics they follow.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub chat_id: i64,
    pub username: String,
    pub display_name: String,
    pub topics: HashSet<String>,
}

/// Read-only view over the auth/preferences subsystem's data.
/// The pipeline never mutates subscriber state through this seam.
#[async_trait::async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// Chat ids with a live session.
    async fn list_active_chat_ids(&self) -> Result<Vec<i64>>;

    /// Resolve one chat id to its subscriber, or None for a dangling session.
    async fn resolve(&self, chat_id: i64) -> Result<Option<Subscriber>>;

    /// All resolvable active subscribers, in session order.
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>> {
        let mut subscribers = Vec::new();
        for chat_id in self.list_active_chat_ids().await? {
            if let Some(subscriber) = self.resolve(chat_id).await? {
                subscribers.push(subscriber);
            }
        }
        Ok(subscribers)
    }
}

/// Directory backed by the shared sqlite database.
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SubscriberDirectory for SqliteDirectory {
    async fn list_active_chat_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT chat_id FROM subscriber_sessions")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list active sessions")?;
        Ok(ids)
    }

    async fn resolve(&self, chat_id: i64) -> Result<Option<Subscriber>> {
        let row = sqlx::query_as::<_, SubscriberRow>(
            r#"
            SELECT s.chat_id, s.username, COALESCE(u.display_name, s.username) AS display_name
            FROM subscriber_sessions s
            JOIN subscribers u ON u.username = s.username
            WHERE s.chat_id = ?
            "#,
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to resolve subscriber")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let topics = sqlx::query_scalar::<_, String>(
            r#"
            SELECT t.name
            FROM subscriber_topics st
            JOIN topics t ON t.id = st.topic_id
            WHERE st.username = ?
            "#,
        )
        .bind(&row.username)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to load topics for {}", row.username))?;

        Ok(Some(Subscriber {
            chat_id: row.chat_id,
            username: row.username,
            display_name: row.display_name,
            topics: topics.into_iter().collect(),
        }))
    }
}

// Internal row type for SQLx mapping
#[derive(sqlx::FromRow)]
struct SubscriberRow {
    chat_id: i64,
    username: String,
    display_name: String,
}
