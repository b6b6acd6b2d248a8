use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::article::{self, Article};

/// Ensure the required schema exists. This runs CREATE TABLE IF NOT EXISTS
/// statements for core tables. Idempotent and safe to call at startup.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    tracing::info!("storage: ensuring DB schema (CREATE TABLE IF NOT EXISTS ...)");
    let stmts = [
        r#"
        CREATE TABLE IF NOT EXISTS topics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            publication_time TEXT,
            link TEXT NOT NULL UNIQUE,
            topic_id INTEGER,
            seen_at TIMESTAMP,
            FOREIGN KEY(topic_id) REFERENCES topics(id)
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS subscribers (
            username TEXT PRIMARY KEY,
            display_name TEXT,
            password_hash TEXT
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS subscriber_sessions (
            chat_id INTEGER PRIMARY KEY,
            username TEXT NOT NULL,
            FOREIGN KEY(username) REFERENCES subscribers(username) ON DELETE CASCADE
        );
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS subscriber_topics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            topic_id INTEGER NOT NULL,
            FOREIGN KEY(username) REFERENCES subscribers(username) ON DELETE CASCADE,
            FOREIGN KEY(topic_id) REFERENCES topics(id) ON DELETE CASCADE,
            UNIQUE(username, topic_id)
        );
        "#,
    ];

    for s in &stmts {
        sqlx::query(s)
            .execute(pool)
            .await
            .with_context(|| "failed to ensure schema")?;
    }

    Ok(())
}

/// Whether an article with this link has already been persisted.
pub async fn article_exists(pool: &SqlitePool, link: &str) -> Result<bool> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM articles WHERE link = ?")
        .bind(link)
        .fetch_optional(pool)
        .await
        .context("failed to check existing article")?;
    Ok(existing.is_some())
}

/// Get-or-create a topic row by name, returning its id.
pub async fn ensure_topic(pool: &SqlitePool, name: &str) -> Result<i64> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM topics WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("failed to look up topic")?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query_scalar::<_, i64>("INSERT INTO topics (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to insert topic {}", name))?;

    Ok(id)
}

/// Persist an article unless its link is already known.
/// Returns true iff the article was newly inserted. The check-then-insert
/// sequence is safe under the single-worker model; the UNIQUE constraint on
/// `link` backs it if concurrent writers are ever introduced.
pub async fn insert_if_new(pool: &SqlitePool, article: &Article) -> Result<bool> {
    if article_exists(pool, &article.link).await? {
        debug!("Article already exists in the database: {}", article.title);
        return Ok(false);
    }

    let topic_id = ensure_topic(pool, &article.subject).await?;

    sqlx::query(
        r#"
        INSERT INTO articles (title, publication_time, link, topic_id, seen_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&article.title)
    .bind(&article.publication_time)
    .bind(&article.link)
    .bind(topic_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .with_context(|| format!("failed to insert article {}", article.link))?;

    Ok(true)
}

/// Known topic names, excluding the placeholder sentinels. This is what the
/// preferences subsystem offers as subscribable options.
pub async fn list_topics(pool: &SqlitePool) -> Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT name FROM topics WHERE name NOT IN (?, ?) ORDER BY name",
    )
    .bind(article::UNKNOWN_SUBJECT)
    .bind(article::NOT_APPLICABLE)
    .fetch_all(pool)
    .await
    .context("failed to list topics")?;
    Ok(names)
}

/// Delete every stored article. Topics are kept. Returns the number removed.
pub async fn clear_articles(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM articles")
        .execute(pool)
        .await
        .context("failed to clear articles")?;
    Ok(result.rows_affected())
}
