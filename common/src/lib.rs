/*!
common/src/lib.rs

Shared configuration types and DB helper functions for Newsflash.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file
- Helpers to initialize an SQLite database pool
- Syncing of configured subscribers into the database
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/newsflash.db")
    pub path: String,
}

/// Scheduler (scrape cadence) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between the start of one scrape cycle and the next
    pub interval_seconds: u64,
}

/// Page fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
    pub max_attempts: Option<u32>,
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Base URL of the Bot API (override for tests; defaults to the public endpoint)
    pub api_url: Option<String>,
    /// Name of the environment variable holding the bot token
    pub token_env: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Per-subscriber configuration (subscribers are defined in the global config file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberConfig {
    pub username: String,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    /// Telegram chat to deliver to; without it the subscriber is registered but unreachable
    pub chat_id: Option<i64>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub fetch: Option<FetchConfig>,
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub subscribers: Vec<SubscriberConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Initialize an SQLite connection pool.
///
/// This function will create the parent directory if necessary, ensure the DB file exists
/// (attempting to create it if missing), and return a configured `SqlitePool`. Defaults are
/// conservative for resource-constrained platforms:
/// - max_connections: 5
/// - connection timeout default provided by `sqlx`
///
/// Example:
///   let pool = init_db_pool("data/newsflash.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = Path::new(path).parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create DB parent directory: {}", parent.display())
        })?;
    }

    // Try to create the DB file if it does not already exist. This gives a clearer error
    // earlier (filesystem permission or path issues) instead of only surfacing it via the
    // SQLite connection attempt.
    tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to create or open DB file: {}", path))?;

    // Schema bootstrap is executed explicitly by the caller (for example, from `main`)
    // once a `SqlitePool` is available.

    // Use a modest pool size for RPI and similar devices. Provide more context on connect errors.
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}

/// Ensure that subscribers defined in the in-memory configuration are present in the database.
/// This function will:
///  - INSERT OR IGNORE a row for each configured subscriber (so it is safe to call multiple times)
///  - UPDATE `display_name` and `password_hash` if those fields are provided in the config
///  - register the subscriber's Telegram chat when `chat_id` is set
///  - add topic preference rows for each listed topic (creating missing topics)
/// The sync is additive: rows absent from the config are left untouched.
/// Usage: call this once after the schema bootstrap so routing sees the configured subscribers.
pub async fn sync_subscribers(config: &Config, pool: &SqlitePool) -> Result<()> {
    for s in &config.subscribers {
        sqlx::query(
            "INSERT OR IGNORE INTO subscribers (username, display_name, password_hash) VALUES (?, ?, ?)"
        )
        .bind(&s.username)
        .bind(s.display_name.clone())
        .bind(s.password_hash.clone())
        .execute(pool)
        .await
        .with_context(|| format!("failed to insert or ignore subscriber {}", s.username))?;

        // Update fields if provided in config (COALESCE keeps existing values if None provided)
        sqlx::query(
            "UPDATE subscribers SET display_name = COALESCE(?, display_name), password_hash = COALESCE(?, password_hash) WHERE username = ?"
        )
        .bind(s.display_name.clone())
        .bind(s.password_hash.clone())
        .bind(&s.username)
        .execute(pool)
        .await
        .with_context(|| format!("failed to update subscriber {}", s.username))?;

        if let Some(chat_id) = s.chat_id {
            sqlx::query(
                "INSERT OR REPLACE INTO subscriber_sessions (chat_id, username) VALUES (?, ?)"
            )
            .bind(chat_id)
            .bind(&s.username)
            .execute(pool)
            .await
            .with_context(|| format!("failed to register chat for subscriber {}", s.username))?;
        }

        for topic in &s.topics {
            sqlx::query("INSERT OR IGNORE INTO topics (name) VALUES (?)")
                .bind(topic)
                .execute(pool)
                .await
                .with_context(|| format!("failed to ensure topic {}", topic))?;

            sqlx::query(
                "INSERT OR IGNORE INTO subscriber_topics (username, topic_id) \
                 SELECT ?, id FROM topics WHERE name = ?"
            )
            .bind(&s.username)
            .bind(topic)
            .execute(pool)
            .await
            .with_context(|| {
                format!("failed to link subscriber {} to topic {}", s.username, topic)
            })?;
        }
    }

    Ok(())
}
