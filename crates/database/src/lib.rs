//! SQLite persistence layer for Troupe.
//!
//! This crate provides async database operations for conversations, their
//! ordered transcripts and the model endpoint pool using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use database::{conversation, message, Database, NewMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:troupe.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let now = "2026-01-01T00:00:00Z";
//!     conversation::create_conversation(db.pool(), "conv-1", "user-1", "story-1", now).await?;
//!
//!     let user_line = NewMessage {
//!         role: "user",
//!         character_id: None,
//!         character_name: None,
//!         content: "hi",
//!     };
//!     let stored = message::append_message(db.pool(), "conv-1", &user_line, now).await?;
//!     assert_eq!(stored.sequence, 1);
//!
//!     Ok(())
//! }
//! ```

pub mod conversation;
pub mod error;
pub mod message;
pub mod model_endpoint;
pub mod models;

pub use error::{DatabaseError, Result};
pub use models::{Conversation, ConversationMessage, ModelEndpointRecord, NewMessage};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/troupe.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing; keep a single connection)
    /// let db = database::Database::connect_with_pool_size("sqlite::memory:", 1).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!("Connected to database: {} (pool size: {})", url, pool_size);

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
