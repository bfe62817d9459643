//! Conversation persistence.

use sqlx::SqlitePool;

use crate::error::{map_unique, DatabaseError, Result};
use crate::models::{Conversation, STATUS_ACTIVE, STATUS_ARCHIVED};

/// Create a new active conversation with `last_sequence = 0`.
pub async fn create_conversation(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
    story_id: &str,
    now: &str,
) -> Result<Conversation> {
    sqlx::query(
        r#"
        INSERT INTO conversations (id, user_id, story_id, status, last_sequence, created_at, updated_at)
        VALUES (?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(story_id)
    .bind(STATUS_ACTIVE)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| map_unique(e, "Conversation", id))?;

    Ok(Conversation {
        id: id.to_string(),
        user_id: user_id.to_string(),
        story_id: story_id.to_string(),
        status: STATUS_ACTIVE.to_string(),
        last_sequence: 0,
        created_at: now.to_string(),
        updated_at: now.to_string(),
    })
}

/// Get a conversation by ID.
pub async fn get_conversation(pool: &SqlitePool, id: &str) -> Result<Conversation> {
    sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, user_id, story_id, status, last_sequence, created_at, updated_at
        FROM conversations
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Conversation",
        id: id.to_string(),
    })
}

/// Find the most recent active conversation for a user and story.
pub async fn find_active_conversation(
    pool: &SqlitePool,
    user_id: &str,
    story_id: &str,
) -> Result<Option<Conversation>> {
    let record = sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, user_id, story_id, status, last_sequence, created_at, updated_at
        FROM conversations
        WHERE user_id = ? AND story_id = ? AND status = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(story_id)
    .bind(STATUS_ACTIVE)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Archive a conversation. Archiving twice is a no-op.
pub async fn archive_conversation(pool: &SqlitePool, id: &str, now: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE conversations
        SET status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(STATUS_ARCHIVED)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Conversation",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// List a user's conversations, newest first.
pub async fn list_conversations(pool: &SqlitePool, user_id: &str) -> Result<Vec<Conversation>> {
    let conversations = sqlx::query_as::<_, Conversation>(
        r#"
        SELECT id, user_id, story_id, status, last_sequence, created_at, updated_at
        FROM conversations
        WHERE user_id = ?
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(conversations)
}
