//! Conversation message persistence and sequencing.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{ConversationMessage, NewMessage, STATUS_ACTIVE};

const VALID_ROLES: [&str; 3] = ["user", "narrator", "character"];

/// Append a message at `last_sequence + 1`.
///
/// The counter bump and the insert share one transaction, so two appends
/// can never observe the same `last_sequence`. Fails with `NotFound` for an
/// unknown conversation and `Archived` for an archived one.
pub async fn append_message(
    pool: &SqlitePool,
    conversation_id: &str,
    message: &NewMessage<'_>,
    now: &str,
) -> Result<ConversationMessage> {
    if !VALID_ROLES.contains(&message.role) {
        return Err(DatabaseError::Invalid(format!(
            "unknown message role: {}",
            message.role
        )));
    }

    let mut tx = pool.begin().await?;

    let sequence: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE conversations
        SET last_sequence = last_sequence + 1, updated_at = ?
        WHERE id = ? AND status = ?
        RETURNING last_sequence
        "#,
    )
    .bind(now)
    .bind(conversation_id)
    .bind(STATUS_ACTIVE)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(sequence) = sequence else {
        let exists: Option<String> =
            sqlx::query_scalar("SELECT status FROM conversations WHERE id = ?")
                .bind(conversation_id)
                .fetch_optional(&mut *tx)
                .await?;
        tx.rollback().await?;

        return Err(match exists {
            Some(_) => DatabaseError::Archived(conversation_id.to_string()),
            None => DatabaseError::NotFound {
                entity: "Conversation",
                id: conversation_id.to_string(),
            },
        });
    };

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO conversation_messages
            (conversation_id, role, character_id, character_name, content, sequence, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(conversation_id)
    .bind(message.role)
    .bind(message.character_id)
    .bind(message.character_name)
    .bind(message.content)
    .bind(sequence)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(ConversationMessage {
        id,
        conversation_id: conversation_id.to_string(),
        role: message.role.to_string(),
        character_id: message.character_id.map(str::to_string),
        character_name: message.character_name.map(str::to_string),
        content: message.content.to_string(),
        sequence,
        created_at: now.to_string(),
    })
}

/// The last `limit` messages of a conversation, in sequence order.
pub async fn recent_messages(
    pool: &SqlitePool,
    conversation_id: &str,
    limit: i64,
) -> Result<Vec<ConversationMessage>> {
    let rows = sqlx::query_as::<_, ConversationMessage>(
        r#"
        SELECT id, conversation_id, role, character_id, character_name, content, sequence, created_at
        FROM (
            SELECT id, conversation_id, role, character_id, character_name, content, sequence, created_at
            FROM conversation_messages
            WHERE conversation_id = ?
            ORDER BY sequence DESC
            LIMIT ?
        )
        ORDER BY sequence ASC
        "#,
    )
    .bind(conversation_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every message of a conversation, in sequence order.
pub async fn list_messages(
    pool: &SqlitePool,
    conversation_id: &str,
) -> Result<Vec<ConversationMessage>> {
    let rows = sqlx::query_as::<_, ConversationMessage>(
        r#"
        SELECT id, conversation_id, role, character_id, character_name, content, sequence, created_at
        FROM conversation_messages
        WHERE conversation_id = ?
        ORDER BY sequence ASC
        "#,
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Delete every message with `sequence > target`. Returns the number removed.
///
/// `last_sequence` is left as is, so later appends never reuse a deleted
/// sequence number.
pub async fn delete_messages_after(
    pool: &SqlitePool,
    conversation_id: &str,
    target_sequence: i64,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM conversation_messages
        WHERE conversation_id = ? AND sequence > ?
        "#,
    )
    .bind(conversation_id)
    .bind(target_sequence)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
