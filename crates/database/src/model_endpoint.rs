//! Model endpoint persistence and usage accounting.

use sqlx::SqlitePool;

use crate::error::{map_unique, DatabaseError, Result};
use crate::models::ModelEndpointRecord;

/// Insert a model endpoint.
pub async fn insert_endpoint(pool: &SqlitePool, endpoint: &ModelEndpointRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO model_endpoints (
            id, capability, base_url, api_key, model,
            temperature, max_tokens, top_p, presence_penalty, frequency_penalty,
            usage_count, last_used, status
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&endpoint.id)
    .bind(&endpoint.capability)
    .bind(&endpoint.base_url)
    .bind(&endpoint.api_key)
    .bind(&endpoint.model)
    .bind(endpoint.temperature)
    .bind(endpoint.max_tokens)
    .bind(endpoint.top_p)
    .bind(endpoint.presence_penalty)
    .bind(endpoint.frequency_penalty)
    .bind(endpoint.usage_count)
    .bind(&endpoint.last_used)
    .bind(&endpoint.status)
    .execute(pool)
    .await
    .map_err(|e| map_unique(e, "ModelEndpoint", &endpoint.id))?;

    Ok(())
}

/// Get an endpoint by ID.
pub async fn get_endpoint(pool: &SqlitePool, id: &str) -> Result<ModelEndpointRecord> {
    sqlx::query_as::<_, ModelEndpointRecord>(
        r#"
        SELECT id, capability, base_url, api_key, model,
               temperature, max_tokens, top_p, presence_penalty, frequency_penalty,
               usage_count, last_used, status
        FROM model_endpoints
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "ModelEndpoint",
        id: id.to_string(),
    })
}

/// Active endpoints of a capability class, in insertion order.
pub async fn list_active_endpoints(
    pool: &SqlitePool,
    capability: &str,
) -> Result<Vec<ModelEndpointRecord>> {
    let rows = sqlx::query_as::<_, ModelEndpointRecord>(
        r#"
        SELECT id, capability, base_url, api_key, model,
               temperature, max_tokens, top_p, presence_penalty, frequency_penalty,
               usage_count, last_used, status
        FROM model_endpoints
        WHERE capability = ? AND status = 'active'
        ORDER BY rowid ASC
        "#,
    )
    .bind(capability)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Increment the usage counter and stamp `last_used`.
pub async fn record_usage(pool: &SqlitePool, id: &str, used_at: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE model_endpoints
        SET usage_count = usage_count + 1, last_used = ?
        WHERE id = ?
        "#,
    )
    .bind(used_at)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "ModelEndpoint",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Set an endpoint's status ("active" or "inactive").
pub async fn set_endpoint_status(pool: &SqlitePool, id: &str, status: &str) -> Result<()> {
    if status != "active" && status != "inactive" {
        return Err(DatabaseError::Invalid(format!(
            "unknown endpoint status: {}",
            status
        )));
    }

    let result = sqlx::query(
        r#"
        UPDATE model_endpoints
        SET status = ?
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "ModelEndpoint",
            id: id.to_string(),
        });
    }

    Ok(())
}
