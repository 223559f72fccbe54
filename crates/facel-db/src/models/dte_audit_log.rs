//! Append-only transmission audit log.
//!
//! One row per transmission attempt (success, intermediate failure or
//! terminal failure). Rows are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An immutable audit entry for a document transmission attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DteAuditLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub document_id: Uuid,
    pub action: String,
    pub status: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl DteAuditLog {
    /// Append an audit row.
    pub async fn append(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        document_id: Uuid,
        action: &str,
        status: &str,
        message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO dte_audit_logs (tenant_id, document_id, action, status, message)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .bind(action)
        .bind(status)
        .bind(message)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// List audit rows for a document, oldest first.
    pub async fn list_for_document(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM dte_audit_logs
            WHERE tenant_id = $1 AND document_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .fetch_all(pool)
        .await
    }
}
