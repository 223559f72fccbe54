//! Electronic tax document (DTE) model.
//!
//! Tracks the transmission lifecycle of a generated document:
//! `PENDIENTE → PROCESADO` on acceptance by the tax authority,
//! `PENDIENTE → RECHAZADO` on rejection or retry exhaustion.

use chrono::{DateTime, Utc};
use facel_core::{TenantAware, TenantId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Document transmission states, in the tax authority's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DteStatus {
    #[serde(rename = "PENDIENTE")]
    Pendiente,
    #[serde(rename = "PROCESADO")]
    Procesado,
    #[serde(rename = "RECHAZADO")]
    Rechazado,
}

impl DteStatus {
    /// Database representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DteStatus::Pendiente => "PENDIENTE",
            DteStatus::Procesado => "PROCESADO",
            DteStatus::Rechazado => "RECHAZADO",
        }
    }
}

impl fmt::Display for DteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDIENTE" => Ok(DteStatus::Pendiente),
            "PROCESADO" => Ok(DteStatus::Procesado),
            "RECHAZADO" => Ok(DteStatus::Rechazado),
            other => Err(format!("unknown document status: {other}")),
        }
    }
}

/// A generated tax document awaiting or past transmission.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DteDocument {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub generation_code: Uuid,
    pub control_number: String,
    pub document_type: String,
    pub environment: String,
    pub status: String,
    /// Receipt seal issued by the tax authority on acceptance.
    pub reception_seal: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Observations returned by the tax authority (JSON array of strings).
    pub observations: serde_json::Value,
    pub attempt_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantAware for DteDocument {
    fn tenant_id(&self) -> TenantId {
        TenantId::from_uuid(self.tenant_id)
    }
}

/// Request to register a document for transmission.
#[derive(Debug, Clone)]
pub struct CreateDteDocument {
    pub generation_code: Uuid,
    pub control_number: String,
    pub document_type: String,
    pub environment: String,
}

impl DteDocument {
    /// Register a new document in `PENDIENTE` state.
    pub async fn create(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        input: CreateDteDocument,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO dte_documents (
                tenant_id, generation_code, control_number, document_type, environment
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(input.generation_code)
        .bind(&input.control_number)
        .bind(&input.document_type)
        .bind(&input.environment)
        .fetch_one(pool)
        .await
    }

    /// Find a document by ID within a tenant.
    pub async fn find_by_id(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM dte_documents
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Find a document by its generation code within a tenant.
    pub async fn find_by_generation_code(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        generation_code: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM dte_documents
            WHERE tenant_id = $1 AND generation_code = $2
            "#,
        )
        .bind(tenant_id)
        .bind(generation_code)
        .fetch_optional(pool)
        .await
    }

    /// Increment the attempt counter; one increment per job attempt.
    pub async fn increment_attempts(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE dte_documents
            SET attempt_count = attempt_count + 1, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Mark accepted: store the receipt seal, processing timestamp and
    /// observations, and flip the state to `PROCESADO`.
    pub async fn mark_procesado(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
        reception_seal: &str,
        processed_at: DateTime<Utc>,
        observations: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE dte_documents SET
                status = 'PROCESADO',
                reception_seal = $3,
                processed_at = $4,
                observations = $5,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(reception_seal)
        .bind(processed_at)
        .bind(observations)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Mark rejected (terminal).
    pub async fn mark_rechazado(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
        observations: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE dte_documents SET
                status = 'RECHAZADO',
                observations = $3,
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(observations)
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [DteStatus::Pendiente, DteStatus::Procesado, DteStatus::Rechazado] {
            assert_eq!(status.as_str().parse::<DteStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_serde_uses_spanish_vocabulary() {
        let json = serde_json::to_string(&DteStatus::Procesado).unwrap();
        assert_eq!(json, "\"PROCESADO\"");
    }
}
