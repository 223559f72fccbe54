//! External reception API client.
//!
//! The fiscal authority's reception service accepts signed documents and
//! answers status queries. The trait seam lets the worker and the status
//! service run against a fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransmissionError;

/// Bearer credentials for the reception API. Each tenant authenticates
/// with its own token, so credentials travel with every request rather
/// than living in the client.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub token: String,
}

impl ApiCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("token", &"[redacted]")
            .finish()
    }
}

/// One document submission.
#[derive(Debug, Clone, Serialize)]
pub struct TransmitRequest {
    pub generation_code: Uuid,
    pub control_number: String,
    pub document_type: String,
    pub environment: String,
    /// Sent as the Authorization header, never in the body.
    #[serde(skip)]
    pub credentials: ApiCredentials,
}

/// Verdict of the reception service on one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Procesado,
    Rechazado,
}

/// Receipt returned for a processed submission.
#[derive(Debug, Clone)]
pub struct TransmitReceipt {
    pub status: ReceiptStatus,
    /// Seal issued on acceptance; absent on rejection.
    pub reception_seal: Option<String>,
    pub processed_at: DateTime<Utc>,
    pub observations: Vec<String>,
}

/// Remote answer to a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Procesado,
    Rechazado,
    NoEncontrado,
}

/// Client seam for the reception API.
#[async_trait]
pub trait TransmitClient: Send + Sync {
    /// Submit a document. `Err` means the verdict is unknown (transport or
    /// server failure) and the attempt may be retried; a `Rechazado` receipt
    /// is a definitive answer, not an error.
    async fn transmit(&self, request: &TransmitRequest)
        -> Result<TransmitReceipt, TransmissionError>;

    /// Query the remote status of a previously submitted document with the
    /// supplied credentials.
    async fn query_status(
        &self,
        generation_code: Uuid,
        credentials: &ApiCredentials,
        environment: &str,
    ) -> Result<RemoteStatus, TransmissionError>;
}

// ---------------------------------------------------------------------------
// Wire format of the reception service
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ReceptionResponse {
    estado: String,
    #[serde(rename = "selloRecibido")]
    sello_recibido: Option<String>,
    #[serde(rename = "fhProcesamiento")]
    fh_procesamiento: Option<DateTime<Utc>>,
    #[serde(default)]
    observaciones: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    estado: String,
}

/// Production client over HTTP with per-request bearer-token auth.
#[derive(Debug, Clone)]
pub struct HttpTransmitClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransmitClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, TransmissionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransmissionError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn parse_receipt(response: ReceptionResponse) -> Result<TransmitReceipt, TransmissionError> {
        let status = match response.estado.as_str() {
            "PROCESADO" => ReceiptStatus::Procesado,
            "RECHAZADO" => ReceiptStatus::Rechazado,
            other => {
                return Err(TransmissionError::InvalidResponse(format!(
                    "unknown estado: {other}"
                )))
            }
        };

        Ok(TransmitReceipt {
            status,
            reception_seal: response.sello_recibido,
            processed_at: response.fh_procesamiento.unwrap_or_else(Utc::now),
            observations: response.observaciones,
        })
    }
}

#[async_trait]
impl TransmitClient for HttpTransmitClient {
    async fn transmit(
        &self,
        request: &TransmitRequest,
    ) -> Result<TransmitReceipt, TransmissionError> {
        let url = format!("{}/recepciondte", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&request.credentials.token)
            .json(request)
            .send()
            .await
            .map_err(|e| TransmissionError::Remote(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(TransmissionError::Remote(format!(
                "reception service returned {status}"
            )));
        }

        let parsed: ReceptionResponse = response
            .json()
            .await
            .map_err(|e| TransmissionError::InvalidResponse(e.to_string()))?;

        Self::parse_receipt(parsed)
    }

    async fn query_status(
        &self,
        generation_code: Uuid,
        credentials: &ApiCredentials,
        environment: &str,
    ) -> Result<RemoteStatus, TransmissionError> {
        let url = format!("{}/consultadte/{generation_code}", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&credentials.token)
            .query(&[("ambiente", environment)])
            .send()
            .await
            .map_err(|e| TransmissionError::Remote(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(RemoteStatus::NoEncontrado);
        }
        if response.status().is_server_error() {
            return Err(TransmissionError::Remote(format!(
                "status service returned {}",
                response.status()
            )));
        }

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| TransmissionError::InvalidResponse(e.to_string()))?;

        match parsed.estado.as_str() {
            "PROCESADO" => Ok(RemoteStatus::Procesado),
            "RECHAZADO" => Ok(RemoteStatus::Rechazado),
            "NO_ENCONTRADO" => Ok(RemoteStatus::NoEncontrado),
            other => Err(TransmissionError::InvalidResponse(format!(
                "unknown estado: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepted_receipt() {
        let receipt = HttpTransmitClient::parse_receipt(ReceptionResponse {
            estado: "PROCESADO".to_string(),
            sello_recibido: Some("SELLO123".to_string()),
            fh_procesamiento: Some(Utc::now()),
            observaciones: vec![],
        })
        .unwrap();

        assert_eq!(receipt.status, ReceiptStatus::Procesado);
        assert_eq!(receipt.reception_seal.as_deref(), Some("SELLO123"));
    }

    #[test]
    fn test_parse_rejected_receipt_keeps_observations() {
        let receipt = HttpTransmitClient::parse_receipt(ReceptionResponse {
            estado: "RECHAZADO".to_string(),
            sello_recibido: None,
            fh_procesamiento: None,
            observaciones: vec!["firma inválida".to_string()],
        })
        .unwrap();

        assert_eq!(receipt.status, ReceiptStatus::Rechazado);
        assert!(receipt.reception_seal.is_none());
        assert_eq!(receipt.observations, vec!["firma inválida"]);
    }

    #[test]
    fn test_request_body_never_carries_credentials() {
        let request = TransmitRequest {
            generation_code: Uuid::new_v4(),
            control_number: "DTE-01-00000001".to_string(),
            document_type: "01".to_string(),
            environment: "00".to_string(),
            credentials: ApiCredentials::new("tenant-token"),
        };

        let body = serde_json::to_string(&request).unwrap();
        assert!(!body.contains("tenant-token"));
        assert!(!body.contains("credentials"));
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let rendered = format!("{:?}", ApiCredentials::new("tenant-token"));
        assert!(!rendered.contains("tenant-token"));
    }

    #[test]
    fn test_parse_unknown_estado_rejected() {
        let result = HttpTransmitClient::parse_receipt(ReceptionResponse {
            estado: "EN_PROCESO".to_string(),
            sello_recibido: None,
            fh_procesamiento: None,
            observaciones: vec![],
        });
        assert!(matches!(result, Err(TransmissionError::InvalidResponse(_))));
    }
}
