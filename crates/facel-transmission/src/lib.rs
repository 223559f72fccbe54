//! Tax document transmission to the fiscal authority.
//!
//! Wraps the external reception API behind a client trait, drives queued
//! transmissions with bounded retries, and answers status queries from
//! local state with a remote fallback.

pub mod client;
pub mod error;
pub mod handlers;
pub mod router;
pub mod service;
pub mod status;
pub mod worker;

pub use client::{
    ApiCredentials, HttpTransmitClient, ReceiptStatus, TransmitClient, TransmitReceipt,
    TransmitRequest,
};
pub use error::TransmissionError;
pub use router::{transmission_router, TransmissionState};
pub use service::TransmissionService;
pub use status::{StatusReport, StatusService};
pub use worker::{TransmissionWorker, TransmissionWorkerConfig};
