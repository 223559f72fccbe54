//! facel core library
//!
//! Shared types for the facel delivery platform.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (`TenantId`, `EndpointId`, ...)
//! - [`traits`] - Multi-tenant traits (`TenantAware`)

pub mod ids;
pub mod traits;

pub use ids::{DeliveryId, DocumentId, EndpointId, ParseIdError, TenantId};
pub use traits::TenantAware;
