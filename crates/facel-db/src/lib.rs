//! Database layer for the facel delivery engine.
//!
//! Provides sqlx models for webhook endpoints, subscriptions and deliveries,
//! plus DTE documents, transmission jobs and the append-only transmission
//! audit log. All queries are tenant-scoped: the tenant id is always bound
//! in the WHERE clause.

pub mod bootstrap;
pub mod error;
pub mod migrations;
pub mod models;

pub use error::DbError;
pub use migrations::run_migrations;
