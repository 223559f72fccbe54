//! Startup bootstrap tasks.

pub mod event_types;

pub use event_types::seed_event_types;
