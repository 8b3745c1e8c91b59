//! HTTP handlers for relay-service.

pub mod health;
pub mod relay;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use relay::{relay, relay_handler};
