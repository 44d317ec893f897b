//! HTTP surface for the governance layer.
//!
//! Thin axum wiring: every business route runs through
//! [`Governance::run`](crate::governance::Governance::run).

mod health;
mod routes;
mod server;

pub use health::{HealthCheck, HealthRegistry, HealthReport};
pub use routes::{router, AppState};
pub use server::HttpServer;
