//! Gatehouse - Request Governance for Web Services
//!
//! This crate wraps request handlers in a governance layer: a fixed-window
//! rate limiter admits or rejects each caller, admitted handlers run under an
//! audit recorder, and failures are classified into stable, caller-safe
//! responses. Stateless sanitizers and validators cover untrusted input.

pub mod audit;
pub mod config;
pub mod error;
pub mod errors;
pub mod governance;
pub mod http;
pub mod ratelimit;
pub mod security;
