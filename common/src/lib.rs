//! Shared primitives for the Headlamp gateway workspace.
//!
//! This crate holds the small types every other crate leans on:
//!
//! - [`ErrorLocation`]: call-site capture for structured errors
//! - [`RedactedToken`]: bearer tokens that never leak into logs
//! - [`HttpStatusCode`]: status categorisation for retry decisions
//!
//! ## Architecture
//!
//! - **common** (this crate): shared primitives
//! - **gateway-core**: supervisor, materializer, gateway and handshake logic
//! - **headlamp-gateway**: host binary wiring everything together

pub mod error;
pub mod http_status;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_token::RedactedToken;

#[cfg(test)]
mod tests;
