//! API Module
//!
//! HTTP surface of the emulator: authentication, request dispatch to the
//! lifecycle engines, metrics and the server bootstrap.

pub mod auth;
pub mod metrics;
pub mod rest;
pub mod server;

pub use auth::{AllowAll, Authenticator, TokenAuthenticator};
pub use metrics::ApiMetrics;
pub use rest::{ApiErrorResponse, RestRouter};
pub use server::{ApiServer, ApiServerConfig};
