//! REST API client for the Gwont backend.
//!
//! Three facades share one `ApiClient` transport:
//! - `PublicApi`: anonymous requests and the credential exchanges
//! - `AdminApi`: requests carrying the admin access token
//! - `UserApi`: requests carrying the selected avatar's delegated token
//!
//! Bodies are JSON. Nothing is retried; non-2xx responses are logged and
//! handed back to the caller.

pub mod authenticated;
pub mod client;
pub mod dto;
pub mod error;

pub use authenticated::{AdminApi, UserApi};
pub use client::{ApiClient, PublicApi, DEFAULT_API_HOST, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
