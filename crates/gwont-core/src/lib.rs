//! Core library for the Gwont companion.
//!
//! Captured game pages are forwarded to the Gwont backend under an
//! administrator identity that can act as individual avatars:
//!
//! - `token`: unsigned JWT payload decoding and expiry checks
//! - `store`: durable key/value persistence for tokens and secrets
//! - `auth`: the session manager and its three-tier renewal chain
//! - `api`: HTTP facades (anonymous, admin, delegated user)
//! - `export`: validation and submission of captured pages
//! - `config`: persisted application settings

pub mod api;
pub mod auth;
pub mod config;
pub mod export;
pub mod store;
pub mod token;

pub use api::{AdminApi, ApiClient, ApiError, PublicApi, UserApi};
pub use auth::{
    AdminSecret, AuthError, IdentitySelector, MissingCredential, RenewalStep, SessionManager, Tier,
    TierState, TokenResolution,
};
pub use config::Config;
pub use export::{ExportError, ExportOutcome, PageCapture, PageExporter, SkipReason};
pub use store::{CredentialStore, JsonFileStore, KeychainStore, MemoryStore, SplitStore, StoreError};
