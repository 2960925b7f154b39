//! Authentication: the administrator → delegated token chain.
//!
//! This module provides:
//! - `SessionManager`: in-memory tokens for the three tiers with lazy
//!   renewal and write-through persistence
//! - `IdentitySelector`: the currently selected avatar `(name, host)`
//! - `AdminSecret`: the configured API key or admin username/password
//!
//! Admin access tokens renew from the refresh token, falling back to a full
//! login. Delegated tokens are issued by the backend for the selected avatar
//! using a valid admin access token.

pub mod error;
pub mod identity;
pub mod session;

pub use error::{AuthError, MissingCredential, RenewalStep};
pub use identity::{avatar_host_from_url, AdminSecret, IdentitySelector};
pub use session::{SessionManager, Tier, TierState, TokenResolution};
