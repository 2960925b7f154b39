//! Bearer token decoding.
//!
//! Tokens are JWT-shaped (`header.payload.signature`). Only the payload is
//! read, to learn the subject and expiry; signatures are never verified here.

pub mod claims;
pub mod codec;

pub use claims::{AdminAccessClaims, AdminRefreshClaims, Claims, DelegatedUserClaims};
pub use codec::{is_valid, DecodeError, Token};

pub type AdminAccessToken = Token<AdminAccessClaims>;
pub type AdminRefreshToken = Token<AdminRefreshClaims>;
pub type DelegatedUserToken = Token<DelegatedUserClaims>;
