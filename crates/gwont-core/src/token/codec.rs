use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use thiserror::Error;

use super::Claims;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed token: expected dot-separated segments")]
    Malformed,

    #[error("Failed to decode token payload: {0}")]
    Base64(String),

    #[error("Failed to parse token claims: {0}")]
    Claims(String),
}

/// A decoded bearer token: the raw string as issued plus its claims.
///
/// Tokens are values. Renewal produces a new `Token`, it never edits one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<C> {
    raw: String,
    claims: C,
}

impl<C: Claims> Token<C> {
    /// Decode a raw token without verifying its signature.
    ///
    /// The signature is not checked: the backend is the only party that
    /// enforces authorization, and the client reads claims purely to decide
    /// when to renew. `None` and empty input decode to `Ok(None)`.
    pub fn decode(raw: Option<&str>) -> Result<Option<Self>, DecodeError> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };

        let payload = raw.split('.').nth(1).ok_or(DecodeError::Malformed)?;
        if payload.is_empty() {
            return Err(DecodeError::Malformed);
        }

        let bytes = decode_segment(payload)?;
        let claims: C =
            serde_json::from_slice(&bytes).map_err(|e| DecodeError::Claims(e.to_string()))?;

        Ok(Some(Self {
            raw: raw.to_string(),
            claims,
        }))
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn claims(&self) -> &C {
        &self.claims
    }

    pub fn subject(&self) -> &str {
        self.claims.subject()
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.claims.expires_at()
    }

    /// Valid iff an expiry is present and lies strictly after `now_ms`.
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.expires_at()
            .map(|exp| exp.saturating_mul(1000) > now_ms)
            .unwrap_or(false)
    }
}

/// True iff the token exists, has an expiry, and that expiry is in the future.
pub fn is_valid<C: Claims>(token: Option<&Token<C>>) -> bool {
    let now_ms = Utc::now().timestamp_millis();
    token.map(|t| t.is_valid_at(now_ms)).unwrap_or(false)
}

/// Payload segments are URL-safe base64, usually unpadded. Some issuers pad
/// or use the standard alphabet, so both are accepted.
fn decode_segment(segment: &str) -> Result<Vec<u8>, DecodeError> {
    let trimmed = segment.trim_end_matches('=');
    general_purpose::URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(trimmed))
        .map_err(|e| DecodeError::Base64(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use crate::token::{AdminAccessClaims, AdminRefreshClaims, DelegatedUserClaims};

    fn encode(payload: &str) -> String {
        format!(
            "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{}.signature",
            general_purpose::URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decode_access_token() {
        let raw = encode(
            r#"{"sub":"admin","exp":9999999999,"iat":1736500000,"nbf":1736500000,"jti":"abc","type":"access","fresh":true,"user_role_id":2}"#,
        );
        let token = Token::<AdminAccessClaims>::decode(Some(&raw))
            .expect("decode")
            .expect("token present");

        assert_eq!(token.raw(), raw);
        assert_eq!(token.subject(), "admin");
        assert_eq!(token.claims().token_type, "access");
        assert!(token.claims().fresh);
        assert_eq!(token.claims().user_role_id, Some(2));
        assert!(is_valid(Some(&token)));
    }

    #[test]
    fn test_decode_delegated_token_host() {
        let raw = encode(
            r#"{"sub":"Marcus","exp":9999999999,"jti":"u1","type":"access","fresh":false,"host":"ts2.x1.europe"}"#,
        );
        let token = Token::<DelegatedUserClaims>::decode(Some(&raw))
            .unwrap()
            .unwrap();
        assert_eq!(token.claims().host, "ts2.x1.europe");
    }

    #[test]
    fn test_decode_empty_is_none() {
        assert_eq!(Token::<AdminRefreshClaims>::decode(None), Ok(None));
        assert_eq!(Token::<AdminRefreshClaims>::decode(Some("")), Ok(None));
        assert_eq!(Token::<AdminRefreshClaims>::decode(Some("   ")), Ok(None));
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(
            Token::<AdminRefreshClaims>::decode(Some("no-dots-here")),
            Err(DecodeError::Malformed)
        );
        assert!(matches!(
            Token::<AdminRefreshClaims>::decode(Some("a.!!!.c")),
            Err(DecodeError::Base64(_))
        ));
        let not_json = format!("a.{}.c", general_purpose::URL_SAFE_NO_PAD.encode("nope"));
        assert!(matches!(
            Token::<AdminRefreshClaims>::decode(Some(&not_json)),
            Err(DecodeError::Claims(_))
        ));
    }

    #[test]
    fn test_decode_padded_standard_alphabet() {
        let payload = general_purpose::STANDARD.encode(r#"{"sub":"x","exp":9999999999}"#);
        let raw = format!("h.{}.s", payload);
        let token = Token::<AdminRefreshClaims>::decode(Some(&raw))
            .unwrap()
            .unwrap();
        assert_eq!(token.expires_at(), Some(9_999_999_999));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let raw = encode(r#"{"sub":"admin","exp":1700000000,"type":"refresh","jti":"r"}"#);
        let first = Token::<AdminRefreshClaims>::decode(Some(&raw));
        let second = Token::<AdminRefreshClaims>::decode(Some(&raw));
        assert_eq!(first, second);
    }

    #[test]
    fn test_validity_boundaries() {
        let raw = encode(r#"{"sub":"admin","exp":1000}"#);
        let token = Token::<AdminRefreshClaims>::decode(Some(&raw))
            .unwrap()
            .unwrap();

        assert!(token.is_valid_at(999_999));
        // Strictly greater: expiry instant itself is already invalid
        assert!(!token.is_valid_at(1_000_000));
        assert!(!token.is_valid_at(1_000_001));
        assert!(!is_valid(Some(&token)));
    }

    #[test]
    fn test_validity_never_returns_after_expiry() {
        let raw = encode(r#"{"sub":"admin","exp":5000}"#);
        let token = Token::<AdminRefreshClaims>::decode(Some(&raw))
            .unwrap()
            .unwrap();
        let expiry_ms = 5_000_000;
        for now in (expiry_ms..expiry_ms + 10_000).step_by(997) {
            assert!(!token.is_valid_at(now));
        }
    }

    #[test]
    fn test_missing_expiry_is_invalid() {
        let raw = encode(r#"{"sub":"admin"}"#);
        let token = Token::<AdminRefreshClaims>::decode(Some(&raw))
            .unwrap()
            .unwrap();
        assert!(!token.is_valid_at(0));
        assert!(!is_valid::<AdminRefreshClaims>(None));
    }
}
