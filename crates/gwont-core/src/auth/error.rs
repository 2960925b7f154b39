use std::fmt;

use thiserror::Error;

use crate::api::ApiError;
use crate::store::StoreError;

/// A renewal step in a tier's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalStep {
    Refresh,
    LoginWithKey,
    Login,
    IssueDelegatedToken,
}

impl fmt::Display for RenewalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenewalStep::Refresh => "refresh",
            RenewalStep::LoginWithKey => "login-with-key",
            RenewalStep::Login => "login",
            RenewalStep::IssueDelegatedToken => "issue-delegated-token",
        };
        f.write_str(name)
    }
}

/// What is missing when no renewal step can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingCredential {
    /// Neither an API key nor an admin username/password is configured.
    AdminSecret,
    /// No avatar identity is selected.
    IdentitySelection,
}

impl fmt::Display for MissingCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingCredential::AdminSecret => {
                f.write_str("no API key or admin username/password configured")
            }
            MissingCredential::IdentitySelection => f.write_str("no avatar identity selected"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication failed at {step}: {reason}")]
    Rejected { step: RenewalStep, reason: String },

    #[error("No token available: {0}")]
    NoTokenAvailable(MissingCredential),

    #[error(transparent)]
    Transport(ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub(crate) fn rejected(step: RenewalStep, reason: impl Into<String>) -> Self {
        AuthError::Rejected {
            step,
            reason: reason.into(),
        }
    }

    /// Classify a failed exchange: a server refusal names the step, a
    /// transport failure is passed through unchanged.
    pub(crate) fn from_exchange(step: RenewalStep, error: ApiError) -> Self {
        if error.is_rejection() {
            Self::rejected(step, error.to_string())
        } else {
            AuthError::Transport(error)
        }
    }

    /// True when the user has to supply configuration before anything can
    /// succeed.
    pub fn needs_configuration(&self) -> bool {
        matches!(self, AuthError::NoTokenAvailable(_))
    }
}

impl From<ApiError> for AuthError {
    fn from(error: ApiError) -> Self {
        AuthError::Transport(error)
    }
}
