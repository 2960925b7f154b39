//! Page export: the hand-off from a captured game page to the backend.
//!
//! A capture is the page's full HTML and URL. The avatar name comes from
//! whoever scraped the page; the avatar host is read off the URL.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::AdminApi;
use crate::auth::{
    avatar_host_from_url, AuthError, IdentitySelector, MissingCredential, SessionManager, Tier,
};

/// What the page-capture side hands over.
#[derive(Debug, Clone)]
pub struct PageCapture {
    pub html: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyPage,
    ForeignSite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The page was sent; `status` is whatever the backend answered.
    Submitted { status: u16 },
    /// The capture was not worth sending.
    Skipped(SkipReason),
    /// No admin credential is configured; send the user to configuration.
    NeedsConfiguration,
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Avatar name not found in the page")]
    NameNotFound,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub struct PageExporter {
    admin: AdminApi,
    session: Arc<SessionManager>,
    site_domain: String,
}

impl PageExporter {
    pub fn new(admin: AdminApi, session: Arc<SessionManager>, site_domain: impl Into<String>) -> Self {
        Self {
            admin,
            session,
            site_domain: site_domain.into(),
        }
    }

    pub fn is_site_page(&self, url: &str) -> bool {
        !url.is_empty() && url.contains(&self.site_domain)
    }

    /// Whether an admin token is held or can be obtained, decided without
    /// talking to the server.
    async fn can_authenticate(&self) -> Result<bool, AuthError> {
        if self.session.has_admin_secret().await? {
            return Ok(true);
        }
        Ok(self.session.tier_state(Tier::AdminAccess).await.is_valid()
            || self.session.tier_state(Tier::AdminRefresh).await.is_valid())
    }

    /// Send a captured page to the export endpoint on behalf of `name`.
    pub async fn export(
        &self,
        capture: PageCapture,
        name: Option<&str>,
    ) -> Result<ExportOutcome, ExportError> {
        if capture.html.trim().is_empty() {
            warn!("No HTML content found");
            return Ok(ExportOutcome::Skipped(SkipReason::EmptyPage));
        }
        if !self.is_site_page(&capture.url) {
            warn!(url = %capture.url, site = %self.site_domain, "Not a game page, skipping export");
            return Ok(ExportOutcome::Skipped(SkipReason::ForeignSite));
        }

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(ExportError::NameNotFound)?;

        if !self.can_authenticate().await? {
            warn!(missing = %MissingCredential::AdminSecret, "Export needs configuration");
            return Ok(ExportOutcome::NeedsConfiguration);
        }

        match avatar_host_from_url(&capture.url, &self.site_domain) {
            Some(host) => {
                self.session
                    .select_identity(Some(IdentitySelector::new(name, host)))
                    .await?
            }
            None => warn!(url = %capture.url, "Could not derive avatar host from URL"),
        }

        let url = capture.url;
        let response = self
            .admin
            .submit_page_export(&url, name, capture.html)
            .await?;
        let status = response.status().as_u16();
        info!(url = %url, avatar = %name, status, "Page exported");

        Ok(ExportOutcome::Submitted { status })
    }
}
