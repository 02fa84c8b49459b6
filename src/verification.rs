//! Domain ownership verification for GTM containers.
//!
//! A verification claim pairs a GTM container id with a domain. The
//! dashboard embeds the issued token on the site (meta tag or snippet);
//! `check_site_for_token` then fetches the page and searches the body
//! for it. Only verified domains feed the relay's event_source_url
//! fallback.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use uuid::Uuid;

/// GTM container ids look like `GTM-XXXXXXX` (6–10 alphanumerics).
static GTM_CONTAINER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^GTM-[A-Z0-9]{6,10}$").expect("container id regex"));

/// Bare domain name: dot-separated labels, no scheme, no port, no path.
static DOMAIN_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("domain name regex")
});

/// Timeout for the verification fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub fn is_valid_container_id(container_id: &str) -> bool {
    GTM_CONTAINER_ID_RE.is_match(container_id)
}

pub fn is_valid_domain_name(domain: &str) -> bool {
    DOMAIN_NAME_RE.is_match(domain)
}

/// Issue a fresh verification token (`CAPIFY_VERIFY_` + 32 hex chars).
pub fn generate_verification_token() -> String {
    format!("CAPIFY_VERIFY_{}", Uuid::new_v4().simple())
}

/// Build the URL to fetch for a registered domain. A domain stored with
/// an explicit scheme keeps it; a bare domain defaults to https.
pub fn site_url(domain: &str) -> String {
    if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{domain}")
    }
}

/// Why a verification attempt did not succeed. All variants are caller
/// errors or site problems, never daemon faults.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Verification token not found on website")]
    TokenNotFound { url: String },
    #[error("Website not accessible (HTTP {status})")]
    SiteStatus { url: String, status: u16 },
    #[error("Failed to access website: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl VerifyError {
    pub fn url(&self) -> &str {
        match self {
            VerifyError::TokenNotFound { url }
            | VerifyError::SiteStatus { url, .. }
            | VerifyError::Unreachable { url, .. } => url,
        }
    }
}

/// Fetch the site and search the response body for the verification
/// token. Redirects are followed; the fetch times out after 10 s.
pub async fn check_site_for_token(
    http: &reqwest::Client,
    domain: &str,
    token: &str,
) -> Result<(), VerifyError> {
    let url = site_url(domain);

    let response = http
        .get(&url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|source| VerifyError::Unreachable {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(VerifyError::SiteStatus {
            url,
            status: status.as_u16(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|source| VerifyError::Unreachable {
            url: url.clone(),
            source,
        })?;
    if body.contains(token) {
        Ok(())
    } else {
        Err(VerifyError::TokenNotFound { url })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
