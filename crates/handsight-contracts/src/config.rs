use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

pub const API_URL_ENV: &str = "HANDSIGHT_API_URL";
pub const TIMEOUT_SECS_ENV: &str = "HANDSIGHT_TIMEOUT_SECS";
pub const ANALYZE_PATH: &str = "/analyze";

/// Connection settings for the analysis service.
///
/// There is no default base URL; it has to be supplied at deploy time.
/// `request_timeout` is `None` unless a caller opts in, in which case the
/// transport is left to resolve or fail on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            bail!("analysis service base URL is empty (set --api-url or {API_URL_ENV})");
        }
        if base_url != base_url.trim() {
            bail!("analysis service base URL has surrounding whitespace: {base_url:?}");
        }
        if base_url.ends_with('/') {
            bail!("analysis service base URL must not end with '/': {base_url}");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("invalid analysis service base URL: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "analysis service base URL must use http or https, got '{}'",
                parsed.scheme()
            );
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            bail!("analysis service base URL must not carry a query or fragment: {base_url}");
        }
        Ok(Self {
            base_url,
            request_timeout: None,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout.filter(|value| !value.is_zero());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    pub fn endpoint(&self) -> String {
        format!("{}{ANALYZE_PATH}", self.base_url)
    }
}

/// Strips whitespace and trailing slashes so a user-supplied URL passes
/// `ClientConfig::new`.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
