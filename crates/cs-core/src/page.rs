//! Page URLs and target-domain membership.
//!
//! Every algorithm in this crate asks the same question of a URL: does it
//! belong to the target domain? [`TargetDomain::contains`] answers it by
//! comparing parsed hosts, so `notexample.com` is never mistaken for
//! `example.com` the way a substring test would.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::ValidationError;

/// A navigation URL, parsed once on ingestion.
///
/// The raw string is kept verbatim for output; the netloc (`host[:port]`) is
/// cached for domain checks and domain-only link lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageUrl {
    raw: String,
    host: Option<String>,
    netloc: Option<String>,
}

impl PageUrl {
    /// Parses an absolute URL.
    pub fn parse(raw: impl Into<String>) -> Result<Self, url::ParseError> {
        let raw = raw.into();
        let parsed = Url::parse(&raw)?;
        let host = parsed.host_str().map(str::to_string);
        let netloc = host.as_deref().map(|host| match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        });
        Ok(Self { raw, host, netloc })
    }

    /// Returns the URL exactly as it was read.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `host[:port]`, or `None` for URLs without a host.
    pub fn netloc(&self) -> Option<&str> {
        self.netloc.as_deref()
    }

    /// Returns the host without any port.
    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

impl TryFrom<String> for PageUrl {
    type Error = url::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PageUrl> for String {
    fn from(url: PageUrl) -> Self {
        url.raw
    }
}

impl fmt::Display for PageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The single site of interest whose arrivals bound sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDomain(String);

impl TargetDomain {
    /// Builds a target domain from a bare host (`tripadvisor.com`) or a URL
    /// (`https://www.tripadvisor.com`).
    ///
    /// A leading `www.` label is dropped so that both the bare domain and
    /// its `www` host match.
    pub fn new(domain: &str) -> Result<Self, ValidationError> {
        let trimmed = domain.trim();
        let host = Url::parse(trimmed)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| trimmed.trim_end_matches('/').to_ascii_lowercase());
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        if host.is_empty() {
            return Err(ValidationError::Empty {
                field: "target domain",
            });
        }
        Ok(Self(host))
    }

    /// Returns the normalized domain.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the URL's host is the domain or one of its subdomains.
    pub fn contains(&self, url: &PageUrl) -> bool {
        url.host().is_some_and(|host| {
            host.strip_suffix(self.0.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.ends_with('.'))
        })
    }

    /// Like [`contains`](Self::contains), treating a missing URL as outside
    /// the domain.
    pub fn contains_opt(&self, url: Option<&PageUrl>) -> bool {
        url.is_some_and(|url| self.contains(url))
    }
}

impl fmt::Display for TargetDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
