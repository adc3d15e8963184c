//! Request classification.
//!
//! Decides, per request, which caching policy applies. Nothing here touches
//! storage or the network.

use serde::{Deserialize, Serialize};
use swcache_core::Request;
use url::Url;

/// Handling policy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// Live, authenticated or realtime data: network every time, no cache.
    Passthrough,
    /// Versioned static assets: network, falling back to the static partition.
    NetworkFirst,
    /// Same-origin documents: dynamic partition, refreshed in the background.
    CacheFirstRefresh,
    /// Not intercepted (non-GET or cross-origin).
    Ignore,
}

impl Classification {
    /// Whether this policy may read or write a partition.
    pub fn uses_cache(self) -> bool {
        matches!(self, Classification::NetworkFirst | Classification::CacheFirstRefresh)
    }
}

/// Pattern-based request classifier bound to one origin.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    passthrough_patterns: Vec<String>,
    static_extensions: Vec<String>,
}

impl Classifier {
    pub fn new(origin: Url, passthrough_patterns: Vec<String>, static_extensions: Vec<String>) -> Self {
        Self { origin, passthrough_patterns, static_extensions }
    }

    pub fn classify(&self, request: &Request) -> Classification {
        if !request.is_get() {
            return Classification::Ignore;
        }

        if self.is_live_data(&request.url) {
            return Classification::Passthrough;
        }

        if !self.is_same_origin(&request.url) {
            return Classification::Ignore;
        }

        let path = request.url.path();
        if self.static_extensions.iter().any(|ext| path.ends_with(ext.as_str())) {
            Classification::NetworkFirst
        } else {
            Classification::CacheFirstRefresh
        }
    }

    /// Matches the hostname (for the backend host) and the path. The query
    /// string is not consulted.
    pub fn is_live_data(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default();
        let path = url.path();
        self.passthrough_patterns
            .iter()
            .any(|pattern| host.contains(pattern.as_str()) || path.contains(pattern.as_str()))
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    /// Same-origin check for a response's final URL, which may have been redirected.
    pub fn is_same_origin_str(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|url| self.is_same_origin(&url))
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }
}
