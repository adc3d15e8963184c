//! Offline-first caching worker.
//!
//! The worker sits between a page and the network. Every request is
//! classified, then served by one of three policies:
//!
//! - **Passthrough / Ignore**: straight to the network, no partition access.
//! - **Network-first**: static assets; the `static` partition is the fallback.
//! - **Cache-first with background refresh**: documents; served from `dynamic`
//!   and refreshed once the capture stamp is older than the staleness window.
//!
//! Lifecycle (install → waiting → active) and control messages live in
//! [`lifecycle`]. Storage, network, and time are injected so the worker runs
//! the same in tests as behind the MCP server.

pub mod classify;
pub mod clock;
pub mod lifecycle;
pub mod stamp;
mod strategy;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use swcache_core::config::{
    default_passthrough_patterns, default_precache_urls, default_stale_after_ms, default_static_extensions,
};
use swcache_core::{AppConfig, CacheStorage, Error, Request, Response};
use tokio::task::JoinHandle;
use url::Url;

use crate::fetch::Fetcher;

pub use classify::{Classification, Classifier};
pub use clock::{Clock, SystemClock};
pub use lifecycle::{ControlMessage, EvictionReport, LifecycleState, MessageReport};

use lifecycle::Lifecycle;

/// The three partition names of one deployed version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionNames {
    pub precache: String,
    pub static_assets: String,
    pub dynamic: String,
}

impl PartitionNames {
    /// `<prefix>-precache-<version>`, `<prefix>-static-<version>`, `<prefix>-dynamic-<version>`.
    pub fn versioned(prefix: &str, version: &str) -> Self {
        Self {
            precache: format!("{prefix}-precache-{version}"),
            static_assets: format!("{prefix}-static-{version}"),
            dynamic: format!("{prefix}-dynamic-{version}"),
        }
    }

    /// Partitions that survive activation.
    pub fn allow_list(&self) -> Vec<String> {
        vec![self.precache.clone(), self.static_assets.clone(), self.dynamic.clone()]
    }
}

/// Everything the worker needs to know about its deployment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub origin: Url,
    pub partitions: PartitionNames,
    pub stale_after: Duration,
    pub passthrough_patterns: Vec<String>,
    pub static_extensions: Vec<String>,
    /// Origin-relative paths fetched into the precache on install.
    pub precache_urls: Vec<String>,
}

impl WorkerConfig {
    /// Defaults for the given origin, version `v1`.
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            partitions: PartitionNames::versioned("swcache", "v1"),
            stale_after: Duration::from_millis(default_stale_after_ms()),
            passthrough_patterns: default_passthrough_patterns(),
            static_extensions: default_static_extensions(),
            precache_urls: default_precache_urls(),
        }
    }
}

impl TryFrom<&AppConfig> for WorkerConfig {
    type Error = Error;

    fn try_from(config: &AppConfig) -> Result<Self, Self::Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        Ok(Self {
            origin,
            partitions: PartitionNames::versioned(&config.cache_prefix, &config.cache_version),
            stale_after: config.stale_after(),
            passthrough_patterns: config.passthrough_patterns.clone(),
            static_extensions: config.static_extensions.clone(),
            precache_urls: config.precache_urls.clone(),
        })
    }
}

/// Where a handled response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
}

/// A background refresh of a dynamic entry.
///
/// Dropping the handle detaches the task; it still runs to completion.
#[derive(Debug)]
pub struct Refresh {
    handle: JoinHandle<bool>,
}

impl Refresh {
    /// Wait for the refresh. True if the dynamic entry was replaced.
    pub async fn wait(self) -> bool {
        self.handle.await.unwrap_or(false)
    }
}

/// Outcome of handling one request.
#[derive(Debug)]
pub struct Handled {
    pub classification: Classification,
    pub source: ResponseSource,
    pub response: Response,
    /// Present when a stale cached document was served.
    pub refresh: Option<Refresh>,
}

impl Handled {
    fn network(classification: Classification, response: Response) -> Self {
        Self { classification, source: ResponseSource::Network, response, refresh: None }
    }

    fn cache(classification: Classification, response: Response) -> Self {
        Self { classification, source: ResponseSource::Cache, response, refresh: None }
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

/// Offline-first caching worker for one origin and one deployed version.
///
/// Cheap to clone; clones share storage, fetcher, clock, and lifecycle state.
#[derive(Clone)]
pub struct Worker {
    config: Arc<WorkerConfig>,
    classifier: Arc<Classifier>,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    lifecycle: Arc<Lifecycle>,
}

impl Worker {
    pub fn new(config: WorkerConfig, storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
        let classifier = Classifier::new(
            config.origin.clone(),
            config.passthrough_patterns.clone(),
            config.static_extensions.clone(),
        );
        Self {
            config: Arc::new(config),
            classifier: Arc::new(classifier),
            storage,
            fetcher,
            clock: Arc::new(SystemClock),
            lifecycle: Arc::new(Lifecycle::default()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Route a request through its caching policy.
    pub async fn handle(&self, request: &Request) -> Result<Handled, Error> {
        let classification = self.classifier.classify(request);
        tracing::debug!(method = %request.method, url = %request.url, ?classification, "intercepted request");

        match classification {
            Classification::Ignore | Classification::Passthrough => {
                let response = self.fetcher.fetch(request).await?;
                Ok(Handled::network(classification, response))
            }
            Classification::NetworkFirst => self.network_first(request).await,
            Classification::CacheFirstRefresh => self.cache_first_refresh(request).await,
        }
    }

    /// Like [`Worker::handle`], but only once this worker controls the origin.
    /// Before activation every request goes straight to the network.
    pub async fn dispatch(&self, request: &Request) -> Result<Handled, Error> {
        if self.is_controlling() {
            return self.handle(request).await;
        }
        let response = self.fetcher.fetch(request).await?;
        Ok(Handled::network(Classification::Ignore, response))
    }

    /// Best-effort lookup: storage failures read as a miss.
    async fn cached(&self, partition: &str, request: &Request) -> Option<Response> {
        match self.storage.lookup(partition, request).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(partition, url = %request.url, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Best-effort write: storage failures are logged and dropped.
    async fn store(&self, partition: &str, request: &Request, response: &Response) {
        if let Err(e) = self.storage.put(partition, request, response).await {
            tracing::warn!(partition, url = %request.url, error = %e, "cache write failed");
        }
    }
}
