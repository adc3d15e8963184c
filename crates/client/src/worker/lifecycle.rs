//! Install / activate / message handling.
//!
//! Install fetches the bootstrap shell into the precache, all or nothing, then
//! skips the waiting phase. Activation evicts every partition outside the
//! current version's allow-list and claims the origin.

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use swcache_core::{Error, Request, Response};
use tokio::sync::RwLock;

use super::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Constructed, install not started.
    #[default]
    Parsed,
    Installing,
    /// Installed, waiting for skip-waiting.
    Waiting,
    Activating,
    Active,
    /// Install failed; this version will never control the origin.
    Redundant,
}

/// Messages a page can post to the worker.
///
/// Wire format: `{ "type": "SKIP_WAITING" }` or `{ "type": "CLEAR_CACHE" }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    ClearCache,
}

impl ControlMessage {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidMessage(e.to_string()))
    }

    /// Parse the bare `type` value, e.g. `"CLEAR_CACHE"`.
    pub fn from_type(kind: &str) -> Result<Self, Error> {
        Self::from_json(&serde_json::json!({ "type": kind.trim() }).to_string())
    }
}

/// Partitions removed (or not) by an eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionReport {
    pub deleted: Vec<String>,
    /// Deletions that failed; these partitions stay until the next pass.
    pub failed: Vec<String>,
}

/// What handling a control message did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReport {
    pub message: ControlMessage,
    /// Whether a waiting worker was activated.
    pub activated: bool,
    pub eviction: EvictionReport,
}

#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    state: RwLock<LifecycleState>,
    skip_waiting: AtomicBool,
    controlling: AtomicBool,
}

impl Worker {
    pub async fn state(&self) -> LifecycleState {
        *self.lifecycle.state.read().await
    }

    pub(crate) async fn set_state(&self, state: LifecycleState) {
        *self.lifecycle.state.write().await = state;
    }

    /// Whether skip-waiting has been requested for this version.
    pub fn skip_waiting_requested(&self) -> bool {
        self.lifecycle.skip_waiting.load(Ordering::SeqCst)
    }

    /// True once activation has claimed the origin.
    pub fn is_controlling(&self) -> bool {
        self.lifecycle.controlling.load(Ordering::SeqCst)
    }

    /// Populate the precache. On success the worker skips waiting and
    /// activates immediately.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` if any bootstrap asset cannot be fetched,
    /// answers with a non-2xx status, or cannot be stored. The precache batch
    /// is written in one transaction, so a failed install leaves no entries.
    pub async fn on_install(&self) -> Result<(), Error> {
        self.set_state(LifecycleState::Installing).await;
        tracing::info!(partition = %self.config.partitions.precache, "installing worker");

        match self.precache().await {
            Ok(count) => {
                tracing::info!(count, "precache populated");
                self.set_state(LifecycleState::Waiting).await;
                self.skip_waiting().await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "install failed; existing partitions left in place");
                self.set_state(LifecycleState::Redundant).await;
                Err(Error::InstallFailed(e.to_string()))
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        let partition = self.config.partitions.precache.as_str();
        self.storage.open(partition).await?;

        let requests = self
            .config
            .precache_urls
            .iter()
            .map(|path| {
                self.config
                    .origin
                    .join(path)
                    .map(Request::get)
                    .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let responses = try_join_all(requests.iter().map(|request| async move {
            let response = self.fetcher.fetch(request).await?;
            if !response.ok() {
                return Err(Error::HttpError(format!("{} returned status {}", request.url, response.status)));
            }
            Ok::<_, Error>(response)
        }))
        .await?;

        let entries: Vec<(Request, Response)> = requests.into_iter().zip(responses).collect();
        self.storage.put_all(partition, &entries).await?;

        Ok(entries.len())
    }

    /// Request activation without waiting for pages to close.
    ///
    /// Activates right away if install has finished; otherwise the request is
    /// remembered and has no further effect. Returns the eviction report when
    /// this call performed the activation.
    pub async fn skip_waiting(&self) -> Option<EvictionReport> {
        self.lifecycle.skip_waiting.store(true, Ordering::SeqCst);

        {
            let mut state = self.lifecycle.state.write().await;
            if *state != LifecycleState::Waiting {
                return None;
            }
            *state = LifecycleState::Activating;
        }

        Some(self.on_activate().await)
    }

    /// Evict partitions from previous versions and claim the origin.
    ///
    /// Never fails: a partition that cannot be deleted is reported and left
    /// for the next activation.
    pub async fn on_activate(&self) -> EvictionReport {
        self.set_state(LifecycleState::Activating).await;

        let report = self.evict_stale(&self.config.partitions.allow_list()).await;

        self.set_state(LifecycleState::Active).await;
        self.lifecycle.controlling.store(true, Ordering::SeqCst);
        tracing::info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "worker activated and controlling origin"
        );

        report
    }

    /// Delete every partition whose name is not in `allow_list`.
    pub async fn evict_stale(&self, allow_list: &[String]) -> EvictionReport {
        let names = match self.storage.partitions().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "could not enumerate partitions");
                return EvictionReport::default();
            }
        };

        let stale = names.into_iter().filter(|name| !allow_list.contains(name)).collect();
        self.delete_partitions(stale).await
    }

    /// Delete every partition regardless of version.
    pub async fn clear_all(&self) -> EvictionReport {
        self.evict_stale(&[]).await
    }

    async fn delete_partitions(&self, names: Vec<String>) -> EvictionReport {
        let results = join_all(names.into_iter().map(|name| async move {
            let result = self.storage.delete(&name).await;
            (name, result)
        }))
        .await;

        let mut report = EvictionReport::default();
        for (name, result) in results {
            match result {
                Ok(true) => report.deleted.push(name),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(partition = %name, error = %e, "partition delete failed");
                    report.failed.push(name);
                }
            }
        }
        report
    }

    /// Handle a message posted by a page.
    pub async fn on_message(&self, message: ControlMessage) -> MessageReport {
        tracing::info!(?message, "control message received");

        match message {
            ControlMessage::SkipWaiting => {
                let eviction = self.skip_waiting().await;
                MessageReport { message, activated: eviction.is_some(), eviction: eviction.unwrap_or_default() }
            }
            ControlMessage::ClearCache => {
                let eviction = self.clear_all().await;
                MessageReport { message, activated: false, eviction }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;

    const SHELL: [&str; 4] = ["/", "/index.html", "/favicon.svg", "/favicon.ico"];

    fn route_shell(h: &Harness) {
        for path in SHELL {
            h.fetcher.route(path, 200, path);
        }
    }

    #[test]
    fn test_control_message_wire_format() {
        assert_eq!(ControlMessage::from_json(r#"{"type":"SKIP_WAITING"}"#).unwrap(), ControlMessage::SkipWaiting);
        assert_eq!(ControlMessage::from_json(r#"{"type":"CLEAR_CACHE"}"#).unwrap(), ControlMessage::ClearCache);
        assert_eq!(ControlMessage::from_type("CLEAR_CACHE").unwrap(), ControlMessage::ClearCache);
        assert_eq!(serde_json::to_string(&ControlMessage::SkipWaiting).unwrap(), r#"{"type":"SKIP_WAITING"}"#);
    }

    #[test]
    fn test_control_message_unknown_type() {
        assert!(matches!(ControlMessage::from_json(r#"{"type":"RELOAD"}"#), Err(Error::InvalidMessage(_))));
        assert!(matches!(ControlMessage::from_json("{}"), Err(Error::InvalidMessage(_))));
    }

    #[tokio::test]
    async fn test_install_populates_precache_and_activates() {
        let h = Harness::new().await;
        route_shell(&h);
        assert_eq!(h.worker.state().await, LifecycleState::Parsed);

        h.worker.on_install().await.unwrap();

        assert_eq!(h.worker.state().await, LifecycleState::Active);
        assert!(h.worker.is_controlling());
        for path in SHELL {
            let entry = h.storage.db().get_entry("condo-precache-v3", &h.get(path)).await.unwrap();
            assert_eq!(entry.unwrap().text(), path);
        }
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let h = Harness::new().await;
        route_shell(&h);
        h.fetcher.offline("/favicon.ico");

        let result = h.worker.on_install().await;

        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(h.worker.state().await, LifecycleState::Redundant);
        assert!(!h.worker.is_controlling());
        for path in SHELL {
            let entry = h.storage.db().get_entry("condo-precache-v3", &h.get(path)).await.unwrap();
            assert!(entry.is_none(), "{path}");
        }
    }

    #[tokio::test]
    async fn test_install_rejects_error_status() {
        let h = Harness::new().await;
        route_shell(&h);
        h.fetcher.route("/favicon.svg", 404, "missing");

        assert!(h.worker.on_install().await.is_err());
        assert_eq!(h.worker.state().await, LifecycleState::Redundant);
    }

    #[tokio::test]
    async fn test_install_write_failure_leaves_no_entries() {
        let h = Harness::new().await;
        route_shell(&h);
        h.storage.fail_writes(true);

        assert!(matches!(h.worker.on_install().await, Err(Error::InstallFailed(_))));
        assert_eq!(h.worker.state().await, LifecycleState::Redundant);
        assert!(h.storage.db().list_entries("condo-precache-v3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_activation_survives_partition_listing_failure() {
        let h = Harness::new().await;
        h.storage.db().open_partition("condo-dynamic-v2").await.unwrap();
        h.storage.fail_lists(true);

        let report = h.worker.on_activate().await;

        assert_eq!(report, EvictionReport::default());
        assert_eq!(h.worker.state().await, LifecycleState::Active);
        assert!(h.worker.is_controlling());
        assert_eq!(h.storage.deletes(), 0);
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_version() {
        let h = Harness::new().await;
        h.storage.db().open_partition("condo-dynamic-v2").await.unwrap();
        h.fetcher.offline("/");

        assert!(h.worker.on_install().await.is_err());
        assert!(h.storage.db().list_partitions().await.unwrap().contains(&"condo-dynamic-v2".to_string()));
    }

    #[tokio::test]
    async fn test_activation_evicts_previous_versions() {
        let h = Harness::new().await;
        for name in ["condo-precache-v2", "condo-static-v2", "condo-dynamic-v2", "condo-dynamic-v3"] {
            h.storage.db().open_partition(name).await.unwrap();
        }

        let report = h.worker.on_activate().await;

        assert_eq!(report.deleted, vec!["condo-precache-v2", "condo-static-v2", "condo-dynamic-v2"]);
        assert!(report.failed.is_empty());
        assert_eq!(h.storage.db().list_partitions().await.unwrap(), vec!["condo-dynamic-v3"]);
        assert_eq!(h.worker.state().await, LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_eviction_is_idempotent() {
        let h = Harness::new().await;
        h.storage.db().open_partition("a-v1").await.unwrap();
        h.storage.db().open_partition("a-v2").await.unwrap();
        let allow = vec!["a-v2".to_string()];

        let first = h.worker.evict_stale(&allow).await;
        assert_eq!(first.deleted, vec!["a-v1"]);
        assert_eq!(h.storage.db().list_partitions().await.unwrap(), vec!["a-v2"]);

        let deletes_before = h.storage.deletes();
        let second = h.worker.evict_stale(&allow).await;
        assert_eq!(second, EvictionReport::default());
        assert_eq!(h.storage.deletes(), deletes_before);
        assert_eq!(h.storage.db().list_partitions().await.unwrap(), vec!["a-v2"]);
    }

    #[tokio::test]
    async fn test_failed_delete_does_not_block_others() {
        let h = Harness::new().await;
        for name in ["a-v0", "a-v1", "a-v2"] {
            h.storage.db().open_partition(name).await.unwrap();
        }
        h.storage.fail_delete("a-v1");

        let report = h.worker.evict_stale(&["a-v2".to_string()]).await;

        assert_eq!(report.deleted, vec!["a-v0"]);
        assert_eq!(report.failed, vec!["a-v1"]);
        assert_eq!(h.storage.db().list_partitions().await.unwrap(), vec!["a-v1", "a-v2"]);
    }

    #[tokio::test]
    async fn test_clear_cache_removes_everything() {
        let h = Harness::new().await;
        route_shell(&h);
        h.worker.on_install().await.unwrap();
        for name in ["old-v1", "old-v2", "condo-static-v3", "condo-dynamic-v3"] {
            h.storage.db().open_partition(name).await.unwrap();
        }

        let report = h.worker.on_message(ControlMessage::ClearCache).await;

        assert!(!report.activated);
        assert_eq!(report.eviction.deleted.len(), 5);
        assert!(h.storage.db().list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_cache_with_no_partitions() {
        let h = Harness::new().await;
        let report = h.worker.on_message(ControlMessage::ClearCache).await;
        assert!(report.eviction.deleted.is_empty());
        assert!(h.storage.db().list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates_waiting_worker() {
        let h = Harness::new().await;
        h.storage.db().open_partition("condo-static-v2").await.unwrap();
        h.worker.set_state(LifecycleState::Waiting).await;

        let report = h.worker.on_message(ControlMessage::SkipWaiting).await;

        assert!(report.activated);
        assert!(h.worker.skip_waiting_requested());
        assert_eq!(report.eviction.deleted, vec!["condo-static-v2"]);
        assert_eq!(h.worker.state().await, LifecycleState::Active);
        assert!(h.worker.is_controlling());
    }

    #[tokio::test]
    async fn test_skip_waiting_when_active_is_noop() {
        let h = Harness::new().await;
        route_shell(&h);
        h.worker.on_install().await.unwrap();

        let report = h.worker.on_message(ControlMessage::SkipWaiting).await;
        assert!(!report.activated);
        assert_eq!(h.worker.state().await, LifecycleState::Active);
    }
}
