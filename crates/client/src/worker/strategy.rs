//! Network-first and cache-first-with-refresh policies.

use swcache_core::{Error, Request};

use super::classify::Classification;
use super::stamp;
use super::{Handled, Refresh, Worker};

impl Worker {
    /// Static assets: the network wins, the `static` partition covers outages.
    pub(super) async fn network_first(&self, request: &Request) -> Result<Handled, Error> {
        let partition = self.config.partitions.static_assets.as_str();

        match self.fetcher.fetch(request).await {
            Ok(response) if response.ok() => {
                self.store(partition, request, &response).await;
                Ok(Handled::network(Classification::NetworkFirst, response))
            }
            Ok(response) => match self.cached(partition, request).await {
                Some(cached) => {
                    tracing::debug!(url = %request.url, status = response.status, "serving cached asset over error status");
                    Ok(Handled::cache(Classification::NetworkFirst, cached))
                }
                None => Ok(Handled::network(Classification::NetworkFirst, response)),
            },
            Err(err) => match self.cached(partition, request).await {
                Some(cached) => {
                    tracing::debug!(url = %request.url, error = %err, "network failed, serving cached asset");
                    Ok(Handled::cache(Classification::NetworkFirst, cached))
                }
                None => Err(err),
            },
        }
    }

    /// Documents: answer from `dynamic` immediately, refresh behind the answer
    /// once the stamp is older than the staleness window.
    pub(super) async fn cache_first_refresh(&self, request: &Request) -> Result<Handled, Error> {
        let partition = self.config.partitions.dynamic.as_str();

        if let Some(cached) = self.cached(partition, request).await {
            let stale = stamp::is_stale(&cached, self.clock.now_ms(), self.config.stale_after);
            tracing::debug!(url = %request.url, stale, "dynamic cache hit");

            let mut handled = Handled::cache(Classification::CacheFirstRefresh, cached);
            if stale {
                handled.refresh = Some(self.spawn_refresh(request.clone()));
            }
            return Ok(handled);
        }

        let response = self.fetcher.fetch(request).await?;
        if !response.ok() || !self.classifier.is_same_origin_str(&response.url) {
            return Ok(Handled::network(Classification::CacheFirstRefresh, response));
        }

        let stamped = stamp::stamp(response, self.clock.now_ms());
        self.store(partition, request, &stamped).await;
        Ok(Handled::network(Classification::CacheFirstRefresh, stamped))
    }

    fn spawn_refresh(&self, request: Request) -> Refresh {
        let worker = self.clone();
        Refresh { handle: tokio::spawn(async move { worker.refresh(&request).await }) }
    }

    /// Refetch and overwrite one dynamic entry. Never fails: the caller
    /// already has its response.
    async fn refresh(&self, request: &Request) -> bool {
        let partition = self.config.partitions.dynamic.as_str();

        let response = match self.fetcher.fetch(request).await {
            Ok(response) if response.ok() && self.classifier.is_same_origin_str(&response.url) => response,
            Ok(response) => {
                tracing::debug!(
                    url = %request.url,
                    final_url = %response.url,
                    status = response.status,
                    "background refresh skipped"
                );
                return false;
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "background refresh failed");
                return false;
            }
        };

        let stamped = stamp::stamp(response, self.clock.now_ms());
        match self.storage.put(partition, request, &stamped).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(partition, url = %request.url, error = %e, "background refresh write failed");
                false
            }
        }
    }
}
