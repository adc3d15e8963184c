//! Shared fixtures for tool tests.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;
use swcache_client::{Fetcher, Worker, WorkerConfig};
use swcache_core::{CacheDb, Error, Request, Response};

pub(crate) const ORIGIN: &str = "http://localhost:5173";

/// Answers every path under the origin with 200; `/offline*` fails.
pub(crate) struct SiteFetcher;

#[async_trait]
impl Fetcher for SiteFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        if request.url.path().starts_with("/offline") {
            return Err(Error::Network("connection refused".into()));
        }
        Ok(Response::new(request.url.as_str(), 200, format!("page {}", request.url.path()))
            .with_header("content-type", "text/html"))
    }
}

pub(crate) async fn worker() -> (Worker, CacheDb) {
    let db = CacheDb::open_in_memory().await.unwrap();
    let config = WorkerConfig::new(url::Url::parse(ORIGIN).unwrap());
    let worker = Worker::new(config, Arc::new(db.clone()), Arc::new(SiteFetcher));
    (worker, db)
}

pub(crate) async fn installed_worker() -> (Worker, CacheDb) {
    let (worker, db) = worker().await;
    worker.on_install().await.unwrap();
    (worker, db)
}

/// Decode the JSON text content of a tool result.
pub(crate) fn decode<T: DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
