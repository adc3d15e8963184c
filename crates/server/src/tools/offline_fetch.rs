//! offline_fetch tool implementation.
//!
//! Routes one request through the worker, the way a page's fetch would be
//! intercepted.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::fetch::resolve;
use swcache_client::worker::stamp;
use swcache_client::{Handled, Worker};
use swcache_core::{Error, Request};

use super::{json_result, variant_name};

/// Input parameters for offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchParams {
    /// Absolute URL, or a path resolved against the worker origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET is eligible for caching.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// The response's final URL.
    pub final_url: String,
    pub status: u16,
    /// Policy applied: PASSTHROUGH, NETWORK_FIRST, CACHE_FIRST_REFRESH or IGNORE.
    pub classification: String,
    /// "network" or "cache".
    pub source: String,
    /// Whether a background refresh was started for a stale entry.
    pub refreshing: bool,
    /// Capture time stamped on dynamic entries (epoch ms).
    pub captured_at: Option<i64>,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
}

impl OfflineFetchOutput {
    fn new(request: &Request, handled: &Handled) -> Self {
        let response = &handled.response;
        Self {
            url: request.url.to_string(),
            final_url: response.url.clone(),
            status: response.status,
            classification: variant_name(&handled.classification),
            source: variant_name(&handled.source),
            refreshing: handled.refresh.is_some(),
            captured_at: stamp::captured_at(response),
            content_type: response.header("content-type").map(str::to_string),
            headers: response.headers.clone(),
            body: response.text(),
        }
    }
}

/// Implementation of the offline_fetch tool.
pub async fn fetch_impl(worker: &Worker, params: OfflineFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let url = resolve(&worker.config().origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let request = Request::new(&params.method, url);

    let handled = worker.dispatch(&request).await?;
    let output = OfflineFetchOutput::new(&request, &handled);

    // The refresh handle is dropped here; the task keeps running on its own.
    Ok(json_result(&output)?)
}
