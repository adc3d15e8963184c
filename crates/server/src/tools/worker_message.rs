//! worker_message tool implementation.
//!
//! Delivers a page → worker control message. Pages treat these as
//! fire-and-forget; the tool still reports what happened.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{ControlMessage, Worker};

use super::{json_result, variant_name};

/// Parameters for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Message type: "SKIP_WAITING" or "CLEAR_CACHE".
    #[serde(rename = "type")]
    pub kind: String,
}

/// Output from the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageOutput {
    /// Whether a waiting worker was activated.
    pub activated: bool,
    /// Partitions deleted.
    pub deleted: Vec<String>,
    /// Partitions that could not be deleted.
    pub failed: Vec<String>,
    /// Lifecycle state after the message was handled.
    pub state: String,
}

/// Implementation of the worker_message tool.
pub async fn message_impl(worker: &Worker, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    let message = ControlMessage::from_type(&params.kind).inspect_err(|e| {
        tracing::warn!(kind = %params.kind, error = %e, "ignoring unknown control message");
    })?;
    let report = worker.on_message(message).await;

    let output = WorkerMessageOutput {
        activated: report.activated,
        deleted: report.eviction.deleted,
        failed: report.eviction.failed,
        state: variant_name(&worker.state().await),
    };

    Ok(json_result(&output)?)
}

#[cfg(test)]
mod tests {
    use crate::tools::test_support::{decode, installed_worker};
    use super::*;

    #[tokio::test]
    async fn test_clear_cache() {
        let (worker, db) = installed_worker().await;
        db.open_partition("swcache-dynamic-v0").await.unwrap();

        let result = message_impl(&worker, WorkerMessageParams { kind: "CLEAR_CACHE".into() })
            .await
            .unwrap();
        let output: WorkerMessageOutput = decode(&result);

        assert_eq!(output.deleted.len(), 2);
        assert!(!output.activated);
        assert_eq!(output.state, "active");
        assert!(db.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skip_waiting_on_active_worker() {
        let (worker, _db) = installed_worker().await;

        let result = message_impl(&worker, WorkerMessageParams { kind: "SKIP_WAITING".into() })
            .await
            .unwrap();
        let output: WorkerMessageOutput = decode(&result);
        assert!(!output.activated);
    }

    #[tokio::test]
    async fn test_unknown_message_rejected() {
        let (worker, _db) = installed_worker().await;
        let result = message_impl(&worker, WorkerMessageParams { kind: "RELOAD".into() }).await;
        assert!(result.is_err());
    }
}
