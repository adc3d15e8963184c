//! cache_list tool implementation.
//!
//! Lists partitions with their sizes, or the entries of one partition.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::Worker;
use swcache_core::cache::EntryMeta;
use swcache_core::{CacheDb, Error, PartitionStats};

use crate::tools::{json_result, variant_name};

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// List the entries of this partition instead of the partition summary.
    #[serde(default)]
    pub partition: Option<String>,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    /// Lifecycle state of the worker.
    pub state: String,
    /// Whether the worker currently intercepts requests.
    pub controlling: bool,
    /// Partition names the current version keeps on activation.
    pub current: Vec<String>,
    pub partitions: Vec<PartitionStats>,
    /// Entries of the requested partition, if one was named.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<EntryMeta>>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(db: &CacheDb, worker: &Worker, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let partitions = db.partition_stats().await?;

    let entries = match params.partition {
        Some(name) => {
            if !partitions.iter().any(|p| p.name == name) {
                return Err(Error::InvalidInput(format!("no partition named {name}")).into());
            }
            Some(db.list_entries(&name).await?)
        }
        None => None,
    };

    let output = CacheListOutput {
        state: variant_name(&worker.state().await),
        controlling: worker.is_controlling(),
        current: worker.config().partitions.allow_list(),
        partitions,
        entries,
    };

    Ok(json_result(&output)?)
}
