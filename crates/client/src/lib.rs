//! Client code for swcache.
//!
//! This crate provides the network fetcher and the offline-first worker
//! that routes requests between the network and the cache partitions.

pub mod fetch;
pub mod worker;

pub use fetch::{FetchClient, FetchConfig, Fetcher};
pub use worker::{
    Classification, Classifier, Clock, ControlMessage, EvictionReport, Handled, LifecycleState, MessageReport,
    PartitionNames, Refresh, ResponseSource, SystemClock, Worker, WorkerConfig,
};
