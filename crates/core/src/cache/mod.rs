//! SQLite-backed partition store for cached HTTP responses.
//!
//! This module provides named, versioned cache partitions using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Request-keyed entries using SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Partition deletion with cascading entry removal

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod partitions;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::EntryMeta;
pub use partitions::PartitionStats;
pub use storage::CacheStorage;
