//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Partitioned response cache with SQLite backend
//! - Request/response value types shared by the worker and the server
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheStorage, PartitionStats};
pub use config::AppConfig;
pub use error::Error;
pub use http::{Request, Response};
