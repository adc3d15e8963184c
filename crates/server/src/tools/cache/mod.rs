//! Cache inspection tools.
//!
//! This module provides tools for looking into the partition store.

pub mod list;

pub use list::{CacheListParams, list_impl};
