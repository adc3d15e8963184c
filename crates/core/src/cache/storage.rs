//! Storage capability consumed by the worker.
//!
//! The worker only ever needs these six operations, so tests can wrap or
//! replace the SQLite store without a database on disk.

use async_trait::async_trait;

use super::connection::CacheDb;
use crate::{Error, Request, Response};

/// Named partitions of request → response pairs.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the partition if it is absent.
    async fn open(&self, partition: &str) -> Result<(), Error>;

    /// Names of every partition currently present.
    async fn partitions(&self) -> Result<Vec<String>, Error>;

    /// Delete a partition with all its entries. Returns false if it did not exist.
    async fn delete(&self, partition: &str) -> Result<bool, Error>;

    /// Stored response for the request, if any.
    async fn lookup(&self, partition: &str, request: &Request) -> Result<Option<Response>, Error>;

    /// Store (or replace) the response for the request.
    async fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<(), Error>;

    /// Store a batch atomically: on error nothing from the batch is kept.
    async fn put_all(&self, partition: &str, entries: &[(Request, Response)]) -> Result<(), Error>;
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, partition: &str) -> Result<(), Error> {
        self.open_partition(partition).await
    }

    async fn partitions(&self) -> Result<Vec<String>, Error> {
        self.list_partitions().await
    }

    async fn delete(&self, partition: &str) -> Result<bool, Error> {
        self.delete_partition(partition).await
    }

    async fn lookup(&self, partition: &str, request: &Request) -> Result<Option<Response>, Error> {
        self.get_entry(partition, request).await
    }

    async fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<(), Error> {
        self.put_entry(partition, request, response).await
    }

    async fn put_all(&self, partition: &str, entries: &[(Request, Response)]) -> Result<(), Error> {
        self.put_entries(partition, entries).await
    }
}
