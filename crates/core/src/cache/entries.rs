//! Entry reads and writes within a partition.
//!
//! Entries are immutable once written; a second put for the same request
//! replaces the row wholesale.

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::{Error, Request, Response};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Listing row for an entry, without its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntryMeta {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub stored_at: String,
}

/// One entry ready to be written.
struct EntryRow {
    key_hash: String,
    method: String,
    /// Request URL; the entry is keyed and listed by it.
    url: String,
    /// Where the response actually came from after redirects.
    final_url: String,
    status: i64,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(request: &Request, response: &Response) -> Result<Self, Error> {
        Ok(Self {
            key_hash: compute_cache_key(&request.method, &request.url),
            method: request.method.clone(),
            url: request.url.to_string(),
            final_url: response.url.clone(),
            status: i64::from(response.status),
            headers_json: serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(e.to_string()))?,
            body: response.body.clone(),
        })
    }
}

impl CacheDb {
    /// Store a response for a request, creating the partition if needed.
    pub async fn put_entry(&self, partition: &str, request: &Request, response: &Response) -> Result<(), Error> {
        let row = EntryRow::new(request, response)?;
        self.write_rows(partition, vec![row]).await
    }

    /// Store a batch of responses in one transaction: either every entry
    /// lands or none does.
    pub async fn put_entries(&self, partition: &str, entries: &[(Request, Response)]) -> Result<(), Error> {
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        self.write_rows(partition, rows).await
    }

    async fn write_rows(&self, partition: &str, rows: Vec<EntryRow>) -> Result<(), Error> {
        let partition = partition.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![&partition, &now],
                )?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO entries
                            (partition, key_hash, method, url, final_url, status, headers_json, body, stored_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                         ON CONFLICT(partition, key_hash) DO UPDATE SET
                            method = excluded.method,
                            url = excluded.url,
                            final_url = excluded.final_url,
                            status = excluded.status,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                    )?;
                    for row in &rows {
                        stmt.execute(params![
                            &partition,
                            &row.key_hash,
                            &row.method,
                            &row.url,
                            &row.final_url,
                            row.status,
                            &row.headers_json,
                            &row.body,
                            &now
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for a request.
    ///
    /// Returns None if the partition or the entry doesn't exist.
    pub async fn get_entry(&self, partition: &str, request: &Request) -> Result<Option<Response>, Error> {
        let partition = partition.to_string();
        let key_hash = compute_cache_key(&request.method, &request.url);
        let stored = self
            .conn
            .call(move |conn| -> Result<Option<(String, i64, String, Vec<u8>)>, Error> {
                let result = conn.query_row(
                    "SELECT COALESCE(final_url, url), status, headers_json, body FROM entries
                     WHERE partition = ?1 AND key_hash = ?2",
                    params![partition, key_hash],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                );

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        let Some((url, status, headers_json, body)) = stored else {
            return Ok(None);
        };

        let headers = serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status}")))?;

        Ok(Some(Response { url, status, headers, body }))
    }

    /// List the entries of a partition, most recently stored first.
    pub async fn list_entries(&self, partition: &str) -> Result<Vec<EntryMeta>, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntryMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, stored_at FROM entries
                     WHERE partition = ?1 ORDER BY stored_at DESC, url",
                )?;
                let entries = stmt
                    .query_map(params![partition], |row| {
                        Ok(EntryMeta {
                            method: row.get(0)?,
                            url: row.get(1)?,
                            status: u16::try_from(row.get::<_, i64>(2)?)
                                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Integer, Box::new(e)))?,
                            stored_at: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }
}
