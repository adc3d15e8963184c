//! Test doubles for the worker: scripted network, spying store, manual clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use swcache_core::{CacheDb, CacheStorage, Error, Request, Response};
use url::Url;

use super::{Clock, PartitionNames, Worker, WorkerConfig};
use crate::fetch::Fetcher;

pub(crate) const ORIGIN: &str = "https://condo.example";

#[derive(Clone)]
enum Reply {
    Status(u16, String),
    Redirect(String),
    Offline,
}

/// Fetcher answering by URL path. Unrouted paths fail like an offline network.
#[derive(Default)]
pub(crate) struct MockFetcher {
    routes: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<Request>>,
}

impl MockFetcher {
    pub(crate) fn route(&self, path: &str, status: u16, body: &str) {
        self.set(path, Reply::Status(status, body.to_string()));
    }

    pub(crate) fn offline(&self, path: &str) {
        self.set(path, Reply::Offline);
    }

    /// Answer 200 with `target` as the final URL.
    pub(crate) fn redirect(&self, path: &str, target: &str) {
        self.set(path, Reply::Redirect(target.to_string()));
    }

    fn set(&self, path: &str, reply: Reply) {
        self.routes.lock().unwrap().insert(path.to_string(), reply);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls_for(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| r.url.path() == path).count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.clone());
        let reply = self.routes.lock().unwrap().get(request.url.path()).cloned();

        match reply {
            Some(Reply::Status(status, body)) => Ok(Response::new(request.url.as_str(), status, body)),
            Some(Reply::Redirect(target)) => Ok(Response::new(target, 200, "redirected")),
            Some(Reply::Offline) | None => Err(Error::Network(format!("offline: {}", request.url))),
        }
    }
}

/// In-memory store that counts every call and can be told to fail.
pub(crate) struct SpyStorage {
    db: CacheDb,
    opens: AtomicUsize,
    lists: AtomicUsize,
    deletes: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    fail_lists: AtomicBool,
    fail_delete: Mutex<Option<String>>,
}

impl SpyStorage {
    pub(crate) async fn new() -> Self {
        Self {
            db: CacheDb::open_in_memory().await.unwrap(),
            opens: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            fail_delete: Mutex::new(None),
        }
    }

    /// Direct access that bypasses the counters.
    pub(crate) fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Calls made through the storage trait, of any kind.
    pub(crate) fn touches(&self) -> usize {
        [&self.opens, &self.lists, &self.deletes, &self.reads, &self.writes]
            .iter()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }

    pub(crate) fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_delete(&self, partition: &str) {
        *self.fail_delete.lock().unwrap() = Some(partition.to_string());
    }

    fn injected(what: &str) -> Error {
        Error::CorruptEntry(format!("injected {what} failure"))
    }
}

#[async_trait]
impl CacheStorage for SpyStorage {
    async fn open(&self, partition: &str) -> Result<(), Error> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.db.open_partition(partition).await
    }

    async fn partitions(&self) -> Result<Vec<String>, Error> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(Self::injected("list"));
        }
        self.db.list_partitions().await
    }

    async fn delete(&self, partition: &str) -> Result<bool, Error> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail_delete.lock().unwrap().as_deref() == Some(partition);
        if fail {
            return Err(Self::injected("delete"));
        }
        self.db.delete_partition(partition).await
    }

    async fn lookup(&self, partition: &str, request: &Request) -> Result<Option<Response>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected("read"));
        }
        self.db.get_entry(partition, request).await
    }

    async fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("write"));
        }
        self.db.put_entry(partition, request, response).await
    }

    async fn put_all(&self, partition: &str, entries: &[(Request, Response)]) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("write"));
        }
        self.db.put_entries(partition, entries).await
    }
}

/// Clock that only moves when told to.
pub(crate) struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub(crate) fn new(now_ms: i64) -> Self {
        Self { now_ms: AtomicI64::new(now_ms) }
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    pub(crate) fn advance(&self, by: Duration) {
        self.now_ms.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        ManualClock::now_ms(self)
    }
}

/// A worker for `https://condo.example`, version `v3`, wired to test doubles.
pub(crate) struct Harness {
    pub(crate) worker: Worker,
    pub(crate) fetcher: Arc<MockFetcher>,
    pub(crate) storage: Arc<SpyStorage>,
    pub(crate) clock: Arc<ManualClock>,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        let mut config = WorkerConfig::new(Url::parse(ORIGIN).unwrap());
        config.partitions = PartitionNames::versioned("condo", "v3");

        let fetcher = Arc::new(MockFetcher::default());
        let storage = Arc::new(SpyStorage::new().await);
        let clock = Arc::new(ManualClock::new(1_760_000_000_000));

        let worker = Worker::new(config, storage.clone(), fetcher.clone()).with_clock(clock.clone());

        Self { worker, fetcher, storage, clock }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{ORIGIN}{path}")
    }

    pub(crate) fn get(&self, path: &str) -> Request {
        Request::get(Url::parse(&self.url(path)).unwrap())
    }
}
