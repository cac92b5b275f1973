use async_trait::async_trait;
use memex_rs_memory::{InMemoryStore, MemoryError, MemoryFilter, MemoryRecord, MemoryStore};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Store operation that can be switched to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Add,
    Get,
    Update,
    Purge,
    Query,
    Clear,
}

impl StoreOp {
    pub const READS: [StoreOp; 2] = [StoreOp::Get, StoreOp::Query];
    pub const WRITES: [StoreOp; 4] = [StoreOp::Add, StoreOp::Update, StoreOp::Purge, StoreOp::Clear];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreOp::Add => "add",
            StoreOp::Get => "get",
            StoreOp::Update => "update",
            StoreOp::Purge => "purge",
            StoreOp::Query => "query",
            StoreOp::Clear => "clear",
        }
    }
}

/// In-memory store whose operations can be switched to fail one by one.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: InMemoryStore,
    failing: Mutex<HashSet<StoreOp>>,
    failures: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose `get` and `query` always fail.
    pub fn reads_fail() -> Self {
        Self::failing(StoreOp::READS)
    }

    pub fn failing(ops: impl IntoIterator<Item = StoreOp>) -> Self {
        let store = Self::default();
        store.failing.lock().extend(ops);
        store
    }

    pub fn set_failing(&self, op: StoreOp, fail: bool) {
        let mut failing = self.failing.lock();
        if fail {
            failing.insert(op);
        } else {
            failing.remove(&op);
        }
    }

    /// Number of calls that returned an injected failure.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Records as held by the backing store, bypassing injected failures.
    pub async fn snapshot(&self) -> Vec<MemoryRecord> {
        self.inner
            .query(&MemoryFilter::all())
            .await
            .unwrap_or_default()
    }

    fn check(&self, op: StoreOp) -> Result<(), MemoryError> {
        if !self.failing.lock().contains(&op) {
            return Ok(());
        }
        self.failures.fetch_add(1, Ordering::SeqCst);
        Err(MemoryError::Io(std::io::Error::other(format!(
            "injected {} failure",
            op.as_str()
        ))))
    }
}

#[async_trait]
impl MemoryStore for FailingStore {
    async fn add(&self, record: MemoryRecord) -> Result<MemoryRecord, MemoryError> {
        self.check(StoreOp::Add)?;
        self.inner.add(record).await
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        self.check(StoreOp::Get)?;
        self.inner.get(id).await
    }

    async fn update(&self, record: MemoryRecord) -> Result<(), MemoryError> {
        self.check(StoreOp::Update)?;
        self.inner.update(record).await
    }

    async fn purge(&self, id: &str) -> Result<bool, MemoryError> {
        self.check(StoreOp::Purge)?;
        self.inner.purge(id).await
    }

    async fn query(&self, filter: &MemoryFilter) -> Result<Vec<MemoryRecord>, MemoryError> {
        self.check(StoreOp::Query)?;
        self.inner.query(filter).await
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.check(StoreOp::Clear)?;
        self.inner.clear().await
    }
}
