use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use cid::Cid;
use lightning_blockstore::MemoryBlockstore;
use lightning_interfaces::{Block, BlockstoreError, BlockstoreInterface};

#[derive(Default)]
struct Counters {
    has: AtomicUsize,
    get: AtomicUsize,
    put: AtomicUsize,
    put_many: AtomicUsize,
    delete: AtomicUsize,
}

#[derive(Default)]
struct Failures {
    get: AtomicBool,
    put: AtomicBool,
}

/// A [`MemoryBlockstore`] that counts calls and can be told to fail.
#[derive(Clone, Default)]
pub struct CountingBlockstore {
    inner: MemoryBlockstore,
    counters: Arc<Counters>,
    failures: Arc<Failures>,
}

impl CountingBlockstore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryBlockstore {
        &self.inner
    }

    /// Make `get` fail with an internal error for every cid.
    pub fn set_fail_get(&self, fail: bool) {
        self.failures.get.store(fail, Ordering::Relaxed);
    }

    /// Make `put` and `put_many` fail with an internal error.
    pub fn set_fail_put(&self, fail: bool) {
        self.failures.put.store(fail, Ordering::Relaxed);
    }

    pub fn has_calls(&self) -> usize {
        self.counters.has.load(Ordering::Relaxed)
    }

    pub fn get_calls(&self) -> usize {
        self.counters.get.load(Ordering::Relaxed)
    }

    pub fn put_calls(&self) -> usize {
        self.counters.put.load(Ordering::Relaxed)
    }

    pub fn put_many_calls(&self) -> usize {
        self.counters.put_many.load(Ordering::Relaxed)
    }

    pub fn delete_calls(&self) -> usize {
        self.counters.delete.load(Ordering::Relaxed)
    }

    /// Total number of calls of any kind.
    pub fn calls(&self) -> usize {
        self.has_calls()
            + self.get_calls()
            + self.put_calls()
            + self.put_many_calls()
            + self.delete_calls()
    }
}

#[async_trait]
impl BlockstoreInterface for CountingBlockstore {
    async fn has(&self, cid: &Cid) -> Result<bool, BlockstoreError> {
        self.counters.has.fetch_add(1, Ordering::Relaxed);
        self.inner.has(cid).await
    }

    async fn get(&self, cid: &Cid) -> Result<Block, BlockstoreError> {
        self.counters.get.fetch_add(1, Ordering::Relaxed);
        if self.failures.get.load(Ordering::Relaxed) {
            return Err(anyhow!("disk on fire").into());
        }
        self.inner.get(cid).await
    }

    async fn put(&self, block: Block) -> Result<(), BlockstoreError> {
        self.counters.put.fetch_add(1, Ordering::Relaxed);
        if self.failures.put.load(Ordering::Relaxed) {
            return Err(anyhow!("disk full").into());
        }
        self.inner.put(block).await
    }

    async fn put_many(&self, blocks: Vec<Block>) -> Result<(), BlockstoreError> {
        self.counters.put_many.fetch_add(1, Ordering::Relaxed);
        if self.failures.put.load(Ordering::Relaxed) {
            return Err(anyhow!("disk full").into());
        }
        self.inner.put_many(blocks).await
    }

    async fn delete(&self, cid: &Cid) -> Result<(), BlockstoreError> {
        self.counters.delete.fetch_add(1, Ordering::Relaxed);
        self.inner.delete(cid).await
    }
}
