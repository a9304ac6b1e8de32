use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use lightning_interfaces::{Block, BlockstoreError, BlockstoreInterface};
use parking_lot::RwLock;
use tracing::trace;

/// A blockstore that keeps every block in memory. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemoryBlockstore {
    inner: Arc<RwLock<HashMap<Cid, Bytes>>>,
}

impl MemoryBlockstore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[async_trait]
impl BlockstoreInterface for MemoryBlockstore {
    async fn has(&self, cid: &Cid) -> Result<bool, BlockstoreError> {
        Ok(self.inner.read().contains_key(cid))
    }

    async fn get(&self, cid: &Cid) -> Result<Block, BlockstoreError> {
        self.inner
            .read()
            .get(cid)
            .map(|data| Block::with_cid(*cid, data.clone()))
            .ok_or(BlockstoreError::NotFound(*cid))
    }

    async fn put(&self, block: Block) -> Result<(), BlockstoreError> {
        trace!("put {}", block.cid());
        let cid = *block.cid();
        self.inner.write().insert(cid, block.into_data());
        Ok(())
    }

    async fn put_many(&self, blocks: Vec<Block>) -> Result<(), BlockstoreError> {
        let mut inner = self.inner.write();
        for block in blocks {
            let cid = *block.cid();
            inner.insert(cid, block.into_data());
        }
        Ok(())
    }

    async fn delete(&self, cid: &Cid) -> Result<(), BlockstoreError> {
        self.inner.write().remove(cid);
        Ok(())
    }
}
