use async_trait::async_trait;
use cid::Cid;
use thiserror::Error;

use crate::types::Block;

#[derive(Debug, Error)]
pub enum BlockstoreError {
    #[error("Block not found in blockstore: {0}")]
    NotFound(Cid),
    #[error("Internal blockstore error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BlockstoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlockstoreError::NotFound(_))
    }
}

/// The local block cache, keyed by cid.
///
/// Implementations must be safe to share between concurrent callers, the block service
/// does not add any locking on top of them.
#[async_trait]
pub trait BlockstoreInterface: Send + Sync {
    /// Returns true if a block with the given cid is held locally.
    async fn has(&self, cid: &Cid) -> Result<bool, BlockstoreError>;

    /// Returns the block for the given cid, or [`BlockstoreError::NotFound`].
    async fn get(&self, cid: &Cid) -> Result<Block, BlockstoreError>;

    async fn put(&self, block: Block) -> Result<(), BlockstoreError>;

    /// Store a batch of blocks. Whether a failure leaves part of the batch persisted is up
    /// to the implementation.
    async fn put_many(&self, blocks: Vec<Block>) -> Result<(), BlockstoreError>;

    async fn delete(&self, cid: &Cid) -> Result<(), BlockstoreError>;
}
