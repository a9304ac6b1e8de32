use lightning_interfaces::BlockstoreError;
use thiserror::Error;

use crate::verifcid::CidError;

#[derive(Debug, Error)]
pub enum BlockServiceError {
    #[error("Rejected cid: {0}")]
    RejectedHash(#[from] CidError),
    #[error(transparent)]
    Blockstore(#[from] BlockstoreError),
    #[error("Failed to fetch block from the exchange: {0}")]
    Fetch(anyhow::Error),
    #[error("Failed to notify the exchange about new blocks: {0}")]
    Notify(anyhow::Error),
    #[error("Failed to provide block: {0}")]
    Provide(anyhow::Error),
    #[error("Failed to close the exchange: {0}")]
    Close(anyhow::Error),
}

impl BlockServiceError {
    /// Returns true if the block was neither held locally nor fetchable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlockServiceError::Blockstore(e) if e.is_not_found())
    }
}
