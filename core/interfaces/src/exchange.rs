use std::sync::Arc;

use async_trait::async_trait;
use cid::Cid;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::Block;

/// Anything able to retrieve blocks from the network.
#[async_trait]
pub trait FetcherInterface: Send + Sync {
    /// Fetch a single block.
    async fn get_block(&self, cid: &Cid) -> anyhow::Result<Block>;

    /// Fetch a batch of blocks. Blocks are delivered on the returned receiver as they
    /// arrive, in no particular order, and the sender side is dropped once the fetcher
    /// is done. Blocks that could not be found are simply never sent.
    async fn get_blocks(
        &self,
        cids: Vec<Cid>,
        cancel: CancellationToken,
    ) -> anyhow::Result<mpsc::Receiver<Block>>;
}

/// The network exchange (bitswap or similar) sitting behind the block service.
#[async_trait]
pub trait ExchangeInterface: FetcherInterface {
    /// Tell the exchange that the given blocks are now available locally.
    async fn notify_new_blocks(&self, blocks: &[Block]) -> anyhow::Result<()>;

    /// Shut the exchange down.
    async fn close(&self) -> anyhow::Result<()>;

    /// Create a fetcher scoped to a single session. Exchanges that do not support
    /// sessions return `None` and are used directly instead.
    fn new_session(&self, _cancel: CancellationToken) -> Option<Arc<dyn FetcherInterface>> {
        None
    }
}
