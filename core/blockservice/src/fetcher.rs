use std::sync::Arc;

use cid::Cid;
use lightning_interfaces::{Block, ExchangeInterface, FetcherInterface};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The capability used to pull missing blocks from the network: either the root exchange
/// or a session created from it.
#[derive(Clone)]
pub enum Fetcher {
    Exchange(Arc<dyn ExchangeInterface>),
    Session(Arc<dyn FetcherInterface>),
}

impl Fetcher {
    pub async fn get_block(&self, cid: &Cid) -> anyhow::Result<Block> {
        match self {
            Fetcher::Exchange(exchange) => exchange.get_block(cid).await,
            Fetcher::Session(session) => session.get_block(cid).await,
        }
    }

    pub async fn get_blocks(
        &self,
        cids: Vec<Cid>,
        cancel: CancellationToken,
    ) -> anyhow::Result<mpsc::Receiver<Block>> {
        match self {
            Fetcher::Exchange(exchange) => exchange.get_blocks(cids, cancel).await,
            Fetcher::Session(session) => session.get_blocks(cids, cancel).await,
        }
    }

    pub fn is_session(&self) -> bool {
        matches!(self, Fetcher::Session(_))
    }

    /// Returns true if both fetchers point at the same underlying object.
    pub fn ptr_eq(&self, other: &Fetcher) -> bool {
        match (self, other) {
            (Fetcher::Exchange(a), Fetcher::Exchange(b)) => Arc::ptr_eq(a, b),
            (Fetcher::Session(a), Fetcher::Session(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Hands out the fetcher a read should fall back to once the blockstore misses. Only
/// consulted when the network is actually needed, so sessions stay uncreated until then.
pub(crate) trait FetcherSource: Clone + Send + Sync + 'static {
    fn grab_fetcher(&self) -> Option<Fetcher>;
}
