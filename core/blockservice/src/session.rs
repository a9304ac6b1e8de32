use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use cid::Cid;
use lightning_interfaces::Block;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, Instrument};

use crate::blockservice::{self, BlockGetter, BlockService};
use crate::error::BlockServiceError;
use crate::fetcher::{Fetcher, FetcherSource};

/// A view of the block service whose network reads all go through one exchange session,
/// so the exchange can narrow its search to the peers that already served this session.
///
/// The exchange session is created lazily, on the first read that misses the blockstore.
/// Clones share the same session.
#[derive(Clone)]
pub struct Session {
    service: BlockService,
    fetcher: Arc<OnceLock<Option<Fetcher>>>,
    // Only kept until the fetcher is created.
    cancel: Arc<Mutex<Option<CancellationToken>>>,
}

impl Session {
    pub(crate) fn new(service: BlockService, cancel: CancellationToken) -> Self {
        Self {
            service,
            fetcher: Arc::new(OnceLock::new()),
            cancel: Arc::new(Mutex::new(Some(cancel))),
        }
    }

    pub fn block_service(&self) -> &BlockService {
        &self.service
    }

    /// The fetcher used for network reads, creating it on first use. `None` when the block
    /// service has no exchange.
    pub fn fetcher(&self) -> Option<Fetcher> {
        // Concurrent first callers block here until the one running the initializer is done.
        self.fetcher
            .get_or_init(|| self.create_fetcher())
            .clone()
    }

    fn create_fetcher(&self) -> Option<Fetcher> {
        let cancel = self.cancel.lock().take().unwrap_or_default();

        let exchange = self.service.exchange()?.clone();
        match exchange.new_session(cancel) {
            Some(session) => {
                debug!("created exchange session");
                Some(Fetcher::Session(session))
            },
            // The exchange has no notion of sessions, use it directly.
            None => Some(Fetcher::Exchange(exchange)),
        }
    }
}

impl FetcherSource for Session {
    fn grab_fetcher(&self) -> Option<Fetcher> {
        self.fetcher()
    }
}

#[async_trait]
impl BlockGetter for Session {
    async fn get_block(&self, cid: &Cid) -> Result<Block, BlockServiceError> {
        blockservice::get_block(&self.service, cid, self)
            .instrument(debug_span!("session.get_block", %cid))
            .await
    }

    fn get_blocks(&self, cids: Vec<Cid>, cancel: CancellationToken) -> mpsc::Receiver<Block> {
        let span = debug_span!("session.get_blocks", count = cids.len());
        blockservice::get_blocks(self.service.clone(), cids, self.clone(), cancel, span)
    }
}

#[cfg(test)]
mod tests {
    use lightning_blockstore::MemoryBlockstore;
    use lightning_test_utils::exchange::MockExchange;

    use super::*;

    #[test]
    fn test_token_is_released_once_fetcher_exists() {
        let exchange = MockExchange::new().with_sessions();
        let service = BlockService::new(
            Arc::new(MemoryBlockstore::new()),
            Some(Arc::new(exchange.clone())),
        );
        let session = service.new_session(CancellationToken::new());
        assert!(session.cancel.lock().is_some());

        assert!(session.fetcher().is_some_and(|fetcher| fetcher.is_session()));
        assert!(session.cancel.lock().is_none());

        session.clone().fetcher();
        assert_eq!(exchange.session_calls(), 1);
    }

    #[test]
    fn test_offline_session_has_no_fetcher() {
        let service = BlockService::new(Arc::new(MemoryBlockstore::new()), None);
        let session = service.new_session(CancellationToken::new());
        assert!(session.fetcher().is_none());
        assert!(session.cancel.lock().is_none());
        assert!(session.block_service().exchange().is_none());
    }
}
