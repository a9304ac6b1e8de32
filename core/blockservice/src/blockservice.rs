use std::slice;
use std::sync::Arc;

use async_trait::async_trait;
use cid::Cid;
use lightning_interfaces::{
    Block,
    BlockstoreInterface,
    ConfigConsumer,
    ExchangeInterface,
    ProviderInterface,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, warn, Instrument};

use crate::config::Config;
use crate::error::BlockServiceError;
use crate::fetcher::{Fetcher, FetcherSource};
use crate::session::Session;
use crate::verifcid::{self, Allowlist, DefaultAllowlist, HashSetAllowlist};

/// The read surface shared by the block service and its sessions.
#[async_trait]
pub trait BlockGetter: Send + Sync {
    /// Get a block, from the blockstore if present, otherwise from the exchange.
    async fn get_block(&self, cid: &Cid) -> Result<Block, BlockServiceError>;

    /// Get a batch of blocks. Blocks are sent on the returned receiver as they are found,
    /// in no particular order.
    ///
    /// Blocks that cannot be found, or that are still missing when `cancel` fires, are
    /// silently left out and the receiver is closed early. It is up to the caller to keep
    /// track of which blocks it got and which it did not.
    ///
    /// Must be called from within a tokio runtime.
    fn get_blocks(&self, cids: Vec<Cid>, cancel: CancellationToken) -> mpsc::Receiver<Block>;
}

/// A hybrid block store: blocks are read from and written to the local blockstore, and
/// anything missing locally is retrieved through the exchange.
#[derive(Clone)]
pub struct BlockService {
    blockstore: Arc<dyn BlockstoreInterface>,
    exchange: Option<Arc<dyn ExchangeInterface>>,
    provider: Option<Arc<dyn ProviderInterface>>,
    allowlist: Arc<dyn Allowlist>,
    // If set, check that a block doesn't already exist before writing it, to avoid
    // announcing it to the exchange and the provider again.
    check_first: bool,
}

impl ConfigConsumer for BlockService {
    const KEY: &'static str = "blockservice";
    type Config = Config;
}

impl BlockService {
    /// Create a block service on top of the given blockstore. Without an exchange the
    /// service runs in local (offline) mode.
    pub fn new(
        blockstore: Arc<dyn BlockstoreInterface>,
        exchange: Option<Arc<dyn ExchangeInterface>>,
    ) -> Self {
        if exchange.is_none() {
            debug!("blockservice running in local (offline) mode");
        }

        Self {
            blockstore,
            exchange,
            provider: None,
            allowlist: Arc::new(DefaultAllowlist),
            check_first: true,
        }
    }

    pub fn init(
        config: Config,
        blockstore: Arc<dyn BlockstoreInterface>,
        exchange: Option<Arc<dyn ExchangeInterface>>,
    ) -> Self {
        let mut service = Self::new(blockstore, exchange);
        if config.write_through {
            service = service.write_through();
        }
        if let Some(codes) = config.allowlist {
            service = service.with_allowlist(Arc::new(HashSetAllowlist::new(codes)));
        }
        service
    }

    /// Disable the existence check on writes so they always go to the blockstore.
    pub fn write_through(mut self) -> Self {
        self.check_first = false;
        self
    }

    pub fn with_allowlist(mut self, allowlist: Arc<dyn Allowlist>) -> Self {
        self.allowlist = allowlist;
        self
    }

    /// Advertise every block added or fetched through the service.
    pub fn with_provider(mut self, provider: Arc<dyn ProviderInterface>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn blockstore(&self) -> &Arc<dyn BlockstoreInterface> {
        &self.blockstore
    }

    pub fn exchange(&self) -> Option<&Arc<dyn ExchangeInterface>> {
        self.exchange.as_ref()
    }

    pub fn allowlist(&self) -> &Arc<dyn Allowlist> {
        &self.allowlist
    }

    pub fn provider(&self) -> Option<&Arc<dyn ProviderInterface>> {
        self.provider.as_ref()
    }

    /// Create a session that shares one exchange session across all of its reads. The
    /// exchange session is only created on the first read that needs the network, using
    /// `cancel` as its lifetime.
    pub fn new_session(&self, cancel: CancellationToken) -> Session {
        Session::new(self.clone(), cancel)
    }

    /// Put a block into the blockstore and announce it.
    #[tracing::instrument(name = "blockservice.add_block", skip_all, fields(cid = %block.cid()))]
    pub async fn add_block(&self, block: Block) -> Result<(), BlockServiceError> {
        let cid = *block.cid();
        // hash security
        verifcid::validate_cid(self.allowlist.as_ref(), &cid)?;

        if self.check_first && self.blockstore.has(&cid).await? {
            return Ok(());
        }

        self.blockstore.put(block.clone()).await?;
        debug!("block added {cid}");

        if let Some(exchange) = &self.exchange {
            if let Err(e) = exchange.notify_new_blocks(slice::from_ref(&block)).await {
                error!("Failed to notify the exchange about {cid}: {e:?}");
            }
        }
        if let Some(provider) = &self.provider {
            if let Err(e) = provider.provide(&cid).await {
                error!("Failed to provide {cid}: {e:?}");
            }
        }

        Ok(())
    }

    /// Put a batch of blocks into the blockstore with a single write and announce them.
    /// A single invalid cid rejects the whole batch before anything is written.
    #[tracing::instrument(name = "blockservice.add_blocks", skip_all, fields(count = blocks.len()))]
    pub async fn add_blocks(&self, blocks: Vec<Block>) -> Result<(), BlockServiceError> {
        // hash security
        for block in &blocks {
            verifcid::validate_cid(self.allowlist.as_ref(), block.cid())?;
        }

        let to_put = if self.check_first {
            let mut to_put = Vec::with_capacity(blocks.len());
            for block in blocks {
                if !self.blockstore.has(block.cid()).await? {
                    to_put.push(block);
                }
            }
            to_put
        } else {
            blocks
        };

        if to_put.is_empty() {
            return Ok(());
        }

        self.blockstore.put_many(to_put.clone()).await?;
        debug!("{} blocks added", to_put.len());

        if let Some(exchange) = &self.exchange {
            if let Err(e) = exchange.notify_new_blocks(&to_put).await {
                error!("Failed to notify the exchange about new blocks: {e:?}");
            }
        }
        if let Some(provider) = &self.provider {
            for block in &to_put {
                if let Err(e) = provider.provide(block.cid()).await {
                    error!("Failed to provide {}: {e:?}", block.cid());
                }
            }
        }

        Ok(())
    }

    /// Remove a block from the blockstore. Deletion does not go through the allowlist.
    #[tracing::instrument(name = "blockservice.delete_block", skip_all, fields(%cid))]
    pub async fn delete_block(&self, cid: &Cid) -> Result<(), BlockServiceError> {
        self.blockstore.delete(cid).await?;
        debug!("block deleted {cid}");
        Ok(())
    }

    /// Shut down the exchange, if there is one.
    pub async fn close(&self) -> Result<(), BlockServiceError> {
        debug!("blockservice is shutting down");
        match &self.exchange {
            Some(exchange) => exchange.close().await.map_err(BlockServiceError::Close),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BlockGetter for BlockService {
    async fn get_block(&self, cid: &Cid) -> Result<Block, BlockServiceError> {
        get_block(self, cid, self)
            .instrument(debug_span!("blockservice.get_block", %cid))
            .await
    }

    fn get_blocks(&self, cids: Vec<Cid>, cancel: CancellationToken) -> mpsc::Receiver<Block> {
        let span = debug_span!("blockservice.get_blocks", count = cids.len());
        get_blocks(self.clone(), cids, self.clone(), cancel, span)
    }
}

impl FetcherSource for BlockService {
    fn grab_fetcher(&self) -> Option<Fetcher> {
        self.exchange.clone().map(Fetcher::Exchange)
    }
}

pub(crate) async fn get_block<S: FetcherSource>(
    service: &BlockService,
    cid: &Cid,
    source: &S,
) -> Result<Block, BlockServiceError> {
    // hash security
    verifcid::validate_cid(service.allowlist.as_ref(), cid)?;

    let not_found = match service.blockstore.get(cid).await {
        Ok(block) => return Ok(block),
        Err(e) if e.is_not_found() => e,
        Err(e) => return Err(e.into()),
    };

    let Some(fetcher) = source.grab_fetcher() else {
        debug!("block {cid} not found locally");
        return Err(not_found.into());
    };

    debug!("searching the exchange for {cid}");
    let block = fetcher
        .get_block(cid)
        .await
        .map_err(BlockServiceError::Fetch)?;

    // Cache the block locally and let the exchange know we have it now.
    service.blockstore.put(block.clone()).await?;
    if let Some(exchange) = &service.exchange {
        exchange
            .notify_new_blocks(slice::from_ref(&block))
            .await
            .map_err(BlockServiceError::Notify)?;
    }
    if let Some(provider) = &service.provider {
        provider
            .provide(block.cid())
            .await
            .map_err(BlockServiceError::Provide)?;
    }

    debug!("block fetched {cid}");
    Ok(block)
}

pub(crate) fn get_blocks<S: FetcherSource>(
    service: BlockService,
    cids: Vec<Cid>,
    source: S,
    cancel: CancellationToken,
    span: tracing::Span,
) -> mpsc::Receiver<Block> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(stream_blocks(service, cids, source, cancel, tx).instrument(span));
    rx
}

/// Drives one batch read. Returning from this function drops `out`, which is how the
/// caller learns that the batch is over.
async fn stream_blocks<S: FetcherSource>(
    service: BlockService,
    cids: Vec<Cid>,
    source: S,
    cancel: CancellationToken,
    out: mpsc::Sender<Block>,
) {
    let cids = retain_valid(service.allowlist.as_ref(), cids);

    let mut misses = Vec::new();
    for cid in cids {
        match service.blockstore.get(&cid).await {
            Ok(block) => {
                if !send(&out, block, &cancel).await {
                    return;
                }
            },
            Err(e) => {
                if !e.is_not_found() {
                    debug!("blockstore failed to get {cid}, trying the exchange: {e:?}");
                }
                misses.push(cid);
            },
        }
    }

    // Sessions are set up by the first batch read even when everything was local.
    let fetcher = source.grab_fetcher();
    if misses.is_empty() {
        return;
    }
    let Some(fetcher) = fetcher else {
        return;
    };

    let mut remote = match fetcher.get_blocks(misses, cancel.clone()).await {
        Ok(remote) => remote,
        Err(e) => {
            error!("Failed to request blocks from the exchange: {e:?}");
            return;
        },
    };

    loop {
        let block = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            block = remote.recv() => match block {
                Some(block) => block,
                None => return,
            },
        };

        if let Err(e) = service.blockstore.put(block.clone()).await {
            error!("Failed to write blocks from the network to the blockstore: {e:?}");
            return;
        }
        if let Some(exchange) = &service.exchange {
            if let Err(e) = exchange.notify_new_blocks(slice::from_ref(&block)).await {
                error!("Failed to notify the exchange about new blocks: {e:?}");
                return;
            }
        }
        if let Some(provider) = &service.provider {
            if let Err(e) = provider.provide(block.cid()).await {
                error!("Failed to provide new blocks: {e:?}");
                return;
            }
        }

        if !send(&out, block, &cancel).await {
            return;
        }
    }
}

/// Drop every cid that fails validation. The common case is that all of them are valid,
/// so the input is only copied once an invalid cid shows up, and the already validated
/// prefix is not checked again.
fn retain_valid(allowlist: &dyn Allowlist, cids: Vec<Cid>) -> Vec<Cid> {
    let Some(first_invalid) = cids
        .iter()
        .position(|cid| verifcid::validate_cid(allowlist, cid).is_err())
    else {
        return cids;
    };

    let mut valid = Vec::with_capacity(cids.len());
    valid.extend_from_slice(&cids[..first_invalid]);
    for cid in &cids[first_invalid..] {
        match verifcid::validate_cid(allowlist, cid) {
            Ok(()) => valid.push(*cid),
            Err(e) => warn!("Unsafe cid {cid} passed to get_blocks: {e}"),
        }
    }
    valid
}

/// Send a block to the caller. Returns false if the caller went away or the request was
/// cancelled.
async fn send(out: &mpsc::Sender<Block>, block: Block, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        res = out.send(block) => res.is_ok(),
    }
}
