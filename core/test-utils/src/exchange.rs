use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use cid::Cid;
use lightning_interfaces::{Block, ExchangeInterface, FetcherInterface};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Counters {
    get_block: AtomicUsize,
    get_blocks: AtomicUsize,
    notify: AtomicUsize,
    close: AtomicUsize,
    sessions: AtomicUsize,
}

#[derive(Default)]
struct Failures {
    notify: AtomicBool,
    get_blocks: AtomicBool,
}

/// Senders of the batch fetch channels, kept alive when streams are held open.
#[derive(Default)]
struct Streams {
    hold: AtomicBool,
    senders: Mutex<Vec<mpsc::Sender<Block>>>,
}

/// The blocks "the network" can serve.
type Network = Arc<RwLock<HashMap<Cid, Block>>>;

/// An exchange backed by an in-memory map of blocks available on the network.
#[derive(Clone, Default)]
pub struct MockExchange {
    network: Network,
    counters: Arc<Counters>,
    failures: Arc<Failures>,
    streams: Arc<Streams>,
    notified: Arc<Mutex<Vec<Cid>>>,
    session_tokens: Arc<Mutex<Vec<CancellationToken>>>,
    supports_sessions: bool,
    session_delay: Option<Duration>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Support sessions. Every session fetches from the same network.
    pub fn with_sessions(mut self) -> Self {
        self.supports_sessions = true;
        self
    }

    /// Block the thread creating a session for `delay`, to widen the window in which
    /// concurrent callers race on session creation.
    pub fn with_session_delay(mut self, delay: Duration) -> Self {
        self.session_delay = Some(delay);
        self
    }

    /// Make `block` retrievable from the network.
    pub fn insert(&self, block: Block) {
        self.network.write().insert(*block.cid(), block);
    }

    pub fn set_fail_notify(&self, fail: bool) {
        self.failures.notify.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_get_blocks(&self, fail: bool) {
        self.failures.get_blocks.store(fail, Ordering::Relaxed);
    }

    /// Keep batch fetch channels open after the known blocks were queued, as a peer that
    /// never answers would. The held senders are available through [`Self::open_streams`].
    pub fn set_hold_streams(&self, hold: bool) {
        self.streams.hold.store(hold, Ordering::Relaxed);
    }

    /// Senders of the batch fetches held open so far, oldest first.
    pub fn open_streams(&self) -> Vec<mpsc::Sender<Block>> {
        self.streams.senders.lock().clone()
    }

    pub fn get_block_calls(&self) -> usize {
        self.counters.get_block.load(Ordering::Relaxed)
    }

    pub fn get_blocks_calls(&self) -> usize {
        self.counters.get_blocks.load(Ordering::Relaxed)
    }

    pub fn notify_calls(&self) -> usize {
        self.counters.notify.load(Ordering::Relaxed)
    }

    pub fn close_calls(&self) -> usize {
        self.counters.close.load(Ordering::Relaxed)
    }

    pub fn session_calls(&self) -> usize {
        self.counters.sessions.load(Ordering::Relaxed)
    }

    /// Every fetch related call, sessions included.
    pub fn fetch_calls(&self) -> usize {
        self.get_block_calls() + self.get_blocks_calls() + self.session_calls()
    }

    /// The cids the exchange was notified about, in order.
    pub fn notified(&self) -> Vec<Cid> {
        self.notified.lock().clone()
    }

    /// The cancellation tokens sessions were created with.
    pub fn session_tokens(&self) -> Vec<CancellationToken> {
        self.session_tokens.lock().clone()
    }
}

#[async_trait]
impl FetcherInterface for MockExchange {
    async fn get_block(&self, cid: &Cid) -> anyhow::Result<Block> {
        self.counters.get_block.fetch_add(1, Ordering::Relaxed);
        fetch_one(&self.network, cid)
    }

    async fn get_blocks(
        &self,
        cids: Vec<Cid>,
        _cancel: CancellationToken,
    ) -> anyhow::Result<mpsc::Receiver<Block>> {
        self.counters.get_blocks.fetch_add(1, Ordering::Relaxed);
        if self.failures.get_blocks.load(Ordering::Relaxed) {
            return Err(anyhow!("no peers"));
        }
        Ok(fetch_many(&self.network, &self.streams, &cids))
    }
}

#[async_trait]
impl ExchangeInterface for MockExchange {
    async fn notify_new_blocks(&self, blocks: &[Block]) -> anyhow::Result<()> {
        self.counters.notify.fetch_add(1, Ordering::Relaxed);
        self.notified
            .lock()
            .extend(blocks.iter().map(|block| *block.cid()));
        if self.failures.notify.load(Ordering::Relaxed) {
            return Err(anyhow!("exchange is not listening"));
        }
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.counters.close.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn new_session(&self, cancel: CancellationToken) -> Option<Arc<dyn FetcherInterface>> {
        if !self.supports_sessions {
            return None;
        }
        if let Some(delay) = self.session_delay {
            std::thread::sleep(delay);
        }
        self.counters.sessions.fetch_add(1, Ordering::Relaxed);
        self.session_tokens.lock().push(cancel);
        Some(Arc::new(MockSession {
            network: self.network.clone(),
            counters: self.counters.clone(),
            streams: self.streams.clone(),
        }))
    }
}

/// A session handed out by [`MockExchange`]. Its fetches count towards the exchange's
/// counters.
pub struct MockSession {
    network: Network,
    counters: Arc<Counters>,
    streams: Arc<Streams>,
}

#[async_trait]
impl FetcherInterface for MockSession {
    async fn get_block(&self, cid: &Cid) -> anyhow::Result<Block> {
        self.counters.get_block.fetch_add(1, Ordering::Relaxed);
        fetch_one(&self.network, cid)
    }

    async fn get_blocks(
        &self,
        cids: Vec<Cid>,
        _cancel: CancellationToken,
    ) -> anyhow::Result<mpsc::Receiver<Block>> {
        self.counters.get_blocks.fetch_add(1, Ordering::Relaxed);
        Ok(fetch_many(&self.network, &self.streams, &cids))
    }
}

fn fetch_one(network: &Network, cid: &Cid) -> anyhow::Result<Block> {
    network
        .read()
        .get(cid)
        .cloned()
        .ok_or_else(|| anyhow!("block {cid} not found on the network"))
}

/// Queue every block the network has and close the channel behind them, unless streams
/// are held open.
fn fetch_many(network: &Network, streams: &Streams, cids: &[Cid]) -> mpsc::Receiver<Block> {
    let found: Vec<_> = {
        let network = network.read();
        cids.iter()
            .filter_map(|cid| network.get(cid).cloned())
            .collect()
    };
    let (tx, rx) = mpsc::channel(found.len().max(1));
    for block in found {
        // The channel has room for every block.
        let _ = tx.try_send(block);
    }
    if streams.hold.load(Ordering::Relaxed) {
        streams.senders.lock().push(tx);
    }
    rx
}
