use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use cid::Cid;
use lightning_interfaces::ProviderInterface;
use parking_lot::Mutex;

/// Records every cid it is asked to provide.
#[derive(Clone, Default)]
pub struct MockProvider {
    provided: Arc<Mutex<Vec<Cid>>>,
    fail: Arc<AtomicBool>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `provide` call fail (after recording the cid).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    pub fn provided(&self) -> Vec<Cid> {
        self.provided.lock().clone()
    }
}

#[async_trait]
impl ProviderInterface for MockProvider {
    async fn provide(&self, cid: &Cid) -> anyhow::Result<()> {
        self.provided.lock().push(*cid);
        if self.fail.load(Ordering::Relaxed) {
            return Err(anyhow!("provider unavailable"));
        }
        Ok(())
    }
}
