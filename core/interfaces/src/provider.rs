use async_trait::async_trait;
use cid::Cid;

/// Announces to the network that this node holds a block.
#[async_trait]
pub trait ProviderInterface: Send + Sync {
    async fn provide(&self, cid: &Cid) -> anyhow::Result<()>;
}
