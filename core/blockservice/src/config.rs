use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Skip the existence check before writes and always hit the blockstore.
    pub write_through: bool,
    // Multihash codes accepted for cids. The default allowlist is used when unset.
    pub allowlist: Option<Vec<u64>>,
}
