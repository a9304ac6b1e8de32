use bytes::Bytes;
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use thiserror::Error;

/// Multicodec code for raw binary content.
pub const RAW_CODEC: u64 = 0x55;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("Unsupported multihash code: {0:#x}")]
    UnsupportedHash(u64),
    #[error("Data does not match cid {0}")]
    HashMismatch(Cid),
}

/// An immutable piece of content together with its content identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    cid: Cid,
    data: Bytes,
}

impl Block {
    /// Create a raw block, addressed by the sha2-256 hash of its data.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let hash = Code::Sha2_256.digest(&data);
        Self {
            cid: Cid::new_v1(RAW_CODEC, hash),
            data,
        }
    }

    /// Create a block without checking that `data` hashes to `cid`.
    pub fn with_cid(cid: Cid, data: impl Into<Bytes>) -> Self {
        Self {
            cid,
            data: data.into(),
        }
    }

    /// Create a block after verifying that `data` hashes to `cid`.
    pub fn new_checked(cid: Cid, data: impl Into<Bytes>) -> Result<Self, BlockError> {
        let data = data.into();
        let code = cid.hash().code();
        let hasher = Code::try_from(code).map_err(|_| BlockError::UnsupportedHash(code))?;
        if &hasher.digest(&data) != cid.hash() {
            return Err(BlockError::HashMismatch(cid));
        }
        Ok(Self { cid, data })
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }
}
