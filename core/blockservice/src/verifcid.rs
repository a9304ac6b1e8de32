//! Hash security checks for content identifiers.
//!
//! Every cid is validated before the block service reads or writes anything for it, so
//! blocks addressed with a weak or unknown hash function never reach the blockstore or the
//! network.

use std::collections::HashSet;

use cid::CidGeneric;
use thiserror::Error;

/// Digests shorter than this are too easy to collide.
pub const MINIMUM_HASH_LENGTH: usize = 20;
/// Only reachable for cids with room for more than 64 byte digests, `cid::Cid` caps
/// them at 64.
pub const MAXIMUM_HASH_LENGTH: usize = 128;
/// Identity "hashes" inline the data, so only the size needs bounding.
pub const MAXIMUM_IDENTITY_DIGEST_SIZE: usize = 128;

pub mod code {
    pub const IDENTITY: u64 = 0x00;
    pub const SHA1: u64 = 0x11;
    pub const SHA2_256: u64 = 0x12;
    pub const SHA2_512: u64 = 0x13;
    pub const SHA3_512: u64 = 0x14;
    pub const SHA3_384: u64 = 0x15;
    pub const SHA3_256: u64 = 0x16;
    pub const SHA3_224: u64 = 0x17;
    pub const KECCAK_224: u64 = 0x1a;
    pub const KECCAK_256: u64 = 0x1b;
    pub const KECCAK_384: u64 = 0x1c;
    pub const KECCAK_512: u64 = 0x1d;
    pub const BLAKE3: u64 = 0x1e;
    pub const SHA2_384: u64 = 0x20;
    pub const MURMUR3_X64_64: u64 = 0x22;
    pub const DBL_SHA2_256: u64 = 0x56;
    pub const MD5: u64 = 0xd5;
    pub const SHA2_256_TRUNC254_PADDED: u64 = 0x1012;
    pub const SHA2_224: u64 = 0x1013;
    pub const SHA2_512_224: u64 = 0x1014;
    pub const SHA2_512_256: u64 = 0x1015;
    pub const X11: u64 = 0x1100;
    pub const POSEIDON_BLS12_381_A2_FC1: u64 = 0xb401;
    pub const BLAKE2B_MIN: u64 = 0xb201;
    pub const BLAKE2B_MAX: u64 = 0xb240;
    pub const BLAKE2S_MIN: u64 = 0xb241;
    pub const BLAKE2S_MAX: u64 = 0xb260;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CidError {
    #[error("Possibly insecure hash function: {0:#x}")]
    PossiblyInsecureHashFunction(u64),
    #[error("Hashes must be at least {MINIMUM_HASH_LENGTH} bytes long, got {0}")]
    BelowMinimumHashLength(usize),
    #[error("Hashes must be at most {MAXIMUM_HASH_LENGTH} bytes long, got {0}")]
    AboveMaximumHashLength(usize),
    #[error("Identity digests must be at most {MAXIMUM_IDENTITY_DIGEST_SIZE} bytes long, got {0}")]
    IdentityDigestTooLarge(usize),
}

/// Decides which multihash functions are acceptable for cids.
pub trait Allowlist: Send + Sync {
    fn is_allowed(&self, code: u64) -> bool;
}

/// The set of hash functions considered safe out of the box.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAllowlist;

impl Allowlist for DefaultAllowlist {
    fn is_allowed(&self, code: u64) -> bool {
        use self::code::*;

        matches!(
            code,
            IDENTITY
                | SHA2_224
                | SHA2_256
                | SHA2_384
                | SHA2_512
                | SHA2_512_224
                | SHA2_512_256
                | SHA2_256_TRUNC254_PADDED
                | SHA3_224
                | SHA3_256
                | SHA3_384
                | SHA3_512
                | KECCAK_224
                | KECCAK_256
                | KECCAK_384
                | KECCAK_512
                | DBL_SHA2_256
                | BLAKE3
                | MURMUR3_X64_64
                | X11
                | POSEIDON_BLS12_381_A2_FC1
                | BLAKE2B_MIN..=BLAKE2B_MAX
                | BLAKE2S_MIN..=BLAKE2S_MAX
        )
    }
}

/// An allowlist made of an explicit set of multihash codes.
#[derive(Clone, Debug, Default)]
pub struct HashSetAllowlist {
    codes: HashSet<u64>,
}

impl HashSetAllowlist {
    pub fn new(codes: impl IntoIterator<Item = u64>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }
}

impl Allowlist for HashSetAllowlist {
    fn is_allowed(&self, code: u64) -> bool {
        self.codes.contains(&code)
    }
}

/// Check the cid's hash function against the allowlist and its digest length against the
/// accepted bounds. Generic over the digest capacity so wider cids get the same checks.
pub fn validate_cid<const S: usize>(
    allowlist: &dyn Allowlist,
    cid: &CidGeneric<S>,
) -> Result<(), CidError> {
    let hash = cid.hash();
    let code = hash.code();
    let len = hash.size() as usize;

    if !allowlist.is_allowed(code) {
        return Err(CidError::PossiblyInsecureHashFunction(code));
    }

    if code == code::IDENTITY {
        if len > MAXIMUM_IDENTITY_DIGEST_SIZE {
            return Err(CidError::IdentityDigestTooLarge(len));
        }
        return Ok(());
    }

    if len < MINIMUM_HASH_LENGTH {
        return Err(CidError::BelowMinimumHashLength(len));
    }
    if len > MAXIMUM_HASH_LENGTH {
        return Err(CidError::AboveMaximumHashLength(len));
    }
    Ok(())
}
