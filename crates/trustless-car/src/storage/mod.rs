//! Block access: raw sources and the verifying store on top of them

use crate::error::Result;
use bytes::Bytes;
use cid::Cid as IpldCid;

/// Async source of raw, unverified blocks
///
/// Implementations:
/// - CAR stream ([`CarReader`](crate::car::CarReader))
/// - In-memory map ([`MemoryBlockSource`])
///
/// Nothing returned from a source is trusted. Consumers go through
/// [`VerifyingBlockStore`], which checks every block against its CID.
///
/// Methods take `&mut self`: a CAR stream advances as blocks are looked up,
/// and each retrieval owns its own source.
#[trait_variant::make(Send)]
pub trait BlockSource {
    /// Get a block by CID
    ///
    /// Returns `None` if the block is not available.
    async fn get_block(&mut self, cid: &IpldCid) -> Result<Option<Bytes>>;
}

pub mod memory;
pub mod verifying;

pub use memory::MemoryBlockSource;
pub use verifying::{VerificationResult, VerifyingBlockStore, verify_block};
