//! In-memory block source

use crate::car::ParsedCar;
use crate::error::Result;
use crate::storage::BlockSource;
use bytes::Bytes;
use cid::Cid as IpldCid;
use std::collections::BTreeMap;

/// In-memory block source backed by a BTreeMap
///
/// Useful for:
/// - Testing
/// - CAR files already parsed into memory ([`ParsedCar`])
///
/// Blocks are stored as given; nothing checks them until they are read through
/// a [`VerifyingBlockStore`](crate::storage::VerifyingBlockStore).
#[derive(Debug, Clone, Default)]
pub struct MemoryBlockSource {
    blocks: BTreeMap<IpldCid, Bytes>,
}

impl MemoryBlockSource {
    /// Create new empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source from a map of blocks
    pub fn new_from_blocks(blocks: BTreeMap<IpldCid, Bytes>) -> Self {
        Self { blocks }
    }

    /// Insert a block under a CID, whether or not the bytes match it
    pub fn insert(&mut self, cid: IpldCid, data: impl Into<Bytes>) {
        self.blocks.insert(cid, data.into());
    }

    /// Mutable access to a stored block
    pub fn get_mut(&mut self, cid: &IpldCid) -> Option<&mut Bytes> {
        self.blocks.get_mut(cid)
    }

    /// Get number of blocks stored
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if source is empty
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl From<ParsedCar> for MemoryBlockSource {
    fn from(car: ParsedCar) -> Self {
        Self::new_from_blocks(car.blocks)
    }
}

impl FromIterator<(IpldCid, Bytes)> for MemoryBlockSource {
    fn from_iter<T: IntoIterator<Item = (IpldCid, Bytes)>>(iter: T) -> Self {
        Self::new_from_blocks(iter.into_iter().collect())
    }
}

impl BlockSource for MemoryBlockSource {
    async fn get_block(&mut self, cid: &IpldCid) -> Result<Option<Bytes>> {
        Ok(self.blocks.get(cid).cloned())
    }
}
