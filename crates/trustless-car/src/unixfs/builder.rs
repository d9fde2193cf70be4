//! Packing bytes into a single-file UnixFS DAG

use super::node::encode_file_node;
use crate::error::{CarError, Result};
use bytes::Bytes;
use cid::Cid as IpldCid;
use std::collections::HashMap;
use trustless_common::hash::HashAlgorithm;
use trustless_common::{DAG_PB_CODEC, RAW_CODEC};

/// Default leaf size (256 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Default maximum links per interior node
pub const DEFAULT_MAX_LINKS: usize = 174;

/// A file packed into blocks
#[derive(Debug, Clone)]
pub struct PackedFile {
    /// Root CID of the file
    pub root: IpldCid,
    /// File size in bytes
    pub size: u64,
    /// Blocks in the order a walk reads them, depth-first from the root
    ///
    /// A block linked more than once is listed at every link, so a CAR
    /// written from this list streams straight into a [`CarReader`].
    ///
    /// [`CarReader`]: crate::car::CarReader
    pub blocks: Vec<(IpldCid, Bytes)>,
}

/// Builds balanced UnixFS file DAGs with raw leaves
///
/// Input is cut into fixed-size raw leaves. Leaves are grouped under dag-pb
/// File nodes of at most `max_links` children, and groups are grouped again
/// until one root remains. A file that fits in one leaf is just that leaf.
///
/// # Example
///
/// ```rust
/// use trustless_car::unixfs::FileBuilder;
///
/// let packed = FileBuilder::new().chunk_size(4).build(b"hello world").unwrap();
/// assert_eq!(packed.size, 11);
/// assert_eq!(packed.blocks[0].0, packed.root);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FileBuilder {
    chunk_size: usize,
    max_links: usize,
    hash: HashAlgorithm,
}

impl Default for FileBuilder {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_links: DEFAULT_MAX_LINKS,
            hash: HashAlgorithm::Sha2_256,
        }
    }
}

/// Node of the tree under construction
#[derive(Clone, Copy)]
struct Built {
    cid: IpldCid,
    size: u64,
}

impl FileBuilder {
    /// Builder with 256 KiB leaves, 174 links per node and sha2-256
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the leaf size (at least 1)
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the maximum links per interior node (at least 2)
    pub fn max_links(mut self, max_links: usize) -> Self {
        self.max_links = max_links.max(2);
        self
    }

    /// Set the hash algorithm for every block
    pub fn hash(mut self, hash: HashAlgorithm) -> Self {
        self.hash = hash;
        self
    }

    /// Pack `data` into blocks
    pub fn build(&self, data: &[u8]) -> Result<PackedFile> {
        let mut blocks: HashMap<IpldCid, (Bytes, Vec<IpldCid>)> = HashMap::new();

        let mut level = data
            .chunks(self.chunk_size)
            .map(|chunk| {
                let cid = self.cid_for(RAW_CODEC, chunk)?;
                blocks.insert(cid, (Bytes::copy_from_slice(chunk), Vec::new()));
                Ok(Built {
                    cid,
                    size: chunk.len() as u64,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if level.is_empty() {
            level.push(self.file_node(&[], &mut blocks)?);
        }

        while level.len() > 1 {
            level = level
                .chunks(self.max_links)
                .map(|group| self.file_node(group, &mut blocks))
                .collect::<Result<Vec<_>>>()?;
        }

        let root = level[0];
        tracing::debug!(root = %root.cid, size = root.size, blocks = blocks.len(), "packed file");

        Ok(PackedFile {
            root: root.cid,
            size: root.size,
            blocks: depth_first(root.cid, &blocks),
        })
    }

    fn file_node(
        &self,
        children: &[Built],
        blocks: &mut HashMap<IpldCid, (Bytes, Vec<IpldCid>)>,
    ) -> Result<Built> {
        let links: Vec<(IpldCid, u64)> = children.iter().map(|c| (c.cid, c.size)).collect();
        let encoded = encode_file_node(&links)?;
        let cid = self.cid_for(DAG_PB_CODEC, &encoded)?;
        blocks.insert(
            cid,
            (Bytes::from(encoded), children.iter().map(|c| c.cid).collect()),
        );
        Ok(Built {
            cid,
            size: links.iter().map(|(_, size)| size).sum(),
        })
    }

    fn cid_for(&self, codec: u64, data: &[u8]) -> Result<IpldCid> {
        let mh = self
            .hash
            .multihash(data)
            .map_err(|e| CarError::encode("block multihash", e))?;
        Ok(IpldCid::new_v1(codec, mh))
    }
}

/// Pre-order listing of the tree below `root`, once per link
fn depth_first(
    root: IpldCid,
    blocks: &HashMap<IpldCid, (Bytes, Vec<IpldCid>)>,
) -> Vec<(IpldCid, Bytes)> {
    let mut out = Vec::with_capacity(blocks.len());
    let mut stack = vec![root];

    while let Some(cid) = stack.pop() {
        if let Some((data, children)) = blocks.get(&cid) {
            out.push((cid, data.clone()));
            stack.extend(children.iter().rev());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unixfs::node::UnixFsNode;

    #[test]
    fn single_chunk_is_raw_leaf() {
        let packed = FileBuilder::new().build(b"tiny").unwrap();
        assert_eq!(packed.root.codec(), RAW_CODEC);
        assert_eq!(packed.blocks.len(), 1);
        assert_eq!(packed.size, 4);
    }

    #[test]
    fn empty_file_is_empty_file_node() {
        let packed = FileBuilder::new().build(b"").unwrap();
        assert_eq!(packed.root.codec(), DAG_PB_CODEC);
        assert_eq!(packed.size, 0);

        let (cid, data) = packed.blocks[0].clone();
        let node = UnixFsNode::decode(&cid, data).unwrap();
        assert_eq!(node.file_size(), Some(0));
    }

    #[test]
    fn balanced_tree_depth_first() {
        // 10 leaves of 1 byte, 3 links per node: 4 + 2 + 1 interior nodes
        let data: Vec<u8> = (0..10).collect();
        let packed = FileBuilder::new()
            .chunk_size(1)
            .max_links(3)
            .build(&data)
            .unwrap();

        assert_eq!(packed.size, 10);
        assert_eq!(packed.blocks.len(), 10 + 4 + 2 + 1);
        assert_eq!(packed.blocks[0].0, packed.root);

        let leaves: Vec<u8> = packed
            .blocks
            .iter()
            .filter(|(cid, _)| cid.codec() == RAW_CODEC)
            .flat_map(|(_, data)| data.to_vec())
            .collect();
        assert_eq!(leaves, data);
    }

    #[test]
    fn repeated_chunks_are_listed_per_link() {
        let packed = FileBuilder::new()
            .chunk_size(2)
            .build(b"abababab")
            .unwrap();
        // root, then the same leaf four times
        assert_eq!(packed.blocks.len(), 5);
        assert_eq!(packed.size, 8);

        let leaf = packed.blocks[1].0;
        assert!(packed.blocks[1..].iter().all(|(cid, data)| *cid == leaf && data == &b"ab"[..]));
    }

    #[test]
    fn hash_algorithm_is_configurable() {
        let packed = FileBuilder::new()
            .hash(HashAlgorithm::Blake3)
            .build(b"blake")
            .unwrap();
        assert_eq!(packed.root.hash().code(), HashAlgorithm::Blake3.code());
    }
}
