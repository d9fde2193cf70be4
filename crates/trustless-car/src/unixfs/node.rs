//! Decoded UnixFS nodes

use super::pb::{self, DataType, PbLink, PbNode, UnixFsData};
use crate::error::{CarError, Result};
use bytes::Bytes;
use cid::Cid as IpldCid;
use trustless_common::{DAG_PB_CODEC, RAW_CODEC};

/// Named link from a directory or shard to a child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedLink {
    /// Entry name, with any HAMT bucket prefix removed
    pub name: String,
    /// Child CID
    pub cid: IpldCid,
}

/// Link from a HAMT shard node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardLink {
    /// Child bucket; another shard node to expand
    Bucket(IpldCid),
    /// Directory entry stored in this bucket
    Entry(NamedLink),
}

/// File node (root or interior) of a chunked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    /// Bytes carried inline, which precede the children's bytes
    pub data: Bytes,
    /// Children, in content order
    pub links: Vec<IpldCid>,
    /// Total size of the file below this node
    pub filesize: u64,
}

/// A block interpreted as UnixFS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnixFsNode {
    /// Leaf bytes: a raw-codec block or a dag-pb node of type Raw
    Raw(Bytes),
    /// File node with optional inline data and child chunks
    File(FileNode),
    /// Plain directory
    Directory(Vec<NamedLink>),
    /// HAMT-sharded directory bucket
    Shard(Vec<ShardLink>),
}

impl UnixFsNode {
    /// Interpret a verified block
    ///
    /// The codec decides the layout: raw blocks are file bytes, dag-pb blocks
    /// must carry a UnixFS payload. Returned byte slices share `data`'s buffer.
    pub fn decode(cid: &IpldCid, data: Bytes) -> Result<Self> {
        match cid.codec() {
            RAW_CODEC => Ok(Self::Raw(data)),
            DAG_PB_CODEC => decode_dag_pb(cid, &data),
            codec => Err(CarError::invalid_node(
                *cid,
                format!("unsupported codec 0x{codec:x}"),
            )),
        }
    }

    /// Content size of this node if it is part of a file
    pub fn file_size(&self) -> Option<u64> {
        match self {
            Self::Raw(data) => Some(data.len() as u64),
            Self::File(file) => Some(file.filesize),
            Self::Directory(_) | Self::Shard(_) => None,
        }
    }
}

fn decode_dag_pb(cid: &IpldCid, data: &Bytes) -> Result<UnixFsNode> {
    let node: PbNode = pb::decode(data)
        .map_err(|e| CarError::invalid_node(*cid, format!("malformed dag-pb: {e}")))?;
    let payload = node
        .data
        .ok_or_else(|| CarError::invalid_node(*cid, "dag-pb node has no UnixFS data"))?;
    let unixfs: UnixFsData = pb::decode(payload)
        .map_err(|e| CarError::invalid_node(*cid, format!("malformed UnixFS data: {e}")))?;

    match unixfs.data_type {
        DataType::Raw if node.links.is_empty() => {
            Ok(UnixFsNode::Raw(slice_of(data, unixfs.data)))
        }
        DataType::Raw | DataType::File => {
            let links = node
                .links
                .iter()
                .map(|link| link_cid(cid, link))
                .collect::<Result<Vec<_>>>()?;
            let inline = slice_of(data, unixfs.data);
            let filesize = match unixfs.filesize {
                Some(filesize) => filesize,
                None => unixfs
                    .blocksizes
                    .iter()
                    .try_fold(inline.len() as u64, |total, size| total.checked_add(*size))
                    .ok_or_else(|| CarError::invalid_node(*cid, "blocksizes overflow"))?,
            };
            Ok(UnixFsNode::File(FileNode {
                data: inline,
                links,
                filesize,
            }))
        }
        DataType::Directory => node
            .links
            .iter()
            .map(|link| {
                Ok(NamedLink {
                    name: link.name.unwrap_or_default().to_string(),
                    cid: link_cid(cid, link)?,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(UnixFsNode::Directory),
        DataType::HamtShard => {
            let prefix_len = bucket_prefix_len(cid, unixfs.fanout)?;
            node.links
                .iter()
                .map(|link| {
                    let child = link_cid(cid, link)?;
                    let name = link.name.unwrap_or_default();
                    if name.len() < prefix_len || !name.is_char_boundary(prefix_len) {
                        return Err(CarError::invalid_node(
                            *cid,
                            format!("shard link name {name:?} shorter than bucket prefix"),
                        ));
                    }
                    Ok(if name.len() == prefix_len {
                        ShardLink::Bucket(child)
                    } else {
                        ShardLink::Entry(NamedLink {
                            name: name[prefix_len..].to_string(),
                            cid: child,
                        })
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(UnixFsNode::Shard)
        }
        DataType::Symlink => Err(CarError::invalid_node(*cid, "symlinks are not supported")),
        DataType::Metadata => Err(CarError::invalid_node(
            *cid,
            "metadata nodes are not supported",
        )),
        DataType::Unknown(value) => Err(CarError::invalid_node(
            *cid,
            format!("unknown UnixFS type {value}"),
        )),
    }
}

/// Share the buffer behind `data` for a sub-slice decoded out of it
fn slice_of(data: &Bytes, part: Option<&[u8]>) -> Bytes {
    match part {
        Some(part) if !part.is_empty() => data.slice_ref(part),
        _ => Bytes::new(),
    }
}

fn link_cid(parent: &IpldCid, link: &PbLink<'_>) -> Result<IpldCid> {
    let hash = link
        .hash
        .ok_or_else(|| CarError::invalid_node(*parent, "link has no hash"))?;
    IpldCid::try_from(hash)
        .map_err(|e| CarError::invalid_node(*parent, format!("link hash is not a CID: {e}")))
}

/// Width of the hex bucket index that prefixes shard link names
fn bucket_prefix_len(cid: &IpldCid, fanout: Option<u64>) -> Result<usize> {
    match fanout {
        Some(fanout) if fanout > 1 && fanout.is_power_of_two() => {
            Ok(format!("{:X}", fanout - 1).len())
        }
        other => Err(CarError::invalid_node(
            *cid,
            format!("invalid HAMT fanout {other:?}"),
        )),
    }
}

/// Encode a UnixFS file node as dag-pb
///
/// `links` pairs each child with its content size.
pub(crate) fn encode_file_node(links: &[(IpldCid, u64)]) -> Result<Vec<u8>> {
    let unixfs = UnixFsData {
        data_type: DataType::File,
        filesize: Some(links.iter().map(|(_, size)| size).sum()),
        blocksizes: links.iter().map(|(_, size)| *size).collect(),
        ..Default::default()
    };
    let payload =
        pb::encode(&unixfs).map_err(|e| CarError::encode("UnixFS file data", e))?;

    let hashes: Vec<Vec<u8>> = links.iter().map(|(cid, _)| cid.to_bytes()).collect();
    let node = PbNode {
        links: hashes
            .iter()
            .zip(links)
            .map(|(hash, (_, size))| PbLink {
                hash: Some(hash.as_slice()),
                name: Some(""),
                tsize: Some(*size),
            })
            .collect(),
        data: Some(payload.as_slice()),
    };
    pb::encode(&node).map_err(|e| CarError::encode("dag-pb file node", e))
}
