//! UnixFS DAG traversal over verified blocks
//!
//! [`DagWalker`] is an explicit cursor: [`DagWalker::next_entry`] produces one
//! entry per call and [`FileChunks::next_chunk`] one chunk of file content per
//! call. Every block either of them touches is read through the
//! [`VerifyingBlockStore`], so a single bad block aborts the traversal with
//! the store's error.

use super::node::{NamedLink, ShardLink, UnixFsNode};
use crate::error::{CarError, Result};
use crate::storage::{BlockSource, VerifyingBlockStore};
use bytes::Bytes;
use cid::Cid as IpldCid;

/// A file in the walked DAG
///
/// Holds the decoded root node; reading the content goes through
/// [`DagWalker::chunks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Root CID of the file
    pub cid: IpldCid,
    /// Path from the walk root, starting with the root CID
    pub path: String,
    /// Size declared by the root node
    pub size: u64,
    inline: Bytes,
    links: Vec<IpldCid>,
}

/// A directory in the walked DAG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Directory CID
    pub cid: IpldCid,
    /// Path from the walk root, starting with the root CID
    pub path: String,
    /// Entries, in link order; shard buckets are flattened
    pub children: Vec<NamedLink>,
    /// Whether the directory is HAMT-sharded
    pub sharded: bool,
}

/// Entry produced by the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnixFsEntry {
    /// File
    File(FileEntry),
    /// Directory
    Directory(DirectoryEntry),
}

impl UnixFsEntry {
    /// CID of the entry's root node
    pub fn cid(&self) -> &IpldCid {
        match self {
            UnixFsEntry::File(f) => &f.cid,
            UnixFsEntry::Directory(d) => &d.cid,
        }
    }

    /// Path from the walk root
    pub fn path(&self) -> &str {
        match self {
            UnixFsEntry::File(f) => &f.path,
            UnixFsEntry::Directory(d) => &d.path,
        }
    }

    /// Check if this is a file entry
    pub fn is_file(&self) -> bool {
        matches!(self, UnixFsEntry::File(_))
    }
}

/// Cursor over the UnixFS DAG below one root
///
/// Entries come out depth-first in link order: a directory before its
/// children. With recursion disabled only the root entry is produced.
///
/// # Example
///
/// ```rust,ignore
/// let mut walker = DagWalker::new(root, VerifyingBlockStore::new(reader));
///
/// while let Some(entry) = walker.next_entry().await? {
///     if let UnixFsEntry::File(file) = entry {
///         let mut chunks = walker.chunks(&file);
///         while let Some(chunk) = chunks.next_chunk().await? {
///             out.extend_from_slice(&chunk);
///         }
///     }
/// }
/// ```
#[derive(Debug)]
pub struct DagWalker<S> {
    store: VerifyingBlockStore<S>,
    /// Nodes still to visit, top of stack next
    pending: Vec<(IpldCid, String)>,
    recursive: bool,
    entries: usize,
}

impl<S: BlockSource> DagWalker<S> {
    /// Start a recursive walk at `root`
    pub fn new(root: IpldCid, store: VerifyingBlockStore<S>) -> Self {
        Self {
            store,
            pending: vec![(root, root.to_string())],
            recursive: true,
            entries: 0,
        }
    }

    /// Whether directory children are walked after the directory itself
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Next entry in walk order
    ///
    /// Returns `None` once every reachable entry has been produced.
    pub async fn next_entry(&mut self) -> Result<Option<UnixFsEntry>> {
        let Some((cid, path)) = self.pending.pop() else {
            return Ok(None);
        };

        let data = self.store.get(&cid).await?;
        let entry = match UnixFsNode::decode(&cid, data)? {
            UnixFsNode::Raw(data) => UnixFsEntry::File(FileEntry {
                cid,
                path,
                size: data.len() as u64,
                inline: data,
                links: Vec::new(),
            }),
            UnixFsNode::File(file) => UnixFsEntry::File(FileEntry {
                cid,
                path,
                size: file.filesize,
                inline: file.data,
                links: file.links,
            }),
            UnixFsNode::Directory(children) => UnixFsEntry::Directory(DirectoryEntry {
                cid,
                path,
                children,
                sharded: false,
            }),
            UnixFsNode::Shard(links) => UnixFsEntry::Directory(DirectoryEntry {
                cid,
                path,
                children: self.expand_shard(links).await?,
                sharded: true,
            }),
        };

        if let (true, UnixFsEntry::Directory(dir)) = (self.recursive, &entry) {
            self.pending.extend(
                dir.children
                    .iter()
                    .rev()
                    .map(|child| (child.cid, format!("{}/{}", dir.path, child.name))),
            );
        }

        self.entries += 1;
        tracing::debug!(cid = %entry.cid(), path = entry.path(), file = entry.is_file(), "walked entry");
        Ok(Some(entry))
    }

    /// Flatten a shard's buckets into its entries, in link order
    async fn expand_shard(&mut self, links: Vec<ShardLink>) -> Result<Vec<NamedLink>> {
        let mut children = Vec::new();
        let mut stack: Vec<ShardLink> = links.into_iter().rev().collect();

        while let Some(link) = stack.pop() {
            match link {
                ShardLink::Entry(named) => children.push(named),
                ShardLink::Bucket(cid) => {
                    let data = self.store.get(&cid).await?;
                    match UnixFsNode::decode(&cid, data)? {
                        UnixFsNode::Shard(inner) => stack.extend(inner.into_iter().rev()),
                        _ => {
                            return Err(CarError::invalid_node(
                                cid,
                                "shard bucket is not a HAMT shard node",
                            ));
                        }
                    }
                }
            }
        }
        Ok(children)
    }

    /// Cursor over the content of `file`
    pub fn chunks(&mut self, file: &FileEntry) -> FileChunks<'_, S> {
        FileChunks {
            walker: self,
            file: file.cid,
            inline: Some(file.inline.clone()),
            pending: file.links.iter().rev().copied().collect(),
        }
    }

    /// Entries produced so far
    pub fn entries_read(&self) -> usize {
        self.entries
    }

    /// Blocks that passed verification during this walk
    pub fn verified_blocks(&self) -> usize {
        self.store.verified_blocks()
    }

    /// Access the verifying store
    pub fn store(&self) -> &VerifyingBlockStore<S> {
        &self.store
    }

    /// Unwrap the verifying store
    pub fn into_store(self) -> VerifyingBlockStore<S> {
        self.store
    }
}

/// Cursor over one file's content
///
/// Yields the root's inline bytes first, then each child's bytes, depth-first
/// and left to right. Blocks are pulled and verified only as chunks are asked
/// for.
#[derive(Debug)]
pub struct FileChunks<'w, S> {
    walker: &'w mut DagWalker<S>,
    file: IpldCid,
    inline: Option<Bytes>,
    pending: Vec<IpldCid>,
}

impl<S: BlockSource> FileChunks<'_, S> {
    /// Next chunk of content
    ///
    /// Returns `None` after the last chunk. Empty nodes produce no chunk.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if let Some(inline) = self.inline.take() {
            if !inline.is_empty() {
                return Ok(Some(inline));
            }
        }

        while let Some(cid) = self.pending.pop() {
            let data = self.walker.store.get(&cid).await?;
            let chunk = match UnixFsNode::decode(&cid, data)? {
                UnixFsNode::Raw(data) => data,
                UnixFsNode::File(node) => {
                    self.pending.extend(node.links.iter().rev());
                    node.data
                }
                UnixFsNode::Directory(_) | UnixFsNode::Shard(_) => {
                    return Err(CarError::invalid_node(
                        cid,
                        format!("directory linked from file {}", self.file),
                    ));
                }
            };
            if !chunk.is_empty() {
                tracing::trace!(%cid, len = chunk.len(), "file chunk");
                return Ok(Some(chunk));
            }
        }
        Ok(None)
    }

    /// Whether every chunk has been produced
    pub fn is_done(&self) -> bool {
        self.inline.is_none() && self.pending.is_empty()
    }
}
