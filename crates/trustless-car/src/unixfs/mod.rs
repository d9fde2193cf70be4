//! UnixFS over dag-pb and raw blocks
//!
//! - [`pb`]: protobuf messages for dag-pb nodes and their UnixFS payload
//! - [`node`]: blocks interpreted as files, directories and shard buckets
//! - [`walker`]: verified traversal of a DAG and of a file's chunks
//! - [`builder`]: packing bytes into a single-file DAG

pub mod builder;
pub mod node;
pub mod pb;
pub mod walker;

pub use builder::{FileBuilder, PackedFile};
pub use node::{FileNode, NamedLink, ShardLink, UnixFsNode};
pub use walker::{DagWalker, DirectoryEntry, FileChunks, FileEntry, UnixFsEntry};
