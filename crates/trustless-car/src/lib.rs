//! Verified CAR decoding and UnixFS reassembly
//!
//! This crate turns an untrusted CAR stream into file bytes that are known to
//! match the requested CID:
//!
//! - **CAR I/O**: incremental decoding of CAR v1 streams, plus a writer for fixtures and packed files
//! - **Storage**: block sources (CAR stream, in-memory) and the verifying store that hashes every block
//! - **UnixFS**: dag-pb and raw node decoding, a DAG walker and a single-file packer
//! - **Assembly**: the single-file policy, size-checked reassembly and content sniffing
//!
//! Every byte handed to callers has passed through
//! [`VerifyingBlockStore`]; sources themselves are never trusted.
//!
//! # Example
//!
//! ```rust,ignore
//! use trustless_car::{CarReader, DagWalker, VerifyingBlockStore, assemble};
//!
//! let reader = CarReader::from_stream(body).await?;
//! let mut walker = DagWalker::new(root, VerifyingBlockStore::new(reader));
//! let file = assemble(&mut walker, DEFAULT_MAX_FILE_SIZE).await?;
//!
//! println!("{} bytes, {} blocks verified", file.len(), walker.verified_blocks());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod assemble;
/// CAR (Content Addressable aRchive) utilities
pub mod car;
pub mod error;
/// Block sources and verification
pub mod storage;
pub mod unixfs;

pub use assemble::{
    AssembledFile, ContentType, DEFAULT_MAX_FILE_SIZE, assemble, detect_content_type, read_file,
    single_file_entry,
};
pub use car::{Block, CarReader, ParsedCar, parse_car_bytes, write_car_bytes};
pub use error::{CarError, Result};
pub use storage::{BlockSource, MemoryBlockSource, VerificationResult, VerifyingBlockStore};
pub use unixfs::{DagWalker, FileBuilder, FileEntry, PackedFile, UnixFsEntry};
