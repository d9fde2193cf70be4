//! Common types for trustless IPFS retrieval
//!
//! - **CIDs**: parsing user input into [`cid::Cid`] values and shortening them for display
//! - **Hashes**: the closed set of multihash algorithms a client can verify
//! - **Streams**: a `Send` byte stream shared by the gateway transport and the CAR decoder
//! - **HTTP**: a small client trait so retrieval can run over `reqwest` or an in-memory transport

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub use ::cid::Cid as IpldCid;

/// CID parsing and display helpers
pub mod cid;
pub mod error;
/// Multihash algorithm registry
pub mod hash;
/// HTTP client abstraction used by the gateway client.
pub mod http_client;
/// Byte stream abstraction for response bodies
pub mod stream;

pub use crate::cid::{parse_cid, shorten_cid};
pub use error::{CidError, UnsupportedHashAlgorithm};
pub use hash::HashAlgorithm;
pub use stream::{ByteStream, StreamError, StreamErrorKind};

/// dag-pb codec identifier for CIDs (0x70)
pub const DAG_PB_CODEC: u64 = 0x70;

/// raw codec identifier for CIDs (0x55)
pub const RAW_CODEC: u64 = 0x55;
