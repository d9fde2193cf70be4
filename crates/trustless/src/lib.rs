//! Verified retrieval of IPFS content from untrusted HTTP gateways
//!
//! The gateway is not trusted. A retrieval asks it for a CAR stream, checks
//! every block against the hash in its own CID, walks the UnixFS DAG below
//! the requested CID and hands back file bytes only once all of them are
//! verified:
//!
//! ```text
//! CID → gateway (CAR stream) → CAR decoder → verifying store → DAG walker → file
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> miette::Result<()> {
//! use trustless::{RetrievalConfig, retrieve};
//!
//! let config = RetrievalConfig::from_env()?;
//! let report = retrieve(
//!     "bafybeicklkqcnlvtiscr2hzkubjwnwjinvskffn4xorqeduft3wq7vm5u4",
//!     &config,
//! )
//! .await?;
//!
//! println!(
//!     "{} bytes ({:?}), {} blocks verified",
//!     report.file.len(),
//!     report.file.content_type(),
//!     report.verified_blocks,
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod retrieval;

pub use config::RetrievalConfig;
pub use error::{FailureKind, Result, RetrievalError};
pub use gateway::{GatewayClient, GatewayError, GatewayStyle};
pub use retrieval::{Retrieval, RetrievalReport, RetrievalState, verify_car};

pub use trustless_car::{AssembledFile, ContentType};
pub use trustless_common::{IpldCid, parse_cid, shorten_cid};

/// Parse `input` and retrieve it with a fresh `reqwest` client
#[cfg(feature = "reqwest-client")]
pub async fn retrieve(input: &str, config: &RetrievalConfig) -> Result<RetrievalReport> {
    let cid = parse_cid(input)?;
    config.retrieval(config.http_client()?, cid).run().await
}
