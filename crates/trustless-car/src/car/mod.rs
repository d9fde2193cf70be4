//! CAR (Content Addressable aRchive) I/O
//!
//! Gateways answer trustless requests with a CAR v1 stream: a varint-prefixed
//! DAG-CBOR header naming the root CIDs, followed by varint-prefixed
//! `CID || bytes` blocks.
//!
//! # Examples
//!
//! Streaming blocks out of a response body:
//! ```ignore
//! use trustless_car::car::CarReader;
//!
//! let mut reader = CarReader::from_stream(body).await?;
//! while let Some(block) = reader.next_block().await? {
//!     println!("{} ({} bytes)", block.cid, block.data.len());
//! }
//! ```

pub mod reader;
pub mod writer;

// Re-export commonly used functions and types
pub use reader::{Block, CarReader, ParsedCar, parse_car_bytes};
pub use writer::write_car_bytes;
