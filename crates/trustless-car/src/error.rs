//! Error types for CAR decoding, block verification and UnixFS reassembly

use cid::Cid as IpldCid;
use std::error::Error;
use trustless_common::stream::StreamError;
use trustless_common::UnsupportedHashAlgorithm;

/// Boxed error type for error sources
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result type alias for CAR operations
pub type Result<T> = std::result::Result<T, CarError>;

/// Errors raised between the byte stream and the assembled file
///
/// [`CarError::HashMismatch`] is a security event: the retrieval that raised it
/// must be abandoned along with any bytes assembled so far.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CarError {
    /// CAR framing violation
    #[error("Malformed CAR stream: {message}")]
    #[diagnostic(
        code(car::format),
        help("The gateway must answer with a CAR v1 stream (application/vnd.ipld.car)")
    )]
    Format {
        /// What was wrong
        message: String,
        /// Underlying decoder error
        #[source]
        source: Option<BoxError>,
    },

    /// The byte stream under the decoder failed
    #[error("Byte stream failed while decoding CAR")]
    #[diagnostic(code(car::transport))]
    Transport {
        /// Underlying error
        #[source]
        source: BoxError,
    },

    /// No hash function registered for the CID's multihash code
    #[error("Unsupported multihash algorithm 0x{code:x}")]
    #[diagnostic(
        code(car::unsupported_hash),
        help("Supported algorithms: identity, sha2-256, sha2-512, blake3")
    )]
    UnsupportedHashAlgorithm {
        /// Multihash code
        code: u64,
    },

    /// Block bytes do not hash to the digest in their CID
    #[error("Hash mismatch for block {cid}")]
    #[diagnostic(
        code(car::hash_mismatch),
        severity(Error),
        help("The gateway served bytes that do not match the requested content; nothing from this retrieval can be trusted")
    )]
    HashMismatch {
        /// CID the bytes were served for
        cid: IpldCid,
    },

    /// Block needed by the walk is not in the CAR
    #[error("Block not found in CAR: {cid}")]
    #[diagnostic(
        code(car::not_found),
        help("All blocks of the requested DAG must be included in the CAR stream")
    )]
    NotFound {
        /// The missing CID
        cid: IpldCid,
    },

    /// Block is not a UnixFS node this client can interpret
    #[error("Invalid UnixFS node {cid}: {message}")]
    #[diagnostic(code(car::invalid_node))]
    InvalidNode {
        /// The offending block
        cid: IpldCid,
        /// What was wrong
        message: String,
    },

    /// The walk did not produce exactly one file entry
    #[error("Expected a single file, walk produced {entries} entries ({files} files)")]
    #[diagnostic(
        code(car::multi_file),
        help("Only CIDs of single files are supported; directories cannot be retrieved")
    )]
    MultiFileNotSupported {
        /// Entries seen before the walk was abandoned
        entries: usize,
        /// How many of them were files
        files: usize,
    },

    /// File content does not match its declared size
    #[error("File {cid} declared {expected} bytes but its blocks hold {actual}")]
    #[diagnostic(code(car::size_mismatch))]
    SizeMismatch {
        /// File root
        cid: IpldCid,
        /// Size declared by the root node
        expected: u64,
        /// Bytes produced by the chunks (at the point the mismatch was detected)
        actual: u64,
    },

    /// Declared file size above the configured limit
    #[error("File {cid} is {size} bytes, max {max}")]
    #[diagnostic(code(car::too_large))]
    TooLarge {
        /// File root
        cid: IpldCid,
        /// Declared size
        size: u64,
        /// Configured maximum
        max: u64,
    },

    /// Encoding a block or CAR failed
    #[error("Encoding failed: {message}")]
    #[diagnostic(code(car::encode))]
    Encode {
        /// What was being encoded
        message: String,
        /// Underlying error
        #[source]
        source: Option<BoxError>,
    },
}

impl CarError {
    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
            source: None,
        }
    }

    /// Classify a decoder error
    ///
    /// Errors caused by the byte stream underneath become
    /// [`CarError::Transport`]; everything else is a framing violation.
    pub fn decode(context: &str, source: impl Error + Send + Sync + 'static) -> Self {
        if StreamError::find_in(&source).is_some() {
            Self::Transport {
                source: Box::new(source),
            }
        } else {
            Self::Format {
                message: context.to_string(),
                source: Some(Box::new(source)),
            }
        }
    }

    /// Create an invalid node error
    pub fn invalid_node(cid: IpldCid, message: impl Into<String>) -> Self {
        Self::InvalidNode {
            cid,
            message: message.into(),
        }
    }

    /// Create an encoding error
    pub fn encode(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        Self::Encode {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error means the gateway served unverifiable data
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Self::HashMismatch { .. })
    }
}

impl From<UnsupportedHashAlgorithm> for CarError {
    fn from(e: UnsupportedHashAlgorithm) -> Self {
        CarError::UnsupportedHashAlgorithm { code: e.code }
    }
}
