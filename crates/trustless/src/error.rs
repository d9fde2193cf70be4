//! Error types for a retrieval

use crate::gateway::GatewayError;
use std::time::Duration;
use trustless_car::CarError;
use trustless_common::CidError;

/// Boxed error type for error sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a retrieval failed, without the details
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Input was not a usable CID
    InvalidCid,
    /// Gateway refused or failed the request
    Gateway,
    /// Response was not a well-formed CAR stream, or the stream broke
    Format,
    /// A block did not match its CID
    Verification,
    /// A CID used a hash algorithm with no implementation
    UnsupportedHash,
    /// The DAG was incomplete or not a readable single file
    Content,
    /// The content was a directory or several files
    MultiFile,
    /// Cancelled by the caller
    Cancelled,
    /// The configured timeout elapsed
    TimedOut,
    /// The retrieval had already been run
    AlreadyStarted,
}

/// Errors from a retrieval
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum RetrievalError {
    /// Input was not a usable CID
    #[error("{0}")]
    Cid(
        #[from]
        #[diagnostic_source]
        CidError,
    ),

    /// Gateway request failed
    #[error("{0}")]
    Gateway(
        #[from]
        #[diagnostic_source]
        GatewayError,
    ),

    /// Decoding, verification or assembly failed
    #[error("{0}")]
    Car(
        #[from]
        #[diagnostic_source]
        CarError,
    ),

    /// The retrieval was cancelled
    #[error("Retrieval cancelled")]
    #[diagnostic(code(retrieval::cancelled))]
    Cancelled,

    /// The retrieval ran past its deadline
    #[error("Retrieval timed out after {after:?}")]
    #[diagnostic(
        code(retrieval::timed_out),
        help("Raise the timeout or try another gateway")
    )]
    TimedOut {
        /// Configured timeout
        after: Duration,
    },

    /// `run` was called on a retrieval that already ran
    #[error("Retrieval already started")]
    #[diagnostic(
        code(retrieval::already_started),
        help("A retrieval runs once; create a new one to retry")
    )]
    AlreadyStarted,
}

impl RetrievalError {
    /// Flatten to the failure category
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Cid(_) => FailureKind::InvalidCid,
            Self::Gateway(_) => FailureKind::Gateway,
            Self::Car(err) => match err {
                CarError::Format { .. } | CarError::Transport { .. } => FailureKind::Format,
                CarError::HashMismatch { .. } => FailureKind::Verification,
                CarError::UnsupportedHashAlgorithm { .. } => FailureKind::UnsupportedHash,
                CarError::MultiFileNotSupported { .. } => FailureKind::MultiFile,
                CarError::NotFound { .. }
                | CarError::InvalidNode { .. }
                | CarError::SizeMismatch { .. }
                | CarError::TooLarge { .. }
                | CarError::Encode { .. } => FailureKind::Content,
            },
            Self::Cancelled => FailureKind::Cancelled,
            Self::TimedOut { .. } => FailureKind::TimedOut,
            Self::AlreadyStarted => FailureKind::AlreadyStarted,
        }
    }

    /// Whether the gateway served bytes that failed verification
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Self::Car(err) if err.is_verification_failure())
    }
}

/// Result type alias for retrievals
pub type Result<T> = std::result::Result<T, RetrievalError>;
