//! Error types for CID parsing and hash resolution

/// Errors produced while turning user input into a CID
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CidError {
    /// Input was empty after trimming and prefix stripping
    #[error("Empty CID")]
    #[diagnostic(code(cid::empty))]
    Empty,

    /// Input carried a path after the CID
    #[error("Unsupported path in {input:?}: only bare CIDs can be retrieved")]
    #[diagnostic(
        code(cid::unsupported_path),
        help("Pass the CID of the file itself instead of a CID followed by a path")
    )]
    UnsupportedPath {
        /// The original input
        input: String,
    },

    /// Remainder is not a valid CID
    #[error("Invalid CID {input:?}")]
    #[diagnostic(code(cid::invalid))]
    Invalid {
        /// The text that failed to parse
        input: String,
        /// Underlying decoding error
        #[source]
        source: ::cid::Error,
    },
}

/// A multihash code with no registered hash function
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
#[error("Unsupported multihash algorithm 0x{code:x}")]
#[diagnostic(
    code(hash::unsupported),
    help("Supported algorithms: identity, sha2-256, sha2-512, blake3")
)]
pub struct UnsupportedHashAlgorithm {
    /// The multihash code found in the CID
    pub code: u64,
}
