//! Hash-verifying block store
//!
//! This is the trust boundary: bytes from a [`BlockSource`] are only handed on
//! after they hash to the digest embedded in the CID they were requested by.

use crate::error::{CarError, Result};
use crate::storage::BlockSource;
use bytes::Bytes;
use cid::Cid as IpldCid;
use trustless_common::hash::HashAlgorithm;

/// Outcome of checking one block against its CID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationResult {
    /// The CID the block was checked against
    pub cid: IpldCid,
    /// Whether the bytes hash to the CID's digest
    pub verified: bool,
    /// Blocks verified by the store so far, including this one
    pub verified_block_count: usize,
}

/// Check `data` against the digest in `cid`
///
/// Returns `Ok(false)` on a digest mismatch and an error if the CID names a
/// hash algorithm with no registered implementation.
pub fn verify_block(cid: &IpldCid, data: &[u8]) -> Result<bool> {
    let mh = cid.hash();
    let algorithm = HashAlgorithm::from_code(mh.code())?;
    Ok(algorithm.digest(data).as_slice() == mh.digest())
}

/// Block store that verifies every block before releasing it
///
/// Owns the verified-block counter for one retrieval. The counter only
/// increases, and only after a block has passed verification.
///
/// # Example
///
/// ```rust,ignore
/// use trustless_car::car::CarReader;
/// use trustless_car::storage::VerifyingBlockStore;
///
/// let reader = CarReader::from_stream(body).await?;
/// let mut store = VerifyingBlockStore::new(reader);
///
/// let bytes = store.get(&root).await?; // hash checked
/// assert_eq!(store.verified_blocks(), 1);
/// ```
#[derive(Debug)]
pub struct VerifyingBlockStore<S> {
    source: S,
    verified: usize,
    last: Option<VerificationResult>,
}

impl<S: BlockSource> VerifyingBlockStore<S> {
    /// Wrap a block source
    pub fn new(source: S) -> Self {
        Self {
            source,
            verified: 0,
            last: None,
        }
    }

    /// Get a block's bytes, verified against `cid`
    ///
    /// Fails with [`CarError::NotFound`] if the source has no such block,
    /// [`CarError::UnsupportedHashAlgorithm`] if the CID's hash cannot be
    /// computed, and [`CarError::HashMismatch`] if the bytes do not match. On
    /// mismatch the bytes are dropped here and never reach the caller.
    ///
    /// Identity-hash CIDs carry their content in the digest and are served
    /// without touching the source.
    pub async fn get(&mut self, cid: &IpldCid) -> Result<Bytes> {
        let mh = cid.hash();
        let data = if HashAlgorithm::from_code(mh.code())? == HashAlgorithm::Identity {
            Bytes::copy_from_slice(mh.digest())
        } else {
            self.source
                .get_block(cid)
                .await?
                .ok_or(CarError::NotFound { cid: *cid })?
        };

        let result = self.record(cid, &data)?;
        if !result.verified {
            tracing::warn!(%cid, "block failed hash verification");
            return Err(CarError::HashMismatch { cid: *cid });
        }

        tracing::debug!(%cid, len = data.len(), verified = result.verified_block_count, "verified block");
        Ok(data)
    }

    fn record(&mut self, cid: &IpldCid, data: &[u8]) -> Result<VerificationResult> {
        let verified = verify_block(cid, data)?;
        if verified {
            self.verified += 1;
        }
        let result = VerificationResult {
            cid: *cid,
            verified,
            verified_block_count: self.verified,
        };
        self.last = Some(result);
        Ok(result)
    }

    /// Blocks verified so far
    pub fn verified_blocks(&self) -> usize {
        self.verified
    }

    /// Outcome of the most recent check, if any block was checked
    pub fn last_result(&self) -> Option<&VerificationResult> {
        self.last.as_ref()
    }

    /// Access the underlying source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Unwrap the underlying source
    pub fn into_inner(self) -> S {
        self.source
    }
}
