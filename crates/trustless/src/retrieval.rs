//! One verified retrieval, from CID to assembled file
//!
//! A [`Retrieval`] moves through
//! `Idle → Fetching → Decoding → Walking → Assembling → Done`, or to
//! `Failed { kind }` from any stage after `Idle`. It runs at most once and
//! never retries.

use crate::error::{FailureKind, Result, RetrievalError};
use crate::gateway::GatewayClient;
use cid::Cid as IpldCid;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trustless_car::{
    AssembledFile, CarError, CarReader, DEFAULT_MAX_FILE_SIZE, DagWalker, VerifyingBlockStore,
    assemble, read_file, single_file_entry,
};
use trustless_common::ByteStream;
use trustless_common::http_client::HttpClient;

/// Stage of a retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalState {
    /// Not started
    Idle,
    /// Waiting for the gateway's response
    Fetching,
    /// Reading the CAR header
    Decoding,
    /// Walking the DAG to the file entry
    Walking,
    /// Reading and verifying the file's chunks
    Assembling,
    /// Finished with a verified file
    Done,
    /// Finished without a file
    Failed {
        /// Failure category
        kind: FailureKind,
    },
}

impl RetrievalState {
    /// Whether the retrieval has finished, either way
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

/// Result of a successful retrieval
#[derive(Debug, Clone)]
pub struct RetrievalReport {
    /// The verified file
    pub file: AssembledFile,
    /// Blocks verified on the way, equal to the blocks the walk touched
    pub verified_blocks: usize,
    /// Roots named by the CAR header
    pub car_roots: Vec<IpldCid>,
}

/// A single retrieval of one CID from one gateway
///
/// # Example
///
/// ```rust,ignore
/// let config = RetrievalConfig::from_env()?;
/// let mut retrieval = config.retrieval(config.http_client()?, cid);
///
/// let cancel = retrieval.cancellation_token();
/// // cancel.cancel() from elsewhere aborts the retrieval
///
/// let report = retrieval.run().await?;
/// println!("{} bytes, {} blocks verified", report.file.len(), report.verified_blocks);
/// ```
#[derive(Debug)]
pub struct Retrieval<C> {
    gateway: GatewayClient<C>,
    cid: IpldCid,
    max_file_size: u64,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    state: RetrievalState,
}

impl<C: HttpClient> Retrieval<C> {
    /// Retrieval of `cid` through `gateway`
    pub fn new(gateway: GatewayClient<C>, cid: IpldCid) -> Self {
        Self {
            gateway,
            cid,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            timeout: None,
            cancel: CancellationToken::new(),
            state: RetrievalState::Idle,
        }
    }

    /// Set the largest declared file size that will be read
    pub fn max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Set a deadline for the whole retrieval
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use `token` for cancellation instead of a fresh one
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this retrieval
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The CID being retrieved
    pub fn cid(&self) -> &IpldCid {
        &self.cid
    }

    /// Current stage
    pub fn state(&self) -> RetrievalState {
        self.state
    }

    /// Fetch, verify and assemble the file
    ///
    /// Returns only after the walk is complete and every block it touched
    /// has passed verification. On any error the partial file is dropped and
    /// the state becomes `Failed`.
    #[tracing::instrument(skip(self), fields(cid = %self.cid))]
    pub async fn run(&mut self) -> Result<RetrievalReport> {
        if self.state != RetrievalState::Idle {
            return Err(RetrievalError::AlreadyStarted);
        }

        let result = match self.timeout {
            Some(after) => tokio::time::timeout(after, self.pipeline())
                .await
                .unwrap_or(Err(RetrievalError::TimedOut { after })),
            None => self.pipeline().await,
        };

        match &result {
            Ok(report) => {
                self.transition(RetrievalState::Done);
                tracing::info!(
                    size = report.file.len(),
                    verified_blocks = report.verified_blocks,
                    "retrieval complete"
                );
            }
            Err(err) => {
                self.transition(RetrievalState::Failed { kind: err.kind() });
                if err.is_verification_failure() {
                    tracing::warn!(error = %err, "gateway served unverifiable data");
                }
            }
        }
        result
    }

    async fn pipeline(&mut self) -> Result<RetrievalReport> {
        let cancel = self.cancel.clone();

        self.transition(RetrievalState::Fetching);
        let body = cancellable(&cancel, self.gateway.fetch_car(&self.cid)).await??;

        self.transition(RetrievalState::Decoding);
        let reader = cancellable(&cancel, CarReader::from_stream(body)).await??;
        let car_roots = reader.roots().to_vec();
        if !car_roots.contains(&self.cid) {
            tracing::debug!(roots = ?car_roots, "requested CID is not a CAR root");
        }

        self.transition(RetrievalState::Walking);
        let mut walker = DagWalker::new(self.cid, VerifyingBlockStore::new(reader));
        let entry = cancellable(&cancel, single_file_entry(&mut walker)).await??;

        self.transition(RetrievalState::Assembling);
        let file = cancellable(&cancel, read_file(&mut walker, &entry, self.max_file_size)).await??;

        Ok(RetrievalReport {
            file,
            verified_blocks: walker.verified_blocks(),
            car_roots,
        })
    }

    fn transition(&mut self, next: RetrievalState) {
        tracing::debug!(from = ?self.state, to = ?next, "retrieval state");
        self.state = next;
    }
}

/// Race `fut` against cancellation
///
/// Cancellation wins ties; the losing future is dropped along with whatever
/// stream it was reading.
async fn cancellable<F: Future>(token: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(RetrievalError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Verify and assemble a CAR that is already at hand, e.g. a local file
///
/// Without `root` the CAR header must name exactly one root.
pub async fn verify_car(
    body: ByteStream,
    root: Option<IpldCid>,
    max_file_size: u64,
) -> Result<RetrievalReport> {
    let reader = CarReader::from_stream(body).await?;
    let car_roots = reader.roots().to_vec();
    let root = match (root, car_roots.as_slice()) {
        (Some(root), _) => root,
        (None, [only]) => *only,
        (None, roots) => {
            return Err(CarError::format(format!(
                "CAR names {} roots; pass the CID to verify",
                roots.len()
            ))
            .into());
        }
    };

    let mut walker = DagWalker::new(root, VerifyingBlockStore::new(reader));
    let file = assemble(&mut walker, max_file_size).await?;
    Ok(RetrievalReport {
        file,
        verified_blocks: walker.verified_blocks(),
        car_roots,
    })
}
