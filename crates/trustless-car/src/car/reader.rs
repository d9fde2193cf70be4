//! CAR stream reading
//!
//! Blocks are decoded incrementally as chunks arrive from the byte stream; the
//! whole archive is never materialized up front, and a block is dropped by the
//! reader as soon as it has been handed out or passed over.

use crate::error::{CarError, Result};
use crate::storage::BlockSource;
use bytes::Bytes;
use cid::Cid as IpldCid;
use n0_future::stream::Stream;
use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio_util::io::StreamReader;
use trustless_common::stream::{ByteStream, StreamError};

/// A block as it appears in the CAR stream, not yet verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// CID the block was stored under
    pub cid: IpldCid,
    /// Raw block bytes
    pub data: Bytes,
}

/// Parsed CAR data held in memory
#[derive(Debug, Clone)]
pub struct ParsedCar {
    /// Root CIDs from the CAR header
    pub roots: Vec<IpldCid>,
    /// All blocks in the CAR
    pub blocks: BTreeMap<IpldCid, Bytes>,
}

/// Forward-only CAR reader over a byte stream
///
/// The header is parsed on construction. Blocks come out in stream order via
/// [`CarReader::next_block`]; [`CarReader::get`] scans forward until it
/// meets the requested CID and discards every block before it.
///
/// The reader holds no blocks. A CAR has to list blocks in the order they are
/// read, which for a UnixFS walk is depth-first with a repeated block sent
/// again at each link. Nothing here is verified; see
/// [`VerifyingBlockStore`](crate::storage::VerifyingBlockStore).
pub struct CarReader {
    inner: iroh_car::CarReader<StreamReader<TrackedStream, Bytes>>,
    failure: oneshot::Receiver<StreamError>,
    roots: Vec<IpldCid>,
    blocks_read: usize,
    blocks_skipped: usize,
    exhausted: bool,
}

impl CarReader {
    /// Read the CAR header from a byte stream
    pub async fn from_stream(stream: ByteStream) -> Result<Self> {
        let (tx, mut failure) = oneshot::channel();
        let tracked = TrackedStream {
            inner: stream,
            failure: Some(tx),
        };

        let inner = match iroh_car::CarReader::new(StreamReader::new(tracked)).await {
            Ok(inner) => inner,
            Err(e) => return Err(classify(&mut failure, "Failed to read CAR header", e)),
        };

        let roots = inner.header().roots().to_vec();
        tracing::debug!(roots = ?roots, "read CAR header");

        Ok(Self {
            inner,
            failure,
            roots,
            blocks_read: 0,
            blocks_skipped: 0,
            exhausted: false,
        })
    }

    /// Read the CAR header from an in-memory buffer
    pub async fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        Self::from_stream(ByteStream::from_bytes(data)).await
    }

    /// Root CIDs named by the header
    pub fn roots(&self) -> &[IpldCid] {
        &self.roots
    }

    /// Number of blocks decoded from the stream so far
    pub fn blocks_read(&self) -> usize {
        self.blocks_read
    }

    /// Number of blocks [`CarReader::get`] passed over and dropped
    pub fn blocks_skipped(&self) -> usize {
        self.blocks_skipped
    }

    /// Next block in stream order
    ///
    /// Returns `None` when the stream is exhausted.
    pub async fn next_block(&mut self) -> Result<Option<Block>> {
        if self.exhausted {
            return Ok(None);
        }

        match self.inner.next_block().await {
            Ok(Some((cid, data))) => {
                self.blocks_read += 1;
                let data = Bytes::from(data);
                tracing::trace!(%cid, len = data.len(), "decoded CAR block");
                Ok(Some(Block { cid, data }))
            }
            Ok(None) => {
                self.exhausted = true;
                Ok(None)
            }
            Err(e) => {
                self.exhausted = true;
                Err(classify(&mut self.failure, "Failed to read CAR block", e))
            }
        }
    }

    /// Find a block by CID, reading forward as far as needed
    ///
    /// Blocks before it are dropped. Returns `None` if the stream ends without
    /// the block, including when it was already read earlier.
    pub async fn get(&mut self, cid: &IpldCid) -> Result<Option<Block>> {
        while let Some(block) = self.next_block().await? {
            if &block.cid == cid {
                return Ok(Some(block));
            }
            self.blocks_skipped += 1;
            tracing::debug!(wanted = %cid, skipped = %block.cid, "dropping out-of-order CAR block");
        }
        Ok(None)
    }

    /// Drain the rest of the stream into memory
    pub async fn collect(mut self) -> Result<ParsedCar> {
        let mut blocks = BTreeMap::new();
        while let Some(block) = self.next_block().await? {
            blocks.insert(block.cid, block.data);
        }
        Ok(ParsedCar {
            roots: self.roots,
            blocks,
        })
    }
}

impl std::fmt::Debug for CarReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarReader")
            .field("roots", &self.roots)
            .field("blocks_read", &self.blocks_read)
            .field("blocks_skipped", &self.blocks_skipped)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl BlockSource for CarReader {
    async fn get_block(&mut self, cid: &IpldCid) -> Result<Option<Bytes>> {
        Ok(self.get(cid).await?.map(|block| block.data))
    }
}

/// Turn a decoder error into a [`CarError`]
///
/// The CAR decoder flattens I/O failures into strings, so the byte stream
/// hands its failure over out of band; when one was recorded the error is a
/// transport failure rather than a framing violation.
fn classify(
    failure: &mut oneshot::Receiver<StreamError>,
    context: &str,
    err: iroh_car::Error,
) -> CarError {
    match failure.try_recv() {
        Ok(stream_err) => CarError::Transport {
            source: Box::new(stream_err),
        },
        Err(_) => CarError::decode(context, err),
    }
}

/// Byte stream adapter that reports its first failure to the owning reader
struct TrackedStream {
    inner: ByteStream,
    failure: Option<oneshot::Sender<StreamError>>,
}

impl Stream for TrackedStream {
    type Item = std::result::Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Err(e))) => {
                let io = std::io::Error::other(e.to_string());
                if let Some(tx) = this.failure.take() {
                    let _ = tx.send(e);
                }
                Poll::Ready(Some(Err(io)))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Parse CAR bytes into roots and a block map
///
/// For in-memory CAR data such as test fixtures. Requires at least one root.
pub async fn parse_car_bytes(data: &[u8]) -> Result<ParsedCar> {
    let reader = CarReader::from_bytes(Bytes::copy_from_slice(data)).await?;
    if reader.roots().is_empty() {
        return Err(CarError::format("CAR file has no roots"));
    }
    reader.collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::writer::write_car_bytes;
    use trustless_common::hash::HashAlgorithm;
    use trustless_common::RAW_CODEC;

    fn make_test_block(value: u8) -> (IpldCid, Bytes) {
        let data = Bytes::from(vec![value; 3]);
        let mh = HashAlgorithm::Sha2_256.multihash(&data).unwrap();
        (IpldCid::new_v1(RAW_CODEC, mh), data)
    }

    async fn make_test_car(roots: Vec<IpldCid>, blocks: Vec<(IpldCid, Bytes)>) -> Vec<u8> {
        write_car_bytes(roots, blocks).await.unwrap()
    }

    /// Split `data` into a stream of `size`-byte chunks
    fn chunked(data: Vec<u8>, size: usize) -> ByteStream {
        let chunks: Vec<std::result::Result<Bytes, StreamError>> = data
            .chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        ByteStream::new(n0_future::stream::iter(chunks))
    }

    #[tokio::test]
    async fn test_parse_car_with_blocks() {
        let (cid1, data1) = make_test_block(1);
        let (cid2, data2) = make_test_block(2);

        let car_bytes = make_test_car(
            vec![cid1],
            vec![(cid1, data1.clone()), (cid2, data2.clone())],
        )
        .await;

        let parsed = parse_car_bytes(&car_bytes).await.unwrap();
        assert_eq!(parsed.roots, vec![cid1]);
        assert_eq!(parsed.blocks.len(), 2);
        assert_eq!(parsed.blocks.get(&cid1).unwrap(), &data1);
        assert_eq!(parsed.blocks.get(&cid2).unwrap(), &data2);
    }

    #[tokio::test]
    async fn test_blocks_in_stream_order_across_tiny_chunks() {
        let blocks: Vec<_> = (0..5).map(make_test_block).collect();
        let car_bytes = make_test_car(vec![blocks[0].0], blocks.clone()).await;

        let mut reader = CarReader::from_stream(chunked(car_bytes, 3)).await.unwrap();
        assert_eq!(reader.roots(), &[blocks[0].0]);

        for (cid, data) in &blocks {
            let block = reader.next_block().await.unwrap().unwrap();
            assert_eq!(&block.cid, cid);
            assert_eq!(&block.data, data);
        }
        assert!(reader.next_block().await.unwrap().is_none());
        assert_eq!(reader.blocks_read(), 5);
    }

    #[tokio::test]
    async fn test_get_scans_forward_and_drops_passed_blocks() {
        let blocks: Vec<_> = (0..4).map(make_test_block).collect();
        let car_bytes = make_test_car(vec![blocks[0].0], blocks.clone()).await;
        let mut reader = CarReader::from_bytes(car_bytes).await.unwrap();

        // the two blocks before it are passed over
        let third = reader.get(&blocks[2].0).await.unwrap().unwrap();
        assert_eq!(third.data, blocks[2].1);
        assert_eq!(reader.blocks_read(), 3);
        assert_eq!(reader.blocks_skipped(), 2);

        // neither a skipped block nor a returned one can be read again
        assert!(reader.get(&blocks[0].0).await.unwrap().is_none());
        assert_eq!(reader.blocks_skipped(), 3);
        assert!(reader.get(&blocks[2].0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_repeated_block_is_read_once_per_occurrence() {
        let (a, data_a) = make_test_block(1);
        let (b, data_b) = make_test_block(2);
        let car_bytes = make_test_car(
            vec![a],
            vec![(a, data_a.clone()), (b, data_b), (a, data_a.clone())],
        )
        .await;
        let mut reader = CarReader::from_bytes(car_bytes).await.unwrap();

        assert_eq!(reader.get(&a).await.unwrap().unwrap().data, data_a);
        assert_eq!(reader.get(&a).await.unwrap().unwrap().data, data_a);
        assert_eq!(reader.blocks_skipped(), 1);
        assert!(reader.get(&a).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_block_is_format_error() {
        let blocks: Vec<_> = (0..2).map(make_test_block).collect();
        let mut car_bytes = make_test_car(vec![blocks[0].0], blocks).await;
        car_bytes.truncate(car_bytes.len() - 2);

        let mut reader = CarReader::from_bytes(car_bytes).await.unwrap();
        assert!(reader.next_block().await.unwrap().is_some());
        let err = reader.next_block().await.unwrap_err();
        assert!(matches!(err, CarError::Format { .. }), "got {err:?}");

        // a failed reader stays finished
        assert!(reader.next_block().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_header_is_format_error() {
        let err = CarReader::from_bytes(vec![0x05, 0xff, 0xff, 0xff, 0xff, 0xff])
            .await
            .unwrap_err();
        assert!(matches!(err, CarError::Format { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_stream_failure_is_transport_error() {
        let (cid, data) = make_test_block(1);
        let car_bytes = make_test_car(vec![cid], vec![(cid, data)]).await;
        let header_len = car_bytes.len() - 10;

        let chunks = vec![
            Ok(Bytes::copy_from_slice(&car_bytes[..header_len])),
            Err(StreamError::closed()),
        ];
        let stream = ByteStream::new(n0_future::stream::iter(chunks));

        let result = async {
            let mut reader = CarReader::from_stream(stream).await?;
            reader.next_block().await
        }
        .await;
        assert!(
            matches!(result, Err(CarError::Transport { .. })),
            "got {result:?}"
        );
    }
}
