//! CAR writing utilities
//!
//! Produces CAR v1 bytes from blocks, e.g. for packing a file or for test fixtures.

use crate::error::{CarError, Result};
use bytes::Bytes;
use cid::Cid as IpldCid;
use iroh_car::CarWriter;
use tokio::io::AsyncWriteExt;

/// Write blocks to CAR bytes (in-memory)
///
/// Blocks are written in the order given, which is the order a reader will
/// see them in. Trustless gateways emit blocks in depth-first DAG order.
pub async fn write_car_bytes(
    roots: Vec<IpldCid>,
    blocks: impl IntoIterator<Item = (IpldCid, Bytes)>,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let header = iroh_car::CarHeader::new_v1(roots);
    let mut writer = CarWriter::new(header, &mut buffer);

    for (cid, data) in blocks {
        writer
            .write(cid, data.as_ref())
            .await
            .map_err(|e| CarError::encode("CAR block", e))?;
    }

    writer
        .finish()
        .await
        .map_err(|e| CarError::encode("CAR trailer", e))?;

    buffer
        .flush()
        .await
        .map_err(|e| CarError::encode("CAR buffer", e))?;

    Ok(buffer)
}
