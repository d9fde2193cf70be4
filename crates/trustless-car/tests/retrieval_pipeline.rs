//! End-to-end tests of the verified pipeline: CAR stream → verifying store →
//! DAG walker → assembler.

use bytes::Bytes;
use cid::Cid as IpldCid;
use trustless_car::unixfs::pb::{self, DataType, PbLink, PbNode, UnixFsData};
use trustless_car::{
    CarError, CarReader, DEFAULT_MAX_FILE_SIZE, DagWalker, FileBuilder, MemoryBlockSource,
    UnixFsEntry, VerifyingBlockStore, assemble, write_car_bytes,
};
use trustless_common::hash::HashAlgorithm;
use trustless_common::{ByteStream, DAG_PB_CODEC};

/// Deterministic pseudo-random content
fn content(len: usize) -> Vec<u8> {
    let mut state = 0x2545_f491_u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

/// Encode a dag-pb node with a UnixFS payload and named links
fn pb_block(unixfs: UnixFsData<'_>, links: &[(&str, IpldCid)]) -> (IpldCid, Bytes) {
    let payload = pb::encode(&unixfs).unwrap();
    let hashes: Vec<Vec<u8>> = links.iter().map(|(_, c)| c.to_bytes()).collect();
    let node = PbNode {
        links: links
            .iter()
            .zip(&hashes)
            .map(|((name, _), hash)| PbLink {
                hash: Some(hash.as_slice()),
                name: Some(*name),
                tsize: None,
            })
            .collect(),
        data: Some(payload.as_slice()),
    };
    let data = pb::encode(&node).unwrap();
    let cid = IpldCid::new_v1(
        DAG_PB_CODEC,
        HashAlgorithm::Sha2_256.multihash(&data).unwrap(),
    );
    (cid, Bytes::from(data))
}

fn directory(links: &[(&str, IpldCid)]) -> (IpldCid, Bytes) {
    pb_block(
        UnixFsData {
            data_type: DataType::Directory,
            ..Default::default()
        },
        links,
    )
}

async fn car_reader(root: IpldCid, blocks: Vec<(IpldCid, Bytes)>) -> CarReader {
    let car = write_car_bytes(vec![root], blocks).await.unwrap();
    // deliver in small pieces so blocks straddle chunk boundaries
    let chunks: Vec<Result<Bytes, trustless_common::StreamError>> = car
        .chunks(1000)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    CarReader::from_stream(ByteStream::new(n0_future::stream::iter(chunks)))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_assembled_bytes_match_packed_input() {
    let data = content(100_000);
    let packed = FileBuilder::new()
        .chunk_size(4096)
        .max_links(8)
        .build(&data)
        .unwrap();

    let reader = car_reader(packed.root, packed.blocks.clone()).await;
    assert_eq!(reader.roots(), &[packed.root]);

    let mut walker = DagWalker::new(packed.root, VerifyingBlockStore::new(reader));
    let file = assemble(&mut walker, DEFAULT_MAX_FILE_SIZE).await.unwrap();

    assert_eq!(file.bytes().as_ref(), data.as_slice());
    assert_eq!(file.cid(), &packed.root);
    assert_eq!(file.content_type(), None);
    assert_eq!(walker.verified_blocks(), packed.blocks.len());
}

#[tokio::test]
async fn test_every_touched_block_hashes_to_its_cid() {
    let data = content(20_000);
    let packed = FileBuilder::new().chunk_size(1024).build(&data).unwrap();

    let reader = car_reader(packed.root, packed.blocks.clone()).await;
    let mut walker = DagWalker::new(packed.root, VerifyingBlockStore::new(reader));
    assemble(&mut walker, DEFAULT_MAX_FILE_SIZE).await.unwrap();

    let store = walker.into_store();
    let last = store.last_result().unwrap();
    assert!(last.verified);
    assert_eq!(last.verified_block_count, packed.blocks.len());

    for (cid, block) in &packed.blocks {
        assert!(trustless_car::storage::verify_block(cid, block).unwrap());
    }
}

#[tokio::test]
async fn test_single_flipped_byte_aborts_with_hash_mismatch() {
    let data = content(10_000);
    let packed = FileBuilder::new().chunk_size(1000).build(&data).unwrap();

    for index in 0..packed.blocks.len() {
        let mut blocks = packed.blocks.clone();
        let mut tampered = blocks[index].1.to_vec();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        blocks[index].1 = Bytes::from(tampered);

        let reader = car_reader(packed.root, blocks.clone()).await;
        let mut walker = DagWalker::new(packed.root, VerifyingBlockStore::new(reader));
        let err = assemble(&mut walker, DEFAULT_MAX_FILE_SIZE)
            .await
            .unwrap_err();

        match err {
            CarError::HashMismatch { cid } => assert_eq!(cid, blocks[index].0),
            other => panic!("block {index}: expected HashMismatch, got {other:?}"),
        }
        assert!(walker.verified_blocks() < packed.blocks.len());
    }
}

#[tokio::test]
async fn test_directory_of_two_files_is_rejected() {
    let a = FileBuilder::new().build(b"first file").unwrap();
    let b = FileBuilder::new().build(b"second file").unwrap();
    let (root, dir) = directory(&[("a.txt", a.root), ("b.txt", b.root)]);

    let mut blocks = vec![(root, dir)];
    blocks.extend(a.blocks);
    blocks.extend(b.blocks);

    let reader = car_reader(root, blocks).await;
    let mut walker = DagWalker::new(root, VerifyingBlockStore::new(reader));
    let err = assemble(&mut walker, DEFAULT_MAX_FILE_SIZE)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            CarError::MultiFileNotSupported {
                entries: 2,
                files: 1
            }
        ),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_walker_lists_directory_then_children() {
    let a = FileBuilder::new().build(b"first file").unwrap();
    let b = FileBuilder::new().build(b"second file").unwrap();
    let (root, dir) = directory(&[("a.txt", a.root), ("b.txt", b.root)]);

    let source: MemoryBlockSource = [(root, dir)]
        .into_iter()
        .chain(a.blocks)
        .chain(b.blocks)
        .collect();
    let mut walker = DagWalker::new(root, VerifyingBlockStore::new(source));

    let mut paths = Vec::new();
    while let Some(entry) = walker.next_entry().await.unwrap() {
        paths.push((entry.path().to_string(), entry.is_file()));
    }
    assert_eq!(
        paths,
        vec![
            (root.to_string(), false),
            (format!("{root}/a.txt"), true),
            (format!("{root}/b.txt"), true),
        ]
    );
    assert_eq!(walker.entries_read(), 3);
    assert_eq!(walker.verified_blocks(), 3);
}

#[tokio::test]
async fn test_non_recursive_walk_stops_at_root() {
    let a = FileBuilder::new().build(b"only").unwrap();
    let (root, dir) = directory(&[("only.txt", a.root)]);
    let source: MemoryBlockSource = [(root, dir)].into_iter().chain(a.blocks).collect();

    let mut walker = DagWalker::new(root, VerifyingBlockStore::new(source)).recursive(false);
    let entry = walker.next_entry().await.unwrap().unwrap();
    let UnixFsEntry::Directory(dir) = entry else {
        panic!("expected directory");
    };
    assert_eq!(dir.children.len(), 1);
    assert_eq!(dir.children[0].name, "only.txt");
    assert!(walker.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn test_sharded_directory_children_are_flattened() {
    let a = FileBuilder::new().build(b"alpha").unwrap();
    let b = FileBuilder::new().build(b"beta").unwrap();
    let shard = |links: &[(&str, IpldCid)]| {
        pb_block(
            UnixFsData {
                data_type: DataType::HamtShard,
                fanout: Some(256),
                hash_type: Some(0x22),
                ..Default::default()
            },
            links,
        )
    };
    let (bucket, bucket_data) = shard(&[("1Bbeta.txt", b.root)]);
    let (root, root_data) = shard(&[("0Falpha.txt", a.root), ("4C", bucket)]);

    let source: MemoryBlockSource = [(root, root_data), (bucket, bucket_data)]
        .into_iter()
        .chain(a.blocks)
        .chain(b.blocks)
        .collect();
    let mut walker = DagWalker::new(root, VerifyingBlockStore::new(source));

    let Some(UnixFsEntry::Directory(dir)) = walker.next_entry().await.unwrap() else {
        panic!("expected directory");
    };
    assert!(dir.sharded);
    let names: Vec<_> = dir.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["alpha.txt", "beta.txt"]);

    let Some(UnixFsEntry::File(file)) = walker.next_entry().await.unwrap() else {
        panic!("expected file");
    };
    assert_eq!(file.path, format!("{root}/alpha.txt"));
}

#[tokio::test]
async fn test_unregistered_hash_code_is_reported() {
    // sha3-256 CID; the block itself is never hashed
    let mh = multihash::Multihash::<64>::wrap(0x16, &[0xab; 32]).unwrap();
    let cid = IpldCid::new_v1(DAG_PB_CODEC, mh);

    let reader = car_reader(cid, vec![(cid, Bytes::from_static(b"opaque"))]).await;
    let mut walker = DagWalker::new(cid, VerifyingBlockStore::new(reader));
    let err = assemble(&mut walker, DEFAULT_MAX_FILE_SIZE)
        .await
        .unwrap_err();
    assert!(
        matches!(err, CarError::UnsupportedHashAlgorithm { code: 0x16 }),
        "got {err:?}"
    );
    assert_eq!(walker.verified_blocks(), 0);
}

#[tokio::test]
async fn test_blocks_out_of_dag_order_are_not_found() {
    let data = content(5000);
    let packed = FileBuilder::new().chunk_size(500).build(&data).unwrap();
    let mut blocks = packed.blocks.clone();
    blocks.reverse();

    // the root comes last, so every leaf has been dropped by the time it is wanted
    let reader = car_reader(packed.root, blocks).await;
    let mut walker = DagWalker::new(packed.root, VerifyingBlockStore::new(reader));
    let err = assemble(&mut walker, DEFAULT_MAX_FILE_SIZE)
        .await
        .unwrap_err();
    assert!(
        matches!(err, CarError::NotFound { cid } if cid == packed.blocks[1].0),
        "got {err:?}"
    );
    assert_eq!(walker.verified_blocks(), 1);
}

#[tokio::test]
async fn test_unrelated_blocks_are_dropped_not_held() {
    let data = content(200_000);
    let packed = FileBuilder::new().chunk_size(16 * 1024).build(&data).unwrap();

    let junk: Vec<(IpldCid, Bytes)> = (0..50u32)
        .map(|i| {
            let bytes = Bytes::from(content(10 * 1024 + i as usize));
            let cid = IpldCid::new_v1(
                trustless_common::RAW_CODEC,
                HashAlgorithm::Sha2_256.multihash(&bytes).unwrap(),
            );
            (cid, bytes)
        })
        .collect();
    let mut blocks = junk.clone();
    blocks.extend(packed.blocks.iter().cloned());

    let reader = car_reader(packed.root, blocks).await;
    let mut walker = DagWalker::new(packed.root, VerifyingBlockStore::new(reader));
    let file = assemble(&mut walker, DEFAULT_MAX_FILE_SIZE).await.unwrap();
    assert_eq!(file.bytes().as_ref(), data.as_slice());

    let reader = walker.store().source();
    assert_eq!(reader.blocks_skipped(), junk.len());
    assert_eq!(reader.blocks_read(), junk.len() + packed.blocks.len());

    // nothing read so far can be produced again
    let mut reader = walker.into_store().into_inner();
    assert!(reader.get(&junk[0].0).await.unwrap().is_none());
    assert!(reader.get(&packed.root).await.unwrap().is_none());
}

#[tokio::test]
async fn test_repeated_leaves_stream_once_per_link() {
    let data = b"0123456789".repeat(300);
    let packed = FileBuilder::new().chunk_size(10).build(&data).unwrap();
    // root, two interior nodes, 300 copies of one leaf
    assert_eq!(packed.blocks.len(), 303);

    let reader = car_reader(packed.root, packed.blocks.clone()).await;
    let mut walker = DagWalker::new(packed.root, VerifyingBlockStore::new(reader));
    let file = assemble(&mut walker, DEFAULT_MAX_FILE_SIZE).await.unwrap();
    assert_eq!(file.bytes().as_ref(), data.as_slice());
    assert_eq!(walker.verified_blocks(), packed.blocks.len());
}

#[tokio::test]
async fn test_chunks_cursor_reports_completion() {
    let data = content(3000);
    let packed = FileBuilder::new().chunk_size(1000).build(&data).unwrap();
    let reader = car_reader(packed.root, packed.blocks.clone()).await;
    let mut walker = DagWalker::new(packed.root, VerifyingBlockStore::new(reader));

    let Some(UnixFsEntry::File(file)) = walker.next_entry().await.unwrap() else {
        panic!("expected file");
    };
    assert_eq!(file.size, 3000);

    let mut chunks = walker.chunks(&file);
    assert!(!chunks.is_done());
    let mut sizes = Vec::new();
    while let Some(chunk) = chunks.next_chunk().await.unwrap() {
        sizes.push(chunk.len());
    }
    assert!(chunks.is_done());
    assert_eq!(sizes, vec![1000, 1000, 1000]);
    assert!(walker.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_leaf_is_not_found() {
    let data = content(3000);
    let packed = FileBuilder::new().chunk_size(1000).build(&data).unwrap();
    let missing = packed.blocks[2].0;
    let blocks: Vec<_> = packed
        .blocks
        .iter()
        .filter(|(cid, _)| *cid != missing)
        .cloned()
        .collect();

    let reader = car_reader(packed.root, blocks).await;
    let mut walker = DagWalker::new(packed.root, VerifyingBlockStore::new(reader));
    let err = assemble(&mut walker, DEFAULT_MAX_FILE_SIZE)
        .await
        .unwrap_err();
    assert!(matches!(err, CarError::NotFound { cid } if cid == missing));
}

#[tokio::test]
async fn test_declared_size_limits() {
    let data = content(4000);
    let packed = FileBuilder::new().chunk_size(1000).build(&data).unwrap();
    let source: MemoryBlockSource = packed.blocks.iter().cloned().collect();

    let mut walker = DagWalker::new(packed.root, VerifyingBlockStore::new(source));
    let err = assemble(&mut walker, 3999).await.unwrap_err();
    assert!(matches!(
        err,
        CarError::TooLarge {
            size: 4000,
            max: 3999,
            ..
        }
    ));
}

#[tokio::test]
async fn test_declared_size_disagreeing_with_content() {
    let leaf = FileBuilder::new().build(b"12345").unwrap();
    let (root, node) = pb_block(
        UnixFsData {
            data_type: DataType::File,
            filesize: Some(8),
            blocksizes: vec![5],
            ..Default::default()
        },
        &[("", leaf.root)],
    );

    let source: MemoryBlockSource = [(root, node)].into_iter().chain(leaf.blocks).collect();
    let mut walker = DagWalker::new(root, VerifyingBlockStore::new(source));
    let err = assemble(&mut walker, DEFAULT_MAX_FILE_SIZE)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CarError::SizeMismatch {
            expected: 8,
            actual: 5,
            ..
        }
    ));
}

#[tokio::test]
async fn test_sniffs_content_type_of_assembled_file() {
    let mut png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    png.extend(content(600));
    let packed = FileBuilder::new().chunk_size(256).build(&png).unwrap();
    let source: MemoryBlockSource = packed.blocks.into_iter().collect();

    let mut walker = DagWalker::new(packed.root, VerifyingBlockStore::new(source));
    let file = assemble(&mut walker, DEFAULT_MAX_FILE_SIZE).await.unwrap();
    let content_type = file.content_type().unwrap();
    assert_eq!(content_type.mime, "image/png");
    assert_eq!(content_type.extension, "png");
}
