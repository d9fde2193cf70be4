//! Reassembling a single file from a verified walk

use crate::error::{CarError, Result};
use crate::storage::BlockSource;
use crate::unixfs::{DagWalker, FileEntry, UnixFsEntry};
use bytes::Bytes;
use cid::Cid as IpldCid;

/// Default limit on the declared size of an assembled file (1 GiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30;

/// Content type detected from the leading bytes of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentType {
    /// Conventional file extension, without the dot
    pub extension: &'static str,
    /// MIME type
    pub mime: &'static str,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (.{})", self.mime, self.extension)
    }
}

/// File content whose every block passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFile {
    cid: IpldCid,
    bytes: Bytes,
    content_type: Option<ContentType>,
}

impl AssembledFile {
    /// Root CID of the file
    pub fn cid(&self) -> &IpldCid {
        &self.cid
    }

    /// File content
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Detected content type, if the leading bytes were recognised
    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type
    }

    /// File size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the file is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Take the file content
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// Detect a content type from magic bytes
///
/// Returns `None` when the format is not recognised.
pub fn detect_content_type(bytes: &[u8]) -> Option<ContentType> {
    infer::get(bytes).map(|kind| ContentType {
        extension: kind.extension(),
        mime: kind.mime_type(),
    })
}

/// Take the only entry of the walk, which must be a file
///
/// Reads at most two entries: a second one, or a directory as the first, fails
/// with [`CarError::MultiFileNotSupported`] counting what was seen.
pub async fn single_file_entry<S: BlockSource>(walker: &mut DagWalker<S>) -> Result<FileEntry> {
    let first = walker.next_entry().await?;
    // a directory's first child is enough to reject it
    let second = if first.is_some() {
        walker.next_entry().await?
    } else {
        None
    };

    match (first, second) {
        (Some(UnixFsEntry::File(file)), None) => Ok(file),
        (first, second) => {
            let seen = [first, second];
            Err(CarError::MultiFileNotSupported {
                entries: seen.iter().flatten().count(),
                files: seen.iter().flatten().filter(|e| e.is_file()).count(),
            })
        }
    }
}

/// Read a file's content to completion and sniff its type
///
/// The buffer is allocated once at the declared size; a declared size above
/// `max_size` fails with [`CarError::TooLarge`] before anything is read, and
/// content that over- or under-runs the declared size fails with
/// [`CarError::SizeMismatch`]. Returns only after the file's last chunk has
/// been verified.
pub async fn read_file<S: BlockSource>(
    walker: &mut DagWalker<S>,
    file: &FileEntry,
    max_size: u64,
) -> Result<AssembledFile> {
    let too_large = || CarError::TooLarge {
        cid: file.cid,
        size: file.size,
        max: max_size,
    };
    if file.size > max_size {
        return Err(too_large());
    }
    let expected = usize::try_from(file.size).map_err(|_| too_large())?;

    let mut buf = Vec::with_capacity(expected);
    let mut chunks = walker.chunks(file);
    while let Some(chunk) = chunks.next_chunk().await? {
        if buf.len() + chunk.len() > expected {
            return Err(CarError::SizeMismatch {
                cid: file.cid,
                expected: file.size,
                actual: (buf.len() + chunk.len()) as u64,
            });
        }
        buf.extend_from_slice(&chunk);
    }

    if buf.len() != expected {
        return Err(CarError::SizeMismatch {
            cid: file.cid,
            expected: file.size,
            actual: buf.len() as u64,
        });
    }

    let content_type = detect_content_type(&buf);
    tracing::debug!(
        cid = %file.cid,
        size = buf.len(),
        content_type = ?content_type.map(|t| t.mime),
        verified_blocks = walker.verified_blocks(),
        "assembled file"
    );

    Ok(AssembledFile {
        cid: file.cid,
        bytes: Bytes::from(buf),
        content_type,
    })
}

/// Walk to the single file below the walker's root and read it
pub async fn assemble<S: BlockSource>(
    walker: &mut DagWalker<S>,
    max_size: u64,
) -> Result<AssembledFile> {
    let file = single_file_entry(walker).await?;
    read_file(walker, &file, max_size).await
}
