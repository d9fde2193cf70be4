//! dag-pb and UnixFS protobuf messages
//!
//! Hand-maintained equivalents of the `quick-protobuf` generated code for
//! these schemas:
//!
//! ```protobuf
//! message PBLink { optional bytes Hash = 1; optional string Name = 2; optional uint64 Tsize = 3; }
//! message PBNode { repeated PBLink Links = 2; optional bytes Data = 1; }
//!
//! message Data {
//!   enum DataType { Raw = 0; Directory = 1; File = 2; Metadata = 3; Symlink = 4; HAMTShard = 5; }
//!   required DataType Type = 1;
//!   optional bytes Data = 2;
//!   optional uint64 filesize = 3;
//!   repeated uint64 blocksizes = 4;
//!   optional uint64 hashType = 5;
//!   optional uint64 fanout = 6;
//!   optional uint32 mode = 7;
//!   optional UnixTime mtime = 8;
//! }
//! ```
//!
//! Fields borrow from the block they were decoded from. dag-pb requires Links
//! to be encoded before Data, which `PbNode::write_message` honours.

use quick_protobuf::sizeofs::{sizeof_len, sizeof_varint};
use quick_protobuf::{BytesReader, MessageRead, MessageWrite, Result, Writer, WriterBackend};

/// Link from a dag-pb node to a child block
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct PbLink<'a> {
    /// Binary CID of the child
    pub hash: Option<&'a [u8]>,
    /// Link name (directory entry name; empty for file chunks)
    pub name: Option<&'a str>,
    /// Cumulative size of the child DAG
    pub tsize: Option<u64>,
}

impl<'a> MessageRead<'a> for PbLink<'a> {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.hash = Some(r.read_bytes(bytes)?),
                Ok(18) => msg.name = Some(r.read_string(bytes)?),
                Ok(24) => msg.tsize = Some(r.read_uint64(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for PbLink<'_> {
    fn get_size(&self) -> usize {
        self.hash.map_or(0, |m| 1 + sizeof_len(m.len()))
            + self.name.map_or(0, |m| 1 + sizeof_len(m.len()))
            + self.tsize.map_or(0, |m| 1 + sizeof_varint(m))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> Result<()> {
        if let Some(s) = self.hash {
            w.write_with_tag(10, |w| w.write_bytes(s))?;
        }
        if let Some(s) = self.name {
            w.write_with_tag(18, |w| w.write_string(s))?;
        }
        if let Some(s) = self.tsize {
            w.write_with_tag(24, |w| w.write_uint64(s))?;
        }
        Ok(())
    }
}

/// dag-pb node
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct PbNode<'a> {
    /// Links to children, in order
    pub links: Vec<PbLink<'a>>,
    /// Opaque payload; for UnixFS an encoded [`UnixFsData`]
    pub data: Option<&'a [u8]>,
}

impl<'a> MessageRead<'a> for PbNode<'a> {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(18) => msg.links.push(r.read_message::<PbLink>(bytes)?),
                Ok(10) => msg.data = Some(r.read_bytes(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for PbNode<'_> {
    fn get_size(&self) -> usize {
        self.links
            .iter()
            .map(|s| 1 + sizeof_len(s.get_size()))
            .sum::<usize>()
            + self.data.map_or(0, |m| 1 + sizeof_len(m.len()))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> Result<()> {
        for s in &self.links {
            w.write_with_tag(18, |w| w.write_message(s))?;
        }
        if let Some(s) = self.data {
            w.write_with_tag(10, |w| w.write_bytes(s))?;
        }
        Ok(())
    }
}

/// UnixFS node type
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum DataType {
    /// Raw file chunk
    #[default]
    Raw,
    /// Directory
    Directory,
    /// File (root or interior node)
    File,
    /// Metadata wrapper
    Metadata,
    /// Symbolic link
    Symlink,
    /// Sharded directory bucket
    HamtShard,
    /// A value outside the schema, kept as read
    Unknown(i32),
}

impl From<i32> for DataType {
    fn from(i: i32) -> Self {
        match i {
            0 => DataType::Raw,
            1 => DataType::Directory,
            2 => DataType::File,
            3 => DataType::Metadata,
            4 => DataType::Symlink,
            5 => DataType::HamtShard,
            other => DataType::Unknown(other),
        }
    }
}

impl From<DataType> for i32 {
    fn from(t: DataType) -> Self {
        match t {
            DataType::Raw => 0,
            DataType::Directory => 1,
            DataType::File => 2,
            DataType::Metadata => 3,
            DataType::Symlink => 4,
            DataType::HamtShard => 5,
            DataType::Unknown(other) => other,
        }
    }
}

/// UnixFS payload carried in a dag-pb node's Data field
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct UnixFsData<'a> {
    /// Node type
    pub data_type: DataType,
    /// Inline file bytes
    pub data: Option<&'a [u8]>,
    /// Total size of the file below this node
    pub filesize: Option<u64>,
    /// Content size of each child, in link order
    pub blocksizes: Vec<u64>,
    /// Hash function used for HAMT buckets
    pub hash_type: Option<u64>,
    /// HAMT fanout
    pub fanout: Option<u64>,
    /// Unix permission bits
    pub mode: Option<u32>,
}

impl<'a> MessageRead<'a> for UnixFsData<'a> {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> Result<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(8) => msg.data_type = r.read_enum(bytes)?,
                Ok(18) => msg.data = Some(r.read_bytes(bytes)?),
                Ok(24) => msg.filesize = Some(r.read_uint64(bytes)?),
                Ok(32) => msg.blocksizes.push(r.read_uint64(bytes)?),
                Ok(34) => msg
                    .blocksizes
                    .extend(r.read_packed(bytes, |r, bytes| r.read_uint64(bytes))?),
                Ok(40) => msg.hash_type = Some(r.read_uint64(bytes)?),
                Ok(48) => msg.fanout = Some(r.read_uint64(bytes)?),
                Ok(56) => msg.mode = Some(r.read_uint32(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for UnixFsData<'_> {
    fn get_size(&self) -> usize {
        1 + sizeof_varint(i32::from(self.data_type) as u64)
            + self.data.map_or(0, |m| 1 + sizeof_len(m.len()))
            + self.filesize.map_or(0, |m| 1 + sizeof_varint(m))
            + self
                .blocksizes
                .iter()
                .map(|s| 1 + sizeof_varint(*s))
                .sum::<usize>()
            + self.hash_type.map_or(0, |m| 1 + sizeof_varint(m))
            + self.fanout.map_or(0, |m| 1 + sizeof_varint(m))
            + self.mode.map_or(0, |m| 1 + sizeof_varint(u64::from(m)))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_with_tag(8, |w| w.write_enum(i32::from(self.data_type)))?;
        if let Some(s) = self.data {
            w.write_with_tag(18, |w| w.write_bytes(s))?;
        }
        if let Some(s) = self.filesize {
            w.write_with_tag(24, |w| w.write_uint64(s))?;
        }
        for s in &self.blocksizes {
            w.write_with_tag(32, |w| w.write_uint64(*s))?;
        }
        if let Some(s) = self.hash_type {
            w.write_with_tag(40, |w| w.write_uint64(s))?;
        }
        if let Some(s) = self.fanout {
            w.write_with_tag(48, |w| w.write_uint64(s))?;
        }
        if let Some(s) = self.mode {
            w.write_with_tag(56, |w| w.write_uint32(s))?;
        }
        Ok(())
    }
}

/// Decode a message from a complete buffer (no length prefix)
pub fn decode<'a, M: MessageRead<'a>>(bytes: &'a [u8]) -> Result<M> {
    let mut reader = BytesReader::from_bytes(bytes);
    M::from_reader(&mut reader, bytes)
}

/// Encode a message into a new buffer (no length prefix)
pub fn encode<M: MessageWrite>(msg: &M) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(msg.get_size());
    let mut writer = Writer::new(&mut buf);
    msg.write_message(&mut writer)?;
    Ok(buf)
}
