//! [`DiscReader`] and associated types.

use std::{
    collections::HashMap,
    io,
    io::{BufRead, Read, Seek, SeekFrom},
    mem::size_of,
    path::Path,
    sync::Arc,
};

use dyn_clone::DynClone;
use itertools::Itertools;
use zerocopy::FromBytes;

use crate::{
    common::{PartitionInfo, PartitionKind},
    disc,
    disc::{
        fst::{Fst, Node},
        wii::{ContentMetadata, Ticket, TmdHeader, H3_TABLE_SIZE, REGION_SIZE},
        ApploaderHeader, DiscHeader, DolHeader, PartitionHeader, BI2_SIZE, BOOT_SIZE,
    },
    io::open,
    util::WindowedReader,
    Error, Result, ResultContext,
};

/// Required trait bounds for reading disc images.
pub trait DiscStream: Read + Seek + DynClone + Send + Sync {}

impl<T> DiscStream for T where T: Read + Seek + DynClone + Send + Sync + ?Sized {}

dyn_clone::clone_trait_object!(DiscStream);

/// Options for opening a partition.
#[derive(Debug, Clone)]
pub struct PartitionOptions {
    /// Wii: Validate data hashes while reading the partition, if present.
    ///
    /// Defaults to `true`; has no effect when the disc header marks the
    /// partition data as hashless.
    pub validate_hashes: bool,
}

impl Default for PartitionOptions {
    fn default() -> Self { Self { validate_hashes: true } }
}

/// An open disc image.
///
/// This is the primary entry point for reading disc images.
#[derive(Clone)]
pub struct DiscReader {
    inner: disc::reader::DiscReader,
}

impl DiscReader {
    /// Opens a disc image from a file path.
    #[inline]
    pub fn new<P: AsRef<Path>>(path: P) -> Result<DiscReader> {
        let stream = open(path.as_ref())?;
        Ok(DiscReader { inner: disc::reader::DiscReader::new(stream)? })
    }

    /// Opens a disc image from a read stream.
    #[inline]
    pub fn new_stream(stream: Box<dyn DiscStream>) -> Result<DiscReader> {
        Ok(DiscReader { inner: disc::reader::DiscReader::new(stream)? })
    }

    /// The disc's primary header.
    #[inline]
    pub fn header(&self) -> &DiscHeader { self.inner.header() }

    /// Whether this is a Wii disc. (GameCube otherwise)
    #[inline]
    pub fn is_wii(&self) -> bool { self.inner.header().is_wii() }

    /// The disc's size in bytes, or an estimate if not determinable.
    #[inline]
    pub fn disc_size(&self) -> u64 { self.inner.disc_size() }

    /// The Wii disc's region information.
    ///
    /// **GameCube**: This will return `None`.
    #[inline]
    pub fn region(&self) -> Option<&[u8; REGION_SIZE]> { self.inner.region() }

    /// A list of Wii partitions on the disc.
    ///
    /// **GameCube**: This will return an empty slice.
    #[inline]
    pub fn partitions(&self) -> &[PartitionInfo] { self.inner.partitions() }

    /// Opens the partition at the specified index.
    ///
    /// **GameCube**: `index` must always be 0.
    pub fn open_partition(&self, index: usize, options: &PartitionOptions) -> Result<Partition> {
        Partition::new(self.inner.open_partition(index, options)?)
    }

    /// Opens the first partition matching the specified kind.
    ///
    /// **GameCube**: `kind` must always be [`PartitionKind::Data`].
    pub fn open_partition_kind(
        &self,
        kind: PartitionKind,
        options: &PartitionOptions,
    ) -> Result<Partition> {
        Partition::new(self.inner.open_partition_kind(kind, options)?)
    }

    /// Opens the partition carrying the primary game data.
    ///
    /// For GameCube discs, this is the entire payload region.
    #[inline]
    pub fn data_partition(&self) -> Result<Partition> {
        self.open_partition_kind(PartitionKind::Data, &PartitionOptions::default())
    }
}

/// An open disc partition's decrypted read stream.
///
/// Implementations provide sector-level access; [`Partition`] layers the file
/// system on top.
pub trait PartitionReader: DynClone + BufRead + Seek + Send + Sync {
    /// Whether this is a Wii partition. (GameCube otherwise)
    fn is_wii(&self) -> bool;

    /// Whether the partition data is stored encrypted.
    fn is_encrypted(&self) -> bool;

    /// Reads the partition header and file system table.
    fn meta(&mut self) -> Result<PartitionMeta>;
}

dyn_clone::clone_trait_object!(PartitionReader);

/// An open disc partition and its file system.
///
/// Obtained from [`DiscReader::open_partition`] or
/// [`DiscReader::data_partition`]. The file system table is parsed and
/// validated once when the partition is opened; file lookups afterwards are
/// constant time.
pub struct Partition {
    pub(crate) reader: Box<dyn PartitionReader>,
    pub(crate) meta: PartitionMeta,
    path_map: HashMap<String, (usize, Node)>,
    encrypted: bool,
}

impl Partition {
    pub(crate) fn new(mut reader: Box<dyn PartitionReader>) -> Result<Self> {
        let meta = reader.meta()?;
        let header = meta.header();
        if reader.is_wii() {
            if !header.is_wii() {
                return Err(Error::CorruptFormat(
                    "Wii partition header is missing Wii magic".to_string(),
                ));
            }
        } else if !header.is_gamecube() {
            return Err(Error::CorruptFormat(
                "GameCube partition header is missing GameCube magic".to_string(),
            ));
        }
        let path_map = meta.fst()?.path_map()?;
        let encrypted = reader.is_encrypted();
        Ok(Self { reader, meta, path_map, encrypted })
    }

    /// Whether this is a Wii partition. (GameCube otherwise)
    #[inline]
    pub fn is_wii(&self) -> bool { self.reader.is_wii() }

    /// Whether the partition data is stored encrypted.
    #[inline]
    pub fn is_encrypted(&self) -> bool { self.encrypted }

    /// Extra partition data. (Raw FST, DOL, apploader, etc.)
    #[inline]
    pub fn meta(&self) -> &PartitionMeta { &self.meta }

    /// The partition's disc header.
    #[inline]
    pub fn header(&self) -> &DiscHeader { self.meta.header() }

    /// The partition's boot metadata. (DOL offset, FST offset, etc.)
    #[inline]
    pub fn partition_header(&self) -> &PartitionHeader { self.meta.partition_header() }

    /// A view into the partition's file system table.
    #[inline]
    pub fn fst(&self) -> Result<Fst> { self.meta.fst() }

    /// Finds a file or directory node by its `/`-separated, case-sensitive
    /// path. Leading and repeated slashes are ignored.
    pub fn find(&self, path: &str) -> Option<(usize, Node)> {
        let normalized = path.split('/').filter(|s| !s.is_empty()).join("/");
        self.path_map.get(&normalized).copied()
    }

    /// Iterates over the partition's file paths in file system order.
    ///
    /// The iterator is lazy; calling this again restarts the traversal.
    pub fn file_paths(&self) -> impl Iterator<Item = String> + '_ {
        Fst::new(&self.meta.raw_fst)
            .ok()
            .map(|fst| fst.iter())
            .into_iter()
            .flatten()
            .filter(|(_, node, _)| node.is_file())
            .map(|(_, _, path)| path)
    }

    /// Opens a read stream over one file's byte range.
    ///
    /// Fails with [`Error::NotFound`] if no file node matches the path. The
    /// returned stream holds its own cursor; multiple streams over the same
    /// partition may coexist.
    pub fn open_file(&self, path: &str) -> Result<PartReadStream> {
        let Some((_, node)) = self.find(path).filter(|(_, node)| node.is_file()) else {
            return Err(Error::NotFound(path.to_string()));
        };
        let reader = dyn_clone::clone_box(&*self.reader);
        let is_wii = self.reader.is_wii();
        let window = WindowedReader::new(reader, node.offset(is_wii), node.length() as u64)
            .with_context(|| format!("Opening file {path}"))?;
        Ok(PartReadStream { inner: Some(window) })
    }
}

fn stream_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "read stream is closed")
}

/// A bounded, seekable read stream over one file inside a partition.
///
/// The stream is an explicit Open/Closed state machine: after [`close`],
/// every operation fails with a stream-closed error rather than returning
/// stale data.
///
/// [`close`]: PartReadStream::close
pub struct PartReadStream {
    inner: Option<WindowedReader<Box<dyn PartitionReader>>>,
}

impl PartReadStream {
    /// The file's byte length.
    pub fn len(&self) -> io::Result<u64> {
        self.inner.as_ref().map(|inner| inner.len()).ok_or_else(stream_closed)
    }

    /// Whether the stream has been closed.
    #[inline]
    pub fn is_closed(&self) -> bool { self.inner.is_none() }

    /// Closes the stream. Further operations fail.
    #[inline]
    pub fn close(&mut self) { self.inner = None; }

    fn stream(&mut self) -> io::Result<&mut WindowedReader<Box<dyn PartitionReader>>> {
        self.inner.as_mut().ok_or_else(stream_closed)
    }
}

impl Read for PartReadStream {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { self.stream()?.read(buf) }
}

impl BufRead for PartReadStream {
    #[inline]
    fn fill_buf(&mut self) -> io::Result<&[u8]> { self.stream()?.fill_buf() }

    #[inline]
    fn consume(&mut self, amt: usize) {
        if let Some(inner) = self.inner.as_mut() {
            inner.consume(amt);
        }
    }
}

impl Seek for PartReadStream {
    #[inline]
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> { self.stream()?.seek(pos) }
}

/// Extra disc partition data. (DOL, FST, etc.)
#[derive(Clone, Debug)]
pub struct PartitionMeta {
    /// Disc and partition header (boot.bin)
    pub raw_boot: Arc<[u8; BOOT_SIZE]>,
    /// Debug and region information (bi2.bin)
    pub raw_bi2: Arc<[u8; BI2_SIZE]>,
    /// Apploader (apploader.bin)
    pub raw_apploader: Arc<[u8]>,
    /// Main binary (main.dol), empty if the partition has none
    pub raw_dol: Arc<[u8]>,
    /// File system table (fst.bin)
    pub raw_fst: Arc<[u8]>,
    /// Ticket (ticket.bin, Wii only)
    pub raw_ticket: Option<Arc<[u8]>>,
    /// TMD (tmd.bin, Wii only)
    pub raw_tmd: Option<Arc<[u8]>>,
    /// Certificate chain (cert.bin, Wii only)
    pub raw_cert_chain: Option<Arc<[u8]>>,
    /// H3 hash table (h3.bin, Wii only)
    pub raw_h3_table: Option<Arc<[u8; H3_TABLE_SIZE]>>,
}

impl PartitionMeta {
    /// A view into the disc header.
    #[inline]
    pub fn header(&self) -> &DiscHeader {
        DiscHeader::ref_from_bytes(&self.raw_boot[..size_of::<DiscHeader>()])
            .expect("Invalid header alignment")
    }

    /// A view into the partition header.
    #[inline]
    pub fn partition_header(&self) -> &PartitionHeader {
        PartitionHeader::ref_from_bytes(&self.raw_boot[size_of::<DiscHeader>()..])
            .expect("Invalid partition header alignment")
    }

    /// A view into the apploader header.
    #[inline]
    pub fn apploader_header(&self) -> &ApploaderHeader {
        ApploaderHeader::ref_from_prefix(&self.raw_apploader)
            .expect("Invalid apploader alignment")
            .0
    }

    /// A view into the file system table (FST).
    #[inline]
    pub fn fst(&self) -> Result<Fst> { Fst::new(&self.raw_fst) }

    /// A view into the DOL header, if the partition has a main DOL.
    #[inline]
    pub fn dol_header(&self) -> Option<&DolHeader> {
        DolHeader::ref_from_prefix(&self.raw_dol).ok().map(|(header, _)| header)
    }

    /// A view into the ticket. (Wii only)
    #[inline]
    pub fn ticket(&self) -> Option<&Ticket> {
        let raw_ticket = self.raw_ticket.as_deref()?;
        Some(Ticket::ref_from_bytes(raw_ticket).expect("Invalid ticket alignment"))
    }

    /// A view into the TMD. (Wii only)
    #[inline]
    pub fn tmd_header(&self) -> Option<&TmdHeader> {
        let raw_tmd = self.raw_tmd.as_deref()?;
        Some(TmdHeader::ref_from_prefix(raw_tmd).expect("Invalid TMD alignment").0)
    }

    /// A view into the TMD content metadata. (Wii only)
    #[inline]
    pub fn content_metadata(&self) -> Option<&[ContentMetadata]> {
        let raw_cmd = &self.raw_tmd.as_deref()?[size_of::<TmdHeader>()..];
        Some(<[ContentMetadata]>::ref_from_bytes(raw_cmd).expect("Invalid CMD alignment"))
    }
}
