//! GameCube disc image builder.
//!
//! Authoring happens in two phases: [`DiscBuilder::plan`] computes the entire
//! disc layout (section offsets, FST shape, total size) and validates it
//! against the MiniDVD capacity, then [`DiscWriter::write_to`] emits the
//! image bytes. No output byte is written before the layout is known good.

use std::{
    fs,
    fs::File,
    io,
    io::{BufReader, Write},
    mem::size_of,
    path::Path,
    sync::Arc,
};

use tracing::{debug, warn};
use zerocopy::{FromBytes, FromZeros, IntoBytes};

use crate::{
    disc::{
        fst::FstBuilder, ApploaderHeader, DiscHeader, DolHeader, PartitionHeader, BI2_SIZE,
        BOOT_SIZE, GCN_MAGIC, MINI_DVD_SIZE, SECTOR_SIZE,
    },
    util::{array_ref_mut, buf_copy, Align},
    Error, ErrorContext, Result, ResultContext,
};

const BI2_OFFSET: u64 = BOOT_SIZE as u64;
const APPLOADER_OFFSET: u64 = BI2_OFFSET + BI2_SIZE as u64;

/// Alignment of the main DOL and the FST.
const SYS_ALIGN: u64 = 128;

/// Default alignment of user file data.
const FILE_ALIGN: u32 = 32;

/// Progress and cancellation sink consumed while emitting an image.
///
/// Invoked synchronously after each written section and never retained beyond
/// the build call.
pub trait BuildCallback {
    /// Reports total bytes written so far, the section or file name just
    /// written, and its byte size. Return `false` to cancel the build.
    fn on_progress(&mut self, bytes_written: u64, name: &str, len: u64) -> bool;
}

impl<F> BuildCallback for F
where F: FnMut(u64, &str, u64) -> bool
{
    fn on_progress(&mut self, bytes_written: u64, name: &str, len: u64) -> bool {
        self(bytes_written, name, len)
    }
}

/// Disc metadata for an authored image.
#[derive(Debug, Clone, Default)]
pub struct DiscOverrides {
    /// 6-byte game ID. (e.g. `GM8E01`)
    pub game_id: Option<[u8; 6]>,
    /// Game title, up to 63 bytes.
    pub game_title: Option<String>,
    /// Disc number for multi-disc games.
    pub disc_num: Option<u8>,
    /// Disc version.
    pub disc_version: Option<u8>,
    /// Whether audio streaming is enabled.
    pub audio_streaming: Option<bool>,
    /// Audio streaming buffer size.
    pub audio_stream_buf_size: Option<u8>,
    /// Region code, written to bi2.bin.
    pub region: Option<u8>,
}

/// A user file to be laid out on the disc.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// `/`-separated path of the file within the disc file system.
    pub name: String,
    /// Byte size of the file.
    pub size: u64,
    /// Data alignment, a power of two. Defaults to 32.
    pub alignment: Option<u32>,
}

#[derive(Debug, Clone)]
enum Entry {
    Dir(String),
    File(FileInfo),
}

impl Entry {
    fn name(&self) -> &str {
        match self {
            Entry::Dir(name) => name,
            Entry::File(info) => &info.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum WriteKind {
    File(String),
    Static(Arc<[u8]>, &'static str),
}

impl WriteKind {
    fn name(&self) -> &str {
        match self {
            WriteKind::File(name) => name,
            WriteKind::Static(_, name) => name,
        }
    }
}

#[derive(Debug, Clone)]
struct WriteInfo {
    kind: WriteKind,
    size: u64,
    offset: u64,
}

/// Builder for GameCube disc images.
#[derive(Clone)]
pub struct DiscBuilder {
    overrides: DiscOverrides,
    apploader: Option<Arc<[u8]>>,
    dol: Option<Arc<[u8]>>,
    entries: Vec<Entry>,
}

impl DiscBuilder {
    /// Create a new builder with the given disc metadata.
    pub fn new(overrides: DiscOverrides) -> Self {
        Self { overrides, apploader: None, dol: None, entries: Vec::new() }
    }

    /// Sets the apploader image. Without one, a zeroed placeholder header is
    /// written in its place.
    pub fn set_apploader(&mut self, data: Vec<u8>) -> Result<()> {
        let Ok((header, _)) = ApploaderHeader::ref_from_prefix(data.as_slice()) else {
            return Err(Error::CorruptFormat("Apploader image too small".to_string()));
        };
        let expected = size_of::<ApploaderHeader>()
            + header.size.get() as usize
            + header.trailer_size.get() as usize;
        if expected != data.len() {
            return Err(Error::CorruptFormat(format!(
                "Apploader is {} bytes, its header describes {expected}",
                data.len()
            )));
        }
        self.apploader = Some(Arc::from(data.as_slice()));
        Ok(())
    }

    /// Sets the main DOL. The DOL's section headers must describe exactly
    /// `data.len()` bytes, since readers re-derive its size from them.
    pub fn set_dol(&mut self, data: Vec<u8>) -> Result<()> {
        let Ok((header, _)) = DolHeader::ref_from_prefix(data.as_slice()) else {
            return Err(Error::CorruptFormat("DOL image too small".to_string()));
        };
        let expected = header.dol_size() as usize;
        if expected != data.len() {
            return Err(Error::CorruptFormat(format!(
                "DOL is {} bytes, its section headers describe {expected}",
                data.len()
            )));
        }
        self.dol = Some(Arc::from(data.as_slice()));
        Ok(())
    }

    /// Adds a user file to the disc file system.
    pub fn add_file(&mut self, info: FileInfo) -> Result<()> {
        validate_name(&info.name)?;
        if let Some(alignment) = info.alignment {
            if !alignment.is_power_of_two() {
                return Err(invalid_input(format!(
                    "File {} alignment {} is not a power of two",
                    info.name, alignment
                )));
            }
        }
        self.entries.push(Entry::File(info));
        Ok(())
    }

    /// Adds a directory to the disc file system. Only needed for empty
    /// directories; parents of added files are created implicitly.
    pub fn add_dir(&mut self, name: String) -> Result<()> {
        validate_name(&name)?;
        self.entries.push(Entry::Dir(name));
        Ok(())
    }

    /// Computes the disc layout and validates it against the MiniDVD
    /// capacity, without writing anything.
    pub fn plan(&self) -> Result<DiscWriter> {
        // Deterministic traversal order: byte-wise lexicographic per path
        // component, directories and files interleaved.
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| a.name().split('/').cmp(b.name().split('/')));
        for pair in entries.windows(2) {
            if pair[0].name() == pair[1].name() {
                return Err(invalid_input(format!("Duplicate entry {}", pair[0].name())));
            }
        }

        let mut disc_header = DiscHeader::new_box_zeroed()?;
        disc_header.gcn_magic = GCN_MAGIC;
        self.apply_overrides(&mut disc_header)?;
        let mut partition_header = PartitionHeader::new_box_zeroed()?;
        let mut raw_bi2 = <[u8]>::new_box_zeroed_with_elems(BI2_SIZE)?;
        if let Some(region) = self.overrides.region {
            *array_ref_mut![raw_bi2, 0x18, 4] = (region as u32).to_be_bytes();
        }
        let apploader = self.apploader.clone().unwrap_or_else(placeholder_apploader);

        // System region: boot, bi2, apploader, then DOL and FST
        let apploader_end = APPLOADER_OFFSET + apploader.len() as u64;
        let dol = self.dol.clone().unwrap_or_else(|| Arc::from(&[] as &[u8]));
        let dol_offset = if dol.is_empty() { 0 } else { apploader_end.align_up(SYS_ALIGN) };
        partition_header.set_dol_offset(dol_offset, false);
        let dol_end = if dol.is_empty() { apploader_end } else { dol_offset + dol.len() as u64 };
        let fst_offset = dol_end.align_up(SYS_ALIGN);
        partition_header.set_fst_offset(fst_offset, false);

        // The FST's size does not depend on file offsets, so it can be sized
        // before the user region is placed.
        let fst_size = {
            let mut builder = FstBuilder::new(false);
            for entry in &entries {
                match entry {
                    Entry::Dir(name) => builder.add_dir(name),
                    Entry::File(info) => builder.add_file(&info.name, 0, 0),
                }
            }
            builder.byte_size() as u64
        };
        partition_header.set_fst_size(fst_size, false);
        partition_header.set_fst_max_size(fst_size, false);

        // User region
        let user_offset = (fst_offset + fst_size).align_up(SECTOR_SIZE as u64);
        let mut offsets = Vec::new();
        let mut last = user_offset;
        for entry in &entries {
            if let Entry::File(info) = entry {
                let offset = last.align_up(info.alignment.unwrap_or(FILE_ALIGN) as u64);
                offsets.push(offset);
                last = offset + info.size;
            }
        }
        let disc_size = last.align_up(SECTOR_SIZE as u64);
        if disc_size > MINI_DVD_SIZE {
            return Err(Error::CapacityExceeded { required: disc_size, limit: MINI_DVD_SIZE });
        }
        partition_header.user_offset.set(user_offset as u32);
        partition_header.user_size.set((disc_size - user_offset) as u32);

        // Generate the FST with final offsets
        let mut fst_builder = FstBuilder::new(false);
        let mut offset_iter = offsets.iter();
        let mut write_info = Vec::with_capacity(entries.len() + 5);
        for entry in &entries {
            match entry {
                Entry::Dir(name) => fst_builder.add_dir(name),
                Entry::File(info) => {
                    let offset = *offset_iter.next().unwrap();
                    fst_builder.add_file(&info.name, offset, info.size as u32);
                    write_info.push(WriteInfo {
                        kind: WriteKind::File(info.name.clone()),
                        size: info.size,
                        offset,
                    });
                }
            }
        }
        let fst_data = fst_builder.finalize();
        if fst_data.len() as u64 != fst_size {
            return Err(Error::CorruptFormat(format!(
                "FST size mismatch: {} != {fst_size}",
                fst_data.len()
            )));
        }

        // System region write entries
        let mut boot = <[u8]>::new_box_zeroed_with_elems(BOOT_SIZE)?;
        boot[..size_of::<DiscHeader>()].copy_from_slice(disc_header.as_bytes());
        boot[size_of::<DiscHeader>()..].copy_from_slice(partition_header.as_bytes());
        write_info.push(WriteInfo {
            kind: WriteKind::Static(Arc::from(boot), "[BOOT]"),
            size: BOOT_SIZE as u64,
            offset: 0,
        });
        write_info.push(WriteInfo {
            kind: WriteKind::Static(Arc::from(raw_bi2), "[BI2]"),
            size: BI2_SIZE as u64,
            offset: BI2_OFFSET,
        });
        write_info.push(WriteInfo {
            kind: WriteKind::Static(apploader.clone(), "[APPLOADER]"),
            size: apploader.len() as u64,
            offset: APPLOADER_OFFSET,
        });
        if !dol.is_empty() {
            let dol_size = dol.len() as u64;
            write_info.push(WriteInfo {
                kind: WriteKind::Static(dol, "[DOL]"),
                size: dol_size,
                offset: dol_offset,
            });
        }
        write_info.push(WriteInfo {
            kind: WriteKind::Static(Arc::from(fst_data), "[FST]"),
            size: fst_size,
            offset: fst_offset,
        });
        sort_files(&mut write_info)?;

        debug!(
            "Planned disc layout: {} entries, FST at {fst_offset:#X} ({fst_size} bytes), \
             user data at {user_offset:#X}, total size {disc_size}",
            entries.len()
        );
        Ok(DiscWriter { write_info, disc_size })
    }

    /// Discovers `dir` recursively and computes the total image size its
    /// layout requires. Returns `None` if the layout would exceed the MiniDVD
    /// capacity.
    pub fn calculate_size_required(&self, dir: &Path) -> Result<Option<u64>> {
        match self.with_directory(dir)?.plan() {
            Ok(writer) => Ok(Some(writer.disc_size())),
            Err(Error::CapacityExceeded { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Builds a disc image from a directory tree.
    ///
    /// The layout is planned and capacity-checked before the output file is
    /// created, so an oversized input produces no output file. A partially
    /// written image on I/O failure is the caller's to clean up.
    pub fn build_from_directory(
        &self,
        dir: &Path,
        out_path: &Path,
        callback: &mut dyn BuildCallback,
    ) -> Result<()> {
        let writer = self.with_directory(dir)?.plan()?;
        let file = File::create(out_path)
            .with_context(|| format!("Creating output file {}", out_path.display()))?;
        let mut out = io::BufWriter::new(file);
        writer.write_to(
            &mut out,
            |w, name| {
                let file = File::open(dir.join(name))?;
                buf_copy(&mut BufReader::new(file), w)?;
                Ok(())
            },
            callback,
        )
    }

    /// Returns a copy of this builder with the contents of `dir` added,
    /// sorted for deterministic output.
    fn with_directory(&self, dir: &Path) -> Result<DiscBuilder> {
        let mut builder = self.clone();
        builder.discover(dir, "")?;
        Ok(builder)
    }

    fn discover(&mut self, dir: &Path, prefix: &str) -> Result<()> {
        let mut dir_entries = fs::read_dir(dir)
            .with_context(|| format!("Reading directory {}", dir.display()))?
            .collect::<io::Result<Vec<_>>>()
            .with_context(|| format!("Reading directory {}", dir.display()))?;
        dir_entries.sort_by_key(|e| e.file_name());
        for entry in dir_entries {
            let Ok(name) = entry.file_name().into_string() else {
                return Err(invalid_input(format!(
                    "Non-Unicode file name in {}",
                    dir.display()
                )));
            };
            let path = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
            let file_type = entry
                .file_type()
                .with_context(|| format!("Reading metadata for {}", entry.path().display()))?;
            if file_type.is_dir() {
                self.add_dir(path.clone())?;
                self.discover(&entry.path(), &path)?;
            } else if file_type.is_file() {
                let size = entry
                    .metadata()
                    .with_context(|| format!("Reading metadata for {}", entry.path().display()))?
                    .len();
                self.add_file(FileInfo { name: path, size, alignment: None })?;
            } else {
                warn!("Skipping special file {}", entry.path().display());
            }
        }
        Ok(())
    }

    fn apply_overrides(&self, disc_header: &mut DiscHeader) -> Result<()> {
        let overrides = &self.overrides;
        if let Some(game_id) = overrides.game_id {
            disc_header.game_id.copy_from_slice(&game_id);
        }
        if let Some(game_title) = overrides.game_title.as_ref() {
            let max_size = disc_header.game_title.len() - 1; // nul terminator
            if game_title.len() > max_size {
                return Err(invalid_input(format!(
                    "Game title \"{game_title}\" is too long ({} > {max_size})",
                    game_title.len()
                )));
            }
            disc_header.game_title[..game_title.len()]
                .copy_from_slice(game_title.as_bytes());
        }
        if let Some(disc_num) = overrides.disc_num {
            disc_header.disc_num = disc_num;
        }
        if let Some(disc_version) = overrides.disc_version {
            disc_header.disc_version = disc_version;
        }
        if let Some(audio_streaming) = overrides.audio_streaming {
            disc_header.audio_streaming = audio_streaming as u8;
        }
        if let Some(audio_stream_buf_size) = overrides.audio_stream_buf_size {
            disc_header.audio_stream_buf_size = audio_stream_buf_size;
        }
        Ok(())
    }
}

/// An immutable, capacity-checked disc layout, ready to be emitted.
pub struct DiscWriter {
    write_info: Vec<WriteInfo>,
    disc_size: u64,
}

impl DiscWriter {
    /// Total byte size of the emitted image.
    #[inline]
    pub fn disc_size(&self) -> u64 { self.disc_size }

    /// Emits the disc image, pulling user file contents through
    /// `file_callback` and padding every gap with zero bytes.
    pub fn write_to<W>(
        &self,
        out: &mut W,
        mut file_callback: impl FnMut(&mut dyn Write, &str) -> io::Result<()>,
        callback: &mut dyn BuildCallback,
    ) -> Result<()>
    where
        W: Write + ?Sized,
    {
        let mut out = WriteCursor { inner: out, position: 0 };
        for info in &self.write_info {
            out.write_zeroes_until(info.offset).context("Writing padding")?;
            match &info.kind {
                WriteKind::File(name) => file_callback(&mut out, name)
                    .with_context(|| format!("Writing file {name}"))?,
                WriteKind::Static(data, name) => out.write_all(data).with_context(|| {
                    format!("Writing static data {name} ({} bytes)", data.len())
                })?,
            }
            if out.position != info.offset + info.size {
                return Err(Error::Io(
                    format!(
                        "File {}: wrote {} bytes, expected {}",
                        info.kind.name(),
                        out.position - info.offset,
                        info.size
                    ),
                    io::Error::from(io::ErrorKind::InvalidData),
                ));
            }
            if !callback.on_progress(out.position, info.kind.name(), info.size) {
                return Err(io::Error::from(io::ErrorKind::Interrupted)
                    .context("Build cancelled"));
            }
        }
        out.write_zeroes_until(self.disc_size).context("Writing end of file")?;
        out.flush().context("Flushing output")?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.split('/').any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(invalid_input(format!("Invalid entry name {name:?}")));
    }
    Ok(())
}

fn invalid_input(msg: String) -> Error {
    Error::Io(msg, io::Error::from(io::ErrorKind::InvalidInput))
}

fn placeholder_apploader() -> Arc<[u8]> {
    Arc::from(vec![0u8; size_of::<ApploaderHeader>()].as_slice())
}

fn sort_files(files: &mut [WriteInfo]) -> Result<()> {
    files.sort_by_key(|info| (info.offset, info.size));
    for pair in files.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.offset < prev.offset + prev.size {
            return Err(Error::CorruptFormat(format!(
                "File {} ({:#X}-{:#X}) overlaps with {} ({:#X}-{:#X})",
                cur.kind.name(),
                cur.offset,
                cur.offset + cur.size,
                prev.kind.name(),
                prev.offset,
                prev.offset + prev.size
            )));
        }
    }
    Ok(())
}

struct WriteCursor<W> {
    inner: W,
    position: u64,
}

impl<W> WriteCursor<W>
where W: Write
{
    fn write_zeroes_until(&mut self, until: u64) -> io::Result<()> {
        static ZEROES: [u8; 0x1000] = [0u8; 0x1000];
        let mut remaining = until.saturating_sub(self.position);
        while remaining > 0 {
            let write_len = remaining.min(ZEROES.len() as u64) as usize;
            let written = self.write(&ZEROES[..write_len])?;
            remaining -= written as u64;
        }
        Ok(())
    }
}

impl<W> Write for WriteCursor<W>
where W: Write
{
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = self.inner.write(buf)?;
        self.position += len as u64;
        Ok(len)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> { self.inner.flush() }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn progress_sink() -> impl FnMut(u64, &str, u64) -> bool { |_, _, _| true }

    fn sample_builder() -> DiscBuilder {
        let mut overrides = DiscOverrides::default();
        overrides.game_id = Some(*b"GTST01");
        overrides.game_title = Some("Test Disc".to_string());
        let mut builder = DiscBuilder::new(overrides);
        builder.add_file(FileInfo { name: "a.txt".into(), size: 5, alignment: None }).unwrap();
        builder.add_file(FileInfo { name: "b.txt".into(), size: 5, alignment: None }).unwrap();
        builder.add_dir("d".into()).unwrap();
        builder
            .add_file(FileInfo { name: "d/nested.txt".into(), size: 6, alignment: None })
            .unwrap();
        builder
    }

    fn emit(writer: &DiscWriter, contents: &HashMap<&str, &[u8]>) -> Vec<u8> {
        let mut out = Vec::new();
        writer
            .write_to(
                &mut out,
                |w, name| {
                    w.write_all(contents[name])?;
                    Ok(())
                },
                &mut progress_sink(),
            )
            .unwrap();
        out
    }

    fn sample_contents() -> HashMap<&'static str, &'static [u8]> {
        HashMap::from([
            ("a.txt", b"hello".as_slice()),
            ("b.txt", b"12345".as_slice()),
            ("d/nested.txt", b"abcdef".as_slice()),
        ])
    }

    #[test]
    fn test_layout() {
        let writer = sample_builder().plan().unwrap();
        // One sector of system data, one sector of user data
        assert_eq!(writer.disc_size(), 2 * SECTOR_SIZE as u64);

        let image = emit(&writer, &sample_contents());
        assert_eq!(image.len() as u64, writer.disc_size());
        let header = DiscHeader::ref_from_bytes(&image[..size_of::<DiscHeader>()]).unwrap();
        assert_eq!(&header.game_id, b"GTST01");
        assert_eq!(header.game_title_str(), "Test Disc");
        assert!(header.is_gamecube());
        assert!(!header.is_wii());
        let partition_header = PartitionHeader::ref_from_bytes(
            &image[size_of::<DiscHeader>()..BOOT_SIZE],
        )
        .unwrap();
        // No DOL: the FST directly follows the apploader placeholder
        assert_eq!(partition_header.dol_offset(false), 0);
        let fst_offset =
            (APPLOADER_OFFSET + size_of::<ApploaderHeader>() as u64).align_up(SYS_ALIGN);
        assert_eq!(partition_header.fst_offset(false), fst_offset);
        // root + 4 entries, 26 bytes of names
        assert_eq!(partition_header.fst_size(false), 5 * 12 + 26);
        assert_eq!(partition_header.user_offset.get(), SECTOR_SIZE as u32);
        assert_eq!(partition_header.user_size.get(), SECTOR_SIZE as u32);
        // File data lands at the planned offsets
        assert_eq!(&image[0x8000..0x8005], b"hello");
        assert_eq!(&image[0x8020..0x8025], b"12345");
        assert_eq!(&image[0x8040..0x8046], b"abcdef");
        // Gaps are zero-filled
        assert!(image[0x8005..0x8020].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_determinism() {
        let contents = sample_contents();
        let image1 = emit(&sample_builder().plan().unwrap(), &contents);
        let image2 = emit(&sample_builder().plan().unwrap(), &contents);
        assert_eq!(image1, image2);
    }

    #[test]
    fn test_capacity_boundary() {
        let mut builder = DiscBuilder::new(DiscOverrides::default());
        // User data starts one sector in; fill the remainder exactly
        builder
            .add_file(FileInfo {
                name: "big.bin".into(),
                size: MINI_DVD_SIZE - SECTOR_SIZE as u64,
                alignment: None,
            })
            .unwrap();
        let writer = builder.plan().expect("Layout at the capacity limit should succeed");
        assert_eq!(writer.disc_size(), MINI_DVD_SIZE);

        let mut builder = DiscBuilder::new(DiscOverrides::default());
        builder
            .add_file(FileInfo {
                name: "big.bin".into(),
                size: MINI_DVD_SIZE - SECTOR_SIZE as u64 + 1,
                alignment: None,
            })
            .unwrap();
        match builder.plan() {
            Err(Error::CapacityExceeded { required, limit }) => {
                assert_eq!(limit, MINI_DVD_SIZE);
                assert_eq!(required, MINI_DVD_SIZE + SECTOR_SIZE as u64);
            }
            Err(e) => panic!("Expected CapacityExceeded, got {e:?}"),
            Ok(_) => panic!("Expected CapacityExceeded, got a layout"),
        }
    }

    #[test]
    fn test_cancellation() {
        let writer = sample_builder().plan().unwrap();
        let mut out = Vec::new();
        let result = writer.write_to(
            &mut out,
            |w, name| {
                w.write_all(sample_contents()[name])?;
                Ok(())
            },
            &mut |_: u64, _: &str, _: u64| false,
        );
        assert!(matches!(result, Err(Error::Io(_, _))));
    }

    #[test]
    fn test_invalid_names() {
        let mut builder = DiscBuilder::new(DiscOverrides::default());
        assert!(builder.add_file(FileInfo { name: "".into(), size: 0, alignment: None }).is_err());
        assert!(builder
            .add_file(FileInfo { name: "/abs".into(), size: 0, alignment: None })
            .is_err());
        assert!(builder
            .add_file(FileInfo { name: "a/../b".into(), size: 0, alignment: None })
            .is_err());
        builder.add_file(FileInfo { name: "dup".into(), size: 0, alignment: None }).unwrap();
        builder.add_file(FileInfo { name: "dup".into(), size: 0, alignment: None }).unwrap();
        assert!(builder.plan().is_err());
    }
}
