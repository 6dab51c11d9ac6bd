use std::{
    io,
    io::{BufRead, Read, Seek, SeekFrom},
    mem::size_of,
    sync::Arc,
};

use zerocopy::{FromBytes, FromZeros};

use crate::{
    disc::{
        ApploaderHeader, DiscHeader, DolHeader, PartitionHeader, BI2_SIZE, BOOT_SIZE, SECTOR_SIZE,
    },
    read::{DiscStream, PartitionMeta, PartitionReader},
    util::{
        impl_read_for_bufread,
        read::{read_arc, read_arc_slice, read_vec, read_with_zero_fill},
    },
    Error, Result, ResultContext,
};

/// Sanity limit for the apploader image. (2 MiB)
const MAX_APPLOADER_SIZE: usize = 0x200000;

/// Sanity limit for the file system table. (8 MiB)
const MAX_FST_SIZE: u64 = 0x800000;

/// Sanity limit for the main DOL. (64 MiB)
const MAX_DOL_SIZE: u32 = 0x4000000;

/// Unencrypted partition reader. For GameCube discs, the partition spans the
/// entire disc image.
pub(crate) struct PartitionReaderGC {
    stream: Box<dyn DiscStream>,
    pos: u64,
    disc_size: u64,
    sector: u32,
    buffer: Box<[u8; SECTOR_SIZE]>,
    meta: Option<PartitionMeta>,
}

impl Clone for PartitionReaderGC {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            pos: 0,
            disc_size: self.disc_size,
            sector: u32::MAX,
            buffer: <[u8; SECTOR_SIZE]>::new_box_zeroed().unwrap(),
            meta: self.meta.clone(),
        }
    }
}

impl PartitionReaderGC {
    pub fn new(stream: Box<dyn DiscStream>, disc_size: u64) -> Result<Box<Self>> {
        Ok(Box::new(Self {
            stream,
            pos: 0,
            disc_size,
            sector: u32::MAX,
            buffer: <[u8; SECTOR_SIZE]>::new_box_zeroed()?,
            meta: None,
        }))
    }
}

impl BufRead for PartitionReaderGC {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.disc_size {
            return Ok(&[]);
        }
        let sector = (self.pos / SECTOR_SIZE as u64) as u32;
        let sector_start = sector as u64 * SECTOR_SIZE as u64;
        if sector != self.sector {
            self.stream.seek(SeekFrom::Start(sector_start))?;
            read_with_zero_fill(self.stream.as_mut(), self.buffer.as_mut())?;
            self.sector = sector;
        }
        let offset = (self.pos - sector_start) as usize;
        let end = (self.disc_size - sector_start).min(SECTOR_SIZE as u64) as usize;
        Ok(&self.buffer[offset..end])
    }

    #[inline]
    fn consume(&mut self, amt: usize) { self.pos += amt as u64; }
}

impl_read_for_bufread!(PartitionReaderGC);

impl Seek for PartitionReaderGC {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = match pos {
            SeekFrom::Start(v) => v,
            SeekFrom::End(v) => self.disc_size.saturating_add_signed(v),
            SeekFrom::Current(v) => self.pos.saturating_add_signed(v),
        };
        Ok(self.pos)
    }

    #[inline]
    fn stream_position(&mut self) -> io::Result<u64> { Ok(self.pos) }
}

impl PartitionReader for PartitionReaderGC {
    fn is_wii(&self) -> bool { false }

    fn is_encrypted(&self) -> bool { false }

    fn meta(&mut self) -> Result<PartitionMeta> {
        if let Some(meta) = &self.meta {
            Ok(meta.clone())
        } else {
            let meta = read_part_meta(self, false)?;
            self.meta = Some(meta.clone());
            Ok(meta)
        }
    }
}

pub(crate) fn read_dol(
    reader: &mut dyn PartitionReader,
    partition_header: &PartitionHeader,
    is_wii: bool,
) -> Result<Arc<[u8]>> {
    let dol_offset = partition_header.dol_offset(is_wii);
    if dol_offset == 0 {
        // No main DOL (e.g. a bare data disc)
        return Ok(Arc::from(&[] as &[u8]));
    }
    reader.seek(SeekFrom::Start(dol_offset)).context("Seeking to DOL offset")?;
    let mut raw_dol: Vec<u8> =
        read_vec(reader, size_of::<DolHeader>()).context("Reading DOL header")?;
    let dol_header = DolHeader::ref_from_bytes(raw_dol.as_slice()).unwrap();
    let dol_size = dol_header.dol_size();
    if dol_size > MAX_DOL_SIZE {
        return Err(Error::CorruptFormat(format!("DOL size {dol_size} out of range")));
    }
    raw_dol.resize(dol_size as usize, 0);
    reader.read_exact(&mut raw_dol[size_of::<DolHeader>()..]).context("Reading DOL")?;
    Ok(Arc::from(raw_dol.as_slice()))
}

pub(crate) fn read_fst<R>(
    reader: &mut R,
    partition_header: &PartitionHeader,
    is_wii: bool,
) -> Result<Arc<[u8]>>
where
    R: Read + Seek + ?Sized,
{
    let fst_offset = partition_header.fst_offset(is_wii);
    let fst_size = partition_header.fst_size(is_wii);
    if fst_size == 0 {
        return Err(Error::CorruptFormat("Partition has no file system table".to_string()));
    }
    if fst_size > MAX_FST_SIZE {
        return Err(Error::CorruptFormat(format!("FST size {fst_size} out of range")));
    }
    reader.seek(SeekFrom::Start(fst_offset)).context("Seeking to FST offset")?;
    let raw_fst: Arc<[u8]> = read_arc_slice(reader, fst_size as usize)
        .with_context(|| format!("Reading partition FST (offset {fst_offset}, size {fst_size})"))?;
    Ok(raw_fst)
}

pub(crate) fn read_part_meta(
    reader: &mut dyn PartitionReader,
    is_wii: bool,
) -> Result<PartitionMeta> {
    reader.seek(SeekFrom::Start(0)).context("Seeking to partition start")?;

    // boot.bin
    let raw_boot: Arc<[u8; BOOT_SIZE]> = read_arc(reader).context("Reading boot.bin")?;
    let partition_header =
        PartitionHeader::ref_from_bytes(&raw_boot[size_of::<DiscHeader>()..]).unwrap();

    // bi2.bin
    let raw_bi2: Arc<[u8; BI2_SIZE]> = read_arc(reader).context("Reading bi2.bin")?;

    // apploader.bin
    let mut raw_apploader: Vec<u8> =
        read_vec(reader, size_of::<ApploaderHeader>()).context("Reading apploader header")?;
    let apploader_header = ApploaderHeader::ref_from_bytes(raw_apploader.as_slice()).unwrap();
    let apploader_size = size_of::<ApploaderHeader>()
        + apploader_header.size.get() as usize
        + apploader_header.trailer_size.get() as usize;
    if apploader_size > MAX_APPLOADER_SIZE {
        return Err(Error::CorruptFormat(format!("Apploader size {apploader_size} out of range")));
    }
    raw_apploader.resize(apploader_size, 0);
    reader
        .read_exact(&mut raw_apploader[size_of::<ApploaderHeader>()..])
        .context("Reading apploader")?;
    let raw_apploader = Arc::from(raw_apploader.as_slice());

    // fst.bin
    let raw_fst = read_fst(reader, partition_header, is_wii)?;

    // main.dol
    let raw_dol = read_dol(reader, partition_header, is_wii)?;

    Ok(PartitionMeta {
        raw_boot,
        raw_bi2,
        raw_apploader,
        raw_fst,
        raw_dol,
        raw_ticket: None,
        raw_tmd: None,
        raw_cert_chain: None,
        raw_h3_table: None,
    })
}
