use std::{
    io,
    io::{Seek, SeekFrom},
    sync::Arc,
};

use tracing::{debug, warn};

use crate::{
    common::{PartitionInfo, PartitionKind},
    disc::{
        fst::{Fst, NodeKind},
        gcn::{read_fst, PartitionReaderGC},
        wii::{
            PartitionReaderWii, WiiPartEntry, WiiPartGroup, REGION_OFFSET, REGION_SIZE,
            WII_PART_GROUP_OFF,
        },
        DiscHeader, PartitionHeader, DL_DVD_SIZE, MINI_DVD_SIZE, SECTOR_SIZE, SL_DVD_SIZE,
    },
    read::{DiscStream, PartitionOptions, PartitionReader},
    util::read::{read_arc, read_from, read_vec},
    Error, ErrorContext, Result, ResultContext,
};

pub(crate) struct DiscReader {
    stream: Box<dyn DiscStream>,
    size: u64,
    header: Arc<DiscHeader>,
    partitions: Arc<[PartitionInfo]>,
    region: Option<[u8; REGION_SIZE]>,
}

impl Clone for DiscReader {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            size: self.size,
            header: self.header.clone(),
            partitions: self.partitions.clone(),
            region: self.region,
        }
    }
}

impl DiscReader {
    pub fn new(mut stream: Box<dyn DiscStream>) -> Result<Self> {
        let stream_len =
            stream.seek(SeekFrom::End(0)).context("Determining disc image size")?;
        stream.seek(SeekFrom::Start(0)).context("Seeking to disc header")?;
        let header: Arc<DiscHeader> = match read_arc(stream.as_mut()) {
            Ok(header) => header,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(Error::UnrecognizedFormat);
            }
            Err(e) => return Err(e.context("Reading disc header")),
        };

        let mut region = None;
        let mut partitions = Arc::<[PartitionInfo]>::default();
        if header.is_wii() {
            if header.has_partition_encryption() && !header.has_partition_hashes() {
                return Err(Error::CorruptFormat(
                    "Wii disc is encrypted but has no partition hashes".to_string(),
                ));
            }

            // Read region info
            stream.seek(SeekFrom::Start(REGION_OFFSET)).context("Seeking to region info")?;
            region = Some(read_from(stream.as_mut()).context("Reading region info")?);

            // Read partition info
            partitions = Arc::from(read_partition_info(stream.as_mut(), &header, stream_len)?);
        } else if !header.is_gamecube() {
            return Err(Error::UnrecognizedFormat);
        }

        let size = if header.is_wii() { guess_disc_size(&partitions) } else { stream_len };
        debug!(
            "Opened {} disc {} ({} bytes)",
            if header.is_wii() { "Wii" } else { "GameCube" },
            header.game_id_str(),
            size
        );
        Ok(Self { stream, size, header, partitions, region })
    }

    #[inline]
    pub fn header(&self) -> &DiscHeader { &self.header }

    #[inline]
    pub fn disc_size(&self) -> u64 { self.size }

    #[inline]
    pub fn region(&self) -> Option<&[u8; REGION_SIZE]> { self.region.as_ref() }

    #[inline]
    pub fn partitions(&self) -> &[PartitionInfo] { &self.partitions }

    /// Opens a decrypted read stream for the specified partition index.
    pub fn open_partition(
        &self,
        index: usize,
        options: &PartitionOptions,
    ) -> Result<Box<dyn PartitionReader>> {
        if self.header.is_gamecube() {
            if index == 0 {
                Ok(PartitionReaderGC::new(self.stream.clone(), self.size)?)
            } else {
                Err(Error::NotFound("GameCube discs only have one partition".to_string()))
            }
        } else if let Some(part) = self.partitions.get(index) {
            Ok(PartitionReaderWii::new(self.stream.clone(), part, options)?)
        } else {
            Err(Error::NotFound(format!("Partition {index}")))
        }
    }

    /// Opens a decrypted read stream for the first partition matching the
    /// specified kind.
    pub fn open_partition_kind(
        &self,
        kind: PartitionKind,
        options: &PartitionOptions,
    ) -> Result<Box<dyn PartitionReader>> {
        if self.header.is_gamecube() {
            if kind == PartitionKind::Data {
                Ok(PartitionReaderGC::new(self.stream.clone(), self.size)?)
            } else {
                Err(Error::NotFound("GameCube discs only have a data partition".to_string()))
            }
        } else if let Some(part) = self.partitions.iter().find(|v| v.kind == kind) {
            Ok(PartitionReaderWii::new(self.stream.clone(), part, options)?)
        } else {
            Err(Error::NotFound(format!("Partition type {kind}")))
        }
    }
}

fn read_partition_info(
    stream: &mut (dyn DiscStream + 'static),
    disc_header: &DiscHeader,
    stream_len: u64,
) -> Result<Vec<PartitionInfo>> {
    stream.seek(SeekFrom::Start(WII_PART_GROUP_OFF)).context("Seeking to partition groups")?;
    let part_groups: [WiiPartGroup; 4] =
        read_from(stream).context("Reading partition groups")?;
    let mut part_info = Vec::new();
    for (group_idx, group) in part_groups.iter().enumerate() {
        let part_count = group.part_count.get();
        if part_count == 0 {
            continue;
        }
        stream
            .seek(SeekFrom::Start(group.part_entry_off()))
            .with_context(|| format!("Seeking to partition group {group_idx}"))?;
        let entries: Vec<WiiPartEntry> = read_vec(stream, part_count as usize)
            .with_context(|| format!("Reading partition group {group_idx}"))?;
        for (part_idx, entry) in entries.iter().enumerate() {
            let offset = entry.offset();
            stream
                .seek(SeekFrom::Start(offset))
                .with_context(|| format!("Seeking to partition data {group_idx}:{part_idx}"))?;
            let header = read_arc(stream)
                .with_context(|| format!("Reading partition header {group_idx}:{part_idx}"))?;
            let mut info = PartitionInfo {
                index: part_info.len(),
                kind: entry.kind.get().into(),
                start_sector: 0,
                data_start_sector: 0,
                data_end_sector: 0,
                key: [0u8; 16],
                header,
                has_encryption: disc_header.has_partition_encryption(),
                has_hashes: disc_header.has_partition_hashes(),
            };
            info.key = info.header.ticket.decrypt_title_key()?;

            if offset % SECTOR_SIZE as u64 != 0 {
                return Err(Error::CorruptFormat(format!(
                    "Partition {group_idx}:{part_idx} offset is not sector aligned",
                )));
            }
            let data_start_offset = offset + info.header.data_off();
            let data_size = info.header.data_size();
            let data_end_offset = data_start_offset + data_size;
            if data_start_offset % SECTOR_SIZE as u64 != 0
                || data_end_offset % SECTOR_SIZE as u64 != 0
            {
                return Err(Error::CorruptFormat(format!(
                    "Partition {group_idx}:{part_idx} data is not sector aligned",
                )));
            }
            info.start_sector = (offset / SECTOR_SIZE as u64) as u32;
            info.data_start_sector = (data_start_offset / SECTOR_SIZE as u64) as u32;
            info.data_end_sector = (data_end_offset / SECTOR_SIZE as u64) as u32;

            if data_size == 0 {
                // Decrypted images may leave the data size zeroed; size the
                // partition from its file system instead.
                info.data_end_sector = stream_len.div_ceil(SECTOR_SIZE as u64) as u32;
                if let Some(end) = guess_data_end(stream, &info)? {
                    info.data_end_sector = end;
                }
            }

            part_info.push(info);
        }
    }
    Ok(part_info)
}

/// Sizes a partition's data region by the furthest file in its FST.
fn guess_data_end(stream: &mut (dyn DiscStream + 'static), info: &PartitionInfo) -> Result<Option<u32>> {
    let mut reader = PartitionReaderWii::new(
        dyn_clone::clone_box(&*stream),
        info,
        &PartitionOptions { validate_hashes: false },
    )?;
    reader
        .seek(SeekFrom::Start(size_of::<DiscHeader>() as u64))
        .context("Seeking to partition header")?;
    let partition_header: PartitionHeader =
        read_from(reader.as_mut()).context("Reading partition header")?;
    let raw_fst = read_fst(reader.as_mut(), &partition_header, true)?;
    let fst = Fst::new(&raw_fst)?;
    let max_fst_offset = fst
        .nodes
        .iter()
        .filter_map(|n| match n.kind() {
            NodeKind::File => Some(n.offset(true) + n.length() as u64),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    if max_fst_offset == 0 {
        warn!("Partition {} has an empty file system", info.index);
        return Ok(None);
    }
    let data_sectors = if info.has_hashes {
        max_fst_offset.div_ceil(crate::disc::wii::SECTOR_DATA_SIZE as u64) as u32
    } else {
        max_fst_offset.div_ceil(SECTOR_SIZE as u64) as u32
    };
    Ok(Some(info.data_start_sector + data_sectors))
}

fn guess_disc_size(part_info: &[PartitionInfo]) -> u64 {
    let max_offset = part_info
        .iter()
        .map(|v| v.data_end_sector as u64 * SECTOR_SIZE as u64)
        .max()
        .unwrap_or(0x50000);
    if max_offset <= MINI_DVD_SIZE && !part_info.iter().any(|v| v.kind == PartitionKind::Data) {
        // Datel disc
        MINI_DVD_SIZE
    } else if max_offset < SL_DVD_SIZE {
        SL_DVD_SIZE
    } else {
        DL_DVD_SIZE
    }
}
