//! Wii disc types.

use std::{
    ffi::CStr,
    fmt, io,
    io::{BufRead, Seek, SeekFrom},
    mem::size_of,
    sync::Arc,
};

use zerocopy::{big_endian::*, FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::{
    common::{HashBytes, KeyBytes, PartitionInfo},
    disc::{gcn::read_part_meta, SECTOR_SIZE},
    read::{DiscStream, PartitionMeta, PartitionOptions, PartitionReader},
    util::{
        aes::decrypt_sector_b2b,
        array_ref, digest::sha1_hash, div_rem, impl_read_for_bufread,
        read::{read_arc, read_arc_slice, read_with_zero_fill},
        static_assert,
    },
    Error, Result, ResultContext,
};

/// Size in bytes of the hash block in a Wii disc sector
pub const HASHES_SIZE: usize = 0x400;

/// Size in bytes of the data block in a Wii disc sector (excluding hashes)
pub const SECTOR_DATA_SIZE: usize = SECTOR_SIZE - HASHES_SIZE; // 0x7C00

/// Size in bytes of the disc region info (region.bin)
pub const REGION_SIZE: usize = 0x20;

/// Size in bytes of the H3 table (h3.bin)
pub const H3_TABLE_SIZE: usize = 0x18000;

/// Offset of the disc region info
pub const REGION_OFFSET: u64 = 0x4E000;

// ppki (Retail)
pub(crate) const RVL_CERT_ISSUER_PPKI_TICKET: &str = "Root-CA00000001-XS00000003";
#[rustfmt::skip]
pub(crate) static RETAIL_COMMON_KEYS: [KeyBytes; 3] = [
    /* RVL_KEY_RETAIL */
    [0xeb, 0xe4, 0x2a, 0x22, 0x5e, 0x85, 0x93, 0xe4, 0x48, 0xd9, 0xc5, 0x45, 0x73, 0x81, 0xaa, 0xf7],
    /* RVL_KEY_KOREAN */
    [0x63, 0xb8, 0x2b, 0xb4, 0xf4, 0x61, 0x4e, 0x2e, 0x13, 0xf2, 0xfe, 0xfb, 0xba, 0x4c, 0x9b, 0x7e],
    /* vWii_KEY_RETAIL */
    [0x30, 0xbf, 0xc7, 0x6e, 0x7c, 0x19, 0xaf, 0xbb, 0x23, 0x16, 0x33, 0x30, 0xce, 0xd7, 0xc2, 0x8d],
];

// dpki (Debug)
pub(crate) const RVL_CERT_ISSUER_DPKI_TICKET: &str = "Root-CA00000002-XS00000006";
#[rustfmt::skip]
pub(crate) static DEBUG_COMMON_KEYS: [KeyBytes; 3] = [
    /* RVL_KEY_DEBUG */
    [0xa1, 0x60, 0x4a, 0x6a, 0x71, 0x23, 0xb5, 0x29, 0xae, 0x8b, 0xec, 0x32, 0xc8, 0x16, 0xfc, 0xaa],
    /* RVL_KEY_KOREAN_DEBUG */
    [0x67, 0x45, 0x8b, 0x6b, 0xc6, 0x23, 0x7b, 0x32, 0x69, 0x98, 0x3c, 0x64, 0x73, 0x48, 0x33, 0x66],
    /* vWii_KEY_DEBUG */
    [0x2f, 0x5c, 0x1b, 0x29, 0x44, 0xe7, 0xfd, 0x6f, 0xc3, 0x97, 0x96, 0x4b, 0x05, 0x76, 0x91, 0xfa],
];

#[derive(Debug, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, align(4))]
pub(crate) struct WiiPartEntry {
    pub(crate) offset: U32,
    pub(crate) kind: U32,
}

static_assert!(size_of::<WiiPartEntry>() == 8);

impl WiiPartEntry {
    pub(crate) fn offset(&self) -> u64 { (self.offset.get() as u64) << 2 }
}

pub(crate) const WII_PART_GROUP_OFF: u64 = 0x40000;

#[derive(Debug, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, align(4))]
pub(crate) struct WiiPartGroup {
    pub(crate) part_count: U32,
    pub(crate) part_entry_off: U32,
}

static_assert!(size_of::<WiiPartGroup>() == 8);

impl WiiPartGroup {
    pub(crate) fn part_entry_off(&self) -> u64 { (self.part_entry_off.get() as u64) << 2 }
}

/// Signed blob header
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, align(4))]
pub struct SignedHeader {
    /// Signature type, always 0x00010001 (RSA-2048)
    pub sig_type: U32,
    /// RSA-2048 signature
    pub sig: [u8; 256],
    _pad: [u8; 60],
}

static_assert!(size_of::<SignedHeader>() == 0x140);

/// Ticket limit
#[derive(Debug, Clone, PartialEq, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, align(4))]
pub struct TicketLimit {
    /// Limit type
    pub limit_type: U32,
    /// Maximum value for the limit
    pub max_value: U32,
}

static_assert!(size_of::<TicketLimit>() == 8);

/// Wii ticket
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, align(4))]
pub struct Ticket {
    /// Signed blob header
    pub header: SignedHeader,
    /// Signature issuer
    pub sig_issuer: [u8; 64],
    /// ECDH data
    pub ecdh: [u8; 60],
    /// Ticket format version
    pub version: u8,
    _pad1: U16,
    /// Title key (encrypted)
    pub title_key: KeyBytes,
    _pad2: u8,
    /// Ticket ID
    pub ticket_id: [u8; 8],
    /// Console ID
    pub console_id: [u8; 4],
    /// Title ID
    pub title_id: [u8; 8],
    _pad3: U16,
    /// Ticket title version
    pub ticket_title_version: U16,
    /// Permitted titles mask
    pub permitted_titles_mask: U32,
    /// Permit mask
    pub permit_mask: U32,
    /// Title export allowed
    pub title_export_allowed: u8,
    /// Common key index
    pub common_key_idx: u8,
    _pad4: [u8; 48],
    /// Content access permissions
    pub content_access_permissions: [u8; 64],
    _pad5: [u8; 2],
    /// Ticket limits
    pub limits: [TicketLimit; 8],
}

static_assert!(size_of::<Ticket>() == 0x2A4);

impl Ticket {
    /// Decrypts the ticket title key using the appropriate common key
    pub fn decrypt_title_key(&self) -> Result<KeyBytes> {
        let mut iv: KeyBytes = [0; 16];
        iv[..8].copy_from_slice(&self.title_id);
        let cert_issuer_ticket =
            CStr::from_bytes_until_nul(&self.sig_issuer).ok().and_then(|c| c.to_str().ok());
        let common_keys = match cert_issuer_ticket {
            Some(RVL_CERT_ISSUER_PPKI_TICKET) => &RETAIL_COMMON_KEYS,
            Some(RVL_CERT_ISSUER_DPKI_TICKET) => &DEBUG_COMMON_KEYS,
            Some(v) => {
                return Err(Error::CorruptFormat(format!("unknown certificate issuer {v:?}")));
            }
            None => {
                return Err(Error::CorruptFormat("failed to parse certificate issuer".to_string()));
            }
        };
        let common_key =
            common_keys.get(self.common_key_idx as usize).ok_or(Error::CorruptFormat(format!(
                "unknown common key index {}",
                self.common_key_idx
            )))?;
        let mut title_key = self.title_key;
        crate::util::aes::aes_cbc_decrypt(common_key, &iv, &mut title_key);
        Ok(title_key)
    }
}

/// Title metadata header
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, align(4))]
pub struct TmdHeader {
    /// Signed blob header
    pub header: SignedHeader,
    /// Signature issuer
    pub sig_issuer: [u8; 64],
    /// Version
    pub version: u8,
    /// CA CRL version
    pub ca_crl_version: u8,
    /// Signer CRL version
    pub signer_crl_version: u8,
    /// Is vWii title
    pub is_vwii: u8,
    /// IOS ID
    pub ios_id: [u8; 8],
    /// Title ID
    pub title_id: [u8; 8],
    /// Title type
    pub title_type: u32,
    /// Group ID
    pub group_id: U16,
    _pad1: [u8; 2],
    /// Region
    pub region: U16,
    /// Ratings
    pub ratings: KeyBytes,
    _pad2: [u8; 12],
    /// IPC mask
    pub ipc_mask: [u8; 12],
    _pad3: [u8; 18],
    /// Access flags
    pub access_flags: U32,
    /// Title version
    pub title_version: U16,
    /// Number of contents
    pub num_contents: U16,
    /// Boot index
    pub boot_idx: U16,
    /// Minor version (unused)
    pub minor_version: U16,
}

static_assert!(size_of::<TmdHeader>() == 0x1E4);

/// TMD content metadata
#[derive(Clone, Debug, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, align(4))]
pub struct ContentMetadata {
    /// Content ID
    pub content_id: U32,
    /// Content index
    pub content_index: U16,
    /// Content type
    pub content_type: U16,
    /// Content size
    pub size: U64,
    /// Content hash
    pub hash: HashBytes,
}

static_assert!(size_of::<ContentMetadata>() == 0x24);

/// Wii partition header.
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, align(4))]
pub struct WiiPartitionHeader {
    /// Ticket
    pub ticket: Ticket,
    tmd_size: U32,
    tmd_off: U32,
    cert_chain_size: U32,
    cert_chain_off: U32,
    h3_table_off: U32,
    data_off: U32,
    data_size: U32,
}

static_assert!(size_of::<WiiPartitionHeader>() == 0x2C0);

impl WiiPartitionHeader {
    /// TMD size in bytes
    pub fn tmd_size(&self) -> u64 { self.tmd_size.get() as u64 }

    /// TMD offset in bytes (relative to the partition start)
    pub fn tmd_off(&self) -> u64 { (self.tmd_off.get() as u64) << 2 }

    /// Certificate chain size in bytes
    pub fn cert_chain_size(&self) -> u64 { self.cert_chain_size.get() as u64 }

    /// Certificate chain offset in bytes (relative to the partition start)
    pub fn cert_chain_off(&self) -> u64 { (self.cert_chain_off.get() as u64) << 2 }

    /// H3 table offset in bytes (relative to the partition start)
    pub fn h3_table_off(&self) -> u64 { (self.h3_table_off.get() as u64) << 2 }

    /// H3 table size in bytes (always [`H3_TABLE_SIZE`])
    pub fn h3_table_size(&self) -> u64 { H3_TABLE_SIZE as u64 }

    /// Data offset in bytes (relative to the partition start)
    pub fn data_off(&self) -> u64 { (self.data_off.get() as u64) << 2 }

    /// Data size in bytes
    pub fn data_size(&self) -> u64 { (self.data_size.get() as u64) << 2 }
}

/// Marker payload for hash tree failures, so they stay distinguishable from
/// plain I/O errors when crossing `std::io::Read` boundaries.
#[derive(Debug)]
pub struct HashMismatch(pub(crate) String);

impl fmt::Display for HashMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl std::error::Error for HashMismatch {}

fn hash_error(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, HashMismatch(msg))
}

/// Encrypted partition reader. Decrypts each sector with the partition content
/// key and optionally verifies it against the partition hash tree.
pub(crate) struct PartitionReaderWii {
    stream: Box<dyn DiscStream>,
    partition: PartitionInfo,
    pos: u64,
    raw: Box<[u8; SECTOR_SIZE]>,
    decrypted: Box<[u8; SECTOR_SIZE]>,
    sector: u32,
    h3_table: Option<Arc<[u8; H3_TABLE_SIZE]>>,
    meta: Option<PartitionMeta>,
}

impl Clone for PartitionReaderWii {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            partition: self.partition.clone(),
            pos: 0,
            raw: <[u8; SECTOR_SIZE]>::new_box_zeroed().unwrap(),
            decrypted: <[u8; SECTOR_SIZE]>::new_box_zeroed().unwrap(),
            sector: u32::MAX,
            h3_table: self.h3_table.clone(),
            meta: self.meta.clone(),
        }
    }
}

impl PartitionReaderWii {
    pub fn new(
        mut stream: Box<dyn DiscStream>,
        partition: &PartitionInfo,
        options: &PartitionOptions,
    ) -> Result<Box<Self>> {
        // The hash tree root lives in the unencrypted partition header area, so
        // it's loaded once up front.
        let h3_table = if options.validate_hashes && partition.has_hashes {
            let offset =
                partition.start_sector as u64 * SECTOR_SIZE as u64 + partition.header.h3_table_off();
            stream.seek(SeekFrom::Start(offset)).context("Seeking to H3 table offset")?;
            Some(read_arc::<[u8; H3_TABLE_SIZE], _>(stream.as_mut()).context("Reading H3 table")?)
        } else {
            None
        };
        Ok(Box::new(Self {
            stream,
            partition: partition.clone(),
            pos: 0,
            raw: <[u8; SECTOR_SIZE]>::new_box_zeroed()?,
            decrypted: <[u8; SECTOR_SIZE]>::new_box_zeroed()?,
            sector: u32::MAX,
            h3_table,
            meta: None,
        }))
    }

    /// Logical (decrypted) length of the partition data in bytes.
    pub fn len(&self) -> u64 {
        let sectors = (self.partition.data_end_sector - self.partition.data_start_sector) as u64;
        if self.partition.has_hashes {
            sectors * SECTOR_DATA_SIZE as u64
        } else {
            sectors * SECTOR_SIZE as u64
        }
    }
}

impl BufRead for PartitionReaderWii {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let sector_data_size =
            if self.partition.has_hashes { SECTOR_DATA_SIZE } else { SECTOR_SIZE };
        let part_sector = (self.pos / sector_data_size as u64) as u32;
        let sector_offset = (self.pos % sector_data_size as u64) as usize;
        let abs_sector = self.partition.data_start_sector + part_sector;
        if abs_sector >= self.partition.data_end_sector {
            return Ok(&[]);
        }

        if abs_sector != self.sector {
            self.stream.seek(SeekFrom::Start(abs_sector as u64 * SECTOR_SIZE as u64))?;
            read_with_zero_fill(self.stream.as_mut(), self.raw.as_mut())?;
            if self.partition.has_encryption {
                decrypt_sector_b2b(&self.raw, &mut self.decrypted, &self.partition.key);
            } else {
                self.decrypted.copy_from_slice(self.raw.as_ref());
            }
            if let Some(h3_table) = self.h3_table.as_deref() {
                verify_sector(&self.decrypted, part_sector, h3_table)?;
            }
            self.sector = abs_sector;
        }

        if self.partition.has_hashes {
            Ok(&self.decrypted[HASHES_SIZE + sector_offset..])
        } else {
            Ok(&self.decrypted[sector_offset..])
        }
    }

    #[inline]
    fn consume(&mut self, amt: usize) { self.pos += amt as u64; }
}

impl_read_for_bufread!(PartitionReaderWii);

impl Seek for PartitionReaderWii {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = match pos {
            SeekFrom::Start(v) => v,
            SeekFrom::End(v) => self.len().saturating_add_signed(v),
            SeekFrom::Current(v) => self.pos.saturating_add_signed(v),
        };
        Ok(self.pos)
    }

    #[inline]
    fn stream_position(&mut self) -> io::Result<u64> { Ok(self.pos) }
}

/// Verifies one decrypted sector against the hash tree.
///
/// H0 hashes cover the sector's 31 data blocks, H1 the sector's row within
/// its subgroup, H2 the subgroup's row within its group, and H3 (stored
/// outside the data area) the group itself.
fn verify_sector(
    buf: &[u8; SECTOR_SIZE],
    part_sector: u32,
    h3_table: &[u8; H3_TABLE_SIZE],
) -> io::Result<()> {
    let (cluster, sector) = div_rem(part_sector as usize, 8);
    let (group, sub_group) = div_rem(cluster, 8);

    // H0 hashes
    for i in 0..31 {
        let expected = array_ref![buf, i * 20, 20];
        let output = sha1_hash(array_ref![buf, (i + 1) * 0x400, 0x400]);
        if output != *expected {
            return Err(hash_error(format!("Invalid H0 hash! (block {i})")));
        }
    }

    // H1 hash
    {
        let expected = array_ref![buf, 0x280 + sector * 20, 20];
        let output = sha1_hash(array_ref![buf, 0, 0x26C]);
        if output != *expected {
            return Err(hash_error(format!("Invalid H1 hash! (sector {sector})")));
        }
    }

    // H2 hash
    {
        let expected = array_ref![buf, 0x340 + sub_group * 20, 20];
        let output = sha1_hash(array_ref![buf, 0x280, 0xA0]);
        if output != *expected {
            return Err(hash_error(format!("Invalid H2 hash! (subgroup {sub_group})")));
        }
    }

    // H3 hash
    {
        let expected = array_ref![h3_table, group * 20, 20];
        let output = sha1_hash(array_ref![buf, 0x340, 0xA0]);
        if output != *expected {
            return Err(hash_error(format!("Invalid H3 hash! (group {group})")));
        }
    }

    Ok(())
}

impl PartitionReader for PartitionReaderWii {
    fn is_wii(&self) -> bool { true }

    fn is_encrypted(&self) -> bool { self.partition.has_encryption }

    fn meta(&mut self) -> Result<PartitionMeta> {
        if let Some(meta) = &self.meta {
            return Ok(meta.clone());
        }
        let mut meta = read_part_meta(self, true)?;
        meta.raw_ticket = Some(Arc::from(self.partition.header.ticket.as_bytes()));

        // TMD, cert chain, and H3 table live in the unencrypted partition
        // header area and are read raw from the disc stream.
        let offset = self.partition.start_sector as u64 * SECTOR_SIZE as u64;
        let header = self.partition.header.clone();
        meta.raw_tmd = if header.tmd_size() != 0 {
            self.stream
                .seek(SeekFrom::Start(offset + header.tmd_off()))
                .context("Seeking to TMD offset")?;
            Some(
                read_arc_slice::<u8, _>(self.stream.as_mut(), header.tmd_size() as usize)
                    .context("Reading TMD")?,
            )
        } else {
            None
        };
        meta.raw_cert_chain = if header.cert_chain_size() != 0 {
            self.stream
                .seek(SeekFrom::Start(offset + header.cert_chain_off()))
                .context("Seeking to cert chain offset")?;
            Some(
                read_arc_slice::<u8, _>(self.stream.as_mut(), header.cert_chain_size() as usize)
                    .context("Reading cert chain")?,
            )
        } else {
            None
        };
        meta.raw_h3_table = if self.partition.has_hashes {
            if let Some(h3_table) = &self.h3_table {
                Some(h3_table.clone())
            } else {
                self.stream
                    .seek(SeekFrom::Start(offset + header.h3_table_off()))
                    .context("Seeking to H3 table offset")?;
                Some(
                    read_arc::<[u8; H3_TABLE_SIZE], _>(self.stream.as_mut())
                        .context("Reading H3 table")?,
                )
            }
        } else {
            None
        };

        self.meta = Some(meta.clone());
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Builds a sector whose hash tables are consistent for part_sector 0,
    // then corrupts one data block to check that verification trips.
    fn build_sector(fill: u8) -> (Box<[u8; SECTOR_SIZE]>, Box<[u8; H3_TABLE_SIZE]>) {
        let mut buf = <[u8; SECTOR_SIZE]>::new_box_zeroed().unwrap();
        buf[HASHES_SIZE..].fill(fill);
        for i in 0..31 {
            let hash = sha1_hash(array_ref![buf, (i + 1) * 0x400, 0x400]);
            buf[i * 20..i * 20 + 20].copy_from_slice(&hash);
        }
        let h1 = sha1_hash(array_ref![buf, 0, 0x26C]);
        for i in 0..8 {
            buf[0x280 + i * 20..0x280 + i * 20 + 20].copy_from_slice(&h1);
        }
        let h2 = sha1_hash(array_ref![buf, 0x280, 0xA0]);
        for i in 0..8 {
            buf[0x340 + i * 20..0x340 + i * 20 + 20].copy_from_slice(&h2);
        }
        let h3 = sha1_hash(array_ref![buf, 0x340, 0xA0]);
        let mut h3_table = <[u8; H3_TABLE_SIZE]>::new_box_zeroed().unwrap();
        h3_table[..20].copy_from_slice(&h3);
        (buf, h3_table)
    }

    #[test]
    fn test_verify_sector() {
        let (buf, h3_table) = build_sector(0xAB);
        verify_sector(&buf, 0, &h3_table).expect("Hash verification failed");
    }

    #[test]
    fn test_verify_sector_corrupt() {
        let (mut buf, h3_table) = build_sector(0xAB);
        buf[HASHES_SIZE + 100] ^= 1;
        let err = verify_sector(&buf, 0, &h3_table).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.get_ref().is_some_and(|e| e.is::<HashMismatch>()));
    }

    #[test]
    fn test_verify_sector_bad_h3() {
        let (buf, mut h3_table) = build_sector(0xCD);
        h3_table[0] ^= 1;
        assert!(verify_sector(&buf, 0, &h3_table).is_err());
    }

    // Assembles a minimal hashless, unencrypted Wii image in memory and reads
    // it back through the full partition path.
    #[test]
    fn test_read_unencrypted_wii_image() {
        use std::io::{Cursor, Read};

        use crate::{
            disc::{fst::FstBuilder, DiscHeader, PartitionHeader, WII_MAGIC},
            read::DiscReader,
        };

        let mut image = vec![0u8; 0x68000];

        let mut disc_header = DiscHeader::new_zeroed();
        disc_header.game_id.copy_from_slice(b"RTSTW1");
        disc_header.wii_magic = WII_MAGIC;
        disc_header.no_partition_hashes = 1;
        disc_header.no_partition_encryption = 1;
        image[..size_of::<DiscHeader>()].copy_from_slice(disc_header.as_bytes());

        let group =
            WiiPartGroup { part_count: U32::new(1), part_entry_off: U32::new(0x40020 >> 2) };
        image[0x40000..0x40008].copy_from_slice(group.as_bytes());
        let entry = WiiPartEntry { offset: U32::new(0x50000 >> 2), kind: U32::new(0) };
        image[0x40020..0x40028].copy_from_slice(entry.as_bytes());

        let mut part_header = WiiPartitionHeader::new_zeroed();
        part_header.ticket.sig_issuer[..RVL_CERT_ISSUER_PPKI_TICKET.len()]
            .copy_from_slice(RVL_CERT_ISSUER_PPKI_TICKET.as_bytes());
        part_header.ticket.common_key_idx = 0;
        part_header.data_off = U32::new(0x8000 >> 2);
        part_header.data_size = U32::new(0x10000 >> 2);
        image[0x50000..0x50000 + size_of::<WiiPartitionHeader>()]
            .copy_from_slice(part_header.as_bytes());

        // Partition contents: boot data, FST, and one file
        let part_base = 0x58000;
        let mut inner_header = DiscHeader::new_zeroed();
        inner_header.game_id.copy_from_slice(b"RTSTW1");
        inner_header.wii_magic = WII_MAGIC;
        image[part_base..part_base + size_of::<DiscHeader>()]
            .copy_from_slice(inner_header.as_bytes());

        let mut fst_builder = FstBuilder::new(true);
        fst_builder.add_file("ab.bin", 0x3000, 8);
        let fst_data = fst_builder.finalize();
        assert_eq!(fst_data.len(), 32);

        let mut partition_header = PartitionHeader::new_zeroed();
        partition_header.set_fst_offset(0x2480, true);
        partition_header.set_fst_size(fst_data.len() as u64, true);
        partition_header.set_fst_max_size(fst_data.len() as u64, true);
        image[part_base + size_of::<DiscHeader>()..part_base + 0x440]
            .copy_from_slice(partition_header.as_bytes());
        image[part_base + 0x2480..part_base + 0x2480 + fst_data.len()]
            .copy_from_slice(&fst_data);
        image[part_base + 0x3000..part_base + 0x3008].copy_from_slice(b"wiidata!");

        let disc =
            DiscReader::new_stream(Box::new(Cursor::new(image))).expect("Failed to open disc");
        assert!(disc.header().is_wii());
        assert_eq!(disc.partitions().len(), 1);

        let partition = disc.data_partition().expect("Failed to open data partition");
        assert!(partition.is_wii());
        assert!(!partition.is_encrypted());
        assert_eq!(partition.file_paths().collect::<Vec<_>>(), ["ab.bin"]);

        let mut stream = partition.open_file("ab.bin").unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"wiidata!");
    }
}
