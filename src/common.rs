//! Common types.

use std::{fmt, sync::Arc};

use crate::disc::{wii::WiiPartitionHeader, SECTOR_SIZE};

/// SHA-1 hash bytes
pub type HashBytes = [u8; 20];

/// AES key bytes
pub type KeyBytes = [u8; 16];

/// Magic bytes
pub type MagicBytes = [u8; 4];

/// The kind of disc partition.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum PartitionKind {
    /// Data partition.
    Data,
    /// Update partition.
    Update,
    /// Channel partition.
    Channel,
    /// Other partition kind.
    Other(u32),
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => write!(f, "Data"),
            Self::Update => write!(f, "Update"),
            Self::Channel => write!(f, "Channel"),
            Self::Other(v) => {
                let bytes = v.to_be_bytes();
                write!(f, "Other ({:08X}, {})", v, String::from_utf8_lossy(&bytes))
            }
        }
    }
}

impl From<u32> for PartitionKind {
    #[inline]
    fn from(v: u32) -> Self {
        match v {
            0 => Self::Data,
            1 => Self::Update,
            2 => Self::Channel,
            v => Self::Other(v),
        }
    }
}

/// Wii partition information.
#[derive(Debug, Clone)]
pub struct PartitionInfo {
    /// The partition index.
    pub index: usize,
    /// The kind of disc partition.
    pub kind: PartitionKind,
    /// The start sector of the partition.
    pub start_sector: u32,
    /// The start sector of the partition's (usually encrypted) data.
    pub data_start_sector: u32,
    /// The end sector of the partition's (usually encrypted) data.
    pub data_end_sector: u32,
    /// The AES content key for the partition, unwrapped from the ticket.
    pub key: KeyBytes,
    /// The Wii partition header.
    pub header: Arc<WiiPartitionHeader>,
    /// Whether the partition data is encrypted.
    pub has_encryption: bool,
    /// Whether the partition data hashes are present.
    pub has_hashes: bool,
}

impl PartitionInfo {
    /// Returns the size of the partition's data region in bytes.
    #[inline]
    pub fn data_size(&self) -> u64 {
        (self.data_end_sector as u64 - self.data_start_sector as u64) * SECTOR_SIZE as u64
    }
}
