//! Boot sector (BIOS parameter block plus extended boot record).

use crate::drivers::block::SECTOR_SIZE;

pub(crate) fn le16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

pub(crate) fn le32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

/// Extended boot signature announcing that volume id, label and type label
/// are present.
pub const EXTENDED_SIGNATURE: u8 = 0x29;

/// Identification block shared by the FAT12/16 and FAT32 extended records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub drive_number: u8,
    pub signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    /// "FAT16   " and friends. Informational only, never trusted.
    pub fs_type_label: [u8; 8],
}

impl VolumeInfo {
    fn decode(sector: &[u8], offset: usize) -> Self {
        VolumeInfo {
            drive_number: sector[offset],
            signature: sector[offset + 2],
            volume_id: le32(sector, offset + 3),
            volume_label: array(sector, offset + 7),
            fs_type_label: array(sector, offset + 18),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fat32Header {
    pub sectors_per_fat: u32,
    pub flags: u16,
    pub version: u16,
    pub root_cluster: u32,
    pub fsinfo_sector: u16,
    pub backup_boot_sector: u16,
    pub volume: VolumeInfo,
}

/// The bytes after offset 36 are laid out differently for FAT32; which
/// layout applies is keyed by the 16-bit sectors-per-FAT field being zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendedHeader {
    Fat16(VolumeInfo),
    Fat32(Fat32Header),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootRecord {
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sector_count: u16,
    pub fat_count: u8,
    pub root_entry_count: u16,
    pub total_sectors_16: u16,
    pub media_type: u8,
    pub sectors_per_fat_16: u16,
    pub sectors_per_track: u16,
    pub head_count: u16,
    pub hidden_sectors: u32,
    pub total_sectors_32: u32,
    pub extended: ExtendedHeader,
}

impl BootRecord {
    pub fn decode(sector: &[u8; SECTOR_SIZE]) -> Self {
        let sectors_per_fat_16 = le16(sector, 22);
        let extended = if sectors_per_fat_16 == 0 {
            ExtendedHeader::Fat32(Fat32Header {
                sectors_per_fat: le32(sector, 36),
                flags: le16(sector, 40),
                version: le16(sector, 42),
                root_cluster: le32(sector, 44),
                fsinfo_sector: le16(sector, 48),
                backup_boot_sector: le16(sector, 50),
                volume: VolumeInfo::decode(sector, 64),
            })
        } else {
            ExtendedHeader::Fat16(VolumeInfo::decode(sector, 36))
        };

        BootRecord {
            oem_name: array(sector, 3),
            bytes_per_sector: le16(sector, 11),
            sectors_per_cluster: sector[13],
            reserved_sector_count: le16(sector, 14),
            fat_count: sector[16],
            root_entry_count: le16(sector, 17),
            total_sectors_16: le16(sector, 19),
            media_type: sector[21],
            sectors_per_fat_16,
            sectors_per_track: le16(sector, 24),
            head_count: le16(sector, 26),
            hidden_sectors: le32(sector, 28),
            total_sectors_32: le32(sector, 32),
            extended,
        }
    }

    pub fn total_sectors(&self) -> u32 {
        if self.total_sectors_16 == 0 {
            self.total_sectors_32
        } else {
            self.total_sectors_16 as u32
        }
    }

    pub fn sectors_per_fat(&self) -> u32 {
        match &self.extended {
            ExtendedHeader::Fat32(header) => header.sectors_per_fat,
            ExtendedHeader::Fat16(_) => self.sectors_per_fat_16 as u32,
        }
    }

    /// First cluster of the root directory; FAT32 headers only.
    pub fn root_cluster(&self) -> Option<u32> {
        match &self.extended {
            ExtendedHeader::Fat32(header) => Some(header.root_cluster),
            ExtendedHeader::Fat16(_) => None,
        }
    }

    pub fn volume(&self) -> &VolumeInfo {
        match &self.extended {
            ExtendedHeader::Fat32(header) => &header.volume,
            ExtendedHeader::Fat16(volume) => volume,
        }
    }

    /// Space-trimmed volume label, if the extended record carries one.
    pub fn volume_label(&self) -> Option<&str> {
        let volume = self.volume();
        if volume.signature != EXTENDED_SIGNATURE {
            return None;
        }
        core::str::from_utf8(&volume.volume_label)
            .ok()
            .map(|label| label.trim_end_matches(' '))
            .filter(|label| !label.is_empty())
    }
}
