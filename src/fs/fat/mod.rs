//! Read-only FAT12/16/32 volume access: geometry and the root directory.

pub mod boot;
pub mod dir;
pub mod geometry;


use alloc::vec::Vec;

use crate::drivers::block::{BlockDevice, SECTOR_SIZE};
use crate::fs::error::{FsError, FsResult};

pub use boot::BootRecord;
pub use dir::{DirEntry, FileAttributes, Timestamp};
pub use geometry::{FatType, Geometry, RootLocation};

use dir::DirectoryParser;

// ══════════════════════════════════════════════════════════════
//  FAT entry values
// ══════════════════════════════════════════════════════════════

const FAT12_BAD: u32 = 0x0FF7;
const FAT16_BAD: u32 = 0xFFF7;
const FAT32_BAD: u32 = 0x0FFF_FFF7;
const FAT32_ENTRY_MASK: u32 = 0x0FFF_FFFF;
const FIRST_DATA_CLUSTER: u32 = 2;

// ══════════════════════════════════════════════════════════════
//  FatFs
// ══════════════════════════════════════════════════════════════

/// A mounted view of one FAT volume on a block device.
pub struct FatFs<'d, D: BlockDevice + ?Sized> {
    disk: &'d D,
    boot: BootRecord,
    geometry: Geometry,
    root: RootLocation,
}

impl<'d, D: BlockDevice + ?Sized> FatFs<'d, D> {
    /// Read sector 0 and derive the volume geometry.
    pub fn open(disk: &'d D) -> FsResult<Self> {
        let mut sector = [0u8; SECTOR_SIZE];
        read_sector(disk, 0, &mut sector)?;

        let boot = BootRecord::decode(&sector);
        let geometry = Geometry::from_boot_record(&boot).ok_or(FsError::InvalidBootSector)?;
        let root = geometry.root_location(&boot);
        if let RootLocation::Cluster(cluster) = root {
            if !geometry.is_data_cluster(cluster) || geometry.first_sector_of(cluster).is_none() {
                crate::log_debug!("FAT: root cluster {} outside the data area", cluster);
                return Err(FsError::InvalidBootSector);
            }
        }

        crate::log_info!(
            "FAT: {} volume, {} clusters of {} sectors",
            geometry.fat_type,
            geometry.total_clusters,
            geometry.sectors_per_cluster
        );
        crate::log_debug!(
            "FAT: first_fat={} root_dir_sectors={} first_data={} data_sectors={}",
            geometry.first_fat_sector,
            geometry.root_dir_sectors,
            geometry.first_data_sector,
            geometry.data_sectors
        );

        Ok(FatFs { disk, boot, geometry, root })
    }

    /// `None` when sector 0 cannot be read or describes no usable geometry.
    pub fn try_read(disk: &'d D) -> Option<Self> {
        Self::open(disk)
            .map_err(|e| crate::log_debug!("FAT: not mounted: {}", e))
            .ok()
    }

    pub fn fat_type(&self) -> FatType {
        self.geometry.fat_type
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn boot_record(&self) -> &BootRecord {
        &self.boot
    }

    pub fn volume_label(&self) -> Option<&str> {
        self.boot.volume_label()
    }

    pub fn root_location(&self) -> RootLocation {
        self.root
    }

    pub fn first_sector_of(&self, cluster: u32) -> Option<u32> {
        self.geometry.first_sector_of(cluster)
    }

    /// Follow the FAT one link. `None` for free, reserved, bad and
    /// end-of-chain entries, and when the FAT cannot be read.
    pub fn next_cluster_of(&self, cluster: u32) -> Option<u32> {
        if !self.geometry.is_data_cluster(cluster) {
            return None;
        }
        let index = cluster as u64;
        let (byte_offset, bad) = match self.geometry.fat_type {
            FatType::Fat12 => (index + index / 2, FAT12_BAD),
            FatType::Fat16 => (index * 2, FAT16_BAD),
            FatType::Fat32 => (index * 4, FAT32_BAD),
        };
        let lba = self.geometry.first_fat_sector as u64 + byte_offset / SECTOR_SIZE as u64;
        let within = (byte_offset % SECTOR_SIZE as u64) as usize;

        // A FAT12 entry at the last byte of a sector continues into the next.
        let mut buf = [0u8; 2 * SECTOR_SIZE];
        let span = if within == SECTOR_SIZE - 1 { 2 * SECTOR_SIZE } else { SECTOR_SIZE };
        read_sector(self.disk, lba, &mut buf[..span]).ok()?;

        let next = match self.geometry.fat_type {
            FatType::Fat12 => {
                let pair = boot::le16(&buf, within) as u32;
                if cluster & 1 == 1 { pair >> 4 } else { pair & 0x0FFF }
            }
            FatType::Fat16 => boot::le16(&buf, within) as u32,
            FatType::Fat32 => boot::le32(&buf, within) & FAT32_ENTRY_MASK,
        };

        (FIRST_DATA_CLUSTER..bad).contains(&next).then_some(next)
    }

    /// Every live entry of the root directory, stopping at the end marker.
    ///
    /// A FAT32 root is read from its first cluster only.
    pub fn read_root(&self) -> FsResult<Vec<DirEntry>> {
        let (start, count) = match self.root {
            RootLocation::Sectors { start, count } => (start, count),
            RootLocation::Cluster(cluster) => {
                let start = self.first_sector_of(cluster).ok_or(FsError::InvalidBootSector)?;
                (start, self.geometry.sectors_per_cluster)
            }
        };

        let mut parser = DirectoryParser::new();
        let mut sector = [0u8; SECTOR_SIZE];
        for lba in start as u64..start as u64 + count as u64 {
            read_sector(self.disk, lba, &mut sector)?;
            if parser.feed_sector(&sector).is_break() {
                break;
            }
        }
        Ok(parser.finish())
    }

    /// Like [`read_root`](Self::read_root), with any read failure collapsed
    /// to `None`.
    pub fn list_root(&self) -> Option<Vec<DirEntry>> {
        self.read_root()
            .map_err(|e| crate::log_warn!("FAT: root directory unreadable: {}", e))
            .ok()
    }
}

fn read_sector<D: BlockDevice + ?Sized>(disk: &D, lba: u64, buf: &mut [u8]) -> FsResult<()> {
    if disk.read(lba, buf) {
        Ok(())
    } else {
        Err(FsError::IoError { lba })
    }
}
