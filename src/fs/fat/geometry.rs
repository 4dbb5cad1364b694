use core::fmt;

use super::boot::BootRecord;
use super::dir::DIR_ENTRY_SIZE;

/// Cluster counts at and above which a volume is FAT16 / FAT32.
pub const FAT16_MIN_CLUSTERS: u32 = 4085;
pub const FAT32_MIN_CLUSTERS: u32 = 65525;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatType {
    Fat12,
    Fat16,
    Fat32,
}

impl FatType {
    /// The variant is a function of the cluster count alone.
    pub fn from_cluster_count(total_clusters: u32) -> Self {
        if total_clusters < FAT16_MIN_CLUSTERS {
            FatType::Fat12
        } else if total_clusters < FAT32_MIN_CLUSTERS {
            FatType::Fat16
        } else {
            FatType::Fat32
        }
    }
}

impl fmt::Display for FatType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FatType::Fat12 => write!(f, "FAT12"),
            FatType::Fat16 => write!(f, "FAT16"),
            FatType::Fat32 => write!(f, "FAT32"),
        }
    }
}

/// Where the root directory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootLocation {
    /// FAT12/16: a fixed run of sectors between the FATs and the data area.
    Sectors { start: u32, count: u32 },
    /// FAT32: an ordinary cluster chain starting here.
    Cluster(u32),
}

/// Layout numbers derived from the boot record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub first_fat_sector: u32,
    pub sectors_per_fat: u32,
    pub root_dir_sectors: u32,
    pub first_data_sector: u32,
    pub data_sectors: u32,
    pub total_clusters: u32,
    pub fat_type: FatType,
}

impl Geometry {
    /// `None` only when the numbers cannot be computed at all: a zero
    /// divisor, or a data area that would start past the end of the volume.
    pub fn from_boot_record(boot: &BootRecord) -> Option<Self> {
        let bytes_per_sector = boot.bytes_per_sector as u32;
        let sectors_per_cluster = boot.sectors_per_cluster as u32;
        if bytes_per_sector == 0 || sectors_per_cluster == 0 {
            return None;
        }

        let sectors_per_fat = boot.sectors_per_fat();
        let root_dir_sectors =
            (boot.root_entry_count as u32 * DIR_ENTRY_SIZE as u32).div_ceil(bytes_per_sector);
        let first_fat_sector = boot.reserved_sector_count as u32;
        let first_data_sector = (boot.fat_count as u32)
            .checked_mul(sectors_per_fat)?
            .checked_add(first_fat_sector + root_dir_sectors)?;
        let data_sectors = boot.total_sectors().checked_sub(first_data_sector)?;
        let total_clusters = data_sectors / sectors_per_cluster;

        Some(Geometry {
            bytes_per_sector,
            sectors_per_cluster,
            first_fat_sector,
            sectors_per_fat,
            root_dir_sectors,
            first_data_sector,
            data_sectors,
            total_clusters,
            fat_type: FatType::from_cluster_count(total_clusters),
        })
    }

    /// Whether `cluster` names one of the volume's data clusters.
    pub fn is_data_cluster(&self, cluster: u32) -> bool {
        cluster
            .checked_sub(2)
            .is_some_and(|index| index < self.total_clusters)
    }

    /// Clusters are numbered from 2. `None` for the reserved clusters 0 and
    /// 1 and when the sector number does not fit in 32 bits.
    pub fn first_sector_of(&self, cluster: u32) -> Option<u32> {
        cluster
            .checked_sub(2)?
            .checked_mul(self.sectors_per_cluster)?
            .checked_add(self.first_data_sector)
    }

    pub fn root_location(&self, boot: &BootRecord) -> RootLocation {
        match (self.fat_type, boot.root_cluster()) {
            (FatType::Fat32, Some(cluster)) => RootLocation::Cluster(cluster),
            _ => RootLocation::Sectors {
                start: self.first_data_sector - self.root_dir_sectors,
                count: self.root_dir_sectors,
            },
        }
    }
}
