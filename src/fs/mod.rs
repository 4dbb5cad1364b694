pub mod error;
pub mod fat;

use alloc::vec::Vec;

use crate::drivers::block::BlockDevice;
use fat::{DirEntry, FatFs};

/// What a disk turned out to hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Volume {
    /// Sector 0 was unreadable or had no usable FAT geometry.
    NoFilesystem,
    /// A FAT volume whose root directory could not be read.
    ListFailed,
    Listed(Vec<DirEntry>),
}

/// Mount `disk` read-only and list its root directory.
pub fn probe<D: BlockDevice + ?Sized>(disk: &D) -> Volume {
    let Some(fs) = FatFs::try_read(disk) else {
        return Volume::NoFilesystem;
    };
    if let Some(label) = fs.volume_label() {
        crate::log_debug!("FAT: volume label {}", label);
    }
    match fs.list_root() {
        Some(entries) => Volume::Listed(entries),
        None => Volume::ListFailed,
    }
}
