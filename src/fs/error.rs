use core::fmt;

/// Filesystem error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// The disk refused a sector read.
    IoError { lba: u64 },
    /// Sector 0 does not describe a usable FAT geometry.
    InvalidBootSector,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FsError::IoError { lba } => write!(f, "I/O error reading sector {}", lba),
            FsError::InvalidBootSector => write!(f, "No FAT geometry in boot sector"),
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
