pub const SECTOR_SIZE: usize = 512;

/// Largest sector count a single PIO command can carry.
pub const MAX_SECTORS_PER_COMMAND: usize = 255;

/// Number of whole sectors one command moves for a buffer of `len` bytes.
pub fn sectors_for(len: usize) -> usize {
    (len / SECTOR_SIZE).min(MAX_SECTORS_PER_COMMAND)
}

/// A sector-addressed disk.
///
/// `read` and `write` issue a single command: the buffer length decides the
/// sector count (`len / 512`, capped at 255, partial sectors ignored).
pub trait BlockDevice {
    fn read(&self, lba: u64, buf: &mut [u8]) -> bool;

    fn write(&self, lba: u64, buf: &[u8]) -> bool;

    /// Read every whole sector of `buf`, splitting into as many commands as
    /// needed. Stops at the first failed command.
    fn read_all(&self, lba: u64, buf: &mut [u8]) -> bool {
        let whole = buf.len() / SECTOR_SIZE * SECTOR_SIZE;
        let mut lba = lba;
        for chunk in buf[..whole].chunks_mut(MAX_SECTORS_PER_COMMAND * SECTOR_SIZE) {
            if !self.read(lba, chunk) {
                return false;
            }
            lba += (chunk.len() / SECTOR_SIZE) as u64;
        }
        true
    }

    /// Write counterpart of [`BlockDevice::read_all`].
    fn write_all(&self, lba: u64, buf: &[u8]) -> bool {
        let whole = buf.len() / SECTOR_SIZE * SECTOR_SIZE;
        let mut lba = lba;
        for chunk in buf[..whole].chunks(MAX_SECTORS_PER_COMMAND * SECTOR_SIZE) {
            if !self.write(lba, chunk) {
                return false;
            }
            lba += (chunk.len() / SECTOR_SIZE) as u64;
        }
        true
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for &D {
    fn read(&self, lba: u64, buf: &mut [u8]) -> bool {
        (**self).read(lba, buf)
    }

    fn write(&self, lba: u64, buf: &[u8]) -> bool {
        (**self).write(lba, buf)
    }
}
