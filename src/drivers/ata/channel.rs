use crate::drivers::block::SECTOR_SIZE;
use crate::drivers::port::PortIo;

use super::pio::{AtaError, AtaResult};
use super::regs::*;

const WORDS_PER_SECTOR: usize = SECTOR_SIZE / 2;

/// Port assignment of one IDE channel. Shared by the master and slave drive
/// wired to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub base: u16,
    /// Control block base; alternate status / device control live at +2.
    pub ctrl: u16,
    /// Bus-master IDE block. Recorded, unused by PIO.
    pub bus_master: u16,
}

impl Channel {
    pub const PRIMARY_LEGACY: Channel = Channel { base: 0x1F0, ctrl: 0x3F4, bus_master: 0 };
    pub const SECONDARY_LEGACY: Channel = Channel { base: 0x170, ctrl: 0x374, bus_master: 0 };

    pub fn bus<'a, P: PortIo + ?Sized>(&self, io: &'a P, poll_limit: u32) -> ChannelBus<'a, P> {
        ChannelBus { io, ports: *self, poll_limit }
    }
}

/// A channel's registers bound to a port backend for the length of one
/// command sequence.
pub struct ChannelBus<'a, P: PortIo + ?Sized> {
    io: &'a P,
    ports: Channel,
    poll_limit: u32,
}

impl<'a, P: PortIo + ?Sized> ChannelBus<'a, P> {
    // ── Register access ──────────────────────────────────────

    pub fn io(&self) -> &'a P {
        self.io
    }

    pub fn read_data(&self) -> u16 {
        self.io.inw(self.ports.base + DATA_REG)
    }

    pub fn write_data(&self, value: u16) {
        self.io.outw(self.ports.base + DATA_REG, value)
    }

    /// LBA high:mid, which holds the device signature after a failed IDENTIFY.
    pub fn read_signature(&self) -> u16 {
        let mid = self.io.inb(self.ports.base + LBA_MID) as u16;
        let high = self.io.inb(self.ports.base + LBA_HIGH) as u16;
        (high << 8) | mid
    }

    pub fn read_status(&self) -> Status {
        Status::from_bits_retain(self.io.inb(self.ports.base + CMD_STATUS))
    }

    pub fn read_error(&self) -> u8 {
        self.io.inb(self.ports.base + ERROR_REG)
    }

    pub fn read_alt_status(&self) -> Status {
        Status::from_bits_retain(self.io.inb(self.ports.ctrl + ALT_STATUS))
    }

    pub fn write_sector_count(&self, count: u8) {
        self.io.outb(self.ports.base + SECTOR_COUNT, count)
    }

    pub fn write_lba(&self, low: u8, mid: u8, high: u8) {
        self.io.outb(self.ports.base + LBA_LOW, low);
        self.io.outb(self.ports.base + LBA_MID, mid);
        self.io.outb(self.ports.base + LBA_HIGH, high);
    }

    pub fn write_drive_select(&self, value: u8) {
        self.io.outb(self.ports.base + DRIVE_SELECT, value)
    }

    pub fn write_command(&self, command: Command) {
        self.io.outb(self.ports.base + CMD_STATUS, command as u8)
    }

    pub fn disable_irqs(&self) {
        self.io.outb(self.ports.ctrl + ALT_STATUS, CONTROL_NIEN)
    }

    // ── Status polling ───────────────────────────────────────

    /// Four alternate-status reads give the drive 400ns to update status.
    pub fn delay_400ns(&self) {
        for _ in 0..4 {
            let _ = self.read_alt_status();
        }
    }

    /// Wait until BSY clears.
    pub fn wait_not_busy(&self) -> AtaResult<()> {
        for _ in 0..self.poll_limit {
            if !self.read_status().contains(Status::BUSY) {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Err(AtaError::Unresponsive)
    }

    /// Wait until the drive either has data ready or reports an error.
    pub fn wait_request_ready(&self) -> AtaResult<Status> {
        for _ in 0..self.poll_limit {
            let status = self.read_status();
            if status.intersects(Status::REQUEST_READY | Status::ERROR) {
                return Ok(status);
            }
            core::hint::spin_loop();
        }
        Err(AtaError::Unresponsive)
    }

    /// Wait for IDENTIFY to settle: either ERR, or BSY clear with DRQ set.
    pub fn wait_identify(&self) -> AtaResult<Status> {
        for _ in 0..self.poll_limit {
            let status = self.read_status();
            if status.contains(Status::ERROR) {
                return Ok(status);
            }
            if !status.contains(Status::BUSY) && status.contains(Status::REQUEST_READY) {
                return Ok(status);
            }
            core::hint::spin_loop();
        }
        Err(AtaError::Unresponsive)
    }

    pub fn poll(&self, advanced_check: bool) -> AtaResult<()> {
        self.delay_400ns();
        self.wait_not_busy()?;

        if advanced_check {
            let status = self.read_status();
            if status.contains(Status::ERROR) {
                return Err(AtaError::Error);
            }
            if status.contains(Status::DRIVE_WRITE_FAULT) {
                return Err(AtaError::DriveWriteFault);
            }
            if !status.contains(Status::REQUEST_READY) {
                return Err(AtaError::RequestNotReady);
            }
        }

        Ok(())
    }

    // ── Data transfer ────────────────────────────────────────

    pub fn read_sectors(&self, sector_count: usize, buf: &mut [u8]) -> AtaResult<()> {
        for sector in buf.chunks_exact_mut(SECTOR_SIZE).take(sector_count) {
            self.poll(true)?;
            for word in sector.chunks_exact_mut(2) {
                word.copy_from_slice(&self.read_data().to_le_bytes());
            }
        }
        Ok(())
    }

    /// Errors during a write only surface on the following flush, so each
    /// sector just waits for BSY to drop.
    pub fn write_sectors(&self, sector_count: usize, buf: &[u8]) -> AtaResult<()> {
        for sector in buf.chunks_exact(SECTOR_SIZE).take(sector_count) {
            self.poll(false)?;
            for word in sector.chunks_exact(2) {
                self.write_data(u16::from_le_bytes([word[0], word[1]]));
            }
        }
        Ok(())
    }

    pub fn read_words(&self, words: &mut [u16; WORDS_PER_SECTOR]) {
        for word in words.iter_mut() {
            *word = self.read_data();
        }
    }
}
