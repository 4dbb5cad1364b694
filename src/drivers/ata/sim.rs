//! Register-level model of an IDE controller with up to four drives, driven
//! through [`PortIo`] so the driver runs unmodified against it.

use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::drivers::block::SECTOR_SIZE;
use crate::drivers::port::{PortIo, IO_WAIT_PORT};

use super::channel::Channel;
use super::identify::encode_model;
use super::pio::AddressMode;
use super::regs::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimKind {
    Ata,
    Atapi,
    /// Aborts IDENTIFY with a signature nobody recognises.
    Unknown,
    /// ATAPI drive that also rejects IDENTIFY PACKET with this error byte.
    AtapiRejecting(u8),
    /// Never clears BSY after IDENTIFY.
    Stuck,
}

pub struct SimDrive {
    pub kind: SimKind,
    pub identify: [u16; 256],
    pub image: Vec<u8>,
    /// Status reads that report BSY after every command.
    pub busy_polls: u32,
    /// Raise ERR once this many sectors of a read have been transferred.
    pub fail_read_after: Option<usize>,
    /// Stay busy forever after a cache flush.
    pub stall_on_flush: bool,
}

impl SimDrive {
    pub fn ata(model: &str, image: Vec<u8>, lba: bool, lba48: bool) -> Self {
        let mut identify = [0u16; 256];
        identify[IDENT_DEVICE_TYPE] = 0x0040;
        if lba {
            identify[IDENT_FEATURES] = FEATURES_SUPPORTS_LBA;
        }
        let sectors = (image.len() / SECTOR_SIZE) as u64;
        identify[IDENT_MAX_LBA] = sectors.min(0x0FFF_FFFF) as u16;
        identify[IDENT_MAX_LBA + 1] = (sectors.min(0x0FFF_FFFF) >> 16) as u16;
        if lba48 {
            identify[IDENT_COMMAND_SETS + 1] = 1 << 10;
            for i in 0..4 {
                identify[IDENT_MAX_LBA_EXT + i] = (sectors >> (16 * i)) as u16;
            }
        }
        encode_model(&mut identify, model);
        SimDrive {
            kind: SimKind::Ata,
            identify,
            image,
            busy_polls: 0,
            fail_read_after: None,
            stall_on_flush: false,
        }
    }

    pub fn with_kind(kind: SimKind, model: &str) -> Self {
        let mut drive = SimDrive::ata(model, Vec::new(), true, false);
        drive.identify[IDENT_DEVICE_TYPE] = 0x85C0;
        drive.kind = kind;
        drive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRecord {
    pub channel: usize,
    pub drive: usize,
    pub command: u8,
    pub mode: AddressMode,
    pub lba: u64,
    pub count: usize,
}

struct PendingWrite {
    lba: u64,
    remaining: usize,
    words: Vec<u16>,
}

struct ChannelState {
    ports: Channel,
    drives: [Option<SimDrive>; 2],
    drive_select: u8,
    /// [previous, current] for the double-latched registers.
    sector_count: [u8; 2],
    lba: [[u8; 2]; 3],
    status: u8,
    error: u8,
    busy_left: u32,
    busy_forever: bool,
    fifo: VecDeque<u16>,
    status_after_drain: u8,
    pending: Option<PendingWrite>,
    control: u8,
    alt_status_reads: usize,
}

impl ChannelState {
    fn new(ports: Channel) -> Self {
        ChannelState {
            ports,
            drives: [None, None],
            drive_select: 0,
            sector_count: [0; 2],
            lba: [[0; 2]; 3],
            status: 0,
            error: 0,
            busy_left: 0,
            busy_forever: false,
            fifo: VecDeque::new(),
            status_after_drain: 0,
            pending: None,
            control: 0,
            alt_status_reads: 0,
        }
    }

    fn selected(&self) -> usize {
        ((self.drive_select >> 4) & 1) as usize
    }

    fn current_status(&self) -> u8 {
        if self.drives[self.selected()].is_none() {
            return 0;
        }
        if self.busy_forever || self.busy_left > 0 {
            return Status::BUSY.bits();
        }
        self.status
    }

    fn decode_address(&self, ext: bool) -> (AddressMode, u64, usize) {
        let cur = |i: usize| self.lba[i][1] as u64;
        let prev = |i: usize| self.lba[i][0] as u64;
        if ext {
            let lba = cur(0) | cur(1) << 8 | cur(2) << 16 | prev(0) << 24 | prev(1) << 32 | prev(2) << 40;
            let count = ((self.sector_count[0] as usize) << 8) | self.sector_count[1] as usize;
            return (AddressMode::Lba48, lba, if count == 0 { 65536 } else { count });
        }
        let count = if self.sector_count[1] == 0 { 256 } else { self.sector_count[1] as usize };
        let head = (self.drive_select & 0x0F) as u64;
        if self.drive_select & 0x40 != 0 {
            (AddressMode::Lba28, cur(0) | cur(1) << 8 | cur(2) << 16 | head << 24, count)
        } else {
            let cylinder = cur(1) | cur(2) << 8;
            let lba = (cylinder * 16 + head) * 63 + cur(0).saturating_sub(1);
            (AddressMode::Chs, lba, count)
        }
    }

    fn command(&mut self, channel: usize, command: u8, log: &mut Vec<CommandRecord>) {
        let selected = self.selected();
        let Some(kind) = self.drives[selected].as_ref().map(|d| d.kind) else {
            return;
        };
        self.fifo.clear();
        self.pending = None;
        self.busy_forever = false;
        self.error = 0;
        self.busy_left = self.drives[selected].as_ref().map_or(0, |d| d.busy_polls);
        let ready = Status::DRIVE_READY.bits();
        let drq = ready | Status::REQUEST_READY.bits();
        let err = ready | Status::ERROR.bits();

        let ext = matches!(command, 0x24 | 0x34 | 0xEA);
        let (mode, lba, count) = self.decode_address(ext);
        log.push(CommandRecord { channel, drive: selected, command, mode, lba, count });

        match command {
            0xEC => match kind {
                SimKind::Ata => {
                    let words = self.drives[selected].as_ref().map(|d| d.identify).unwrap();
                    self.fifo.extend(words.iter().copied());
                    self.status = drq;
                    self.status_after_drain = ready;
                }
                SimKind::Atapi | SimKind::AtapiRejecting(_) => {
                    self.lba[1][1] = 0x14;
                    self.lba[2][1] = 0xEB;
                    self.error = ErrorBits::ABORTED.bits();
                    self.status = err;
                }
                SimKind::Unknown => {
                    self.lba[1][1] = 0x3C;
                    self.lba[2][1] = 0xC3;
                    self.error = ErrorBits::ABORTED.bits();
                    self.status = err;
                }
                SimKind::Stuck => self.busy_forever = true,
            },
            0xA1 => match kind {
                SimKind::Atapi => {
                    let words = self.drives[selected].as_ref().map(|d| d.identify).unwrap();
                    self.fifo.extend(words.iter().copied());
                    self.status = drq;
                    self.status_after_drain = ready;
                }
                SimKind::AtapiRejecting(code) => {
                    self.error = code;
                    self.status = err;
                }
                _ => {
                    self.error = ErrorBits::ABORTED.bits();
                    self.status = err;
                }
            },
            0x20 | 0x24 => {
                let drive = self.drives[selected].as_ref().unwrap();
                let served = drive.fail_read_after.map_or(count, |n| n.min(count));
                for s in 0..served {
                    let start = (lba as usize + s) * SECTOR_SIZE;
                    for w in 0..SECTOR_SIZE / 2 {
                        let byte = |i: usize| drive.image.get(start + 2 * w + i).copied().unwrap_or(0);
                        self.fifo.push_back(u16::from_le_bytes([byte(0), byte(1)]));
                    }
                }
                self.status_after_drain = if served < count { err } else { ready };
                self.status = if served == 0 { self.status_after_drain } else { drq };
            }
            0x30 | 0x34 => {
                self.pending = Some(PendingWrite { lba, remaining: count, words: Vec::new() });
                self.status = drq;
            }
            0xE7 | 0xEA => {
                if self.drives[selected].as_ref().unwrap().stall_on_flush {
                    self.busy_forever = true;
                }
                self.status = ready;
            }
            _ => {
                self.error = ErrorBits::ABORTED.bits();
                self.status = err;
            }
        }
    }

    fn read_data(&mut self) -> u16 {
        let word = self.fifo.pop_front().unwrap_or(0);
        if self.fifo.is_empty() {
            self.status = self.status_after_drain;
        }
        word
    }

    fn write_data(&mut self, word: u16) {
        let selected = self.selected();
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        pending.words.push(word);
        if pending.words.len() < SECTOR_SIZE / 2 {
            return;
        }
        let start = pending.lba as usize * SECTOR_SIZE;
        // Sectors past the end of the image are accepted and dropped.
        if let Some(drive) = self.drives[selected].as_mut().filter(|d| d.image.len() >= start + SECTOR_SIZE) {
            for (i, w) in pending.words.iter().enumerate() {
                drive.image[start + 2 * i..start + 2 * i + 2].copy_from_slice(&w.to_le_bytes());
            }
        }
        pending.words.clear();
        pending.lba += 1;
        pending.remaining -= 1;
        if pending.remaining == 0 {
            self.pending = None;
            self.status = Status::DRIVE_READY.bits();
        }
    }
}

struct SimState {
    channels: [ChannelState; 2],
    log: Vec<CommandRecord>,
}

pub struct SimBus {
    state: RefCell<SimState>,
}

impl SimBus {
    pub fn new(primary: Channel, secondary: Channel) -> Self {
        SimBus {
            state: RefCell::new(SimState {
                channels: [ChannelState::new(primary), ChannelState::new(secondary)],
                log: Vec::new(),
            }),
        }
    }

    pub fn legacy() -> Self {
        Self::new(Channel::PRIMARY_LEGACY, Channel::SECONDARY_LEGACY)
    }

    pub fn attach(self, channel: usize, position: usize, drive: SimDrive) -> Self {
        self.state.borrow_mut().channels[channel].drives[position] = Some(drive);
        self
    }

    pub fn commands(&self) -> Vec<CommandRecord> {
        self.state.borrow().log.clone()
    }

    pub fn transfer_commands(&self) -> Vec<CommandRecord> {
        self.commands().into_iter().filter(|c| !matches!(c.command, 0xEC | 0xA1)).collect()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().log.clear();
    }

    pub fn image(&self, channel: usize, position: usize) -> Vec<u8> {
        self.state.borrow().channels[channel].drives[position]
            .as_ref()
            .map_or_else(Vec::new, |d| d.image.clone())
    }

    pub fn control(&self, channel: usize) -> u8 {
        self.state.borrow().channels[channel].control
    }

    pub fn alt_status_reads(&self, channel: usize) -> usize {
        self.state.borrow().channels[channel].alt_status_reads
    }

    pub fn set_fail_read_after(&self, channel: usize, position: usize, sectors: Option<usize>) {
        if let Some(drive) = self.state.borrow_mut().channels[channel].drives[position].as_mut() {
            drive.fail_read_after = sectors;
        }
    }

    pub fn set_stall_on_flush(&self, channel: usize, position: usize) {
        if let Some(drive) = self.state.borrow_mut().channels[channel].drives[position].as_mut() {
            drive.stall_on_flush = true;
        }
    }

    /// Map a port to (channel, register offset, is_control).
    fn locate(state: &SimState, port: u16) -> Option<(usize, u16, bool)> {
        state.channels.iter().enumerate().find_map(|(i, ch)| {
            if port >= ch.ports.base && port < ch.ports.base + 8 {
                Some((i, port - ch.ports.base, false))
            } else if port == ch.ports.ctrl + ALT_STATUS {
                Some((i, ALT_STATUS, true))
            } else {
                None
            }
        })
    }
}

impl PortIo for SimBus {
    fn inb(&self, port: u16) -> u8 {
        let mut state = self.state.borrow_mut();
        let Some((i, reg, control)) = Self::locate(&state, port) else {
            return 0xFF;
        };
        let ch = &mut state.channels[i];
        if control {
            ch.alt_status_reads += 1;
            return ch.current_status();
        }
        match reg {
            ERROR_REG => ch.error,
            SECTOR_COUNT => ch.sector_count[1],
            LBA_LOW => ch.lba[0][1],
            LBA_MID => ch.lba[1][1],
            LBA_HIGH => ch.lba[2][1],
            DRIVE_SELECT => ch.drive_select,
            CMD_STATUS => {
                let status = ch.current_status();
                if ch.busy_left > 0 && !ch.busy_forever {
                    ch.busy_left -= 1;
                }
                status
            }
            _ => 0xFF,
        }
    }

    fn outb(&self, port: u16, value: u8) {
        if port == IO_WAIT_PORT {
            return;
        }
        let mut state = self.state.borrow_mut();
        let Some((i, reg, control)) = Self::locate(&state, port) else {
            return;
        };
        let SimState { channels, log } = &mut *state;
        let ch = &mut channels[i];
        if control {
            ch.control = value;
            return;
        }
        match reg {
            SECTOR_COUNT => ch.sector_count = [ch.sector_count[1], value],
            LBA_LOW | LBA_MID | LBA_HIGH => {
                let r = &mut ch.lba[(reg - LBA_LOW) as usize];
                *r = [r[1], value];
            }
            DRIVE_SELECT => ch.drive_select = value,
            CMD_STATUS => ch.command(i, value, log),
            _ => {}
        }
    }

    fn inw(&self, port: u16) -> u16 {
        let mut state = self.state.borrow_mut();
        match Self::locate(&state, port) {
            Some((i, DATA_REG, false)) => state.channels[i].read_data(),
            _ => 0xFFFF,
        }
    }

    fn outw(&self, port: u16, value: u16) {
        let mut state = self.state.borrow_mut();
        if let Some((i, DATA_REG, false)) = Self::locate(&state, port) {
            state.channels[i].write_data(value);
        }
    }
}

/// `sectors` zero-filled sectors with each sector's first eight bytes set
/// to its LBA.
pub fn numbered_image(sectors: usize) -> Vec<u8> {
    let mut image = vec![0u8; sectors * SECTOR_SIZE];
    for s in 0..sectors {
        image[s * SECTOR_SIZE..s * SECTOR_SIZE + 8].copy_from_slice(&(s as u64).to_le_bytes());
    }
    image
}
