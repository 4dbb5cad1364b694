use bit_field::BitField;
use core::fmt;
use heapless::String;

use crate::drivers::block::sectors_for;
use crate::drivers::port::{io_wait, PortIo};

use super::channel::ChannelBus;
use super::identify::{IdentifyData, MODEL_LEN};
use super::regs::*;

// ──────────────────────────────────────────────────────────────
//  Outcomes
// ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtaError {
    /// ERR set in the status register.
    Error,
    DriveWriteFault,
    /// No error, but DRQ never came up.
    RequestNotReady,
    /// The poll limit ran out with the drive still busy.
    Unresponsive,
}

impl fmt::Display for AtaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AtaError::Error           => write!(f, "drive reported an error"),
            AtaError::DriveWriteFault => write!(f, "drive write fault"),
            AtaError::RequestNotReady => write!(f, "data request not ready"),
            AtaError::Unresponsive    => write!(f, "drive unresponsive"),
        }
    }
}

pub type AtaResult<T> = Result<T, AtaError>;

/// Outcome of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingResult {
    Success,
    Error,
    DriveWriteFault,
    RequestNotReady,
    Unresponsive,
}

impl PollingResult {
    pub fn is_success(self) -> bool {
        self == PollingResult::Success
    }
}

impl From<AtaResult<()>> for PollingResult {
    fn from(result: AtaResult<()>) -> Self {
        match result {
            Ok(()) => PollingResult::Success,
            Err(AtaError::Error) => PollingResult::Error,
            Err(AtaError::DriveWriteFault) => PollingResult::DriveWriteFault,
            Err(AtaError::RequestNotReady) => PollingResult::RequestNotReady,
            Err(AtaError::Unresponsive) => PollingResult::Unresponsive,
        }
    }
}

/// Outcome of the identification handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifyResult {
    Success(Device),
    NoDevice,
    UnknownDeviceType,
    /// Contents of the error register.
    RequestError(u8),
    Unresponsive,
}

// ──────────────────────────────────────────────────────────────
//  Addressing
// ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelId {
    Primary,
    Secondary,
}

impl ChannelId {
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrivePosition {
    Master,
    Slave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Ata,
    Atapi,
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InterfaceKind::Ata   => write!(f, "ATA"),
            InterfaceKind::Atapi => write!(f, "ATAPI"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Chs,
    Lba28,
    Lba48,
}

/// First LBA that no longer fits in 28 bits.
pub const LBA48_THRESHOLD: u64 = 0x1000_0000;

impl AddressMode {
    pub fn select(lba: u64, supports_lba: bool) -> Self {
        if lba >= LBA48_THRESHOLD {
            AddressMode::Lba48
        } else if supports_lba {
            AddressMode::Lba28
        } else {
            AddressMode::Chs
        }
    }

    fn command(self, direction: Direction) -> Command {
        match (direction, self) {
            (Direction::Read, AddressMode::Lba48)  => Command::ReadPioExt,
            (Direction::Read, _)                   => Command::ReadPio,
            (Direction::Write, AddressMode::Lba48) => Command::WritePioExt,
            (Direction::Write, _)                  => Command::WritePio,
        }
    }

    fn flush_command(self) -> Command {
        match self {
            AddressMode::Lba48 => Command::CacheFlushExt,
            _ => Command::CacheFlush,
        }
    }
}

/// Legacy geometry: 16 heads, 63 sectors per track.
pub const CHS_HEADS: u32 = 16;
pub const CHS_SECTORS_PER_TRACK: u32 = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chs {
    pub cylinder: u32,
    pub head: u8,
    /// 1-based.
    pub sector: u8,
}

impl Chs {
    pub fn from_lba(lba: u32) -> Self {
        let sector = lba % CHS_SECTORS_PER_TRACK + 1;
        let track_start = lba + 1 - sector;
        Chs {
            cylinder: track_start / (CHS_HEADS * CHS_SECTORS_PER_TRACK),
            head: (track_start % (CHS_HEADS * CHS_SECTORS_PER_TRACK) / CHS_SECTORS_PER_TRACK) as u8,
            sector: sector as u8,
        }
    }

    pub fn to_lba(self) -> u32 {
        (self.cylinder * CHS_HEADS + self.head as u32) * CHS_SECTORS_PER_TRACK + self.sector as u32 - 1
    }
}

/// Register contents for one transfer command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskFile {
    pub mode: AddressMode,
    pub drive_select: u8,
    pub sector_count: u8,
    /// LBA bytes 0..6, or sector / cylinder low / cylinder high in CHS mode.
    pub lba_io: [u8; 6],
}

impl TaskFile {
    pub fn new(lba: u64, supports_lba: bool, position: DrivePosition, sector_count: u8) -> Self {
        let mode = AddressMode::select(lba, supports_lba);
        let mut lba_io = [0u8; 6];
        let head: u8;

        match mode {
            AddressMode::Lba48 => {
                for (i, byte) in lba_io.iter_mut().enumerate() {
                    *byte = lba.get_bits(i * 8..(i + 1) * 8) as u8;
                }
                head = 0;
            }
            AddressMode::Lba28 => {
                for (i, byte) in lba_io.iter_mut().take(3).enumerate() {
                    *byte = lba.get_bits(i * 8..(i + 1) * 8) as u8;
                }
                head = lba.get_bits(24..28) as u8;
            }
            AddressMode::Chs => {
                let chs = Chs::from_lba(lba as u32);
                lba_io[0] = chs.sector;
                lba_io[1] = chs.cylinder.get_bits(0..8) as u8;
                lba_io[2] = chs.cylinder.get_bits(8..16) as u8;
                head = chs.head;
            }
        }

        let mut drive_select = DRIVE_SELECT_BASE;
        drive_select.set_bit(DRIVE_SELECT_LBA_BIT, mode != AddressMode::Chs);
        drive_select.set_bit(DRIVE_SELECT_SLAVE_BIT, position == DrivePosition::Slave);
        drive_select |= head;

        TaskFile { mode, drive_select, sector_count, lba_io }
    }
}

/// Buffer side of a transfer; its length decides the sector count.
pub enum Transfer<'b> {
    Read(&'b mut [u8]),
    Write(&'b [u8]),
}

impl Transfer<'_> {
    pub fn direction(&self) -> Direction {
        match self {
            Transfer::Read(_) => Direction::Read,
            Transfer::Write(_) => Direction::Write,
        }
    }

    fn len(&self) -> usize {
        match self {
            Transfer::Read(buf) => buf.len(),
            Transfer::Write(buf) => buf.len(),
        }
    }
}

// ──────────────────────────────────────────────────────────────
//  Device
// ──────────────────────────────────────────────────────────────

/// One identified drive. Immutable once identification succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    channel: ChannelId,
    position: DrivePosition,
    interface: InterfaceKind,
    signature: u16,
    features: u16,
    command_sets: u32,
    size: u64,
    model: String<MODEL_LEN>,
}

impl Device {
    /// Run IDENTIFY (falling back to IDENTIFY PACKET for ATAPI drives) on
    /// the drive at `position` of the channel behind `bus`.
    pub fn identify<P: PortIo + ?Sized>(
        bus: &ChannelBus<'_, P>,
        channel: ChannelId,
        position: DrivePosition,
    ) -> IdentifyResult {
        let mut select = DRIVE_SELECT_BASE;
        select.set_bit(DRIVE_SELECT_SLAVE_BIT, position == DrivePosition::Slave);
        bus.write_drive_select(select);
        io_wait(bus.io());

        bus.write_command(Command::Identify);
        io_wait(bus.io());

        bus.delay_400ns();
        if bus.read_status().is_empty() {
            return IdentifyResult::NoDevice;
        }

        let status = match bus.wait_identify() {
            Ok(status) => status,
            Err(_) => return IdentifyResult::Unresponsive,
        };

        let mut interface = InterfaceKind::Ata;
        if status.contains(Status::ERROR) {
            // Packet devices abort IDENTIFY and leave their signature behind.
            if !ATAPI_SIGNATURES.contains(&bus.read_signature()) {
                return IdentifyResult::UnknownDeviceType;
            }
            interface = InterfaceKind::Atapi;
            bus.write_command(Command::IdentifyPacket);
            io_wait(bus.io());
        }

        match bus.wait_request_ready() {
            Ok(status) if status.contains(Status::ERROR) => {
                return IdentifyResult::RequestError(bus.read_error());
            }
            Ok(_) => {}
            Err(_) => return IdentifyResult::Unresponsive,
        }

        let mut words = [0u16; 256];
        bus.read_words(&mut words);
        let data = IdentifyData::parse(&words);

        IdentifyResult::Success(Device {
            channel,
            position,
            interface,
            signature: data.signature,
            features: data.features,
            command_sets: data.command_sets,
            size: data.size,
            model: data.model,
        })
    }

    /// Move `min(len / 512, 255)` sectors starting at `lba` in one command.
    /// A buffer holding no whole sector is a no-op that never touches the
    /// bus: a sector count of 0 would ask the drive for 256 sectors.
    pub fn access<P: PortIo + ?Sized>(
        &self,
        bus: &ChannelBus<'_, P>,
        lba: u64,
        transfer: Transfer<'_>,
    ) -> PollingResult {
        let result = self.run_command(bus, lba, transfer);
        if let Err(err) = result {
            crate::log_debug!("ATA: transfer at LBA {} on {} failed: {}", lba, self.model(), err);
        }
        result.into()
    }

    fn run_command<P: PortIo + ?Sized>(
        &self,
        bus: &ChannelBus<'_, P>,
        lba: u64,
        transfer: Transfer<'_>,
    ) -> AtaResult<()> {
        let sector_count = sectors_for(transfer.len());
        if sector_count == 0 {
            return Ok(());
        }
        let task = TaskFile::new(lba, self.supports_lba(), self.position, sector_count as u8);

        bus.wait_not_busy()?;
        bus.write_drive_select(task.drive_select);

        // 48-bit registers are double latched: high-order bytes go first.
        if task.mode == AddressMode::Lba48 {
            bus.write_sector_count(0);
            bus.write_lba(task.lba_io[3], task.lba_io[4], task.lba_io[5]);
        }
        bus.write_sector_count(task.sector_count);
        bus.write_lba(task.lba_io[0], task.lba_io[1], task.lba_io[2]);

        bus.write_command(task.mode.command(transfer.direction()));
        match transfer {
            Transfer::Read(buf) => bus.read_sectors(sector_count, buf),
            Transfer::Write(buf) => {
                bus.write_sectors(sector_count, buf)?;
                bus.write_command(task.mode.flush_command());
                bus.poll(false)
            }
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn position(&self) -> DrivePosition {
        self.position
    }

    pub fn interface(&self) -> InterfaceKind {
        self.interface
    }

    pub fn signature(&self) -> u16 {
        self.signature
    }

    pub fn features(&self) -> u16 {
        self.features
    }

    pub fn command_sets(&self) -> u32 {
        self.command_sets
    }

    /// Capacity in 512-byte sectors.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn model(&self) -> &str {
        self.model.as_str()
    }

    pub fn supports_lba(&self) -> bool {
        self.features & FEATURES_SUPPORTS_LBA != 0
    }

    pub fn supports_lba48(&self) -> bool {
        self.command_sets & COMMAND_SETS_USES_48_BIT != 0
    }
}
