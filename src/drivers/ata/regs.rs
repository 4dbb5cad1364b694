use bitflags::bitflags;

// ──────────────────────────────────────────────────────────────
//  Port offsets
// ──────────────────────────────────────────────────────────────

// Relative to the channel's base port.
pub const DATA_REG: u16     = 0; // R/W data (16-bit)
pub const ERROR_REG: u16    = 1; // R: error / W: features
pub const SECTOR_COUNT: u16 = 2;
pub const LBA_LOW: u16      = 3;
pub const LBA_MID: u16      = 4;
pub const LBA_HIGH: u16     = 5;
pub const DRIVE_SELECT: u16 = 6;
pub const CMD_STATUS: u16   = 7; // R: status / W: command

// Relative to the channel's control port.
pub const ALT_STATUS: u16 = 2; // R: alternate status / W: device control

/// Device control: nIEN, no interrupts from the drive.
pub const CONTROL_NIEN: u8 = 0x02;

// ──────────────────────────────────────────────────────────────
//  Register bits
// ──────────────────────────────────────────────────────────────

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        const BUSY              = 0x80;
        const DRIVE_READY       = 0x40;
        const DRIVE_WRITE_FAULT = 0x20;
        const SEEK_COMPLETE     = 0x10;
        const REQUEST_READY     = 0x08;
        const CORRECTED_DATA    = 0x04;
        const INDEX             = 0x02;
        const ERROR             = 0x01;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ErrorBits: u8 {
        const BAD_BLOCK             = 0x80;
        const UNCORRECTABLE         = 0x40;
        const MEDIA_CHANGED         = 0x20;
        const ID_MARK_NOT_FOUND     = 0x10;
        const MEDIA_CHANGE_REQUEST  = 0x08;
        const ABORTED               = 0x04;
        const TRACK_0_NOT_FOUND     = 0x02;
        const NO_ADDRESS_MARK       = 0x01;
    }
}

// ──────────────────────────────────────────────────────────────
//  Commands
// ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    ReadPio        = 0x20,
    ReadPioExt     = 0x24,
    WritePio       = 0x30,
    WritePioExt    = 0x34,
    Identify       = 0xEC,
    IdentifyPacket = 0xA1,
    CacheFlush     = 0xE7,
    CacheFlushExt  = 0xEA,
}

// ──────────────────────────────────────────────────────────────
//  Drive select
// ──────────────────────────────────────────────────────────────

/// Bits 5 and 7 are obsolete but must read as set.
pub const DRIVE_SELECT_BASE: u8 = 0xA0;
pub const DRIVE_SELECT_LBA_BIT: usize = 6;
pub const DRIVE_SELECT_SLAVE_BIT: usize = 4;

// ──────────────────────────────────────────────────────────────
//  IDENTIFY data (word offsets)
// ──────────────────────────────────────────────────────────────

pub const IDENT_DEVICE_TYPE: usize  = 0;
pub const IDENT_MODEL: usize        = 27;
pub const IDENT_MODEL_WORDS: usize  = 20;
pub const IDENT_FEATURES: usize     = 49;
pub const IDENT_MAX_LBA: usize      = 60;
pub const IDENT_COMMAND_SETS: usize = 82;
pub const IDENT_MAX_LBA_EXT: usize  = 100;

pub const FEATURES_SUPPORTS_LBA: u16 = 1 << 9;
pub const COMMAND_SETS_USES_48_BIT: u32 = 1 << 26;

/// LBA mid/high after an aborted IDENTIFY on a packet device.
pub const ATAPI_SIGNATURES: [u16; 2] = [0xEB14, 0x9669];
