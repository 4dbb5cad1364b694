//! Directory slots and long-file-name reconstruction.

use alloc::string::String;
use alloc::vec::Vec;
use core::ops::ControlFlow;

use bit_field::BitField;
use bitflags::bitflags;

use super::boot::{le16, le32};
use crate::drivers::block::SECTOR_SIZE;

pub const DIR_ENTRY_SIZE: usize = 32;
pub const ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / DIR_ENTRY_SIZE;

const END_OF_DIRECTORY: u8 = 0x00;
const DELETED_ENTRY: u8 = 0xE5;
/// A leading 0x05 stands for a real 0xE5 in the first name byte.
const ESCAPED_E5: u8 = 0x05;
const LONG_NAME_ATTR: u8 = 0x0F;

/// UTF-16 units carried by one long-name slot.
pub const LFN_UNITS_PER_SLOT: usize = 13;
const LFN_UNIT_OFFSETS: [usize; LFN_UNITS_PER_SLOT] =
    [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileAttributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN    = 0x02;
        const SYSTEM    = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE   = 0x20;
    }
}

// ──────────────────────────────────────────────
// Timestamps
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// Packed DOS date and time words.
    pub fn decode(date: u16, time: u16) -> Self {
        Timestamp {
            year: 1980 + date.get_bits(9..16),
            month: date.get_bits(5..9) as u8,
            day: date.get_bits(0..5) as u8,
            hour: time.get_bits(11..16) as u8,
            minute: time.get_bits(5..11) as u8,
            second: time.get_bits(0..5) as u8 * 2,
        }
    }
}

// ──────────────────────────────────────────────
// Raw slots
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortEntry {
    pub name: [u8; 8],
    pub ext: [u8; 3],
    pub attributes: FileAttributes,
    pub created: Timestamp,
    pub modified: Timestamp,
    pub first_cluster: u32,
    pub size: u32,
}

impl ShortEntry {
    fn decode(raw: &[u8; DIR_ENTRY_SIZE]) -> Self {
        let mut name = [0u8; 8];
        let mut ext = [0u8; 3];
        name.copy_from_slice(&raw[0..8]);
        ext.copy_from_slice(&raw[8..11]);
        if name[0] == ESCAPED_E5 {
            name[0] = DELETED_ENTRY;
        }

        ShortEntry {
            name,
            ext,
            attributes: FileAttributes::from_bits_retain(raw[11]),
            created: Timestamp::decode(le16(raw, 16), le16(raw, 14)),
            modified: Timestamp::decode(le16(raw, 24), le16(raw, 22)),
            first_cluster: ((le16(raw, 20) as u32) << 16) | le16(raw, 26) as u32,
            size: le32(raw, 28),
        }
    }

    /// `NAME.EXT`, or just `NAME` when the extension is blank.
    pub fn display_name(&self) -> String {
        let mut out = String::new();
        push_trimmed(&mut out, &self.name);
        if self.ext.iter().any(|&b| b != b' ') {
            out.push('.');
            push_trimmed(&mut out, &self.ext);
        }
        out
    }

    pub fn is_directory(&self) -> bool {
        self.attributes.contains(FileAttributes::DIRECTORY)
    }
}

fn push_trimmed(out: &mut String, bytes: &[u8]) {
    let len = bytes.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    out.extend(bytes[..len].iter().map(|&b| char::from(b)));
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongNameSlot {
    pub order: u8,
    pub checksum: u8,
    pub units: [u16; LFN_UNITS_PER_SLOT],
}

impl LongNameSlot {
    fn decode(raw: &[u8; DIR_ENTRY_SIZE]) -> Self {
        let mut units = [0u16; LFN_UNITS_PER_SLOT];
        for (unit, &offset) in units.iter_mut().zip(LFN_UNIT_OFFSETS.iter()) {
            *unit = le16(raw, offset);
        }
        LongNameSlot { order: raw[0], checksum: raw[13], units }
    }

    /// 1-based position of this fragment within the name.
    pub fn index(&self) -> usize {
        self.order.get_bits(0..4) as usize
    }

    /// Characters up to the first NUL.
    pub fn chars(&self) -> &[u16] {
        let len = self.units.iter().position(|&u| u == 0).unwrap_or(LFN_UNITS_PER_SLOT);
        &self.units[..len]
    }
}

/// One 32-byte directory slot, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    End,
    Deleted,
    LongName(LongNameSlot),
    VolumeLabel,
    Short(ShortEntry),
}

impl Slot {
    pub fn decode(raw: &[u8; DIR_ENTRY_SIZE]) -> Self {
        let attributes = raw[11];
        match raw[0] {
            END_OF_DIRECTORY => Slot::End,
            DELETED_ENTRY => Slot::Deleted,
            _ if attributes == LONG_NAME_ATTR => Slot::LongName(LongNameSlot::decode(raw)),
            _ if attributes & FileAttributes::VOLUME_ID.bits() != 0 => Slot::VolumeLabel,
            _ => Slot::Short(ShortEntry::decode(raw)),
        }
    }
}

// ──────────────────────────────────────────────
// Long name reconstruction
// ──────────────────────────────────────────────

/// Long name under reconstruction. Fragments may arrive in any order;
/// each lands at its own offset.
#[derive(Debug, Default, Clone)]
pub struct LongName {
    units: Vec<u16>,
}

impl LongName {
    pub const fn new() -> Self {
        LongName { units: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Fragments numbered 0 have no valid position and are ignored.
    pub fn apply(&mut self, slot: &LongNameSlot) {
        let Some(offset) = (slot.index() * LFN_UNITS_PER_SLOT).checked_sub(LFN_UNITS_PER_SLOT)
        else {
            return;
        };
        let chars = slot.chars();
        if self.units.len() < offset {
            self.units.resize(offset, u16::from(b' '));
        }
        for (i, &unit) in chars.iter().enumerate() {
            match self.units.get_mut(offset + i) {
                Some(existing) => *existing = unit,
                None => self.units.push(unit),
            }
        }
    }

    /// Decode the accumulated name and reset for the next entry.
    pub fn take(&mut self) -> Option<String> {
        if self.units.is_empty() {
            return None;
        }
        let name = char::decode_utf16(self.units.drain(..))
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        Some(name)
    }
}

// ──────────────────────────────────────────────
// Directory listing
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_directory: bool,
    pub attributes: FileAttributes,
    pub first_cluster: u32,
    pub size: u32,
    pub modified: Timestamp,
}

impl DirEntry {
    fn from_short(entry: &ShortEntry, long_name: Option<String>) -> Self {
        DirEntry {
            name: long_name.unwrap_or_else(|| entry.display_name()),
            is_directory: entry.is_directory(),
            attributes: entry.attributes,
            first_cluster: entry.first_cluster,
            size: entry.size,
            modified: entry.modified,
        }
    }
}

/// Advance the slot state machine by one slot. `Break` means the
/// end-of-directory marker was reached.
pub fn step(long_name: &mut LongName, slot: Slot) -> ControlFlow<(), Option<DirEntry>> {
    match slot {
        Slot::End => ControlFlow::Break(()),
        // Neither of these touches a name under reconstruction.
        Slot::Deleted | Slot::VolumeLabel => ControlFlow::Continue(None),
        Slot::LongName(fragment) => {
            long_name.apply(&fragment);
            ControlFlow::Continue(None)
        }
        Slot::Short(entry) => {
            ControlFlow::Continue(Some(DirEntry::from_short(&entry, long_name.take())))
        }
    }
}

/// Collects entries from consecutive directory sectors.
#[derive(Debug, Default)]
pub struct DirectoryParser {
    long_name: LongName,
    entries: Vec<DirEntry>,
    finished: bool,
}

impl DirectoryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Break` once the end marker has been seen; later sectors
    /// are not looked at.
    pub fn feed_sector(&mut self, sector: &[u8; SECTOR_SIZE]) -> ControlFlow<()> {
        if self.finished {
            return ControlFlow::Break(());
        }
        for raw in sector.chunks_exact(DIR_ENTRY_SIZE) {
            let mut slot = [0u8; DIR_ENTRY_SIZE];
            slot.copy_from_slice(raw);
            if self.feed(&slot).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Single-slot form of [`feed_sector`](Self::feed_sector).
    pub fn feed(&mut self, raw: &[u8; DIR_ENTRY_SIZE]) -> ControlFlow<()> {
        if self.finished {
            return ControlFlow::Break(());
        }
        match step(&mut self.long_name, Slot::decode(raw)) {
            ControlFlow::Break(()) => {
                self.finished = true;
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(Some(entry)) => self.entries.push(entry),
            ControlFlow::Continue(None) => {}
        }
        ControlFlow::Continue(())
    }

    pub fn finish(self) -> Vec<DirEntry> {
        self.entries
    }
}
