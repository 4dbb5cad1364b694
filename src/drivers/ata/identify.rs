use bit_field::BitField;
use heapless::String;

use super::regs::*;

pub const MODEL_LEN: usize = IDENT_MODEL_WORDS * 2;

/// Fields of the 256-word IDENTIFY (PACKET) DEVICE block the driver uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyData {
    pub signature: u16,
    pub features: u16,
    pub command_sets: u32,
    /// Capacity in 512-byte sectors.
    pub size: u64,
    pub model: String<MODEL_LEN>,
}

impl IdentifyData {
    pub fn parse(words: &[u16; 256]) -> Self {
        let dword = |offset: usize| (words[offset] as u32) | ((words[offset + 1] as u32) << 16);

        let command_sets = dword(IDENT_COMMAND_SETS);
        let size = if command_sets & COMMAND_SETS_USES_48_BIT != 0 {
            let mut size = 0u64;
            for (i, word) in words[IDENT_MAX_LBA_EXT..IDENT_MAX_LBA_EXT + 4].iter().enumerate() {
                size.set_bits(i * 16..(i + 1) * 16, *word as u64);
            }
            size
        } else {
            dword(IDENT_MAX_LBA) as u64
        };

        IdentifyData {
            signature: words[IDENT_DEVICE_TYPE],
            features: words[IDENT_FEATURES],
            command_sets,
            size,
            model: decode_model(&words[IDENT_MODEL..IDENT_MODEL + IDENT_MODEL_WORDS]),
        }
    }
}

/// ATA strings store two characters per word, first character in the high
/// byte. Trailing spaces are padding.
fn decode_model(words: &[u16]) -> String<MODEL_LEN> {
    let mut raw = [b' '; MODEL_LEN];
    for (i, word) in words.iter().enumerate() {
        raw[2 * i] = word.get_bits(8..16) as u8;
        raw[2 * i + 1] = word.get_bits(0..8) as u8;
    }
    let end = raw.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);

    let mut model = String::new();
    for &b in &raw[..end] {
        let c = if b.is_ascii() && b != 0 { b as char } else { '?' };
        // Cannot overflow: at most MODEL_LEN one-byte chars.
        let _ = model.push(c);
    }
    model
}

#[cfg(test)]
pub(crate) fn encode_model(words: &mut [u16; 256], model: &str) {
    let mut raw = [b' '; MODEL_LEN];
    raw[..model.len()].copy_from_slice(model.as_bytes());
    for i in 0..IDENT_MODEL_WORDS {
        words[IDENT_MODEL + i] = ((raw[2 * i] as u16) << 8) | raw[2 * i + 1] as u16;
    }
}
