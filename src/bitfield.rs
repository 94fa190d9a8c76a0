//! Integer and sub-byte field codec
//!
//! Slot telemetry packs several counters of odd widths into one 48- or 80-bit
//! group. Packing and unpacking go through a binary string and are not
//! symmetric: packing left-pads the concatenated fields to a byte boundary,
//! unpacking reads the fields right-aligned from the tail of the string.

/// Widths of a 6-byte step slot: mode, steps, active minutes, calories, distance, wear
pub const STEP_SLOT_WIDTHS: [u8; 6] = [2, 12, 4, 10, 12, 8];

/// Widths of a 10-byte sport slot: sport, duration, steps, calories, distance, avg hr, max hr
pub const SPORT_SLOT_WIDTHS: [u8; 7] = [6, 10, 16, 14, 18, 8, 8];

/// Read up to eight bytes as an unsigned integer
pub fn bytes_to_uint(bytes: &[u8], big_endian: bool) -> u64 {
    let bytes = &bytes[..bytes.len().min(8)];
    let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
    if big_endian {
        bytes.iter().fold(0, fold)
    } else {
        bytes.iter().rev().fold(0, fold)
    }
}

/// Read up to eight bytes as a two's-complement signed integer
pub fn bytes_to_int(bytes: &[u8], big_endian: bool) -> i64 {
    let len = bytes.len().min(8);
    if len == 0 {
        return 0;
    }
    let raw = bytes_to_uint(bytes, big_endian);
    let shift = 64 - 8 * len as u32;
    ((raw << shift) as i64) >> shift
}

fn to_binary_string(value: u32, width: u8) -> String {
    let masked = if width >= 32 {
        value
    } else {
        value & ((1u32 << width) - 1)
    };
    format!("{:0width$b}", masked, width = width as usize)
}

/// Pack `(value, width)` pairs, first field in the most significant bits
///
/// Values wider than their field are masked. The result is left-padded with
/// zero bits to a whole number of bytes.
pub fn pack_bits(fields: &[(u32, u8)]) -> Vec<u8> {
    let mut bits: String = fields
        .iter()
        .map(|&(value, width)| to_binary_string(value, width))
        .collect();
    let pad = (8 - bits.len() % 8) % 8;
    bits.insert_str(0, &"0".repeat(pad));

    bits.as_bytes()
        .chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, c| (acc << 1) | (c - b'0')))
        .collect()
}

/// Unpack fields of the given widths, right-aligned at the end of `bytes`
pub fn unpack_bits(bytes: &[u8], widths: &[u8]) -> Vec<u32> {
    let mut bits: String = bytes.iter().map(|b| format!("{:08b}", b)).collect();
    let total: usize = widths.iter().map(|&w| w as usize).sum();
    if total > bits.len() {
        bits.insert_str(0, &"0".repeat(total - bits.len()));
    }

    let mut cursor = bits.len() - total;
    widths
        .iter()
        .map(|&width| {
            let field = &bits[cursor..cursor + width as usize];
            cursor += width as usize;
            if field.is_empty() {
                0
            } else {
                u32::from_str_radix(field, 2).unwrap_or(0)
            }
        })
        .collect()
}
