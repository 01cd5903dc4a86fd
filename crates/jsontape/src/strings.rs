//! String decoding into the length-prefixed string buffer.
//!
//! Invoked by the tape builder at every opening quote. The decoder copies
//! the source in 16-byte blocks, storing each block to the destination
//! unconditionally before deciding whether it contained the closing quote,
//! a backslash, or a stray control byte; the string buffer is sized so
//! those whole-block stores can never overrun (see
//! [`StringBuffer::reserve_for`]). Escapes are resolved through a 256-entry
//! map, and `\uXXXX` escapes (including UTF-16 surrogate pairs) are decoded
//! to UTF-8 inline.

use crate::error::{Error, Result};
use crate::simd::{Backend, ByteVec, LANES};

/// These escapes yield themselves: `"`, `\`, `/`. The letters map to their
/// control characters; `u` is handled separately; zero marks an invalid
/// escape.
#[rustfmt::skip]
const ESCAPE_MAP: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0x0.
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0x22, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x2F, // 0x2.
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0x4.
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x5C, 0, 0, 0, // 0x5.
    0, 0, 0x08, 0, 0, 0, 0x0C, 0, 0, 0, 0, 0, 0, 0, 0x0A, 0, // 0x6.
    0, 0, 0x0D, 0, 0x09, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 0x7.
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Destination buffer for decoded strings.
///
/// Records are written sequentially: a 4-byte little-endian length, the
/// decoded bytes, a zero terminator. Storage stays fully resized so the
/// decoder can store whole blocks past the current write position.
pub(crate) struct StringBuffer {
    bytes: Vec<u8>,
    cursor: usize,
}

impl StringBuffer {
    pub(crate) fn new() -> Self {
        Self {
            bytes: Vec::new(),
            cursor: 0,
        }
    }

    /// Sizes the buffer from the input length. Decoded bytes never exceed
    /// their source, but each record adds five bytes of framing and an
    /// input as dense as `"",` pays that for every three source bytes, so
    /// the capacity is five thirds of the input plus block-store slack.
    pub(crate) fn reserve_for(&mut self, input_len: usize) -> Result<()> {
        let needed = 5 * input_len / 3 + 2 * LANES + 8;
        if self.bytes.len() < needed {
            self.bytes
                .try_reserve_exact(needed - self.bytes.len())
                .map_err(|_| Error::Allocation)?;
            self.bytes.resize(needed, 0);
        }
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.cursor = 0;
    }

    /// The bytes written so far.
    pub(crate) fn written(&self) -> &[u8] {
        &self.bytes[..self.cursor]
    }
}

/// Decodes the string whose opening quote sits at `offset`, appending a
/// record to `strings` and returning the record's buffer offset for the
/// tape payload.
///
/// `bytes` is the padded input slice; stage 1 has already established that
/// the string has a closing quote, so block reads stay inside the padding.
pub(crate) fn parse_string<B: Backend>(
    bytes: &[u8],
    offset: usize,
    strings: &mut StringBuffer,
) -> Result<u64> {
    let record_start = strings.cursor;
    // Space for the length prefix; patched when the closing quote is found.
    let payload_start = record_start + 4;

    let mut src = offset + 1;
    let mut dst = payload_start;
    loop {
        let block = B::Vec::load(&bytes[src..]);
        strings.bytes[dst..dst + LANES].copy_from_slice(&bytes[src..src + LANES]);

        let quote_bits = block.eq(B::Vec::splat(b'"')).movemask();
        let backslash_bits = block.eq(B::Vec::splat(b'\\')).movemask();
        let control_bits = block.lteq(0x1F).movemask();
        let quote_dist = quote_bits.trailing_zeros() as usize;
        let backslash_dist = backslash_bits.trailing_zeros() as usize;
        let control_dist = control_bits.trailing_zeros() as usize;

        if control_dist < quote_dist && control_dist < backslash_dist {
            return Err(Error::UnescapedChars);
        }
        if quote_dist < backslash_dist {
            // The closing quote came first: terminate and frame the record.
            dst += quote_dist;
            strings.bytes[dst] = 0;
            let len = u32::try_from(dst - payload_start).map_err(|_| Error::Capacity)?;
            strings.bytes[record_start..payload_start].copy_from_slice(&len.to_le_bytes());
            strings.cursor = dst + 1;
            return Ok(u64::try_from(record_start).map_err(|_| Error::Capacity)?);
        }
        if backslash_dist < quote_dist {
            src += backslash_dist;
            dst += backslash_dist;
            let escape_char = bytes[src + 1];
            if escape_char == b'u' {
                let (code_point, consumed) = decode_unicode_escape(bytes, src)?;
                src += consumed;
                dst += encode_utf8(code_point, &mut strings.bytes[dst..dst + 4]);
            } else {
                let replacement = ESCAPE_MAP[usize::from(escape_char)];
                if replacement == 0 {
                    return Err(Error::StringEscape);
                }
                strings.bytes[dst] = replacement;
                src += 2;
                dst += 1;
            }
        } else {
            // Neither delimiter in this block; both distances are LANES.
            src += LANES;
            dst += LANES;
        }
    }
}

/// Decodes `\uXXXX` starting at the backslash, joining a UTF-16 surrogate
/// pair when the first escape lands in the high-surrogate range. Returns
/// the code point and the number of source bytes consumed.
fn decode_unicode_escape(bytes: &[u8], backslash: usize) -> Result<(u32, usize)> {
    let first = hex_to_u32(&bytes[backslash + 2..backslash + 6]).ok_or(Error::StringEscape)?;
    if (0xD800..0xDC00).contains(&first) {
        // High surrogate: the low half must follow immediately.
        if bytes[backslash + 6] != b'\\' || bytes[backslash + 7] != b'u' {
            return Err(Error::StringEscape);
        }
        let second = hex_to_u32(&bytes[backslash + 8..backslash + 12]).ok_or(Error::StringEscape)?;
        if !(0xDC00..0xE000).contains(&second) {
            return Err(Error::StringEscape);
        }
        let code_point = (((first - 0xD800) << 10) | (second - 0xDC00)) + 0x10000;
        Ok((code_point, 12))
    } else if (0xDC00..0xE000).contains(&first) {
        // A lone low surrogate never forms a scalar value.
        Err(Error::StringEscape)
    } else {
        Ok((first, 6))
    }
}

fn hex_digit(byte: u8) -> Option<u32> {
    match byte {
        b'0'..=b'9' => Some(u32::from(byte - b'0')),
        b'a'..=b'f' => Some(u32::from(byte - b'a') + 10),
        b'A'..=b'F' => Some(u32::from(byte - b'A') + 10),
        _ => None,
    }
}

fn hex_to_u32(digits: &[u8]) -> Option<u32> {
    let mut acc = 0u32;
    for &d in &digits[..4] {
        acc = (acc << 4) | hex_digit(d)?;
    }
    Some(acc)
}

/// Encodes a code point as 1-4 UTF-8 bytes into `out`, returning the
/// length. Surrogates never reach here; the escape decoder has already
/// combined or rejected them.
#[expect(clippy::cast_possible_truncation)]
fn encode_utf8(code_point: u32, out: &mut [u8]) -> usize {
    if code_point < 0x80 {
        out[0] = code_point as u8;
        1
    } else if code_point < 0x800 {
        out[0] = 0xC0 | (code_point >> 6) as u8;
        out[1] = 0x80 | (code_point & 0x3F) as u8;
        2
    } else if code_point < 0x10000 {
        out[0] = 0xE0 | (code_point >> 12) as u8;
        out[1] = 0x80 | ((code_point >> 6) & 0x3F) as u8;
        out[2] = 0x80 | (code_point & 0x3F) as u8;
        3
    } else {
        out[0] = 0xF0 | (code_point >> 18) as u8;
        out[1] = 0x80 | ((code_point >> 12) & 0x3F) as u8;
        out[2] = 0x80 | ((code_point >> 6) & 0x3F) as u8;
        out[3] = 0x80 | (code_point & 0x3F) as u8;
        4
    }
}
