//! Number decoding onto the tape.
//!
//! Accepts exactly the JSON number grammar: optional minus, an integer
//! part that is `0` or starts with a nonzero digit, an optional fraction,
//! an optional exponent. Integers land on the tape as `l` (or `u` when the
//! value exceeds `i64::MAX` but fits `u64`); everything else becomes a
//! correctly rounded binary64 `d`.
//!
//! The float conversion runs three tiers. Small exponents with a
//! 53-bit-safe significand multiply or divide by an exact power of ten.
//! The general case multiplies the normalized significand by a truncated
//! 128-bit power of five, refines the one ambiguous tie pattern with a
//! second multiplication, rounds to nearest-even, and assembles the IEEE
//! word, emitting subnormals when the exponent bottoms out. Only inputs
//! with more than 19 significant digits fall back to the standard
//! library's correctly rounded parser, and infinities are rejected
//! everywhere.

mod tables;

use crate::error::{Error, Result};
use crate::tape::Tape;
use tables::{LARGEST_POWER, POWER_OF_FIVE_128, POWER_OF_TEN, SMALLEST_POWER};

/// Largest significand whose conversion to double is lossless.
const MAX_SAFE_SIGNIFICAND: u64 = (1 << 53) - 1;

/// Bytes allowed directly after a number: the four JSON whitespace bytes
/// and the six structural bytes.
#[rustfmt::skip]
const STRUCTURAL_OR_WHITESPACE: [bool; 256] = {
    let mut table = [false; 256];
    table[b' ' as usize] = true;
    table[b'\t' as usize] = true;
    table[b'\n' as usize] = true;
    table[b'\r' as usize] = true;
    table[b'{' as usize] = true;
    table[b'}' as usize] = true;
    table[b'[' as usize] = true;
    table[b']' as usize] = true;
    table[b':' as usize] = true;
    table[b',' as usize] = true;
    table
};

/// True when the byte may legally terminate a scalar, or the scalar runs
/// to the very end of the document (the padding there is zero-filled).
#[inline]
pub(crate) fn is_valid_scalar_end(bytes: &[u8], at: usize, doc_len: usize) -> bool {
    at == doc_len || STRUCTURAL_OR_WHITESPACE[usize::from(bytes[at])]
}

#[inline]
fn digit(byte: u8) -> Option<u64> {
    if byte.is_ascii_digit() {
        Some(u64::from(byte - b'0'))
    } else {
        None
    }
}

/// Checks whether the eight bytes at `at` are all ASCII digits with two
/// rounds of byte-parallel range arithmetic on one 64-bit load.
#[inline]
fn is_made_of_eight_digits_fast(bytes: &[u8], at: usize) -> bool {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    let val = u64::from_le_bytes(raw);
    ((val & 0xF0F0_F0F0_F0F0_F0F0)
        | (((val.wrapping_add(0x0606_0606_0606_0606)) & 0xF0F0_F0F0_F0F0_F0F0) >> 4))
        == 0x3333_3333_3333_3333
}

/// Converts eight ASCII digits to their value with three multiply-shift
/// steps instead of eight multiply-adds.
#[inline]
fn parse_eight_digits_unrolled(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    let mut val = u64::from_le_bytes(raw);
    val = (val & 0x0F0F_0F0F_0F0F_0F0F).wrapping_mul(2561) >> 8;
    val = (val & 0x00FF_00FF_00FF_00FF).wrapping_mul(6_553_601) >> 16;
    (val & 0x0000_FFFF_0000_FFFF).wrapping_mul(42_949_672_960_001) >> 32
}

/// Parses the number starting at `offset` and writes it to `tape`.
///
/// `bytes` is the padded input; digit loops stop naturally at the
/// zero-filled padding and the terminator check accepts the document end.
pub(crate) fn parse_number(
    bytes: &[u8],
    offset: usize,
    doc_len: usize,
    tape: &mut Tape,
) -> Result<()> {
    let negative = bytes[offset] == b'-';
    let mut p = offset + usize::from(negative);

    let start_digits = p;
    let mut i: u64 = 0;
    while let Some(d) = digit(bytes[p]) {
        // May wrap for very long digit strings; the digit-count checks
        // below decide whether the accumulated value is trustworthy.
        i = i.wrapping_mul(10).wrapping_add(d);
        p += 1;
    }
    let mut digit_count = p - start_digits;
    if digit_count == 0 || (bytes[start_digits] == b'0' && digit_count > 1) {
        return Err(Error::Number);
    }

    let mut exponent: i64 = 0;
    let mut is_float = false;
    if bytes[p] == b'.' {
        is_float = true;
        p += 1;
        let first_after_period = p;
        // Fractions often carry long digit runs; take them eight at a time.
        if is_made_of_eight_digits_fast(bytes, p) {
            i = i
                .wrapping_mul(100_000_000)
                .wrapping_add(parse_eight_digits_unrolled(bytes, p));
            p += 8;
        }
        while let Some(d) = digit(bytes[p]) {
            i = i.wrapping_mul(10).wrapping_add(d);
            p += 1;
        }
        if p == first_after_period {
            return Err(Error::Number);
        }
        exponent = -i64::try_from(p - first_after_period).map_err(|_| Error::Number)?;
        digit_count = p - start_digits;
    }
    if bytes[p] == b'e' || bytes[p] == b'E' {
        is_float = true;
        p += 1;
        parse_exponent(bytes, &mut p, &mut exponent)?;
    }
    if !is_valid_scalar_end(bytes, p, doc_len) {
        return Err(Error::Number);
    }

    if is_float {
        return write_float(
            &bytes[offset..p],
            negative,
            i,
            &bytes[start_digits..],
            digit_count,
            exponent,
            tape,
        );
    }

    // The longest negative 64-bit integer has 19 digits, the longest
    // positive one 20.
    let longest_digit_count = if negative { 19 } else { 20 };
    if digit_count > longest_digit_count {
        return Err(Error::Number);
    }
    if digit_count == longest_digit_count {
        if negative {
            if i > (i64::MAX as u64) + 1 {
                return Err(Error::Number);
            }
            #[expect(clippy::cast_possible_wrap)]
            tape.append_i64(i.wrapping_neg() as i64);
            return Ok(());
        }
        // A 20-digit value that survived accumulation must start with 1
        // and exceed i64::MAX; anything else wrapped around.
        if bytes[offset] != b'1' || i <= i64::MAX as u64 {
            return Err(Error::Number);
        }
    }

    if i > i64::MAX as u64 {
        tape.append_u64(i);
    } else {
        #[expect(clippy::cast_possible_wrap)]
        let value = i as i64;
        tape.append_i64(if negative { -value } else { value });
    }
    Ok(())
}

/// Parses `[+-]?digits` after the `e`, clamping absurdly long exponents to
/// a magnitude that still routes to the right overflow/underflow path.
fn parse_exponent(bytes: &[u8], p: &mut usize, exponent: &mut i64) -> Result<()> {
    let neg_exp = bytes[*p] == b'-';
    if neg_exp || bytes[*p] == b'+' {
        *p += 1;
    }
    let mut start_exp = *p;
    let mut exp_number: i64 = 0;
    while let Some(d) = digit(bytes[*p]) {
        #[expect(clippy::cast_possible_wrap)]
        let d = d as i64;
        exp_number = exp_number.wrapping_mul(10).wrapping_add(d);
        *p += 1;
    }
    if *p == start_exp {
        return Err(Error::Number);
    }
    if *p > start_exp + 18 {
        // 1e000000000000000000001 is legal; strip the zeros before deciding
        // the accumulator overflowed.
        while bytes[start_exp] == b'0' {
            start_exp += 1;
        }
        if *p > start_exp + 18 {
            // Any number this extreme is zero or infinite; the exact
            // magnitude no longer matters.
            exp_number = 999_999_999_999_999_999;
        }
    }
    *exponent += if neg_exp { -exp_number } else { exp_number };
    Ok(())
}

/// Number of digits ignoring leading zeros and the decimal point, for the
/// 19-digit trust threshold on floats like `0.00000012345…`.
fn significant_digits(digits: &[u8], digit_count: usize) -> usize {
    let mut start = 0;
    while start < digits.len() && (digits[start] == b'0' || digits[start] == b'.') {
        start += 1;
    }
    digit_count - start
}

fn write_float(
    token: &[u8],
    negative: bool,
    i: u64,
    start_digits: &[u8],
    digit_count: usize,
    exponent: i64,
    tape: &mut Tape,
) -> Result<()> {
    if digit_count > 19 && significant_digits(start_digits, digit_count) > 19 {
        // The accumulator may have wrapped; only the full-precision
        // fallback can be trusted now.
        tape.append_f64(parse_float_fallback(token)?);
        return Ok(());
    }
    if !(SMALLEST_POWER..=LARGEST_POWER).contains(&exponent) {
        if exponent < SMALLEST_POWER || i == 0 {
            // 1e-999 collapses to zero, preserving the sign.
            tape.append_f64(if negative { -0.0 } else { 0.0 });
            return Ok(());
        }
        // exponent > LARGEST_POWER with a nonzero significand: infinite.
        return Err(Error::Number);
    }
    let value = match compute_float_64(exponent, i, negative) {
        Some(value) => value,
        None => parse_float_fallback(token)?,
    };
    tape.append_f64(value);
    Ok(())
}

/// Correctly rounded `i * 10^power`, negated when asked. `None` when the
/// result would be infinite.
#[expect(clippy::cast_precision_loss)]
fn compute_float_64(power: i64, i: u64, negative: bool) -> Option<f64> {
    // Clinger's fast path: both operands exact, one rounding.
    if (-22..=22).contains(&power) && i <= MAX_SAFE_SIGNIFICAND {
        let mut d = i as f64;
        if power < 0 {
            d /= POWER_OF_TEN[usize::try_from(-power).ok()?];
        } else {
            d *= POWER_OF_TEN[usize::try_from(power).ok()?];
        }
        return Some(if negative { -d } else { d });
    }
    if i == 0 {
        return Some(if negative { -0.0 } else { 0.0 });
    }

    // The binary exponent of w * 5^q before normalization adjustment;
    // (152170 + 65536) / 2^16 approximates log(5)/log(2) + 1.
    let exponent = (((152_170 + 65_536) * power) >> 16) + 1024 + 63;

    let lz = i.leading_zeros();
    let w = i << lz;

    let index = usize::try_from(2 * (power - SMALLEST_POWER)).ok()?;
    let (mut upper, mut lower) = full_multiplication(w, POWER_OF_FIVE_128[index]);
    // When the low nine bits of the high word are all ones the truncated
    // product may hide the rounding decision; one more 64x64 multiply
    // against the next table word settles it.
    if upper & 0x1FF == 0x1FF {
        let (second_high, _) = full_multiplication(w, POWER_OF_FIVE_128[index + 1]);
        lower = lower.wrapping_add(second_high);
        if second_high > lower {
            upper += 1;
        }
    }

    let upperbit = (upper >> 63) as u32;
    let mut mantissa = upper >> (upperbit + 9);
    let lz = i64::from(lz) + i64::from(1 ^ upperbit);

    let mut real_exponent = exponent - lz;
    if real_exponent <= 0 {
        // Subnormal territory.
        if 1 - real_exponent >= 64 {
            return Some(if negative { -0.0 } else { 0.0 });
        }
        mantissa >>= u32::try_from(1 - real_exponent).ok()?;
        mantissa += mantissa & 1;
        mantissa >>= 1;
        // Rounding up may have pushed the value back over the normal
        // threshold.
        real_exponent = i64::from(mantissa >= (1 << 52));
        return Some(assemble_double(mantissa, real_exponent, negative));
    }

    // Round to nearest, ties to even. An exactly-halfway product takes the
    // form (2m+1) * 2^p, only possible for a narrow band of powers.
    if lower <= 1
        && (-4..=23).contains(&power)
        && mantissa & 3 == 1
        && (mantissa << (upperbit + 9)) == upper
    {
        mantissa &= !1;
    }
    mantissa += mantissa & 1;
    mantissa >>= 1;
    if mantissa >= (1 << 53) {
        // 7.2057594037927933e16 and friends round up into an extra bit.
        mantissa = 1 << 52;
        real_exponent += 1;
    }
    mantissa &= !(1 << 52);
    if real_exponent > 2046 {
        return None;
    }
    Some(assemble_double(mantissa, real_exponent, negative))
}

#[inline]
#[expect(clippy::cast_possible_truncation)]
fn full_multiplication(a: u64, b: u64) -> (u64, u64) {
    let product = u128::from(a) * u128::from(b);
    ((product >> 64) as u64, product as u64)
}

#[inline]
fn assemble_double(mantissa: u64, real_exponent: i64, negative: bool) -> f64 {
    debug_assert!((0..=2046).contains(&real_exponent));
    #[expect(clippy::cast_sign_loss)]
    let exponent_bits = (real_exponent as u64) << 52;
    let bits = (mantissa & !(1 << 52)) | exponent_bits | (u64::from(negative) << 63);
    f64::from_bits(bits)
}

/// Full-precision fallback for the rare inputs the 128-bit path cannot
/// settle; rejects anything that does not round to a finite double.
fn parse_float_fallback(token: &[u8]) -> Result<f64> {
    let text = core::str::from_utf8(token).map_err(|_| Error::Number)?;
    let value: f64 = text.parse().map_err(|_| Error::Number)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::Number)
    }
}
