//! Incremental UTF-8 validation over 64-byte blocks.
//!
//! The checker walks the document in the same blocks as the structural
//! scanner and keeps three registers of carry between blocks: the previous
//! raw bytes, their high nibbles, and the per-lane count of continuation
//! bytes still owed. Errors accumulate into a sticky register; nothing
//! aborts mid-document, and [`Utf8Checker::has_error`] is consulted once
//! after the last block.
//!
//! Accepts exactly RFC 3629: rejects bytes above 0xF4, the overlong lead
//! bytes 0xC0/0xC1, overlong 3- and 4-byte encodings, surrogate code points,
//! and sequences truncated by the end of input (the carried-continuation
//! count must be settled at finalization).
//!
//! Legal sequences, per the Unicode core spec table:
//!
//! ```text
//! U+0000..U+007F      00..7F
//! U+0080..U+07FF      C2..DF  80..BF
//! U+0800..U+0FFF      E0      A0..BF  80..BF
//! U+1000..U+CFFF      E1..EC  80..BF  80..BF
//! U+D000..U+D7FF      ED      80..9F  80..BF
//! U+E000..U+FFFF      EE..EF  80..BF  80..BF
//! U+10000..U+3FFFF    F0      90..BF  80..BF  80..BF
//! U+40000..U+FFFFF    F1..F3  80..BF  80..BF  80..BF
//! U+100000..U+10FFFF  F4      80..8F  80..BF  80..BF
//! ```

use crate::simd::{ByteVec, Chunk, LANES};

/// How many continuation bytes each lead byte announces, indexed by high
/// nibble. ASCII counts as one so the continuation arithmetic can treat
/// every non-continuation byte uniformly.
const CONTINUATION_LENGTHS: [u8; LANES] = [1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 2, 2, 3, 4];

/// Minimum first byte for each lead high nibble, used to catch overlong
/// encodings; 0x80 (i8 MIN) disables the comparison for that nibble.
const OVERLONG_FIRST_MINS: [u8; LANES] = [
    0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0xC2, 0x80, 0xE1,
    0xF1,
];

/// Minimum second byte for each lead high nibble; 0x7F (i8 MAX) makes the
/// pair condition always true so the first-byte comparison decides alone.
const OVERLONG_SECOND_MINS: [u8; LANES] = [
    0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x7F, 0x7F, 0xA0,
    0x90,
];

/// Cross-block validator state.
pub(crate) struct Utf8Checker<V: ByteVec> {
    has_error: V,
    prev_raw: V,
    prev_high_nibbles: V,
    prev_carried: V,
}

impl<V: ByteVec> Utf8Checker<V> {
    pub(crate) fn new() -> Self {
        Self {
            has_error: V::zero(),
            prev_raw: V::zero(),
            prev_high_nibbles: V::zero(),
            prev_carried: V::zero(),
        }
    }

    #[inline]
    fn add_errors(&mut self, errors: V) {
        self.has_error = self.has_error | errors;
    }

    /// Threshold for carried continuations when no fresh multi-byte data
    /// arrives: interior lanes may legitimately carry up to 4, but the last
    /// lane above 1 means a sequence is still owed bytes.
    #[inline]
    fn carried_threshold() -> V {
        let mut lanes = [9u8; LANES];
        lanes[LANES - 1] = 1;
        V::load(&lanes)
    }

    #[inline]
    fn check_carried_continuations(&mut self) {
        let over = self.prev_carried.gt_signed(Self::carried_threshold());
        self.add_errors(over);
    }

    /// Full per-register check; only reached for registers that are not
    /// pure ASCII at the block level.
    #[inline]
    fn check_bytes(&mut self, current: V) {
        let high_nibbles = current.shr4();

        // No byte may exceed 0xF4.
        self.add_errors(current.saturating_sub(V::splat(0xF4)));

        let initial_lengths = high_nibbles.lookup16(CONTINUATION_LENGTHS);
        let carries = self.carry_continuations(initial_lengths);

        // Overlap or underlap between announced lengths and actual
        // continuation bytes: (carries > lengths) must differ lane-wise
        // from (lengths > 0).
        let over = carries.gt_signed(initial_lengths);
        let fresh = initial_lengths.gt_signed(V::zero());
        self.add_errors(over.eq(fresh));

        let off1 = current.prev1(self.prev_raw);
        self.check_first_continuation_max(current, off1);
        self.check_overlong(current, off1, high_nibbles);

        self.prev_raw = current;
        self.prev_high_nibbles = high_nibbles;
        self.prev_carried = carries;
    }

    /// Propagates announced sequence lengths forward so each continuation
    /// position knows how many bytes its sequence still owes.
    #[inline]
    fn carry_continuations(&self, initial_lengths: V) -> V {
        let right1 = initial_lengths
            .prev1(self.prev_carried)
            .saturating_sub(V::splat(1));
        let sum = initial_lengths.wrapping_add(right1);
        let right2 = sum.prev2(self.prev_carried).saturating_sub(V::splat(2));
        sum.wrapping_add(right2)
    }

    /// After 0xED the next byte must be at most 0x9F (no surrogates) and
    /// after 0xF4 at most 0x8F (nothing beyond U+10FFFF). Continuation
    /// bytes have their sign bit set, so the signed comparison works.
    #[inline]
    fn check_first_continuation_max(&mut self, current: V, off1: V) {
        let mask_ed = off1.eq(V::splat(0xED));
        let mask_f4 = off1.eq(V::splat(0xF4));
        let bad_ed = current.gt_signed(V::splat(0x9F)) & mask_ed;
        let bad_f4 = current.gt_signed(V::splat(0x8F)) & mask_f4;
        self.add_errors(bad_ed | bad_f4);
    }

    /// An encoding is overlong when the lead byte is under the minimum for
    /// its length class and, for E0/F0 leads, the second byte is under the
    /// class minimum as well.
    #[inline]
    fn check_overlong(&mut self, current: V, off1: V, high_nibbles: V) {
        let off1_high_nibbles = high_nibbles.prev1(self.prev_high_nibbles);
        let initial_mins = off1_high_nibbles.lookup16(OVERLONG_FIRST_MINS);
        let initial_under = initial_mins.gt_signed(off1);
        let second_mins = off1_high_nibbles.lookup16(OVERLONG_SECOND_MINS);
        let second_under = second_mins.gt_signed(current);
        self.add_errors(initial_under & second_under);
    }

    /// Feeds one 64-byte block.
    #[inline]
    pub(crate) fn check_chunk(&mut self, chunk: &Chunk<V>) {
        if chunk.is_ascii() {
            // Nothing new to validate; only a sequence left dangling by the
            // previous block can be wrong.
            self.check_carried_continuations();
        } else {
            for &reg in chunk.registers() {
                self.check_bytes(reg);
            }
        }
    }

    /// Settles the carry after the last block; a dangling multi-byte
    /// sequence at end of input is an error.
    pub(crate) fn finish(&mut self) {
        self.check_carried_continuations();
    }

    pub(crate) fn has_error(&self) -> bool {
        self.has_error.any_bit_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::BLOCK_BYTES;
    use crate::simd::fallback::Swar;

    fn validate(input: &[u8]) -> bool {
        let mut checker = Utf8Checker::<Swar>::new();
        let mut pos = 0;
        while pos + BLOCK_BYTES <= input.len() {
            let mut block = [0u8; BLOCK_BYTES];
            block.copy_from_slice(&input[pos..pos + BLOCK_BYTES]);
            checker.check_chunk(&Chunk::load(&block));
            pos += BLOCK_BYTES;
        }
        if pos < input.len() {
            let mut block = [0x20u8; BLOCK_BYTES];
            block[..input.len() - pos].copy_from_slice(&input[pos..]);
            checker.check_chunk(&Chunk::load(&block));
        }
        checker.finish();
        !checker.has_error()
    }

    #[test]
    fn accepts_ascii_and_basic_multibyte() {
        assert!(validate(b"plain ascii"));
        assert!(validate("héllo wörld".as_bytes()));
        assert!(validate("中文, русский, עברית".as_bytes()));
        assert!(validate("emoji \u{1F600}\u{1F680}".as_bytes()));
        assert!(validate(b""));
    }

    #[test]
    fn rejects_stray_and_overlong_bytes() {
        assert!(!validate(b"\x80"));
        assert!(!validate(b"\xC0\xAF"));
        assert!(!validate(b"\xC1\xBF"));
        assert!(!validate(b"\xF5\x80\x80\x80"));
        assert!(!validate(b"\xFF"));
        // Overlong 3- and 4-byte forms.
        assert!(!validate(b"\xE0\x80\xA0"));
        assert!(!validate(b"\xF0\x80\x80\xA0"));
    }

    #[test]
    fn rejects_surrogates_and_out_of_range() {
        // U+D800 encoded directly.
        assert!(!validate(b"\xED\xA0\x80"));
        assert!(!validate(b"\xED\xBF\xBF"));
        // U+110000 and beyond.
        assert!(!validate(b"\xF4\x90\x80\x80"));
        // Boundary acceptances around those rejects.
        assert!(validate(b"\xED\x9F\xBF"));
        assert!(validate(b"\xF4\x8F\xBF\xBF"));
        assert!(validate(b"\xEE\x80\x80"));
    }

    #[test]
    fn rejects_truncation_and_bad_continuations() {
        assert!(!validate(b"\xE2\x82"));
        assert!(!validate(b"\xF0\x9F\x98"));
        assert!(!validate(b"\xC3"));
        assert!(!validate(b"\xC3\x28"));
        assert!(!validate(b"\xE2\x28\xA1"));
        // A continuation byte with no lead.
        assert!(!validate(b"abc\xBFdef"));
    }

    #[test]
    fn sequences_straddling_block_boundaries() {
        // Place a 4-byte scalar so it spans the 64-byte boundary at every
        // possible offset.
        for lead_pos in 61..64usize {
            let mut doc = vec![b'a'; lead_pos];
            doc.extend_from_slice("\u{1F600}".as_bytes());
            doc.extend_from_slice(b"tail");
            assert!(validate(&doc), "lead at {lead_pos}");
        }
        // Truncate the same scalar exactly at the boundary.
        let mut doc = vec![b'a'; 62];
        doc.extend_from_slice(&"\u{1F600}".as_bytes()[..2]);
        assert!(!validate(&doc));
    }

    #[test]
    fn truncation_at_exact_block_multiple() {
        // 63 ASCII bytes then a lead byte: the input is exactly one block
        // and the owed continuations only surface at finalization.
        let mut doc = vec![b'x'; 63];
        doc.push(0xE2);
        assert_eq!(doc.len(), BLOCK_BYTES);
        assert!(!validate(&doc));
    }

    #[test]
    fn agrees_with_std_on_mixed_inputs() {
        let samples: &[&[u8]] = &[
            b"simple",
            "βoption".as_bytes(),
            b"\xE2\x82\xAC and \xF0\x9F\x8D\x95",
            b"bad \xED\xA0\x80 surrogate",
            b"ok \xEF\xBF\xBD end",
            b"\xF4\x8F\xBF\xBF\xF4\x90\x80\x80",
        ];
        for sample in samples {
            assert_eq!(
                validate(sample),
                core::str::from_utf8(sample).is_ok(),
                "{sample:?}"
            );
        }
    }
}
