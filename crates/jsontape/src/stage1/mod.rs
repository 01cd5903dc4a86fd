//! Stage 1: structural indexing.
//!
//! The document is scanned in 64-byte blocks. Each block is reduced to a
//! handful of 64-bit masks (backslashes, quotes, structural bytes,
//! whitespace, control bytes), the quoted regions are resolved with the
//! odd-backslash-run trick plus a prefix XOR, and the surviving structural
//! bits are flattened into a dense array of byte offsets. UTF-8 validation
//! rides along on the same blocks.
//!
//! All cross-block state lives in small named carry structs rather than
//! loose mutable locals: [`BackslashParity`], [`QuoteState`],
//! [`PseudoStructuralCarry`], and the validator's
//! [`Utf8Checker`](utf8::Utf8Checker). Errors accumulate stickily; the pass
//! always runs to the end of the input and reports once.

pub(crate) mod utf8;

use crate::error::{Error, Result};
use crate::padded::PaddedBytes;
use crate::simd::{BLOCK_BYTES, Backend, Chunk};
use utf8::Utf8Checker;

/// Slack beyond the document length reserved in the index array so the
/// unrolled flattener may write a few entries past the live count.
pub(crate) const INDEX_SLACK: usize = 64;

const EVEN_BITS: u64 = 0x5555_5555_5555_5555;

/// Carry for the escaped-character scanner: whether the previous block
/// ended in an odd-length run of backslashes.
#[derive(Default)]
pub(crate) struct BackslashParity {
    prev_ends_odd: u64, // 0 or 1
}

impl BackslashParity {
    /// Returns the positions that terminate an odd-length backslash run.
    /// The character at such a position is escaped; in particular a quote
    /// there is not a real string delimiter.
    #[inline]
    pub(crate) fn odd_run_ends(&mut self, backslash: u64) -> u64 {
        let start_edges = backslash & !(backslash << 1);
        // Flip the parity of the first run when the previous block ended
        // mid-run on an odd count.
        let even_start_mask = EVEN_BITS ^ self.prev_ends_odd;
        let even_starts = start_edges & even_start_mask;
        let odd_starts = start_edges & !even_start_mask;
        let even_carries = backslash.wrapping_add(even_starts);
        let (mut odd_carries, ends_odd) = backslash.overflowing_add(odd_starts);
        odd_carries |= self.prev_ends_odd;
        self.prev_ends_odd = u64::from(ends_odd);
        let even_carry_ends = even_carries & !backslash;
        let odd_carry_ends = odd_carries & !backslash;
        let even_start_odd_end = even_carry_ends & !EVEN_BITS;
        let odd_start_even_end = odd_carry_ends & EVEN_BITS;
        even_start_odd_end | odd_start_even_end
    }
}

/// Per-block output of the quoted-region resolver.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QuoteMasks {
    /// Unescaped `"` positions.
    pub(crate) bits: u64,
    /// Bytes covered by a string: the opening quote through the byte before
    /// the closing quote.
    pub(crate) region: u64,
}

/// Carry for the quoted-region resolver: whether the previous block ended
/// inside a string (sign-extended to all 64 bits).
#[derive(Default)]
pub(crate) struct QuoteState {
    prev_inside: u64, // 0 or all ones
}

impl QuoteState {
    #[inline]
    pub(crate) fn resolve<B: Backend>(&mut self, quote_raw: u64, odd_ends: u64) -> QuoteMasks {
        let bits = quote_raw & !odd_ends;
        let mut region = B::prefix_xor(bits);
        region ^= self.prev_inside;
        self.prev_inside = ((region as i64) >> 63) as u64;
        QuoteMasks { bits, region }
    }

    #[inline]
    pub(crate) fn inside_string(&self) -> bool {
        self.prev_inside != 0
    }
}

/// Carry for pseudo-structural detection: whether the last byte of the
/// previous block was structural or whitespace. The first byte of the
/// document counts as following whitespace.
struct PseudoStructuralCarry {
    prev_ends_pred: u64, // 0 or 1
}

impl PseudoStructuralCarry {
    fn new() -> Self {
        Self { prev_ends_pred: 1 }
    }

    /// Combines the block's masks into its final structural bits.
    #[inline]
    fn finalize(&mut self, structural: u64, whitespace: u64, quotes: QuoteMasks) -> u64 {
        // Drop structural lookalikes inside strings, then make every string
        // start visible to the tape builder.
        let mut structurals = structural & !quotes.region;
        structurals |= quotes.bits;

        // A pseudo-structural byte opens a scalar: it is neither whitespace
        // nor inside a string, and its predecessor is structural or
        // whitespace.
        let pseudo_pred = structurals | whitespace;
        let shifted_pseudo_pred = (pseudo_pred << 1) | self.prev_ends_pred;
        self.prev_ends_pred = pseudo_pred >> 63;
        let pseudo_structurals = shifted_pseudo_pred & !whitespace & !quotes.region;
        structurals |= pseudo_structurals;

        // Closing quotes served their purpose above; the tape builder only
        // visits string starts.
        structurals & !(quotes.bits & !quotes.region)
    }
}

/// The dense array of structural byte offsets produced by stage 1.
///
/// Backing storage is sized once per document (length plus
/// [`INDEX_SLACK`]) and reused across parses; `count` tracks the live
/// prefix.
pub(crate) struct StructuralIndex {
    offsets: Vec<u32>,
    count: usize,
}

impl StructuralIndex {
    pub(crate) fn new() -> Self {
        Self {
            offsets: Vec::new(),
            count: 0,
        }
    }

    /// Grows the backing storage for documents up to `input_len` bytes.
    pub(crate) fn reserve_for(&mut self, input_len: usize) -> Result<()> {
        let needed = input_len + INDEX_SLACK;
        if self.offsets.len() < needed {
            self.offsets
                .try_reserve_exact(needed - self.offsets.len())
                .map_err(|_| Error::Allocation)?;
            self.offsets.resize(needed, 0);
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.count = 0;
    }

    /// The live offsets, ending with the end-of-document sentinel.
    pub(crate) fn offsets(&self) -> &[u32] {
        &self.offsets[..self.count]
    }

    /// Appends `base + i` for every set bit `i` of `bits`, lowest first.
    ///
    /// Eight offsets are written per step with the write position computed
    /// from the popcount up front, so the loop never branches per bit; the
    /// slots written past the live count are slack and get overwritten by
    /// later blocks.
    #[inline]
    fn flatten(&mut self, base: u32, mut bits: u64) {
        if bits == 0 {
            return;
        }
        let cnt = bits.count_ones() as usize;
        let next_count = self.count + cnt;
        let mut out = self.count;
        Self::write_eight(&mut self.offsets[out..], base, &mut bits);
        if cnt > 8 {
            out += 8;
            Self::write_eight(&mut self.offsets[out..], base, &mut bits);
            if cnt > 16 {
                out += 8;
                // One structural byte every four input bytes at most ends up
                // here, e.g. long runs of `"",`.
                while bits != 0 {
                    self.offsets[out] = base + bits.trailing_zeros();
                    bits &= bits.wrapping_sub(1);
                    out += 1;
                }
            }
        }
        self.count = next_count;
    }

    #[inline]
    fn write_eight(dst: &mut [u32], base: u32, bits: &mut u64) {
        for slot in dst.iter_mut().take(8) {
            // trailing_zeros of an exhausted mask is 64; the garbage offset
            // lands in slack and is never part of the live prefix.
            *slot = base + bits.trailing_zeros();
            *bits &= bits.wrapping_sub(1);
        }
    }

    fn push_sentinel(&mut self, len: u32) {
        self.offsets[self.count] = len;
        self.count += 1;
    }
}

/// Sticky per-document error bits accumulated by stage 1.
#[derive(Default)]
struct ErrorSump {
    unescaped_chars: u64,
}

/// Runs structural indexing over `input`, filling `index`.
///
/// On success the index holds strictly increasing offsets of every
/// structural and pseudo-structural byte, terminated by the sentinel
/// offset `input.len()`.
pub(crate) fn find_structural_bits<B: Backend>(
    input: &PaddedBytes,
    index: &mut StructuralIndex,
) -> Result<()> {
    let len = input.len();
    let bytes = input.padded();
    index.clear();

    let mut utf8 = Utf8Checker::<B::Vec>::new();
    let mut backslashes = BackslashParity::default();
    let mut quotes = QuoteState::default();
    let mut pseudo = PseudoStructuralCarry::new();
    let mut errors = ErrorSump::default();

    let mut block = [0u8; BLOCK_BYTES];
    let mut pos = 0;
    while pos + BLOCK_BYTES <= len {
        block.copy_from_slice(&bytes[pos..pos + BLOCK_BYTES]);
        scan_block::<B>(
            &block,
            pos,
            index,
            &mut utf8,
            &mut backslashes,
            &mut quotes,
            &mut pseudo,
            &mut errors,
        );
        pos += BLOCK_BYTES;
    }
    if pos < len {
        // Space-fill the remainder so the classification and UTF-8 checks
        // see neutral bytes past the end.
        block = [0x20; BLOCK_BYTES];
        block[..len - pos].copy_from_slice(&bytes[pos..len]);
        scan_block::<B>(
            &block,
            pos,
            index,
            &mut utf8,
            &mut backslashes,
            &mut quotes,
            &mut pseudo,
            &mut errors,
        );
    }
    utf8.finish();

    if quotes.inside_string() {
        return Err(Error::UnclosedString);
    }
    if index.count == 0 {
        return Err(Error::Empty);
    }
    index.push_sentinel(u32::try_from(len).map_err(|_| Error::Capacity)?);
    if errors.unescaped_chars != 0 {
        return Err(Error::UnescapedChars);
    }
    if utf8.has_error() {
        return Err(Error::Utf8);
    }
    Ok(())
}

#[expect(clippy::too_many_arguments)]
#[inline]
fn scan_block<B: Backend>(
    block: &[u8; BLOCK_BYTES],
    pos: usize,
    index: &mut StructuralIndex,
    utf8: &mut Utf8Checker<B::Vec>,
    backslashes: &mut BackslashParity,
    quotes: &mut QuoteState,
    pseudo: &mut PseudoStructuralCarry,
    errors: &mut ErrorSump,
) {
    let chunk = Chunk::<B::Vec>::load(block);
    utf8.check_chunk(&chunk);

    let backslash = chunk.eq(b'\\');
    let odd_ends = backslashes.odd_run_ends(backslash);

    let quote_raw = chunk.eq(b'"');
    let quote_masks = quotes.resolve::<B>(quote_raw, odd_ends);

    // Everything below U+0020 must be escaped inside a string.
    let control = chunk.lteq(0x1F);
    errors.unescaped_chars |= quote_masks.region & control;

    let classes = chunk.classify();
    let structurals = pseudo.finalize(classes.structural, classes.whitespace, quote_masks);

    #[expect(clippy::cast_possible_truncation)]
    index.flatten(pos as u32, structurals);
}
