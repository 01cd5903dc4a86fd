//! x86-64 scanning kernel over 128-bit registers.
//!
//! Uses SSSE3 byte shuffles for the nibble lookups and the carry-less
//! multiply for the prefix XOR. None of the wrapper functions are marked
//! `#[target_feature]`; the registry only hands this kernel out after
//! runtime CPU detection, so the intrinsics are never reached on hardware
//! that lacks them.

use core::arch::x86_64::{
    __m128i, _mm_add_epi8, _mm_adds_epu8, _mm_alignr_epi8, _mm_and_si128, _mm_clmulepi64_si128,
    _mm_cmpeq_epi8, _mm_cmpgt_epi8, _mm_cvtsi128_si64, _mm_loadu_si128, _mm_movemask_epi8,
    _mm_or_si128, _mm_set_epi64x, _mm_set1_epi8, _mm_setzero_si128, _mm_srli_epi16,
    _mm_subs_epu8, _mm_xor_si128,
};
use core::ops::{BitAnd, BitOr, BitXor};

use super::{Backend, ByteVec, LANES};

/// One SSE register.
#[derive(Clone, Copy)]
pub(crate) struct Sse(__m128i);

/// True when the CPU can run this kernel.
pub(crate) fn supported() -> bool {
    std::arch::is_x86_feature_detected!("ssse3")
        && std::arch::is_x86_feature_detected!("pclmulqdq")
}

impl BitAnd for Sse {
    type Output = Self;
    #[inline]
    fn bitand(self, other: Self) -> Self {
        Self(unsafe { _mm_and_si128(self.0, other.0) })
    }
}

impl BitOr for Sse {
    type Output = Self;
    #[inline]
    fn bitor(self, other: Self) -> Self {
        Self(unsafe { _mm_or_si128(self.0, other.0) })
    }
}

impl BitXor for Sse {
    type Output = Self;
    #[inline]
    fn bitxor(self, other: Self) -> Self {
        Self(unsafe { _mm_xor_si128(self.0, other.0) })
    }
}

impl ByteVec for Sse {
    #[inline]
    fn load(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= LANES);
        Self(unsafe { _mm_loadu_si128(bytes.as_ptr().cast::<__m128i>()) })
    }

    #[inline]
    fn splat(byte: u8) -> Self {
        Self(unsafe { _mm_set1_epi8(byte as i8) })
    }

    #[inline]
    fn zero() -> Self {
        Self(unsafe { _mm_setzero_si128() })
    }

    #[inline]
    fn eq(self, other: Self) -> Self {
        Self(unsafe { _mm_cmpeq_epi8(self.0, other.0) })
    }

    #[inline]
    fn gt_signed(self, other: Self) -> Self {
        Self(unsafe { _mm_cmpgt_epi8(self.0, other.0) })
    }

    #[inline]
    fn saturating_add(self, other: Self) -> Self {
        Self(unsafe { _mm_adds_epu8(self.0, other.0) })
    }

    #[inline]
    fn saturating_sub(self, other: Self) -> Self {
        Self(unsafe { _mm_subs_epu8(self.0, other.0) })
    }

    #[inline]
    fn wrapping_add(self, other: Self) -> Self {
        Self(unsafe { _mm_add_epi8(self.0, other.0) })
    }

    #[inline]
    fn shr4(self) -> Self {
        let shifted = Self(unsafe { _mm_srli_epi16::<4>(self.0) });
        shifted & Self::splat(0x0F)
    }

    #[inline]
    fn lookup16(self, table: [u8; LANES]) -> Self {
        let table = Self::load(&table);
        Self(unsafe { core::arch::x86_64::_mm_shuffle_epi8(table.0, self.0) })
    }

    #[inline]
    fn prev1(self, prev: Self) -> Self {
        Self(unsafe { _mm_alignr_epi8::<15>(self.0, prev.0) })
    }

    #[inline]
    fn prev2(self, prev: Self) -> Self {
        Self(unsafe { _mm_alignr_epi8::<14>(self.0, prev.0) })
    }

    #[inline]
    fn movemask(self) -> u16 {
        (unsafe { _mm_movemask_epi8(self.0) }) as u16
    }
}

/// The 128-bit vector kernel, published as `v128`.
pub(crate) struct V128;

impl Backend for V128 {
    type Vec = Sse;

    const NAME: &'static str = "v128";

    #[inline]
    fn prefix_xor(bits: u64) -> u64 {
        unsafe {
            let ones = _mm_set1_epi8(-1);
            let m = _mm_set_epi64x(0, bits as i64);
            let product = _mm_clmulepi64_si128::<0>(m, ones);
            _mm_cvtsi128_si64(product) as u64
        }
    }
}
