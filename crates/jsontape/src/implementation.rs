//! Registry of compiled kernel instantiations.
//!
//! The scanning and decoding pipeline is generic over a
//! [`Backend`](crate::simd::Backend); each backend is monomorphized once
//! and published here as a named [`Implementation`]. Selection happens per
//! parser at construction time, by runtime CPU detection or by name, and
//! there is no process-global mutable state.

use crate::error::{Error, Result};
use crate::minify::minify_with;
use crate::padded::PaddedBytes;
use crate::simd::fallback::Fallback;
use crate::stage1::{StructuralIndex, find_structural_bits};
use crate::stage2::{ContainerStack, build_tape};
use crate::strings::StringBuffer;
use crate::tape::Tape;

type Stage1Fn = fn(&PaddedBytes, &mut StructuralIndex) -> Result<()>;
type Stage2Fn = fn(
    &PaddedBytes,
    &StructuralIndex,
    &mut Tape,
    &mut StringBuffer,
    &mut ContainerStack,
    usize,
) -> Result<()>;
type MinifyFn = fn(&PaddedBytes, &mut Vec<u8>) -> Result<()>;

/// One selectable kernel instantiation.
pub struct Implementation {
    name: &'static str,
    description: &'static str,
    supported: fn() -> bool,
    pub(crate) stage1: Stage1Fn,
    pub(crate) stage2: Stage2Fn,
    pub(crate) minify: MinifyFn,
}

impl Implementation {
    /// Registry name, e.g. `"fallback"` or `"v128"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Whether the current CPU can run this kernel.
    #[must_use]
    pub fn supported(&self) -> bool {
        (self.supported)()
    }

    /// Every kernel compiled into this build, usable or not.
    #[must_use]
    pub fn compiled() -> &'static [&'static Implementation] {
        REGISTRY
    }

    /// The kernels the current CPU can actually run, best first.
    #[must_use]
    pub fn available() -> Vec<&'static Implementation> {
        REGISTRY.iter().copied().filter(|i| i.supported()).collect()
    }

    /// The best kernel for the current CPU; the portable fallback is always
    /// present.
    #[must_use]
    pub fn detect() -> &'static Implementation {
        REGISTRY
            .iter()
            .copied()
            .find(|i| i.supported())
            .unwrap_or(&FALLBACK)
    }

    /// Looks a kernel up by registry name, requiring CPU support.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownImplementation`] when no usable kernel has that name.
    pub fn from_name(name: &str) -> Result<&'static Implementation> {
        REGISTRY
            .iter()
            .copied()
            .find(|i| i.name == name && i.supported())
            .ok_or_else(|| Error::UnknownImplementation(name.to_owned()))
    }
}

impl std::fmt::Debug for Implementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Implementation")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("supported", &self.supported())
            .finish()
    }
}

static FALLBACK: Implementation = Implementation {
    name: "fallback",
    description: "portable byte-at-a-time lanes, shift-fold prefix scan",
    supported: || true,
    stage1: find_structural_bits::<Fallback>,
    stage2: build_tape::<Fallback>,
    minify: minify_with::<Fallback>,
};

#[cfg(target_arch = "x86_64")]
static V128: Implementation = Implementation {
    name: "v128",
    description: "128-bit SSE lanes with SSSE3 shuffles and carry-less multiply",
    supported: crate::simd::x86::supported,
    stage1: find_structural_bits::<crate::simd::x86::V128>,
    stage2: build_tape::<crate::simd::x86::V128>,
    minify: minify_with::<crate::simd::x86::V128>,
};

/// Best-first registry order.
#[cfg(target_arch = "x86_64")]
static REGISTRY: &[&Implementation] = &[&V128, &FALLBACK];
#[cfg(not(target_arch = "x86_64"))]
static REGISTRY: &[&Implementation] = &[&FALLBACK];
