//! Owned input buffers satisfying the parser's trailing-padding contract.
//!
//! The scanning kernels read the document in fixed 64-byte blocks and the
//! string decoder performs unconditional 16-byte loads, so every input must
//! be followed by [`PADDING`] readable bytes. `PaddedBytes` owns such a
//! buffer: the logical document occupies `[0, len)` and the tail is
//! zero-filled. The parser only ever reads the tail; it never writes the
//! buffer at all.

use std::fs;
use std::path::Path;

use bstr::ByteSlice;

use crate::error::Result;

/// Number of readable bytes guaranteed past the logical end of the input.
pub const PADDING: usize = 64;

/// A byte buffer with [`PADDING`] readable zero bytes past its logical end.
pub struct PaddedBytes {
    bytes: Vec<u8>,
    len: usize,
}

impl PaddedBytes {
    /// Copies `data` into a freshly padded buffer.
    #[must_use]
    pub fn copy_from(data: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(data.len() + PADDING);
        bytes.extend_from_slice(data);
        bytes.resize(data.len() + PADDING, 0);
        Self {
            bytes,
            len: data.len(),
        }
    }

    /// Takes ownership of `data`, extending its allocation with the zero
    /// tail.
    #[must_use]
    pub fn from_vec(mut data: Vec<u8>) -> Self {
        let len = data.len();
        data.resize(len + PADDING, 0);
        Self { bytes: data, len }
    }

    /// Reads a whole file into a padded buffer.
    ///
    /// The allocation is rounded up to a cache-line multiple and the tail is
    /// zero-filled, so the result always satisfies the padding contract no
    /// matter the file size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) when the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path)?;
        let len = data.len();
        let mut bytes = data;
        let rounded = (len + PADDING).next_multiple_of(64);
        bytes.resize(rounded, 0);
        Ok(Self { bytes, len })
    }

    /// Length of the logical document, excluding padding.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the logical document is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The logical document bytes, without the padding tail.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The document plus its readable padding tail.
    ///
    /// Scanning code indexes into this slice so that block reads near the
    /// end of the document stay in bounds.
    #[must_use]
    pub(crate) fn padded(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<&[u8]> for PaddedBytes {
    fn from(data: &[u8]) -> Self {
        Self::copy_from(data)
    }
}

impl From<&str> for PaddedBytes {
    fn from(data: &str) -> Self {
        Self::copy_from(data.as_bytes())
    }
}

impl From<Vec<u8>> for PaddedBytes {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<String> for PaddedBytes {
    fn from(data: String) -> Self {
        Self::from_vec(data.into_bytes())
    }
}

impl std::fmt::Debug for PaddedBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Render a short lossy prefix; inputs are arbitrary bytes until
        // stage 1 has validated them.
        const PREVIEW: usize = 48;
        let shown = &self.as_bytes()[..self.len.min(PREVIEW)];
        write!(f, "PaddedBytes({} bytes: {:?}", self.len, shown.as_bstr())?;
        if self.len > PREVIEW {
            write!(f, "…")?;
        }
        write!(f, ")")
    }
}
