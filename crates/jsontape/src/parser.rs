//! The reusable parser state and its `parse` entry point.
//!
//! A [`Parser`] owns every buffer the pipeline writes: the structural
//! index, the tape, the string buffer, and the container stack. The input
//! stays a borrowed read-only [`PaddedBytes`]; a successful parse returns
//! a [`Document`] view whose lifetime is tied to the parser, and the next
//! `parse` call logically discards it while keeping the backing storage.
//!
//! Buffers are grown once per size class at entry. Growth is the only
//! step that can allocate, and it fails with a status instead of
//! overflowing any downstream write.

use crate::error::{Error, Result};
use crate::implementation::Implementation;
use crate::padded::PaddedBytes;
use crate::stage1::StructuralIndex;
use crate::stage2::ContainerStack;
use crate::strings::StringBuffer;
use crate::tape::{Document, Tape};

/// Default cap on document size: tape positions and string-buffer offsets
/// must stay well inside the 56-bit payloads and 32-bit index entries.
pub const DEFAULT_MAX_CAPACITY: usize = 0xFFFF_FF00;

/// Default cap on container nesting.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Construction-time knobs for a [`Parser`].
///
/// # Default
///
/// Maximum capacity [`DEFAULT_MAX_CAPACITY`], maximum depth
/// [`DEFAULT_MAX_DEPTH`], and the kernel picked by CPU detection.
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Largest document, in bytes, this parser will ever accept.
    pub max_capacity: usize,

    /// Deepest container nesting accepted before failing with
    /// [`Error::Depth`].
    pub max_depth: usize,

    /// Registry name of the kernel to use; `None` selects by CPU
    /// detection.
    pub implementation: Option<&'static str>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
            implementation: None,
        }
    }
}

/// A reusable JSON parser.
///
/// Not shareable across threads while parsing; give each thread its own
/// instance. Reuse is the intended pattern: buffers grown for one document
/// are kept for the next.
pub struct Parser {
    implementation: &'static Implementation,
    max_capacity: usize,
    max_depth: usize,
    capacity: usize,
    index: StructuralIndex,
    tape: Tape,
    strings: StringBuffer,
    stack: ContainerStack,
}

impl Parser {
    /// A parser with default options and the best detected kernel.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default()).unwrap_or_else(|_| {
            // Only a named-kernel lookup can fail, and the default options
            // name none.
            unreachable!("default options cannot fail")
        })
    }

    /// A parser with explicit options.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownImplementation`] when `options.implementation` names
    /// a kernel that is absent or unsupported on this CPU.
    pub fn with_options(options: ParserOptions) -> Result<Self> {
        let implementation = match options.implementation {
            Some(name) => Implementation::from_name(name)?,
            None => Implementation::detect(),
        };
        Ok(Self {
            implementation,
            max_capacity: options.max_capacity,
            max_depth: options.max_depth,
            capacity: 0,
            index: StructuralIndex::new(),
            tape: Tape::new(),
            strings: StringBuffer::new(),
            stack: ContainerStack::new(),
        })
    }

    /// The kernel this parser runs.
    #[must_use]
    pub fn implementation(&self) -> &'static Implementation {
        self.implementation
    }

    /// Grows the internal buffers for documents up to `input_len` bytes.
    ///
    /// Called implicitly by [`Parser::parse`]; exposed so callers can
    /// front-load the allocation cost.
    ///
    /// # Errors
    ///
    /// [`Error::Capacity`] past the configured maximum,
    /// [`Error::Allocation`] when growing a buffer fails.
    pub fn ensure_capacity(&mut self, input_len: usize) -> Result<()> {
        if input_len <= self.capacity {
            return Ok(());
        }
        if input_len > self.max_capacity {
            return Err(Error::Capacity);
        }
        self.index.reserve_for(input_len)?;
        self.tape.reserve_for(input_len)?;
        self.strings.reserve_for(input_len)?;
        self.capacity = input_len;
        Ok(())
    }

    /// Parses one document, reusing this parser's buffers.
    ///
    /// The previous document's contents are logically discarded whether or
    /// not the parse succeeds.
    ///
    /// # Errors
    ///
    /// Any [`Error`] variant from the taxonomy: stage 1 reports its sticky
    /// input-level errors first, then stage 2 fails fast on the first
    /// structural or scalar error.
    pub fn parse<'p>(&'p mut self, input: &PaddedBytes) -> Result<Document<'p>> {
        self.ensure_capacity(input.len())?;
        (self.implementation.stage1)(input, &mut self.index)?;
        (self.implementation.stage2)(
            input,
            &self.index,
            &mut self.tape,
            &mut self.strings,
            &mut self.stack,
            self.max_depth,
        )?;
        Ok(Document::new(self.tape.words(), self.strings.written()))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
