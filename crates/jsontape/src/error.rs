use thiserror::Error;

/// Failure modes reported by the parser and its helpers.
///
/// Stage 1 accumulates its errors stickily across the whole document and
/// reports them before tape construction begins; stage 2 and the scalar
/// decoders fail fast at the first offending structural position. A failed
/// parse leaves the [`Parser`](crate::Parser) reusable, but no document view
/// is handed out.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The document is larger than the parser's configured maximum capacity.
    #[error("document exceeds the configured maximum capacity")]
    Capacity,

    /// Growing one of the parser's internal buffers failed.
    #[error("memory allocation failed")]
    Allocation,

    /// The padded-buffer file loader failed to read the file.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The document contains no structural byte at all.
    #[error("empty document")]
    Empty,

    /// A string was still open when the input ended.
    #[error("unclosed string")]
    UnclosedString,

    /// A code point below U+0020 appeared unescaped inside a string.
    #[error("unescaped control character inside a string")]
    UnescapedChars,

    /// The document is not well-formed UTF-8.
    #[error("invalid utf-8 in document")]
    Utf8,

    /// A number does not match the JSON grammar or cannot be represented.
    #[error("malformed number")]
    Number,

    /// A string escape sequence is malformed, including broken `\uXXXX`
    /// surrogate pairs.
    #[error("malformed string escape")]
    StringEscape,

    /// Mismatched brackets, a missing colon or comma, or an unexpected token.
    #[error("structural error while building the tape")]
    Tape,

    /// The document nests deeper than the configured maximum depth.
    #[error("maximum nesting depth exceeded")]
    Depth,

    /// Well-formed value followed by more non-whitespace input.
    #[error("trailing content after the document root")]
    TrailingContent,

    /// The requested kernel name is not present in the registry.
    #[error("unknown implementation `{0}`")]
    UnknownImplementation(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;
