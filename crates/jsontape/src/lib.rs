//! A tape-building JSON parser with data-parallel byte scanning.
//!
//! Documents are parsed in two pipelined stages. Stage 1 walks the input
//! in 64-byte blocks, reducing each block to bitmasks with byte-vector
//! operations: it validates UTF-8, resolves which bytes sit inside
//! strings, and records the offset of every structural byte and every
//! scalar start into a dense index. Stage 2 walks that index once with an
//! explicit-stack state machine, decoding strings and numbers inline and
//! emitting the tape: a flat array of tagged 64-bit words in which
//! matching container words point at each other, so a finished document
//! can be traversed without reparsing.
//!
//! Inputs must satisfy a padding contract, [`PADDING`] readable bytes
//! past the end, provided by [`PaddedBytes`]. The parser itself is
//! reusable and owns all scratch storage:
//!
//! ```
//! use jsontape::{PaddedBytes, Parser};
//!
//! let mut parser = Parser::new();
//! let input = PaddedBytes::from(r#"{"label": "x", "points": [1, 2.5]}"#);
//! let doc = parser.parse(&input)?;
//! assert_eq!(doc.word(0).tag(), Some(jsontape::TapeTag::Root));
//! # Ok::<(), jsontape::Error>(())
//! ```
//!
//! Scanning kernels are selected at run time from a small registry (see
//! [`Implementation`]); a portable kernel is always present, and a 128-bit
//! vector kernel is used on x86-64 hardware that supports it.

mod error;
mod implementation;
mod minify;
mod numbers;
mod padded;
mod parser;
mod simd;
mod stage1;
mod stage2;
mod strings;
mod tape;

pub use error::{Error, Result};
pub use implementation::Implementation;
pub use minify::minify;
pub use padded::{PADDING, PaddedBytes};
pub use parser::{DEFAULT_MAX_CAPACITY, DEFAULT_MAX_DEPTH, Parser, ParserOptions};
pub use tape::{Document, TAPE_VALUE_MASK, TapeTag, TapeWord};
