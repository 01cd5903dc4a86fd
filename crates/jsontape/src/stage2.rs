//! Stage 2: tape construction.
//!
//! A single pass over the structural index array drives an explicit state
//! machine (no recursion) with one stack entry per open container. Each
//! state names what the grammar expects next; every transition either
//! consumes one structural position or fails the parse. Scalars are decoded
//! in place by [`crate::strings`] and [`crate::numbers`].
//!
//! Container bookkeeping: an open brace writes a placeholder word and
//! pushes its tape index; the matching close writes a word pointing back at
//! the open and patches the open word to point just past the close, so
//! scope skipping is constant-time in both directions on the finished
//! tape.

use crate::error::{Error, Result};
use crate::numbers::{is_valid_scalar_end, parse_number};
use crate::padded::PaddedBytes;
use crate::simd::Backend;
use crate::stage1::StructuralIndex;
use crate::strings::{StringBuffer, parse_string};
use crate::tape::{Tape, TapeTag};

/// One open container: where its open word sits and which kind it is.
#[derive(Debug, Clone, Copy)]
struct ContainerFrame {
    tape_index: usize,
    is_object: bool,
}

/// Reusable container stack; capacity grows on demand but the live depth
/// is capped at the parser's configured maximum.
pub(crate) struct ContainerStack {
    frames: Vec<ContainerFrame>,
}

impl ContainerStack {
    pub(crate) fn new() -> Self {
        Self { frames: Vec::new() }
    }

    fn clear(&mut self) {
        self.frames.clear();
    }
}

/// What the grammar expects at the next structural position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Object just opened: a key or `}`.
    ObjectFirstKey,
    /// After a comma in an object: a key only.
    ObjectKey,
    /// After a key: `:`.
    ObjectColon,
    /// After a colon: any value.
    ObjectValue,
    /// After an object member: `,` or `}`.
    ObjectContinue,
    /// Array just opened: a value or `]`.
    ArrayFirstValue,
    /// After a comma in an array: a value only.
    ArrayValue,
    /// After an array element: `,` or `]`.
    ArrayContinue,
    /// Root value complete: only the sentinel may remain.
    Done,
}

pub(crate) struct TapeBuilder<'a> {
    bytes: &'a [u8],
    doc_len: usize,
    offsets: &'a [u32],
    next: usize,
    tape: &'a mut Tape,
    strings: &'a mut StringBuffer,
    stack: &'a mut ContainerStack,
    max_depth: usize,
}

/// Walks the structural index, producing the tape and string buffer.
pub(crate) fn build_tape<B: Backend>(
    input: &PaddedBytes,
    index: &StructuralIndex,
    tape: &mut Tape,
    strings: &mut StringBuffer,
    stack: &mut ContainerStack,
    max_depth: usize,
) -> Result<()> {
    tape.clear();
    strings.clear();
    stack.clear();
    TapeBuilder {
        bytes: input.padded(),
        doc_len: input.len(),
        offsets: index.offsets(),
        next: 0,
        tape,
        strings,
        stack,
        max_depth,
    }
    .run::<B>()
}

impl TapeBuilder<'_> {
    /// Consumes the next structural position, yielding its byte offset and
    /// the byte there. The sentinel offset yields the padding's zero byte.
    #[inline]
    fn advance(&mut self) -> Result<(usize, u8)> {
        let offset = *self.offsets.get(self.next).ok_or(Error::Tape)?;
        self.next += 1;
        let offset = offset as usize;
        Ok((offset, self.bytes[offset]))
    }

    #[inline]
    fn at_sentinel(&self, offset: usize) -> bool {
        offset == self.doc_len
    }

    fn run<B: Backend>(mut self) -> Result<()> {
        // Placeholder root; patched once the tape length is known.
        self.tape.append(TapeTag::Root, 0);

        let (offset, byte) = self.advance()?;
        let mut state = match byte {
            b'{' => {
                self.open_container(true)?;
                State::ObjectFirstKey
            }
            b'[' => {
                self.open_container(false)?;
                State::ArrayFirstValue
            }
            _ if self.at_sentinel(offset) => return Err(Error::Tape),
            _ => {
                // Bare scalar document.
                self.scalar::<B>(offset, byte)?;
                State::Done
            }
        };

        while state != State::Done {
            state = self.step::<B>(state)?;
        }

        // Exactly the sentinel must remain.
        let (offset, _) = self.advance()?;
        if !self.at_sentinel(offset) || self.next != self.offsets.len() {
            return Err(Error::TrailingContent);
        }
        let end = self.tape.len();
        self.tape.append(TapeTag::Root, 0);
        self.tape
            .overwrite(0, TapeTag::Root, u64::try_from(end).map_err(|_| Error::Tape)?);
        Ok(())
    }

    #[inline]
    fn step<B: Backend>(&mut self, state: State) -> Result<State> {
        let (offset, byte) = self.advance()?;
        match state {
            State::ObjectFirstKey => match byte {
                b'"' => {
                    self.string::<B>(offset)?;
                    Ok(State::ObjectColon)
                }
                b'}' => self.close_container(b'}'),
                _ => Err(Error::Tape),
            },
            State::ObjectKey => match byte {
                // A bare key: `,` was consumed, so `}` would be a trailing
                // comma.
                b'"' => {
                    self.string::<B>(offset)?;
                    Ok(State::ObjectColon)
                }
                _ => Err(Error::Tape),
            },
            State::ObjectColon => match byte {
                b':' => Ok(State::ObjectValue),
                _ => Err(Error::Tape),
            },
            State::ObjectValue => self.value::<B>(offset, byte, State::ObjectContinue),
            State::ObjectContinue => match byte {
                b',' => Ok(State::ObjectKey),
                b'}' => self.close_container(b'}'),
                _ => Err(Error::Tape),
            },
            State::ArrayFirstValue => match byte {
                b']' => self.close_container(b']'),
                _ => self.value::<B>(offset, byte, State::ArrayContinue),
            },
            State::ArrayValue => {
                // `,` consumed: a close here would be a trailing comma.
                self.value::<B>(offset, byte, State::ArrayContinue)
            }
            State::ArrayContinue => match byte {
                b',' => Ok(State::ArrayValue),
                b']' => self.close_container(b']'),
                _ => Err(Error::Tape),
            },
            State::Done => Err(Error::Tape),
        }
    }

    /// Dispatches a value position: container opens recurse into the
    /// container's start state, scalars return the continuation state.
    #[inline]
    fn value<B: Backend>(&mut self, offset: usize, byte: u8, after: State) -> Result<State> {
        match byte {
            b'{' => {
                self.open_container(true)?;
                Ok(State::ObjectFirstKey)
            }
            b'[' => {
                self.open_container(false)?;
                Ok(State::ArrayFirstValue)
            }
            _ => {
                if self.at_sentinel(offset) {
                    return Err(Error::Tape);
                }
                self.scalar::<B>(offset, byte)?;
                Ok(after)
            }
        }
    }

    fn open_container(&mut self, is_object: bool) -> Result<()> {
        if self.stack.frames.len() >= self.max_depth {
            return Err(Error::Depth);
        }
        self.stack.frames.push(ContainerFrame {
            tape_index: self.tape.len(),
            is_object,
        });
        // Placeholder; patched by the matching close.
        self.tape.append(
            if is_object {
                TapeTag::StartObject
            } else {
                TapeTag::StartArray
            },
            0,
        );
        Ok(())
    }

    /// Writes the close word, patches the open word, pops the frame, and
    /// resumes the parent container's state.
    fn close_container(&mut self, close_byte: u8) -> Result<State> {
        let frame = self.stack.frames.pop().ok_or(Error::Tape)?;
        if frame.is_object != (close_byte == b'}') {
            return Err(Error::Tape);
        }
        let close_index = self.tape.len();
        let (close_tag, open_tag) = if frame.is_object {
            (TapeTag::EndObject, TapeTag::StartObject)
        } else {
            (TapeTag::EndArray, TapeTag::StartArray)
        };
        self.tape.append(
            close_tag,
            u64::try_from(frame.tape_index).map_err(|_| Error::Tape)?,
        );
        self.tape.overwrite(
            frame.tape_index,
            open_tag,
            u64::try_from(close_index).map_err(|_| Error::Tape)?,
        );
        Ok(match self.stack.frames.last() {
            None => State::Done,
            Some(parent) if parent.is_object => State::ObjectContinue,
            Some(_) => State::ArrayContinue,
        })
    }

    #[inline]
    fn string<B: Backend>(&mut self, offset: usize) -> Result<()> {
        let payload = parse_string::<B>(self.bytes, offset, self.strings)?;
        self.tape.append(TapeTag::String, payload);
        Ok(())
    }

    fn scalar<B: Backend>(&mut self, offset: usize, byte: u8) -> Result<()> {
        match byte {
            b'"' => self.string::<B>(offset),
            b't' => self.atom(offset, b"true", TapeTag::True),
            b'f' => self.atom(offset, b"false", TapeTag::False),
            b'n' => self.atom(offset, b"null", TapeTag::Null),
            b'-' | b'0'..=b'9' => parse_number(self.bytes, offset, self.doc_len, self.tape),
            _ => Err(Error::Tape),
        }
    }

    fn atom(&mut self, offset: usize, text: &'static [u8], tag: TapeTag) -> Result<()> {
        let end = offset + text.len();
        // Padded reads: a truncated atom at end of input compares against
        // zero bytes and fails.
        if &self.bytes[offset..end] != text || !is_valid_scalar_end(self.bytes, end, self.doc_len) {
            return Err(Error::Tape);
        }
        self.tape.append(tag, 0);
        Ok(())
    }
}
