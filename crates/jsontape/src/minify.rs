//! Whitespace removal sharing the stage-1 scanning kernels.
//!
//! Minification runs the same per-block mask pipeline as structural
//! indexing (backslash parity, quote resolution) but instead of building
//! an index it drops every whitespace byte that lies outside a string.
//! Nothing else is validated; the only error is a string left open at end
//! of input.

use crate::error::{Error, Result};
use crate::implementation::Implementation;
use crate::padded::PaddedBytes;
use crate::simd::{BLOCK_BYTES, Backend, Chunk};
use crate::stage1::{BackslashParity, QuoteState};

/// Removes insignificant whitespace from `input` using the best available
/// kernel.
///
/// # Errors
///
/// [`Error::UnclosedString`] when the input ends inside a string.
pub fn minify(input: &PaddedBytes) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    (Implementation::detect().minify)(input, &mut out)?;
    Ok(out)
}

/// Kernel-parameterized minifier; registered per backend.
pub(crate) fn minify_with<B: Backend>(input: &PaddedBytes, out: &mut Vec<u8>) -> Result<()> {
    let len = input.len();
    let bytes = input.padded();
    let mut backslashes = BackslashParity::default();
    let mut quotes = QuoteState::default();

    let mut block = [0u8; BLOCK_BYTES];
    let mut pos = 0;
    while pos < len {
        let take = BLOCK_BYTES.min(len - pos);
        if take == BLOCK_BYTES {
            block.copy_from_slice(&bytes[pos..pos + BLOCK_BYTES]);
        } else {
            // Space-fill the tail; trailing spaces are outside any closed
            // string and drop out on their own.
            block = [0x20; BLOCK_BYTES];
            block[..take].copy_from_slice(&bytes[pos..len]);
        }
        let chunk = Chunk::<B::Vec>::load(&block);
        let odd_ends = backslashes.odd_run_ends(chunk.eq(b'\\'));
        let quote_masks = quotes.resolve::<B>(chunk.eq(b'"'), odd_ends);
        let whitespace = chunk.classify().whitespace;

        // Keep everything except whitespace outside the quoted regions.
        let mut keep = !(whitespace & !quote_masks.region);
        let mut at = 0usize;
        while keep != 0 {
            let skip = keep.trailing_zeros() as usize;
            keep >>= skip;
            at += skip;
            let run = (!keep).trailing_zeros() as usize;
            out.extend_from_slice(&block[at..at + run]);
            at += run;
            keep = if run == BLOCK_BYTES { 0 } else { keep >> run };
        }
        pos += BLOCK_BYTES;
    }

    if quotes.inside_string() {
        return Err(Error::UnclosedString);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::fallback::Fallback;

    fn run(doc: &str) -> Result<String> {
        let input = PaddedBytes::from(doc);
        let mut out = Vec::new();
        minify_with::<Fallback>(&input, &mut out)?;
        Ok(String::from_utf8(out).expect("minified output is utf-8"))
    }

    #[test]
    fn strips_whitespace_between_tokens() {
        assert_eq!(
            run("{ \"a\" : 1 ,\n\t\"b\" : [ true , null ] }").unwrap(),
            "{\"a\":1,\"b\":[true,null]}"
        );
    }

    #[test]
    fn preserves_whitespace_inside_strings() {
        assert_eq!(
            run("{ \"a b\" : \" c\\td \" }").unwrap(),
            "{\"a b\":\" c\\td \"}"
        );
        // An escaped quote does not end the protected region.
        assert_eq!(run("[\" a\\\" b \"]").unwrap(), "[\" a\\\" b \"]");
    }

    #[test]
    fn unclosed_string_reported() {
        assert!(matches!(run("[\"abc"), Err(Error::UnclosedString)));
    }

    #[test]
    fn empty_and_all_whitespace() {
        assert_eq!(run("").unwrap(), "");
        assert_eq!(run(" \n\t\r ").unwrap(), "");
    }

    #[test]
    fn long_documents_cross_blocks() {
        let doc = format!("[ {} 1 ]", "\"filler words here\" , ".repeat(20));
        let out = run(&doc).unwrap();
        assert!(!out.contains(" ,"));
        assert!(out.contains("\"filler words here\""));
        assert!(out.ends_with(",1]"));
    }

    #[test]
    fn public_entry_uses_detected_kernel() {
        let input = PaddedBytes::from("[ 1 , 2 ]");
        assert_eq!(minify(&input).unwrap(), b"[1,2]");
    }
}
