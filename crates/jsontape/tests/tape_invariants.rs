//! Structural invariants of the finished tape, checked over generated
//! documents.

use jsontape::{PaddedBytes, Parser, TapeTag, TapeWord};
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

/// Serialized JSON built from a tiny grammar walker, so the invariants are
/// exercised over arbitrary nesting shapes without depending on any other
/// serializer.
#[derive(Debug, Clone)]
struct DocText(String);

impl Arbitrary for DocText {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut out = String::new();
        write_value(g, 3, &mut out);
        DocText(out)
    }
}

fn write_value(g: &mut Gen, depth: usize, out: &mut String) {
    let choice = u8::arbitrary(g) % if depth == 0 { 5 } else { 7 };
    match choice {
        0 => out.push_str("null"),
        1 => out.push_str(if bool::arbitrary(g) { "true" } else { "false" }),
        2 => out.push_str(&i32::arbitrary(g).to_string()),
        3 => {
            let numerator = i32::arbitrary(g);
            out.push_str(&format!("{numerator}.5e{}", i8::arbitrary(g) % 30));
        }
        4 => {
            out.push('"');
            for _ in 0..usize::arbitrary(g) % 8 {
                out.push(char::from(b'a' + u8::arbitrary(g) % 26));
            }
            out.push('"');
        }
        5 => {
            out.push('[');
            let len = usize::arbitrary(g) % 4;
            for k in 0..len {
                if k > 0 {
                    out.push(',');
                }
                write_value(g, depth - 1, out);
            }
            out.push(']');
        }
        _ => {
            out.push('{');
            let len = usize::arbitrary(g) % 4;
            for k in 0..len {
                if k > 0 {
                    out.push(',');
                }
                out.push('"');
                out.push(char::from(b'k' + u8::try_from(k).unwrap()));
                out.push_str("\":");
                write_value(g, depth - 1, out);
            }
            out.push('}');
        }
    }
}

fn words_of(text: &str) -> Vec<u64> {
    let mut parser = Parser::new();
    let input = PaddedBytes::from(text);
    let doc = parser
        .parse(&input)
        .unwrap_or_else(|e| panic!("{text:?} failed: {e}"));
    doc.raw_tape().to_vec()
}

/// Walks the words, skipping numeric value words, calling `check` on each
/// tagged word.
fn each_tagged_word(words: &[u64], mut check: impl FnMut(usize, TapeWord)) {
    let mut i = 0;
    while i < words.len() {
        let word = TapeWord::raw(words[i]);
        let tag = word.tag().expect("every live word carries a valid tag");
        check(i, word);
        i += if tag.has_value_word() { 2 } else { 1 };
    }
}

#[quickcheck]
fn roots_bracket_the_tape(doc: DocText) -> bool {
    let words = words_of(&doc.0);
    let first = TapeWord::raw(words[0]);
    let last = TapeWord::raw(words[words.len() - 1]);
    first.tag() == Some(TapeTag::Root)
        && last.tag() == Some(TapeTag::Root)
        && first.payload() == u64::try_from(words.len() - 1).unwrap()
        && last.payload() == 0
}

#[quickcheck]
fn scope_payloads_are_mutually_inverse(doc: DocText) -> bool {
    let words = words_of(&doc.0);
    let mut ok = true;
    each_tagged_word(&words, |i, word| match word.tag() {
        Some(TapeTag::StartObject) => {
            let close = usize::try_from(word.payload()).unwrap();
            let close_word = TapeWord::raw(words[close]);
            ok &= close_word.tag() == Some(TapeTag::EndObject)
                && usize::try_from(close_word.payload()).unwrap() == i;
        }
        Some(TapeTag::StartArray) => {
            let close = usize::try_from(word.payload()).unwrap();
            let close_word = TapeWord::raw(words[close]);
            ok &= close_word.tag() == Some(TapeTag::EndArray)
                && usize::try_from(close_word.payload()).unwrap() == i;
        }
        _ => {}
    });
    ok
}

#[quickcheck]
fn object_children_alternate_key_value(doc: DocText) -> bool {
    let words = words_of(&doc.0);
    let mut ok = true;
    each_tagged_word(&words, |i, word| {
        if word.tag() == Some(TapeTag::StartObject) {
            let close = usize::try_from(word.payload()).unwrap();
            // Walk direct children between open and close.
            let mut at = i + 1;
            let mut expect_key = true;
            while at < close {
                let child = TapeWord::raw(words[at]);
                let tag = child.tag().expect("valid child tag");
                if expect_key {
                    ok &= tag == TapeTag::String;
                    at += 1;
                } else {
                    at = match tag {
                        TapeTag::StartObject | TapeTag::StartArray => {
                            usize::try_from(child.payload()).unwrap() + 1
                        }
                        _ if tag.has_value_word() => at + 2,
                        _ => at + 1,
                    };
                }
                expect_key = !expect_key;
            }
            // A complete object ends expecting a key again.
            ok &= expect_key;
        }
    });
    ok
}
