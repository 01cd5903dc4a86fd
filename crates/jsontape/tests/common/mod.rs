//! Shared helpers: reconstruct a `serde_json::Value` from a finished tape
//! so documents can be checked against the reference parser.

use jsontape::{Document, TapeTag};
use serde_json::{Map, Value};

/// Rebuilds the document value by walking the tape between the two root
/// words.
pub fn document_to_value(doc: &Document) -> Value {
    let root = doc.word(0);
    assert_eq!(root.tag(), Some(TapeTag::Root), "tape starts with a root");
    let end = usize::try_from(root.payload()).unwrap();
    assert_eq!(end, doc.tape_len() - 1, "root points at the closing root");
    assert_eq!(doc.word(end).tag(), Some(TapeTag::Root));
    assert_eq!(doc.word(end).payload(), 0);
    let (value, next) = value_at(doc, 1);
    assert_eq!(next, end, "exactly one value between the roots");
    value
}

fn string_at(doc: &Document, payload: u64) -> String {
    String::from_utf8(doc.string_at(payload).to_vec()).expect("decoded strings are utf-8")
}

#[expect(clippy::cast_possible_wrap)]
fn value_at(doc: &Document, at: usize) -> (Value, usize) {
    let word = doc.word(at);
    match word.tag().expect("valid tape tag") {
        TapeTag::Null => (Value::Null, at + 1),
        TapeTag::True => (Value::Bool(true), at + 1),
        TapeTag::False => (Value::Bool(false), at + 1),
        TapeTag::String => (Value::String(string_at(doc, word.payload())), at + 1),
        TapeTag::Int64 => (Value::from(doc.value_word(at) as i64), at + 2),
        TapeTag::UInt64 => (Value::from(doc.value_word(at)), at + 2),
        TapeTag::Double => (Value::from(f64::from_bits(doc.value_word(at))), at + 2),
        TapeTag::StartArray => {
            let close = usize::try_from(word.payload()).unwrap();
            let mut items = Vec::new();
            let mut cursor = at + 1;
            while cursor < close {
                let (item, next) = value_at(doc, cursor);
                items.push(item);
                cursor = next;
            }
            (Value::Array(items), close + 1)
        }
        TapeTag::StartObject => {
            let close = usize::try_from(word.payload()).unwrap();
            let mut map = Map::new();
            let mut cursor = at + 1;
            while cursor < close {
                let key_word = doc.word(cursor);
                assert_eq!(key_word.tag(), Some(TapeTag::String), "keys are strings");
                let key = string_at(doc, key_word.payload());
                let (item, next) = value_at(doc, cursor + 1);
                map.insert(key, item);
                cursor = next;
            }
            (Value::Object(map), close + 1)
        }
        tag @ (TapeTag::Root | TapeTag::EndObject | TapeTag::EndArray) => {
            panic!("unexpected {tag:?} at tape index {at}")
        }
    }
}
