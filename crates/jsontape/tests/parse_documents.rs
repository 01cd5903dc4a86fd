//! End-to-end parses checked against the documented tape layout and the
//! reference parser.

mod common;

use common::document_to_value;
use jsontape::{Error, PaddedBytes, Parser, ParserOptions, TapeTag, minify};
use rstest::rstest;
use serde_json::{Value, json};

fn tag_string(doc: &jsontape::Document) -> String {
    doc.tags()
        .iter()
        .map(|t| char::from(*t as u8))
        .collect::<String>()
}

#[test]
fn object_with_nested_array() {
    let mut parser = Parser::new();
    let input = PaddedBytes::from(r#"{"a":1,"b":[true,null,-2.5]}"#);
    let doc = parser.parse(&input).unwrap();
    assert_eq!(tag_string(&doc), "r{\"l\"[tnd]}r");
    // The key records land in order: 4-byte length, bytes, terminator.
    assert_eq!(&doc.string_bytes()[..6], &[1, 0, 0, 0, b'a', 0]);
    assert_eq!(&doc.string_bytes()[6..12], &[1, 0, 0, 0, b'b', 0]);
    assert_eq!(
        document_to_value(&doc),
        json!({"a": 1, "b": [true, null, -2.5]})
    );
}

#[test]
fn empty_array_payloads() {
    let mut parser = Parser::new();
    let input = PaddedBytes::from("[]");
    let doc = parser.parse(&input).unwrap();
    assert_eq!(doc.tape_len(), 4);
    assert_eq!(doc.word(1).payload(), 2);
    assert_eq!(doc.word(2).payload(), 1);
    assert_eq!(document_to_value(&doc), json!([]));
}

#[test]
fn root_string_with_escape() {
    let mut parser = Parser::new();
    let input = PaddedBytes::from(r#""hello\nworld""#);
    let doc = parser.parse(&input).unwrap();
    assert_eq!(tag_string(&doc), "r\"r");
    let payload = doc.word(1).payload();
    assert_eq!(doc.string_at(payload), b"hello\nworld");
    assert_eq!(&doc.string_bytes()[..4], &[11, 0, 0, 0]);
}

#[test]
fn surrogate_pair_root_string() {
    let mut parser = Parser::new();
    let input = PaddedBytes::from(r#""\uD83D\uDE00""#);
    let doc = parser.parse(&input).unwrap();
    let payload = doc.word(1).payload();
    assert_eq!(doc.string_at(payload), &[0xF0, 0x9F, 0x98, 0x80]);
    assert_eq!(&doc.string_bytes()[..4], &[4, 0, 0, 0]);
}

#[test]
fn unterminated_string_fails() {
    let mut parser = Parser::new();
    let input = PaddedBytes::from(r#"{"x": "unterminated"#);
    assert!(matches!(parser.parse(&input), Err(Error::UnclosedString)));
}

#[test]
fn max_u64_root_number() {
    let mut parser = Parser::new();
    let input = PaddedBytes::from("18446744073709551615");
    let doc = parser.parse(&input).unwrap();
    assert_eq!(doc.word(1).tag(), Some(TapeTag::UInt64));
    assert_eq!(doc.value_word(1), 0xFFFF_FFFF_FFFF_FFFF);
}

#[test]
fn trailing_comma_in_object_fails() {
    let mut parser = Parser::new();
    let input = PaddedBytes::from(r#"{"a":1,}"#);
    assert!(matches!(parser.parse(&input), Err(Error::Tape)));
}

#[rstest]
#[case(json!({}))]
#[case(json!([[], {}, [{}]]))]
#[case(json!({"nested": {"deep": {"deeper": [1, 2, 3]}}}))]
#[case(json!(["mixed", 1, -2.5, true, null, {"k": "v"}]))]
#[case(json!({"empty string": "", "unicode": "ünïcödé 漢字 😀"}))]
#[case(json!([0.1, 0.2, 0.3, 1e10, 1e-10, -0.0]))]
#[case(json!("top level string"))]
#[case(json!(42))]
#[case(json!(null))]
fn round_trips_against_reference(#[case] expect: Value) {
    let text = serde_json::to_string(&expect).unwrap();
    let mut parser = Parser::new();
    let input = PaddedBytes::from(text.as_str());
    let doc = parser.parse(&input).unwrap();
    assert_eq!(document_to_value(&doc), expect, "{text}");
}

#[test]
fn pretty_printed_documents_parse_too() {
    let expect = json!({"a": [1, 2, {"b": "c"}], "d": null});
    let text = serde_json::to_string_pretty(&expect).unwrap();
    let mut parser = Parser::new();
    let input = PaddedBytes::from(text.as_str());
    let doc = parser.parse(&input).unwrap();
    assert_eq!(document_to_value(&doc), expect);
}

#[test]
fn document_lengths_around_the_block_size() {
    // Exactly 63, 64, 65 bytes and a couple of multiples.
    let mut parser = Parser::new();
    for target in [63usize, 64, 65, 127, 128, 129, 192] {
        let fill = target - 4; // ["<fill>"]
        let doc_text = format!("[\"{}\"]", "x".repeat(fill));
        assert_eq!(doc_text.len(), target);
        let input = PaddedBytes::from(doc_text.as_str());
        let doc = parser.parse(&input).unwrap();
        assert_eq!(
            document_to_value(&doc),
            json!(["x".repeat(fill)]),
            "len {target}"
        );
    }
}

#[test]
fn depth_limit_boundary() {
    let mut parser = Parser::with_options(ParserOptions {
        max_depth: 32,
        ..ParserOptions::default()
    })
    .unwrap();
    let at_limit = format!("{}{}", "[".repeat(32), "]".repeat(32));
    assert!(parser.parse(&PaddedBytes::from(at_limit.as_str())).is_ok());
    let over = format!("{}{}", "[".repeat(33), "]".repeat(33));
    assert!(matches!(
        parser.parse(&PaddedBytes::from(over.as_str())),
        Err(Error::Depth)
    ));
}

#[test]
fn dump_renders_every_word() {
    let mut parser = Parser::new();
    let input = PaddedBytes::from(r#"{"n": -2.5, "big": 18446744073709551615, "t": true}"#);
    let doc = parser.parse(&input).unwrap();
    let dump = doc.dump();
    assert!(dump.contains("float -2.5"));
    assert!(dump.contains("unsigned integer 18446744073709551615"));
    assert!(dump.contains("string \"n\""));
    assert!(dump.contains("true"));
}

#[test]
fn minify_then_parse_preserves_the_document() {
    let expect = json!({"a": [1, 2.5, "s p a c e s"], "b": {"c": null}});
    let pretty = serde_json::to_string_pretty(&expect).unwrap();
    let minified = minify(&PaddedBytes::from(pretty.as_str())).unwrap();
    assert!(minified.len() < pretty.len());
    let mut parser = Parser::new();
    let input = PaddedBytes::from_vec(minified);
    let doc = parser.parse(&input).unwrap();
    assert_eq!(document_to_value(&doc), expect);
}

#[rstest]
#[case(&b"[1, 2"[..], Error::Tape)]
#[case(&b"[\"a\x02b\"]"[..], Error::UnescapedChars)]
#[case(&b"[\"\xC0\xAF\"]"[..], Error::Utf8)]
#[case(&b"  "[..], Error::Empty)]
#[case(&b"[01]"[..], Error::Number)]
#[case(&b"[\"\\q\"]"[..], Error::StringEscape)]
#[case(&b"{} {}"[..], Error::TrailingContent)]
fn failure_taxonomy(#[case] doc: &[u8], #[case] expect: Error) {
    let mut parser = Parser::new();
    let input = PaddedBytes::copy_from(doc);
    let got = parser.parse(&input).expect_err("must fail");
    assert_eq!(
        core::mem::discriminant(&got),
        core::mem::discriminant(&expect),
        "doc {doc:?}: got {got:?}"
    );
}
