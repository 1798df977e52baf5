use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::tests::utils::{Event, RecordingSink, assert_parses, list, obj, string};
use crate::{ParserOptions, XmlParser};

#[test]
fn empty_root_object() {
    assert_parses("<root></root>", &[obj(""), Event::EndObject]);
}

#[test]
fn literals_are_transported_as_text() {
    assert_parses(
        "<root>true</root>",
        &[obj(""), string("", "true"), Event::EndObject],
    );
    assert_parses(
        "<root>false</root>",
        &[obj(""), string("", "false"), Event::EndObject],
    );
    assert_parses(
        "<root>null</root>",
        &[obj(""), string("", "null"), Event::EndObject],
    );
}

#[test]
fn numbers_are_transported_as_text() {
    assert_parses(
        "<root>42.5</root>",
        &[obj(""), string("", "42.5"), Event::EndObject],
    );
    assert_parses(
        "<root>1.2345e-10</root>",
        &[obj(""), string("", "1.2345e-10"), Event::EndObject],
    );
    assert_parses(
        "<root>-79497823553162765</root>",
        &[obj(""), string("", "-79497823553162765"), Event::EndObject],
    );
    assert_parses(
        "<root>11779497823553162765</root>",
        &[obj(""), string("", "11779497823553162765"), Event::EndObject],
    );
}

#[test]
fn empty_list() {
    assert_parses("<_list_empty></_list_empty>", &[list("empty"), Event::EndList]);
}

#[test]
fn attribute_and_empty_child() {
    assert_parses(
        r#"<root test="value"><empty></empty></root>"#,
        &[
            obj(""),
            string("test", "value"),
            obj("empty"),
            Event::EndObject,
            Event::EndObject,
        ],
    );
}

#[test]
fn single_and_double_quoted_attributes() {
    assert_parses(
        r#"<root test=""></root>"#,
        &[obj(""), string("test", ""), Event::EndObject],
    );
    assert_parses(
        "<root test=''></root>",
        &[obj(""), string("test", ""), Event::EndObject],
    );
    assert_parses(
        r#"<root test="Some String"></root>"#,
        &[obj(""), string("test", "Some String"), Event::EndObject],
    );
    assert_parses(
        "<root test='Another String'></root>",
        &[obj(""), string("test", "Another String"), Event::EndObject],
    );
}

#[test]
fn key_shapes() {
    assert_parses(
        "<root s=\"true\" d=\"false\" key=\"null\">\
         <_list_snake_key></_list_snake_key><camelKey></camelKey></root>",
        &[
            obj(""),
            string("s", "true"),
            string("d", "false"),
            string("key", "null"),
            list("snake_key"),
            Event::EndList,
            obj("camelKey"),
            Event::EndObject,
            Event::EndObject,
        ],
    );
}

#[test]
fn keys_with_reserved_prefixes() {
    assert_parses(
        r#"<root nullkey="a" truekey="b" falsekey="c"></root>"#,
        &[
            obj(""),
            string("nullkey", "a"),
            string("truekey", "b"),
            string("falsekey", "c"),
            Event::EndObject,
        ],
    );
}

#[test]
fn list_children_are_anonymous_objects() {
    assert_parses(
        "<root><_list_items><items>a</items><items>b</items></_list_items></root>",
        &[
            obj(""),
            list("items"),
            obj(""),
            string("", "a"),
            Event::EndObject,
            obj(""),
            string("", "b"),
            Event::EndObject,
            Event::EndList,
            Event::EndObject,
        ],
    );
}

#[test]
fn anonymous_wrappers_emit_no_object_events() {
    assert_parses(
        "<_list_items><anonymous>a</anonymous><anonymous>b</anonymous></_list_items>",
        &[
            list("items"),
            string("", "a"),
            string("", "b"),
            Event::EndList,
        ],
    );
}

#[test]
fn lists_nested_through_objects() {
    assert_parses(
        "<root><_list_test><test><_list_test11><test11>22</test11>\
         <test11>-127</test11></_list_test11></test>\
         <test key=\"true\"></test></_list_test></root>",
        &[
            obj(""),
            list("test"),
            obj(""),
            list("test11"),
            obj(""),
            string("", "22"),
            Event::EndObject,
            obj(""),
            string("", "-127"),
            Event::EndObject,
            Event::EndList,
            Event::EndObject,
            obj(""),
            string("key", "true"),
            Event::EndObject,
            Event::EndList,
            Event::EndObject,
        ],
    );
}

#[test]
fn object_values_mix() {
    assert_parses(
        "<root t=\"true\" s=\"a string\" pi=\"22\" nd=\"-1056.4\">\
         <_list_l2><l2><_list_l22></_list_l22></l2></_list_l2>\
         <o key=\"true\"></o></root>",
        &[
            obj(""),
            string("t", "true"),
            string("s", "a string"),
            string("pi", "22"),
            string("nd", "-1056.4"),
            list("l2"),
            obj(""),
            list("l22"),
            Event::EndList,
            Event::EndObject,
            Event::EndList,
            obj("o"),
            string("key", "true"),
            Event::EndObject,
            Event::EndObject,
        ],
    );
}

#[test]
fn nested_root_tag_keeps_its_name() {
    // Only a top-level `root` maps to the anonymous object.
    assert_parses(
        "<root><root></root></root>",
        &[obj(""), obj("root"), Event::EndObject, Event::EndObject],
    );
}

#[test]
fn slash_inside_start_tag_is_tolerated() {
    // `/>` does not close the element; a matching end tag is still required.
    assert_parses("<root /></root>", &[obj(""), Event::EndObject]);
}

#[test]
fn unicode_escapes_pass_through_text_verbatim() {
    assert_parses(
        "<root>\"\\u0639\\u0631\\u0628\\u0649\"</root>",
        &[
            obj(""),
            string("", "\"\\u0639\\u0631\\u0628\\u0649\""),
            Event::EndObject,
        ],
    );
}

#[test]
fn unicode_escapes_decode_in_attribute_values() {
    assert_parses(
        r#"<root k="\u0041\u00e9\u2603"></root>"#,
        &[obj(""), string("k", "Aé☃"), Event::EndObject],
    );
}

#[test]
fn surrogate_pairs_fold_into_supplementary_code_points() {
    assert_parses(
        r#"<root k="\ud83c\udf6f and \ud83d\udc1d"></root>"#,
        &[
            obj(""),
            string("k", "\u{1F36F} and \u{1F41D}"),
            Event::EndObject,
        ],
    );
}

#[test]
fn ascii_escapes_decode_in_attribute_values() {
    assert_parses(
        r#"<root k="a\tb\nc\rd\be\ff\vg\\h\"i\'j"></root>"#,
        &[
            obj(""),
            string("k", "a\tb\nc\rd\u{8}e\u{c}f\u{b}g\\h\"i'j"),
            Event::EndObject,
        ],
    );
}

#[test]
fn multibyte_content_survives_any_split() {
    assert_parses(
        r#"<root note="héllo ☃ 🍯"></root>"#,
        &[obj(""), string("note", "héllo ☃ 🍯"), Event::EndObject],
    );
    assert_parses(
        "<root>héllo ☃</root>",
        &[obj(""), string("", "héllo ☃"), Event::EndObject],
    );
}

#[test]
fn predefined_entities_are_validated_not_decoded() {
    assert_parses(
        "<root>a&lt;b&amp;c&gt;d&apos;e&quot;f</root>",
        &[
            obj(""),
            string("", "a&lt;b&amp;c&gt;d&apos;e&quot;f"),
            Event::EndObject,
        ],
    );
}

#[test]
fn unknown_characters_are_fine_inside_attribute_values() {
    assert_parses(
        r#"<root key="*&#25"></root>"#,
        &[obj(""), string("key", "*&#25"), Event::EndObject],
    );
}

#[test]
fn declarations_and_comments_are_skipped() {
    assert_parses(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><root></root>",
        &[obj(""), Event::EndObject],
    );
    assert_parses(
        "<!-- a comment --><root></root>",
        &[obj(""), Event::EndObject],
    );
    assert_parses(
        "<root><!-- inner comment --></root>",
        &[obj(""), Event::EndObject],
    );
    assert_parses("<root><?pi target?></root>", &[obj(""), Event::EndObject]);
}

#[test]
fn whitespace_around_and_inside_elements() {
    assert_parses("  <root></root>  ", &[obj(""), Event::EndObject]);
    assert_parses("<root>   </root>", &[obj(""), Event::EndObject]);
    assert_parses(
        "<root>\n  <empty></empty>\n</root>",
        &[obj(""), obj("empty"), Event::EndObject, Event::EndObject],
    );
}

#[test]
fn nesting_up_to_the_limit_succeeds() {
    let mut xml = String::from("<root>");
    for i in 0..99 {
        xml.push_str(&format!("<a{i}>"));
    }
    for i in (0..99).rev() {
        xml.push_str(&format!("</a{i}>"));
    }
    xml.push_str("</root>");

    let mut expected = Vec::new();
    expected.push(obj(""));
    for i in 0..99 {
        expected.push(obj(&format!("a{i}")));
    }
    for _ in 0..100 {
        expected.push(Event::EndObject);
    }

    // The document is large; exercise a representative set of splits rather
    // than every byte position.
    let bytes = xml.as_bytes();
    for split in [0, 1, bytes.len() / 2, bytes.len()] {
        let events = crate::tests::utils::parse_split(bytes, split).unwrap();
        assert_eq!(events, expected);
    }
}

#[test]
fn custom_depth_limit_is_respected_at_the_boundary() {
    let options = ParserOptions {
        max_recursion_depth: 3,
        ..Default::default()
    };
    let mut parser = XmlParser::with_options(RecordingSink::default(), options.clone());
    parser.parse(b"<root><a><b></b></a></root>").unwrap();
    parser.finish_parse().unwrap();

    let mut parser = XmlParser::with_options(RecordingSink::default(), options);
    let result = parser
        .parse(b"<root><a><b><c></c></b></a></root>")
        .and_then(|()| parser.finish_parse());
    let err = result.unwrap_err();
    assert_eq!(err.kind(), crate::ParseErrorKind::RecursionDepthExceeded);
    assert!(
        err.message()
            .starts_with("Message too deep. Max recursion depth reached for tag 'c'"),
        "{err}"
    );
}

#[test]
fn set_max_recursion_depth_applies_to_later_input() {
    let mut parser = XmlParser::new(RecordingSink::default());
    parser.set_max_recursion_depth(2);
    let result = parser
        .parse(b"<root><a><b></b></a></root>")
        .and_then(|()| parser.finish_parse());
    assert_eq!(
        result.unwrap_err().kind(),
        crate::ParseErrorKind::RecursionDepthExceeded
    );
}

#[test]
fn lists_do_not_count_toward_recursion_depth() {
    // Three object frames, two list frames: passes with the limit at three,
    // while the equivalent pure-object nesting of five would not.
    let options = ParserOptions {
        max_recursion_depth: 3,
        ..Default::default()
    };
    let mut parser = XmlParser::with_options(RecordingSink::default(), options);
    parser
        .parse(b"<root><_list_a><a><_list_b><b></b></_list_b></a></_list_a></root>")
        .unwrap();
    parser.finish_parse().unwrap();
}

#[test]
fn finish_is_idempotent_after_success() {
    let mut parser = XmlParser::new(RecordingSink::default());
    parser.parse(b"<root></root>   ").unwrap();
    parser.finish_parse().unwrap();
    parser.finish_parse().unwrap();
}

#[test]
fn whitespace_only_input_is_accepted_when_opted_in() {
    let options = ParserOptions {
        allow_no_root_element: true,
        ..Default::default()
    };
    let mut parser = XmlParser::with_options(RecordingSink::default(), options.clone());
    parser.parse(b"   \n\t  ").unwrap();
    parser.finish_parse().unwrap();
    assert!(parser.sink_mut().events.is_empty());

    let mut parser = XmlParser::with_options(RecordingSink::default(), options);
    parser.finish_parse().unwrap();
    assert!(parser.sink_mut().events.is_empty());
}

#[test]
fn whitespace_only_input_is_rejected_by_default() {
    let mut parser = XmlParser::new(RecordingSink::default());
    parser.parse(b"   ").unwrap();
    let err = parser.finish_parse().unwrap_err();
    assert_eq!(err.kind(), crate::ParseErrorKind::ExpectedOpenTag);
    assert!(err.message().starts_with("Unexpected end of string."));
}

#[test]
fn invalid_utf8_is_replaced_when_coercing() {
    let options = ParserOptions {
        coerce_to_utf8: true,
        ..Default::default()
    };
    let mut parser = XmlParser::with_options(RecordingSink::default(), options);
    parser.parse(b"<root t=\"a\xFFb\"></root>").unwrap();
    parser.finish_parse().unwrap();
    assert_eq!(
        parser.sink_mut().events,
        &[obj(""), string("t", "a b"), Event::EndObject]
    );
}

#[test]
fn custom_replacement_character_is_used() {
    let options = ParserOptions {
        coerce_to_utf8: true,
        utf8_replacement_character: String::from("?"),
        ..Default::default()
    };
    let mut parser = XmlParser::with_options(RecordingSink::default(), options);
    parser.parse(b"<root t=\"\xFF\xFE\"></root>").unwrap();
    parser.finish_parse().unwrap();
    assert_eq!(
        parser.sink_mut().events,
        &[obj(""), string("t", "??"), Event::EndObject]
    );
}
