use proptest::prelude::*;
use textpp::script::stmt::parse_program;
use textpp::substitute::substitute;
use textpp::{process_str, Options, Preprocessor, Source};

fn inline_prefixes() -> Vec<String> {
    vec!["PyPP_".to_owned(), "M4_".to_owned()]
}

proptest! {
    /// The embedded-code parser returns Ok or Err on any input, never panics.
    #[test]
    fn parser_does_not_panic(s in "\\PC*") {
        let _ = parse_program(&s);
    }
}

/// Operands at the edges of the integer, float and size ranges.
const EDGE_OPERANDS: &[&str] = &[
    "0",
    "1",
    "-1",
    "9223372036854775807",
    "(-9223372036854775807 - 1)",
    "1114112",
    "1e300",
    "-1e300",
    "float('inf')",
    "float('nan')",
    "2.5",
    "'ab'",
    "''",
    "[1, 2]",
    "(1,)",
    "range(-9223372036854775807, 9223372036854775807)",
    "None",
    "True",
];

fn edge_expr() -> impl Strategy<Value = String> {
    let leaf = prop::sample::select(EDGE_OPERANDS).prop_map(str::to_owned);
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            (
                inner.clone(),
                prop::sample::select(vec![
                    "+", "-", "*", "/", "//", "%", "**", "<<", ">>", "&", "|", "==", "<", "in",
                ]),
                inner.clone(),
            )
                .prop_map(|(l, op, r)| format!("({l} {op} {r})")),
            (
                prop::sample::select(vec!["int", "round", "chr", "abs", "len", "hex", "str", "float", "bool"]),
                inner.clone(),
            )
                .prop_map(|(f, x)| format!("{f}({x})")),
            (inner.clone(), inner.clone()).prop_map(|(x, n)| format!("round({x}, {n})")),
            (inner.clone(), inner.clone()).prop_map(|(s, w)| format!("str({s}).center({w})")),
            (
                prop::sample::select(vec!["%c", "%d", "%.3f", "%s", "%x"]),
                inner.clone(),
            )
                .prop_map(|(f, x)| format!("('{f}' % {x})")),
            (inner.clone(), inner.clone(), inner)
                .prop_map(|(s, a, b)| format!("str({s})[{a}:{b}:{a}]")),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Scripts over edge-case values finish with output or an error, never a
    /// panic, a hang or an unbounded allocation.
    #[test]
    fn edge_case_scripts_do_not_panic(expr in edge_expr()) {
        let doc = format!("### PyPP out(str({expr}))\n");
        match process_str(&doc, Options::default()) {
            Ok(out) => prop_assert!(out.len() <= textpp::script::value::MAX_SIZE),
            Err(err) => prop_assert!(!err.to_string().is_empty()),
        }
    }
}

proptest! {
    /// Lines carrying no prefix of any kind pass through byte for byte.
    #[test]
    fn unprefixed_document_is_unchanged(
        lines in prop::collection::vec("[a-z0-9 .,;:!?=(){}\\[\\]-]{0,40}", 0..12),
        trailing_newline in any::<bool>(),
    ) {
        let mut doc = lines.join("\n");
        if trailing_newline && !doc.is_empty() {
            doc.push('\n');
        }
        let out = process_str(&doc, Options::default()).unwrap();
        prop_assert_eq!(out, doc);
    }
}

proptest! {
    /// A bound key is always replaced by its value, whatever surrounds it.
    #[test]
    fn bound_key_is_replaced(
        before in "[a-z ]{0,20}",
        key in "[A-Z][A-Z0-9_]{0,10}",
        value in "[a-z0-9 ]{0,20}",
        after in " [a-z ]{0,20}",
    ) {
        let line = format!("{before}PyPP_{key}{after}\n");
        let result = substitute(&line, &inline_prefixes(), |k| {
            Ok((k == key).then(|| value.clone()))
        }).unwrap();
        prop_assert_eq!(result.text, format!("{before}{value}{after}\n"));
        prop_assert!(result.unresolved.is_empty());
    }
}

proptest! {
    /// Unbound keys leave the line untouched and are each reported once.
    #[test]
    fn unbound_keys_are_kept_and_reported(
        keys in prop::collection::vec("[A-Z][A-Z0-9]{0,6}", 1..5),
    ) {
        let line = keys.iter().map(|k| format!("M4_{k}")).collect::<Vec<_>>().join(" ");
        let result = substitute(&line, &inline_prefixes(), |_| Ok(None)).unwrap();
        prop_assert_eq!(&result.text, &line);
        let expected: Vec<String> = keys.iter().map(|k| format!("M4_{k}")).collect();
        prop_assert_eq!(result.unresolved, expected);
    }
}

proptest! {
    /// Removing the ignore lines from the input gives exactly the output.
    #[test]
    fn ignore_lines_are_dropped(
        lines in prop::collection::vec(
            prop_oneof!["[a-z ]{0,20}", "<PyPP#[a-z ]{0,20}"],
            0..12,
        ),
    ) {
        let doc: String = lines.iter().map(|l| format!("{l}\n")).collect();
        let expected: String = lines
            .iter()
            .filter(|l| !l.starts_with("<PyPP#"))
            .map(|l| format!("{l}\n"))
            .collect();
        prop_assert_eq!(process_str(&doc, Options::default()).unwrap(), expected);
    }
}

proptest! {
    /// Nothing inside a divert block reaches the output.
    #[test]
    fn divert_hides_its_body(
        body in prop::collection::vec("[a-zA-Z_ ]{0,20}", 0..8),
    ) {
        let mut doc = String::from("### PyPP divert\n");
        for line in &body {
            doc.push_str(line);
            doc.push('\n');
        }
        doc.push_str("### PyPP end\n");
        let mut pp = Preprocessor::new(Options::default());
        pp.include(Source::text("doc", &doc)).unwrap();
        pp.finish().unwrap();
        prop_assert!(pp.output().is_empty());
    }
}
