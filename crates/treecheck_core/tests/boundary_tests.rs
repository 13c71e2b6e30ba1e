use treecheck_core::core::datatype::builtin;
use treecheck_core::core::name::{NameSignature, UNKNOWN_NAME};
use treecheck_core::core::schema::{Schema, SchemaBuilder};
use treecheck_core::core::validator::{Attribute, Validator};
use treecheck_core::errors::ValidationErrorKind;

/// `x` carries any number (or exactly one) of arbitrary attributes whose
/// values are unconstrained.
fn any_attribute_schema(repeated: bool) -> Schema {
    let mut b = SchemaBuilder::new();
    let start = b.add_state(false, true);
    let att = b.add_state(false, false);
    let value = b.add_state(false, true);
    let value_done = b.add_state(true, true);
    let content = b.add_state(true, true);
    let done = b.add_state(true, true);

    let x = b.name("", "x");
    b.element(start, NameSignature::exact(x), att, done);
    b.attribute(att, NameSignature::any(), repeated, value, content);
    b.data(value, builtin("", "string").unwrap(), None, value_done);
    b.finish(start, UNKNOWN_NAME).unwrap()
}

#[test]
fn test_single_occurrence_attribute_rejects_two_matches() {
    let schema = any_attribute_schema(false);
    let mut v = Validator::new(&schema);
    let attrs = [
        Attribute { uri: "", local: "y", value: "1" },
        Attribute { uri: "", local: "z", value: "2" },
    ];
    let err = v.start_element("", "x", "x", &attrs).unwrap_err();
    assert_eq!(err.kind, ValidationErrorKind::UnexpectedStartTag);
}

#[test]
fn test_single_occurrence_attribute_accepts_one_match() {
    let schema = any_attribute_schema(false);
    let mut v = Validator::new(&schema);
    let attrs = [Attribute { uri: "", local: "y", value: "1" }];
    v.start_element("", "x", "x", &attrs).unwrap();
    v.end_element("x").unwrap();
    assert!(v.end_document());
}

#[test]
fn test_repeated_attribute_accepts_several_matches() {
    let schema = any_attribute_schema(true);
    let mut v = Validator::new(&schema);
    let attrs = [
        Attribute { uri: "", local: "y", value: "1" },
        Attribute { uri: "", local: "z", value: "2" },
    ];
    v.start_element("", "x", "x", &attrs).unwrap();
    v.end_element("x").unwrap();
    assert!(v.end_document());
}

#[test]
fn test_repeated_attribute_still_requires_one_match() {
    let schema = any_attribute_schema(true);
    let mut v = Validator::new(&schema);
    let err = v.start_element("", "x", "x", &[]).unwrap_err();
    assert_eq!(err.kind, ValidationErrorKind::UnexpectedStartTag);
}

/// Nested elements each requiring their own `y` attribute: expansion must
/// only ever see the snapshot of the element being opened.
fn nested_attribute_schema() -> Schema {
    let mut b = SchemaBuilder::new();
    let start = b.add_state(false, true);
    let out_att = b.add_state(false, false);
    let value = b.add_state(false, true);
    let value_done = b.add_state(true, true);
    let inner = b.add_state(false, true);
    let in_att = b.add_state(false, false);
    let in_content = b.add_state(true, true);
    let out_end = b.add_state(true, true);
    let done = b.add_state(true, true);

    let out = b.name("", "out");
    let inn = b.name("", "in");
    let y = b.name("", "y");

    b.element(start, NameSignature::exact(out), out_att, done);
    b.attribute(out_att, NameSignature::exact(y), false, value, inner);
    b.element(inner, NameSignature::exact(inn), in_att, out_end);
    b.attribute(in_att, NameSignature::exact(y), false, value, in_content);
    b.data(value, builtin("", "string").unwrap(), None, value_done);
    b.finish(start, UNKNOWN_NAME).unwrap()
}

#[test]
fn test_nested_elements_use_their_own_snapshot() {
    let schema = nested_attribute_schema();
    let mut v = Validator::new(&schema);
    let y = |value| [Attribute { uri: "", local: "y", value }];
    v.start_element("", "out", "out", &y("1")).unwrap();
    v.start_element("", "in", "in", &y("2")).unwrap();
    v.end_element("in").unwrap();
    v.end_element("out").unwrap();
    assert!(v.end_document());
}

#[test]
fn test_inner_element_cannot_borrow_outer_attribute() {
    let schema = nested_attribute_schema();
    let mut v = Validator::new(&schema);
    let attrs = [Attribute { uri: "", local: "y", value: "1" }];
    v.start_element("", "out", "out", &attrs).unwrap();
    let err = v.start_element("", "in", "in", &[]).unwrap_err();
    assert_eq!(err.kind, ValidationErrorKind::UnexpectedStartTag);
    assert_eq!(err.path, "/out/in");
}

/// Attribute-free guard: `x` may carry the `id` attribute and nothing else.
fn guarded_schema() -> Schema {
    let mut b = SchemaBuilder::new();
    let start = b.add_state(false, true);
    let guard = b.add_state(false, false);
    let content = b.add_state(true, true);
    let done = b.add_state(true, true);

    let x = b.name("", "x");
    let id = b.name("", "id");
    b.element(start, NameSignature::exact(x), guard, done);
    b.no_attribute(
        guard,
        vec![NameSignature::any()],
        vec![NameSignature::exact(id)],
        content,
    );
    b.finish(start, UNKNOWN_NAME).unwrap()
}

#[test]
fn test_no_attribute_guard_passes_bare_element() {
    let schema = guarded_schema();
    let mut v = Validator::new(&schema);
    v.start_element("", "x", "x", &[]).unwrap();
    v.end_element("x").unwrap();
    assert!(v.end_document());
}

#[test]
fn test_no_attribute_guard_ignores_excepted_name() {
    let schema = guarded_schema();
    let mut v = Validator::new(&schema);
    let attrs = [Attribute { uri: "", local: "id", value: "n1" }];
    v.start_element("", "x", "x", &attrs).unwrap();
    v.end_element("x").unwrap();
    assert!(v.end_document());
}

#[test]
fn test_no_attribute_guard_blocks_foreign_attribute() {
    let schema = guarded_schema();
    let mut v = Validator::new(&schema);
    let attrs = [Attribute { uri: "", local: "other", value: "1" }];
    let err = v.start_element("", "x", "x", &attrs).unwrap_err();
    assert_eq!(err.kind, ValidationErrorKind::UnexpectedStartTag);
}

/// Wildcard name literals route unknown locals to a shared code.
#[test]
fn test_wildcard_name_literal_matches_any_local() {
    let mut b = SchemaBuilder::new();
    let start = b.add_state(false, true);
    let content = b.add_state(true, true);
    let done = b.add_state(true, true);
    let any = b.wildcard("urn:ns");
    b.element(start, NameSignature::exact(any), content, done);
    let schema = b.finish(start, UNKNOWN_NAME).unwrap();

    let mut v = Validator::new(&schema);
    v.start_element("urn:ns", "whatever", "whatever", &[]).unwrap();
    v.end_element("whatever").unwrap();
    assert!(v.end_document());

    v.start_document();
    let err = v
        .start_element("urn:other", "whatever", "whatever", &[])
        .unwrap_err();
    assert_eq!(err.kind, ValidationErrorKind::UnexpectedStartTag);
}

/// Empty character chunks flush as ignorable whitespace and must not kill
/// the current state.
#[test]
fn test_empty_chunks_between_elements_are_ignorable() {
    let mut b = SchemaBuilder::new();
    let start = b.add_state(false, true);
    let content = b.add_state(true, true);
    let done = b.add_state(true, true);
    let foo = b.name("", "foo");
    b.element(start, NameSignature::exact(foo), content, done);
    let schema = b.finish(start, UNKNOWN_NAME).unwrap();

    let mut v = Validator::new(&schema);
    v.characters("");
    v.start_element("", "foo", "foo", &[]).unwrap();
    v.characters("");
    v.ignorable_whitespace("  \n\t");
    v.end_element("foo").unwrap();
    assert!(v.end_document());
}

/// An empty element body still reaches text productions that accept the
/// empty string.
#[test]
fn test_empty_body_satisfies_string_data() {
    let mut b = SchemaBuilder::new();
    let start = b.add_state(false, true);
    let text = b.add_state(false, true);
    let text_done = b.add_state(true, true);
    let done = b.add_state(true, true);
    let n = b.name("", "n");
    b.element(start, NameSignature::exact(n), text, done);
    b.data(text, builtin("", "string").unwrap(), None, text_done);
    let schema = b.finish(start, UNKNOWN_NAME).unwrap();

    let mut v = Validator::new(&schema);
    v.start_element("", "n", "n", &[]).unwrap();
    v.end_element("n").unwrap();
    assert!(v.end_document());
}

/// Recursive schema: `a` contains an optional `a`. Ten thousand levels must
/// validate without exhausting the stack, and the continuation chain must
/// tear down iteratively.
#[test]
fn test_ten_thousand_deep_nesting() {
    let mut b = SchemaBuilder::new();
    let node = b.add_state(true, true);
    let tail = b.add_state(true, true);
    let a = b.name("", "a");
    b.element(node, NameSignature::exact(a), node, tail);
    let schema = b.finish(node, UNKNOWN_NAME).unwrap();

    const DEPTH: usize = 10_000;
    let mut v = Validator::new(&schema);
    for _ in 0..DEPTH {
        v.start_element("", "a", "a", &[]).unwrap();
    }
    for _ in 0..DEPTH {
        v.end_element("a").unwrap();
    }
    assert!(v.end_document());
}

/// A deep failure is still reported with the full open-element path.
#[test]
fn test_deep_failure_reports_path() {
    let mut b = SchemaBuilder::new();
    let node = b.add_state(true, true);
    let tail = b.add_state(true, true);
    let a = b.name("", "a");
    b.element(node, NameSignature::exact(a), node, tail);
    let schema = b.finish(node, UNKNOWN_NAME).unwrap();

    let mut v = Validator::new(&schema);
    v.start_element("", "a", "a", &[]).unwrap();
    v.start_element("", "a", "a", &[]).unwrap();
    let err = v.start_element("", "b", "b", &[]).unwrap_err();
    assert_eq!(err.kind, ValidationErrorKind::UnexpectedStartTag);
    assert_eq!(err.path, "/a/a/b");
}
