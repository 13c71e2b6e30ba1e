use std::sync::Arc;

use treecheck_core::core::datatype::{StringType, TokenType};
use treecheck_core::core::name::{NameSignature, UNKNOWN_NAME};
use treecheck_core::core::schema::{Schema, SchemaBuilder};

/// The built-in compiled grammar the binary validates against.
///
/// It accepts note documents:
///
/// ```xml
/// <note id="n1">
///   <to>Alice</to>
///   <from>Bob</from>
///   <body>hello</body>
/// </note>
/// ```
///
/// `note` requires an `id` attribute (a token); the three children follow in
/// order, carry no attributes, and hold free text. Small as it is, the
/// grammar exercises element, attribute, data, and no-attribute productions,
/// which makes it a usable end-to-end fixture too.
#[must_use]
pub fn schema() -> Schema {
    let mut b = SchemaBuilder::new();

    let start = b.add_state(false, true);
    let note_att = b.add_state(false, false);
    let id_value = b.add_state(false, true);
    let value_done = b.add_state(true, true);
    let seq_to = b.add_state(false, true);
    let seq_from = b.add_state(false, true);
    let seq_body = b.add_state(false, true);
    let field = b.add_state(false, false);
    let text = b.add_state(false, true);
    let text_done = b.add_state(true, true);
    let note_end = b.add_state(true, true);
    let done = b.add_state(true, true);

    let note = b.name("", "note");
    let id = b.name("", "id");
    let to = b.name("", "to");
    let from = b.name("", "from");
    let body = b.name("", "body");

    b.element(start, NameSignature::exact(note), note_att, done);
    b.attribute(note_att, NameSignature::exact(id), false, id_value, seq_to);
    b.data(id_value, Arc::new(TokenType), None, value_done);

    b.element(seq_to, NameSignature::exact(to), field, seq_from);
    b.element(seq_from, NameSignature::exact(from), field, seq_body);
    b.element(seq_body, NameSignature::exact(body), field, note_end);

    b.no_attribute(field, vec![NameSignature::any()], Vec::new(), text);
    b.data(text, Arc::new(StringType), None, text_done);

    b.finish(start, UNKNOWN_NAME)
        .expect("sample schema only references its own states")
}
