use std::fmt::Display;
use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use thiserror::Error;
use tracing::trace;

use treecheck_core::core::schema::Schema;
use treecheck_core::core::validator::{Attribute, Validator};
use treecheck_core::errors::ValidationError;

/// Why a document was not accepted.
///
/// Well-formedness failures come from the reader and say nothing about the
/// grammar; validation failures mean the document parsed but is not a member
/// of the schema's language.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("not well-formed: {message}")]
    Malformed { message: String },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn malformed(err: impl Display) -> DocumentError {
    DocumentError::Malformed {
        message: err.to_string(),
    }
}

/// Reads `path` and validates its contents against `schema`.
///
/// # Errors
///
/// Fails when the file cannot be read, is not well-formed, or does not
/// validate.
pub fn validate_file(schema: &Schema, path: &Path) -> Result<(), DocumentError> {
    let contents = fs::read_to_string(path)?;
    validate_str(schema, &contents)
}

/// Validates an in-memory document against `schema`.
///
/// The reader is namespace-aware. Namespace declarations never reach the
/// engine; character data and CDATA both feed the text accumulator; empty
/// elements synthesize a start and an end event.
///
/// # Errors
///
/// Fails when the document is not well-formed or does not validate.
pub fn validate_str(schema: &Schema, xml: &str) -> Result<(), DocumentError> {
    let mut reader = NsReader::from_str(xml);
    let mut validator = Validator::new(schema);

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => start_element(&reader, &mut validator, &e)?,
            Event::Empty(e) => {
                start_element(&reader, &mut validator, &e)?;
                let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                validator.end_element(&qname)?;
            }
            Event::End(e) => {
                let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                validator.end_element(&qname)?;
            }
            Event::Text(e) => {
                validator.characters(&e.unescape().map_err(malformed)?);
            }
            Event::CData(e) => {
                // CDATA content is literal; no entity unescaping applies.
                validator.characters(&String::from_utf8_lossy(&e));
            }
            Event::Eof => break,
            // Declarations, comments, and processing instructions carry no
            // validation events.
            _ => {}
        }
    }

    trace!(valid = validator.end_document(), "document finished");
    Ok(())
}

fn start_element(
    reader: &NsReader<&[u8]>,
    validator: &mut Validator<'_>,
    e: &BytesStart<'_>,
) -> Result<(), DocumentError> {
    let (resolution, local) = reader.resolve_element(e.name());
    let uri = namespace_uri(resolution)?;
    let local = String::from_utf8_lossy(local.as_ref()).into_owned();
    let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();

    let mut owned: Vec<(String, String, String)> = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(malformed)?;
        if attr.key.as_namespace_binding().is_some() {
            // xmlns / xmlns:* declarations are the reader's concern only.
            continue;
        }
        let (resolution, attr_local) = reader.resolve_attribute(attr.key);
        let attr_uri = namespace_uri(resolution)?;
        let attr_local = String::from_utf8_lossy(attr_local.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(malformed)?.into_owned();
        owned.push((attr_uri, attr_local, value));
    }
    let attrs: Vec<Attribute<'_>> = owned
        .iter()
        .map(|(uri, local, value)| Attribute { uri, local, value })
        .collect();

    validator.start_element(&uri, &local, &qname, &attrs)?;
    Ok(())
}

fn namespace_uri(resolution: ResolveResult<'_>) -> Result<String, DocumentError> {
    match resolution {
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Bound(ns) => Ok(String::from_utf8_lossy(ns.into_inner()).into_owned()),
        ResolveResult::Unknown(prefix) => Err(DocumentError::Malformed {
            message: format!(
                "unbound namespace prefix {}",
                String::from_utf8_lossy(&prefix)
            ),
        }),
    }
}
