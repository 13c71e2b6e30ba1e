use std::mem;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::core::attributes::{AttributesSet, Text};
use crate::core::schema::Schema;
use crate::core::state::Expr;
use crate::errors::{ValidationError, ValidationErrorKind};

/// Text-buffer capacity restored after flushing an oversized accumulation,
/// so one huge text node does not pin its storage for the whole document.
const TEXT_BUFFER_CAP: usize = 1024;

/// One raw attribute as delivered by a document parser.
///
/// Namespace declarations must not be passed here; filtering them is the
/// event source's job.
#[derive(Debug, Clone, Copy)]
pub struct Attribute<'a> {
    pub uri: &'a str,
    pub local: &'a str,
    pub value: &'a str,
}

/// Drives one document's event stream through the state algebra.
///
/// The driver owns the current state expression, the text accumulator, and
/// the per-element attribute snapshots. It halts on the first error: the
/// failure is stored and every later event returns it unchanged until
/// [`Validator::start_document`] resets the driver.
#[derive(Debug)]
pub struct Validator<'s> {
    schema: &'s Schema,
    current: Rc<Expr>,
    attributes: Vec<AttributesSet>,
    text: String,
    path: Vec<String>,
    failure: Option<ValidationError>,
}

impl<'s> Validator<'s> {
    /// Creates a driver positioned at the start of a document.
    #[must_use]
    pub fn new(schema: &'s Schema) -> Self {
        let mut validator = Self {
            schema,
            current: Expr::empty(),
            attributes: Vec::new(),
            text: String::new(),
            path: Vec::new(),
            failure: None,
        };
        validator.start_document();
        validator
    }

    /// Resets the driver for a fresh document.
    pub fn start_document(&mut self) {
        trace!("start document");
        self.current = Expr::primitive(self.schema.initial_state());
        self.attributes.clear();
        self.text.clear();
        self.path.clear();
        self.failure = None;
    }

    /// Feeds a start-element event.
    ///
    /// `attrs` must already exclude namespace declarations.
    ///
    /// # Errors
    ///
    /// Fails when pending text or the element's name has no viable
    /// continuation from the current state.
    pub fn start_element(
        &mut self,
        uri: &str,
        local: &str,
        qname: &str,
        attrs: &[Attribute<'_>],
    ) -> Result<(), ValidationError> {
        self.check_live()?;
        self.process_text()?;

        trace!(qname, "start element");
        self.path.push(qname.to_owned());

        let mut snapshot = AttributesSet::new();
        for att in attrs {
            snapshot.push(
                self.schema.name_code(att.uri, att.local),
                att.value.to_owned(),
            );
        }
        self.attributes.push(snapshot);

        let code = self.schema.name_code(uri, local);
        let next =
            self.current
                .start_element(self.schema, code, self.current_attributes(), Expr::empty());
        if next.is_empty() {
            return Err(self.fail(ValidationErrorKind::UnexpectedStartTag));
        }
        self.current = next;
        Ok(())
    }

    /// Accumulates character data; the buffer is flushed at the next
    /// structural event.
    pub fn characters(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    /// Ignorable whitespace is buffered exactly like character data.
    pub fn ignorable_whitespace(&mut self, chunk: &str) {
        self.characters(chunk);
    }

    /// Feeds an end-element event.
    ///
    /// # Errors
    ///
    /// Fails when pending text has no continuation or the element's content
    /// is incomplete.
    pub fn end_element(&mut self, qname: &str) -> Result<(), ValidationError> {
        self.check_live()?;
        self.process_text()?;

        trace!(qname, "end element");
        self.attributes.pop();

        let next = self
            .current
            .end_element(self.schema, self.current_attributes(), Expr::empty());
        if next.is_empty() {
            return Err(self.fail(ValidationErrorKind::UnexpectedEndTag));
        }
        self.current = next;
        self.path.pop();
        Ok(())
    }

    /// Finishes the document. Returns `true` when no error was emitted.
    pub fn end_document(&mut self) -> bool {
        trace!("end document");
        self.failure.is_none()
    }

    /// The stored failure, if the document has already failed.
    #[must_use]
    pub fn error(&self) -> Option<&ValidationError> {
        self.failure.as_ref()
    }

    /// Flushes the text accumulator through the state algebra.
    ///
    /// An empty buffer still rewrites: empty text is ignorable whitespace,
    /// and productions that accept the empty string must see it.
    fn process_text(&mut self) -> Result<(), ValidationError> {
        let text = mem::take(&mut self.text);
        if !text.is_empty() {
            trace!(text = text.as_str(), "flush text");
        }

        let next = self.current.text(
            self.schema,
            Text::new(&text),
            self.current_attributes(),
            Expr::empty(),
        );

        if text.capacity() > TEXT_BUFFER_CAP {
            self.text = String::with_capacity(TEXT_BUFFER_CAP);
        } else {
            self.text = text;
            self.text.clear();
        }

        if next.is_empty() {
            return Err(self.fail(ValidationErrorKind::UnexpectedText));
        }
        self.current = next;
        Ok(())
    }

    fn current_attributes(&self) -> &AttributesSet {
        static EMPTY: AttributesSet = AttributesSet::new();
        self.attributes.last().unwrap_or(&EMPTY)
    }

    fn fail(&mut self, kind: ValidationErrorKind) -> ValidationError {
        let error = ValidationError::new(kind, self.path_string());
        debug!(%error, "validation failed");
        self.current = Expr::empty();
        self.failure = Some(error.clone());
        error
    }

    fn path_string(&self) -> String {
        if self.path.is_empty() {
            return "/".to_owned();
        }
        let mut out = String::new();
        for name in &self.path {
            out.push('/');
            out.push_str(name);
        }
        out
    }

    fn check_live(&self) -> Result<(), ValidationError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
