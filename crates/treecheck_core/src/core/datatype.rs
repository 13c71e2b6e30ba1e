use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::core::attributes::is_xml_whitespace;

/// Opaque parsed value. Only the datatype that produced it can interpret it;
/// dropping the box releases it.
pub type Value = Box<dyn Any + Send + Sync>;

/// Capability bundle for a text datatype.
///
/// Implementations are shared inside a sealed schema, so they must be safe to
/// use from concurrently running drivers.
pub trait Datatype: fmt::Debug + Send + Sync {
    /// Whether `text` is lexically valid for this datatype.
    fn is_valid(&self, text: &str) -> bool;

    /// Parses `text` into a comparable value, or `None` when it has none.
    fn create_value(&self, text: &str) -> Option<Value>;

    /// Compares two values produced by this datatype.
    fn same_value(&self, a: &Value, b: &Value) -> bool;
}

/// The identity datatype: every string is valid and compares verbatim.
#[derive(Debug)]
pub struct StringType;

impl Datatype for StringType {
    fn is_valid(&self, _text: &str) -> bool {
        true
    }

    fn create_value(&self, text: &str) -> Option<Value> {
        Some(Box::new(text.to_owned()))
    }

    fn same_value(&self, a: &Value, b: &Value) -> bool {
        string_eq(a, b)
    }
}

/// Whitespace-collapsing datatype: values compare after leading and trailing
/// whitespace is removed and interior runs become a single space.
#[derive(Debug)]
pub struct TokenType;

impl Datatype for TokenType {
    fn is_valid(&self, _text: &str) -> bool {
        true
    }

    fn create_value(&self, text: &str) -> Option<Value> {
        Some(Box::new(collapse(text)))
    }

    fn same_value(&self, a: &Value, b: &Value) -> bool {
        string_eq(a, b)
    }
}

fn string_eq(a: &Value, b: &Value) -> bool {
    match (a.downcast_ref::<String>(), b.downcast_ref::<String>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn collapse(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_whitespace = true;
    for ch in text.chars() {
        if is_xml_whitespace(ch) {
            if !in_whitespace {
                out.push(' ');
            }
            in_whitespace = true;
        } else {
            out.push(ch);
            in_whitespace = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Wraps a base datatype and accepts only strings whose parsed value equals a
/// target literal under the base's comparator.
///
/// The target is parsed once at construction, which keeps the wrapper free of
/// interior mutability and the schema sharable across drivers. A literal the
/// base cannot parse leaves the restriction rejecting every string.
pub struct ValueRestriction {
    base: Arc<dyn Datatype>,
    literal: String,
    target: Option<Value>,
}

impl ValueRestriction {
    #[must_use]
    pub fn new(base: Arc<dyn Datatype>, literal: impl Into<String>) -> Self {
        let literal = literal.into();
        let target = base.create_value(&literal);
        Self {
            base,
            literal,
            target,
        }
    }
}

impl fmt::Debug for ValueRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueRestriction")
            .field("base", &self.base)
            .field("literal", &self.literal)
            .finish()
    }
}

impl Datatype for ValueRestriction {
    fn is_valid(&self, text: &str) -> bool {
        let Some(target) = &self.target else {
            return false;
        };
        match self.base.create_value(text) {
            Some(value) => self.base.same_value(target, &value),
            None => false,
        }
    }

    fn create_value(&self, text: &str) -> Option<Value> {
        self.base.create_value(text)
    }

    fn same_value(&self, a: &Value, b: &Value) -> bool {
        self.base.same_value(a, b)
    }
}

/// Looks up a built-in datatype by qualified name.
///
/// Only the empty-uri `string` and `token` names are known. Callers wanting a
/// permissive fallback substitute `string` themselves.
#[must_use]
pub fn builtin(uri: &str, local: &str) -> Option<Arc<dyn Datatype>> {
    if !uri.is_empty() {
        return None;
    }
    match local {
        "string" => Some(Arc::new(StringType)),
        "token" => Some(Arc::new(TokenType)),
        _ => None,
    }
}
