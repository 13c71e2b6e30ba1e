use std::sync::Arc;

use crate::core::datatype::Datatype;
use crate::core::name::{Name, NameSignature};

/// Identifier of a primitive automaton state within one schema.
pub type StateId = u32;

/// Identifier of an interleave alphabet entry within one schema.
pub type InterleaveId = u32;

/// "Accept an element whose name matches `name`, whose content matches
/// `left`, and whose tail of the enclosing sequence is `right`."
#[derive(Debug, Clone, Copy)]
pub struct ElementTr {
    pub name: NameSignature,
    pub left: StateId,
    pub right: StateId,
}

/// Attribute production. The attribute's value must satisfy `left` as text;
/// consuming it advances to `right`. `repeated` permits one or more
/// occurrences, otherwise exactly one is required.
#[derive(Debug, Clone, Copy)]
pub struct AttTr {
    pub name: NameSignature,
    pub repeated: bool,
    pub left: StateId,
    pub right: StateId,
}

/// Text production. The datatype must validate the text and, when `left` is
/// present, that state must *reject* the text as final. The negative
/// lookahead encodes "any value of this datatype except those".
#[derive(Debug, Clone)]
pub struct DataTr {
    pub left: Option<StateId>,
    pub right: StateId,
    pub datatype: Arc<dyn Datatype>,
}

/// Token-list production: whitespace-split text is threaded token by token
/// through `left`; reaching a final state advances to `right`.
#[derive(Debug, Clone, Copy)]
pub struct ListTr {
    pub left: StateId,
    pub right: StateId,
}

/// Interleave alphabet: concurrent matching of `left` and `right`,
/// re-synchronized through `join`. Text routes to the side named by
/// `text_to_left`.
#[derive(Debug, Clone, Copy)]
pub struct InterleaveTr {
    pub left: StateId,
    pub right: StateId,
    pub join: StateId,
    pub text_to_left: bool,
}

/// Advances to `right` when no present attribute is accepted by the test
/// set.
#[derive(Debug, Clone)]
pub struct NoAttTr {
    pub right: StateId,
    pub neg_tests: Vec<NameSignature>,
    pub pos_tests: Vec<NameSignature>,
}

impl NoAttTr {
    /// An attribute blocks this transition iff its name matches a `neg_tests`
    /// entry and none of the `pos_tests` exceptions.
    #[must_use]
    pub fn accepts(&self, name: Name) -> bool {
        if self.pos_tests.iter().any(|t| t.accepts(name)) {
            return false;
        }
        self.neg_tests.iter().any(|t| t.accepts(name))
    }
}

/// Outgoing productions of one primitive state, grouped by kind.
///
/// Order within a list is irrelevant: the lists are set unions, merged
/// through `Choice` by the rewrite rules. An empty list means the state has
/// no productions of that kind.
#[derive(Debug, Clone, Default)]
pub struct StateInfo {
    pub id: StateId,
    pub is_final: bool,
    pub is_persistent: bool,
    pub attributes: Vec<AttTr>,
    pub data: Vec<DataTr>,
    pub elements: Vec<ElementTr>,
    pub interleaves: Vec<InterleaveId>,
    pub lists: Vec<ListTr>,
    pub no_attributes: Vec<NoAttTr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_att_pos_tests_override_neg_tests() {
        let tr = NoAttTr {
            right: 0,
            neg_tests: vec![NameSignature::any()],
            pos_tests: vec![NameSignature::exact(5)],
        };
        assert!(tr.accepts(4));
        assert!(!tr.accepts(5));
    }

    #[test]
    fn test_no_att_without_neg_tests_accepts_nothing() {
        let tr = NoAttTr {
            right: 0,
            neg_tests: Vec::new(),
            pos_tests: Vec::new(),
        };
        assert!(!tr.accepts(0));
    }
}
