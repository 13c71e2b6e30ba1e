use indexmap::IndexMap;
use std::sync::Arc;

use crate::core::datatype::Datatype;
use crate::core::name::{Name, NameLiteral, NameSignature};
use crate::core::transition::{
    AttTr, DataTr, ElementTr, InterleaveId, InterleaveTr, ListTr, NoAttTr, StateId, StateInfo,
};
use crate::errors::SchemaError;

/// A sealed, immutable compiled grammar: the state table, the schema-wide
/// interleave alphabet table, and the name-literal lookup.
///
/// A schema is read-only after [`SchemaBuilder::finish`] and may be shared
/// across concurrently running drivers; every driver keeps its own state
/// expression and attribute stack.
#[derive(Debug)]
pub struct Schema {
    infos: Vec<StateInfo>,
    interleaves: Vec<InterleaveTr>,
    name_literals: Vec<NameLiteral>,
    initial: StateId,
    default_name_code: Name,
}

impl Schema {
    /// Identifier of the grammar's start state.
    #[must_use]
    pub fn initial_state(&self) -> StateId {
        self.initial
    }

    /// Resolves a qualified name to its code.
    ///
    /// Literal match first, then the `(uri, "*")` wildcard, then the
    /// schema's default code. The tables hold tens of entries and lookups are
    /// dominated by event dispatch, so the scan is linear.
    #[must_use]
    pub fn name_code(&self, uri: &str, local: &str) -> Name {
        for lit in &self.name_literals {
            if lit.uri == uri && lit.local == local {
                return lit.code;
            }
        }
        for lit in &self.name_literals {
            if lit.uri == uri && lit.local == "*" {
                return lit.code;
            }
        }
        self.default_name_code
    }

    pub(crate) fn info(&self, id: StateId) -> &StateInfo {
        &self.infos[id as usize]
    }

    pub(crate) fn interleave(&self, id: InterleaveId) -> &InterleaveTr {
        &self.interleaves[id as usize]
    }
}

/// Assembles the tables of a [`Schema`] and seals them.
///
/// States are allocated first so productions may reference one another
/// freely, forward or cyclically; `finish` verifies every reference before
/// the schema becomes visible to a driver, after which the engine indexes
/// without checks.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    infos: Vec<StateInfo>,
    interleaves: Vec<InterleaveTr>,
    names: IndexMap<(String, String), Name>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new primitive state and returns its identifier.
    pub fn add_state(&mut self, is_final: bool, is_persistent: bool) -> StateId {
        let id = self.infos.len() as StateId;
        self.infos.push(StateInfo {
            id,
            is_final,
            is_persistent,
            ..StateInfo::default()
        });
        id
    }

    /// Interns a name literal, assigning codes in insertion order.
    pub fn name(&mut self, uri: &str, local: &str) -> Name {
        let next = self.names.len() as Name;
        *self
            .names
            .entry((uri.to_owned(), local.to_owned()))
            .or_insert(next)
    }

    /// Interns the `(uri, "*")` wildcard literal.
    pub fn wildcard(&mut self, uri: &str) -> Name {
        self.name(uri, "*")
    }

    /// Registers a literal with an externally assigned code, for tables
    /// produced by a schema compiler that picks its own bit patterns.
    pub fn literal(&mut self, uri: &str, local: &str, code: Name) {
        self.names.insert((uri.to_owned(), local.to_owned()), code);
    }

    pub fn element(&mut self, from: StateId, name: NameSignature, left: StateId, right: StateId) {
        self.info_mut(from).elements.push(ElementTr { name, left, right });
    }

    pub fn attribute(
        &mut self,
        from: StateId,
        name: NameSignature,
        repeated: bool,
        left: StateId,
        right: StateId,
    ) {
        self.info_mut(from).attributes.push(AttTr {
            name,
            repeated,
            left,
            right,
        });
    }

    pub fn data(
        &mut self,
        from: StateId,
        datatype: Arc<dyn Datatype>,
        left: Option<StateId>,
        right: StateId,
    ) {
        self.info_mut(from).data.push(DataTr {
            left,
            right,
            datatype,
        });
    }

    pub fn list(&mut self, from: StateId, left: StateId, right: StateId) {
        self.info_mut(from).lists.push(ListTr { left, right });
    }

    pub fn no_attribute(
        &mut self,
        from: StateId,
        neg_tests: Vec<NameSignature>,
        pos_tests: Vec<NameSignature>,
        right: StateId,
    ) {
        self.info_mut(from).no_attributes.push(NoAttTr {
            right,
            neg_tests,
            pos_tests,
        });
    }

    /// Adds an interleave production and its schema-wide alphabet entry.
    pub fn interleave(
        &mut self,
        from: StateId,
        left: StateId,
        right: StateId,
        join: StateId,
        text_to_left: bool,
    ) -> InterleaveId {
        let id = self.interleaves.len() as InterleaveId;
        self.interleaves.push(InterleaveTr {
            left,
            right,
            join,
            text_to_left,
        });
        self.info_mut(from).interleaves.push(id);
        id
    }

    /// Seals the schema.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] when any production or the initial state
    /// references a state or alphabet entry that does not exist.
    pub fn finish(self, initial: StateId, default_name_code: Name) -> Result<Schema, SchemaError> {
        let states = self.infos.len();

        if (initial as usize) >= states {
            return Err(SchemaError::DanglingInitialState { id: initial });
        }

        for info in &self.infos {
            for e in &info.elements {
                check_state(e.left, states, "element content")?;
                check_state(e.right, states, "element tail")?;
            }
            for a in &info.attributes {
                check_state(a.left, states, "attribute value")?;
                check_state(a.right, states, "attribute tail")?;
            }
            for d in &info.data {
                if let Some(left) = d.left {
                    check_state(left, states, "data exception")?;
                }
                check_state(d.right, states, "data tail")?;
            }
            for l in &info.lists {
                check_state(l.left, states, "list item")?;
                check_state(l.right, states, "list tail")?;
            }
            for n in &info.no_attributes {
                check_state(n.right, states, "no-attribute tail")?;
            }
            for &ia in &info.interleaves {
                if (ia as usize) >= self.interleaves.len() {
                    return Err(SchemaError::DanglingInterleave { id: ia });
                }
            }
        }

        for tr in &self.interleaves {
            check_state(tr.left, states, "interleave left")?;
            check_state(tr.right, states, "interleave right")?;
            check_state(tr.join, states, "interleave join")?;
        }

        let name_literals = self
            .names
            .into_iter()
            .map(|((uri, local), code)| NameLiteral { uri, local, code })
            .collect();

        Ok(Schema {
            infos: self.infos,
            interleaves: self.interleaves,
            name_literals,
            initial,
            default_name_code,
        })
    }

    fn info_mut(&mut self, id: StateId) -> &mut StateInfo {
        &mut self.infos[id as usize]
    }
}

fn check_state(id: StateId, count: usize, role: &'static str) -> Result<(), SchemaError> {
    if (id as usize) < count {
        Ok(())
    } else {
        Err(SchemaError::DanglingState { id, role })
    }
}
