use std::mem;
use std::rc::Rc;

use crate::core::attributes::{AttributesSet, Text, is_xml_whitespace};
use crate::core::name::Name;
use crate::core::schema::Schema;
use crate::core::transition::{InterleaveId, StateId};

/// A state expression: the set of continuations currently possible.
///
/// Expressions form a dag shared through [`Rc`]. Rewrites never mutate a
/// node; they build new expressions around shared subterms. Every event entry
/// point takes and returns a partial-result accumulator, the disjunction of
/// alternatives found so far, so that a rewrite can only grow the result.
#[derive(Debug)]
pub enum Expr {
    /// No match is possible from here.
    Empty,
    /// A node of the compiled automaton.
    Primitive(StateId),
    /// The current sub-production is `child`; once it is final, continue
    /// with `then`.
    After {
        child: Rc<Expr>,
        then: Rc<Expr>,
        is_final: bool,
    },
    /// Non-deterministic union. `rhs` is never itself a choice; unions stay
    /// left-leaning.
    Choice {
        lhs: Rc<Expr>,
        rhs: Rc<Expr>,
        is_final: bool,
    },
    /// Concurrent matching of both sides, synchronized by the alphabet's
    /// join state.
    Interleave {
        lhs: Rc<Expr>,
        rhs: Rc<Expr>,
        alphabet: InterleaveId,
        is_final: bool,
    },
}

impl Expr {
    /// The shared empty-set expression.
    #[must_use]
    pub fn empty() -> Rc<Expr> {
        thread_local! {
            static EMPTY: Rc<Expr> = Rc::new(Expr::Empty);
        }
        EMPTY.with(Rc::clone)
    }

    /// A primitive-state expression for `id`.
    #[must_use]
    pub fn primitive(id: StateId) -> Rc<Expr> {
        Rc::new(Expr::Primitive(id))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Expr::Empty)
    }

    /// Whether this expression is a complete match if no further input
    /// arrives.
    #[must_use]
    pub fn is_final(&self, schema: &Schema) -> bool {
        match self {
            Expr::Empty => false,
            Expr::Primitive(id) => schema.info(*id).is_final,
            Expr::After { is_final, .. }
            | Expr::Choice { is_final, .. }
            | Expr::Interleave { is_final, .. } => *is_final,
        }
    }

    /// `After` constructor: the empty set absorbs both operands.
    #[must_use]
    pub fn after(schema: &Schema, child: Rc<Expr>, then: Rc<Expr>) -> Rc<Expr> {
        if child.is_empty() || then.is_empty() {
            return Expr::empty();
        }
        let is_final = child.is_final(schema);
        Rc::new(Expr::After {
            child,
            then,
            is_final,
        })
    }

    /// `Choice` constructor. `rhs` must not itself be a choice;
    /// [`Expr::choice2`] is the entry point for arbitrary operands.
    #[must_use]
    pub fn choice(schema: &Schema, lhs: Rc<Expr>, rhs: Rc<Expr>) -> Rc<Expr> {
        debug_assert!(!matches!(*rhs, Expr::Choice { .. }));
        if lhs.is_empty() {
            return rhs;
        }
        if rhs.is_empty() {
            return lhs;
        }
        if lhs.contains(&rhs) {
            return lhs;
        }
        let is_final = lhs.is_final(schema) || rhs.is_final(schema);
        Rc::new(Expr::Choice { lhs, rhs, is_final })
    }

    /// `Choice` over arbitrary operands: a choice on the right is flattened
    /// so the union stays left-leaning.
    #[must_use]
    pub fn choice2(schema: &Schema, lhs: Rc<Expr>, rhs: Rc<Expr>) -> Rc<Expr> {
        if let Expr::Choice { lhs: cl, rhs: cr, .. } = &*rhs {
            let merged = Expr::choice2(schema, lhs, cl.clone());
            Expr::choice(schema, merged, cr.clone())
        } else {
            Expr::choice(schema, lhs, rhs)
        }
    }

    /// `Interleave` constructor: the empty set absorbs both operands.
    #[must_use]
    pub fn interleave(
        schema: &Schema,
        lhs: Rc<Expr>,
        rhs: Rc<Expr>,
        alphabet: InterleaveId,
    ) -> Rc<Expr> {
        if lhs.is_empty() || rhs.is_empty() {
            return Expr::empty();
        }
        let join = schema.interleave(alphabet).join;
        let is_final =
            lhs.is_final(schema) && rhs.is_final(schema) && schema.info(join).is_final;
        Rc::new(Expr::Interleave {
            lhs,
            rhs,
            alphabet,
            is_final,
        })
    }

    /// Disjunct subsumption. Conservative: identity, choice membership, and
    /// the structural `After` rule. Incompleteness only costs extra
    /// disjuncts, never wrong answers.
    #[must_use]
    pub fn contains(self: &Rc<Expr>, other: &Rc<Expr>) -> bool {
        if Rc::ptr_eq(self, other) {
            return true;
        }
        match (&**self, &**other) {
            (Expr::Choice { lhs, rhs, .. }, _) => lhs.contains(other) || rhs.contains(other),
            (Expr::Empty, Expr::Empty) => true,
            (Expr::Primitive(a), Expr::Primitive(b)) => a == b,
            (
                Expr::After {
                    child: c1, then: t1, ..
                },
                Expr::After {
                    child: c2, then: t2, ..
                },
            ) => c1.contains(c2) && t1.contains(t2) && t2.contains(t1),
            _ => false,
        }
    }

    /// Derivative by a start-element event.
    pub fn start_element(
        self: &Rc<Expr>,
        schema: &Schema,
        name: Name,
        attributes: &AttributesSet,
        acc: Rc<Expr>,
    ) -> Rc<Expr> {
        match &**self {
            Expr::Empty => acc,
            Expr::Primitive(id) => {
                primitive_start_element(schema, *id, name, attributes, acc)
            }
            Expr::After { child, then, .. } => {
                let inner = child.start_element(schema, name, attributes, Expr::empty());
                inner.wrap_after_by_after(schema, then, acc)
            }
            Expr::Choice { lhs, rhs, .. } => {
                let acc = lhs.start_element(schema, name, attributes, acc);
                rhs.start_element(schema, name, attributes, acc)
            }
            Expr::Interleave {
                lhs, rhs, alphabet, ..
            } => {
                let l = lhs.start_element(schema, name, attributes, Expr::empty());
                let acc = l.wrap_after_by_interleave_right(schema, rhs, *alphabet, acc);
                let r = rhs.start_element(schema, name, attributes, Expr::empty());
                r.wrap_after_by_interleave_left(schema, lhs, *alphabet, acc)
            }
        }
    }

    /// Derivative by an end-element event.
    ///
    /// Only composite expressions built by earlier rewrites can receive this:
    /// a primitive or interleave here means the event source delivered an end
    /// tag that no start tag opened.
    pub fn end_element(
        self: &Rc<Expr>,
        schema: &Schema,
        attributes: &AttributesSet,
        acc: Rc<Expr>,
    ) -> Rc<Expr> {
        match &**self {
            Expr::Empty => acc,
            Expr::Primitive(_) | Expr::Interleave { .. } => {
                debug_assert!(false, "end-element on a non-composite state");
                Expr::empty()
            }
            Expr::After { then, is_final, .. } => {
                if *is_final {
                    then.expand(schema, attributes, acc)
                } else {
                    acc
                }
            }
            Expr::Choice { lhs, rhs, .. } => {
                let acc = lhs.end_element(schema, attributes, acc);
                rhs.end_element(schema, attributes, acc)
            }
        }
    }

    /// Resolves any pending attribute-matching obligation.
    pub fn expand(
        self: &Rc<Expr>,
        schema: &Schema,
        attributes: &AttributesSet,
        acc: Rc<Expr>,
    ) -> Rc<Expr> {
        match &**self {
            Expr::Empty => acc,
            Expr::Primitive(id) => expand_attributes(schema, *id, attributes, acc),
            Expr::After { child, then, .. } => {
                let inner = child.expand(schema, attributes, Expr::empty());
                Expr::choice(schema, acc, Expr::after(schema, inner, then.clone()))
            }
            Expr::Choice { lhs, rhs, .. } => {
                let acc = lhs.expand(schema, attributes, acc);
                rhs.expand(schema, attributes, acc)
            }
            Expr::Interleave {
                lhs, rhs, alphabet, ..
            } => {
                let l = lhs.expand(schema, attributes, Expr::empty());
                let r = rhs.expand(schema, attributes, Expr::empty());
                Expr::choice(
                    schema,
                    acc,
                    Expr::interleave(schema, l, r, *alphabet),
                )
            }
        }
    }

    /// Derivative by a text event.
    pub fn text(
        self: &Rc<Expr>,
        schema: &Schema,
        value: Text<'_>,
        attributes: &AttributesSet,
        acc: Rc<Expr>,
    ) -> Rc<Expr> {
        match &**self {
            Expr::Empty => acc,
            Expr::Primitive(id) => primitive_text(schema, *id, self, value, attributes, acc),
            Expr::After { child, then, .. } => {
                let inner = child.text(schema, value, attributes, Expr::empty());
                Expr::choice(schema, acc, Expr::after(schema, inner, then.clone()))
            }
            Expr::Choice { lhs, rhs, .. } => {
                let acc = lhs.text(schema, value, attributes, acc);
                rhs.text(schema, value, attributes, acc)
            }
            Expr::Interleave {
                lhs, rhs, alphabet, ..
            } => {
                let routed = if schema.interleave(*alphabet).text_to_left {
                    let l = lhs.text(schema, value, attributes, Expr::empty());
                    Expr::interleave(schema, l, rhs.clone(), *alphabet)
                } else {
                    let r = rhs.text(schema, value, attributes, Expr::empty());
                    Expr::interleave(schema, lhs.clone(), r, *alphabet)
                };
                let mut result = Expr::choice(schema, acc, routed.clone());
                if let Expr::Interleave { lhs: il, rhs: ir, .. } = &*routed {
                    // Both sides can finish: the join state becomes reachable.
                    if il.is_final(schema) && ir.is_final(schema) {
                        let join = schema.interleave(*alphabet).join;
                        result = expand_attributes(schema, join, attributes, result);
                    }
                }
                result
            }
        }
    }

    /// Re-embeds each disjunct as the child of an `After` continuing with
    /// `new_then`.
    pub fn wrap_after_by_after(
        self: &Rc<Expr>,
        schema: &Schema,
        new_then: &Rc<Expr>,
        acc: Rc<Expr>,
    ) -> Rc<Expr> {
        match &**self {
            Expr::Empty => acc,
            Expr::After { child, then, .. } => {
                let chained = Expr::after(schema, then.clone(), new_then.clone());
                Expr::choice(schema, acc, Expr::after(schema, child.clone(), chained))
            }
            Expr::Choice { lhs, rhs, .. } => {
                let acc = lhs.wrap_after_by_after(schema, new_then, acc);
                rhs.wrap_after_by_after(schema, new_then, acc)
            }
            Expr::Primitive(_) | Expr::Interleave { .. } => {
                debug_assert!(false, "wrap on a non-after state");
                Expr::empty()
            }
        }
    }

    /// Re-embeds each disjunct as the child of an `After` continuing into an
    /// interleave whose left side is `lhs`.
    pub fn wrap_after_by_interleave_left(
        self: &Rc<Expr>,
        schema: &Schema,
        lhs: &Rc<Expr>,
        alphabet: InterleaveId,
        acc: Rc<Expr>,
    ) -> Rc<Expr> {
        match &**self {
            Expr::Empty => acc,
            Expr::After { child, then, .. } => {
                let cont = Expr::interleave(schema, lhs.clone(), then.clone(), alphabet);
                Expr::choice(schema, acc, Expr::after(schema, child.clone(), cont))
            }
            Expr::Choice { lhs: cl, rhs: cr, .. } => {
                let acc = cl.wrap_after_by_interleave_left(schema, lhs, alphabet, acc);
                cr.wrap_after_by_interleave_left(schema, lhs, alphabet, acc)
            }
            Expr::Primitive(_) | Expr::Interleave { .. } => {
                debug_assert!(false, "wrap on a non-after state");
                Expr::empty()
            }
        }
    }

    /// Mirror of [`Expr::wrap_after_by_interleave_left`] for the right side.
    pub fn wrap_after_by_interleave_right(
        self: &Rc<Expr>,
        schema: &Schema,
        rhs: &Rc<Expr>,
        alphabet: InterleaveId,
        acc: Rc<Expr>,
    ) -> Rc<Expr> {
        match &**self {
            Expr::Empty => acc,
            Expr::After { child, then, .. } => {
                let cont = Expr::interleave(schema, then.clone(), rhs.clone(), alphabet);
                Expr::choice(schema, acc, Expr::after(schema, child.clone(), cont))
            }
            Expr::Choice { lhs: cl, rhs: cr, .. } => {
                let acc = cl.wrap_after_by_interleave_right(schema, rhs, alphabet, acc);
                cr.wrap_after_by_interleave_right(schema, rhs, alphabet, acc)
            }
            Expr::Primitive(_) | Expr::Interleave { .. } => {
                debug_assert!(false, "wrap on a non-after state");
                Expr::empty()
            }
        }
    }
}

/// Element derivative of a primitive state: one `After` disjunct per
/// accepting element production, content expanded against the new element's
/// attributes.
fn primitive_start_element(
    schema: &Schema,
    id: StateId,
    name: Name,
    attributes: &AttributesSet,
    acc: Rc<Expr>,
) -> Rc<Expr> {
    let mut result = acc;
    for e in &schema.info(id).elements {
        if e.name.accepts(name) {
            let content = expand_attributes(schema, e.left, attributes, Expr::empty());
            result = Expr::choice(
                schema,
                result,
                Expr::after(schema, content, Expr::primitive(e.right)),
            );
        }
    }
    result
}

/// Text derivative of a primitive state: whitespace keeps the state itself
/// viable, data productions check datatype plus negative lookahead, list
/// productions thread the tokens.
fn primitive_text(
    schema: &Schema,
    id: StateId,
    this: &Rc<Expr>,
    value: Text<'_>,
    attributes: &AttributesSet,
    acc: Rc<Expr>,
) -> Rc<Expr> {
    let info = schema.info(id);
    let mut result = acc;

    if value.is_ignorable() {
        result = Expr::choice(schema, result, this.clone());
    }

    for d in &info.data {
        if d.datatype.is_valid(value.as_str()) && !data_excepted(schema, d.left, value) {
            result = expand_attributes(schema, d.right, attributes, result);
        }
    }

    for l in &info.lists {
        let mut child = Expr::primitive(l.left);
        for token in value.as_str().split(is_xml_whitespace) {
            if token.is_empty() {
                continue;
            }
            child = child.text(schema, Text::new(token), &AttributesSet::EMPTY, Expr::empty());
        }
        if child.is_final(schema) {
            result = expand_attributes(schema, l.right, attributes, result);
        }
    }

    result
}

/// The negative-lookahead half of a data production: the exception state
/// accepting the value as final blocks the transition.
fn data_excepted(schema: &Schema, left: Option<StateId>, value: Text<'_>) -> bool {
    match left {
        Some(id) => Expr::primitive(id)
            .text(schema, value, &AttributesSet::EMPTY, Expr::empty())
            .is_final(schema),
        None => false,
    }
}

/// The attribute-matching core of a primitive state.
///
/// Persistent states stay a disjunct of their own expansion; attribute
/// productions count matching occurrences against the cardinality rule;
/// no-attribute guards descend when nothing blocks them; interleave
/// productions expand both sides independently.
fn expand_attributes(
    schema: &Schema,
    id: StateId,
    attributes: &AttributesSet,
    result: Rc<Expr>,
) -> Rc<Expr> {
    let this = Expr::primitive(id);
    if result.contains(&this) {
        return result;
    }

    let info = schema.info(id);
    let mut result = result;

    if info.is_persistent {
        result = Expr::choice(schema, result, this);
    }

    for a in &info.attributes {
        let mut matched = 0usize;
        let mut failed = false;
        for j in 0..attributes.len() {
            if a.name.accepts(attributes.name(j)) {
                let accepted = Expr::primitive(a.left)
                    .text(
                        schema,
                        Text::new(attributes.value(j)),
                        &AttributesSet::EMPTY,
                        Expr::empty(),
                    )
                    .is_final(schema);
                if accepted {
                    matched += 1;
                } else {
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            continue;
        }
        let satisfied = if a.repeated { matched != 0 } else { matched == 1 };
        if satisfied {
            result = expand_attributes(schema, a.right, attributes, result);
        }
    }

    for n in &info.no_attributes {
        let blocked = (0..attributes.len()).any(|j| n.accepts(attributes.name(j)));
        if !blocked {
            result = expand_attributes(schema, n.right, attributes, result);
        }
    }

    for &ia in &info.interleaves {
        let tr = schema.interleave(ia);
        let l = expand_attributes(schema, tr.left, attributes, Expr::empty());
        let r = expand_attributes(schema, tr.right, attributes, Expr::empty());
        result = Expr::choice(schema, result, Expr::interleave(schema, l, r, ia));
    }

    result
}

impl Drop for Expr {
    // Continuation chains built by deep element nesting are long and
    // right-nested; unwinding them on the call stack would overflow.
    fn drop(&mut self) {
        let mut stack = Vec::new();
        take_children(self, &mut stack);
        while let Some(node) = stack.pop() {
            if let Ok(mut inner) = Rc::try_unwrap(node) {
                take_children(&mut inner, &mut stack);
            }
        }
    }
}

fn take_children(expr: &mut Expr, out: &mut Vec<Rc<Expr>>) {
    match expr {
        Expr::Empty | Expr::Primitive(_) => {}
        Expr::After { child: a, then: b, .. }
        | Expr::Choice { lhs: a, rhs: b, .. }
        | Expr::Interleave { lhs: a, rhs: b, .. } => {
            out.push(mem::replace(a, Rc::new(Expr::Empty)));
            out.push(mem::replace(b, Rc::new(Expr::Empty)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::SchemaBuilder;

    fn tiny_schema() -> Schema {
        let mut b = SchemaBuilder::new();
        let s0 = b.add_state(false, false);
        let s1 = b.add_state(true, false);
        let _ = (s0, s1);
        b.finish(s0, 0).unwrap()
    }

    #[test]
    fn test_after_absorbs_empty() {
        let schema = tiny_schema();
        let child = Expr::primitive(0);
        assert!(Expr::after(&schema, child.clone(), Expr::empty()).is_empty());
        assert!(Expr::after(&schema, Expr::empty(), child).is_empty());
    }

    #[test]
    fn test_choice_identities() {
        let schema = tiny_schema();
        let p = Expr::primitive(1);
        let left = Expr::choice(&schema, Expr::empty(), p.clone());
        assert!(Rc::ptr_eq(&left, &p));
        let right = Expr::choice(&schema, p.clone(), Expr::empty());
        assert!(Rc::ptr_eq(&right, &p));
    }

    #[test]
    fn test_choice_drops_contained_disjunct() {
        let schema = tiny_schema();
        let a = Expr::primitive(0);
        let same = Expr::primitive(0);
        let merged = Expr::choice(&schema, a.clone(), same);
        assert!(Rc::ptr_eq(&merged, &a));
    }

    #[test]
    fn test_choice_final_flag() {
        let schema = tiny_schema();
        let non_final = Expr::primitive(0);
        let fin = Expr::primitive(1);
        let merged = Expr::choice(&schema, non_final, fin);
        assert!(merged.is_final(&schema));
    }

    #[test]
    fn test_choice2_flattens_right_choice() {
        let schema = tiny_schema();
        let a = Expr::primitive(0);
        let b = Expr::primitive(1);
        let rhs = Expr::choice(&schema, a.clone(), b.clone());
        let merged = Expr::choice2(&schema, a.clone(), rhs);
        // `a` is already present, so only `b` is added on the right.
        match &*merged {
            Expr::Choice { lhs, rhs, .. } => {
                assert!(lhs.contains(&a));
                assert!(rhs.contains(&b));
            }
            other => panic!("expected a choice, got {other:?}"),
        }
    }

    #[test]
    fn test_contains_after_requires_equivalent_continuations() {
        let schema = tiny_schema();
        let p0 = Expr::primitive(0);
        let p1 = Expr::primitive(1);
        let a = Expr::after(&schema, p0.clone(), p1.clone());
        let b = Expr::after(&schema, Expr::primitive(0), Expr::primitive(1));
        let c = Expr::after(&schema, p0, Expr::primitive(0));
        assert!(a.contains(&b));
        assert!(!a.contains(&c));
    }

    #[test]
    fn test_empty_rewrites_return_accumulator() {
        let schema = tiny_schema();
        let acc = Expr::primitive(1);
        let empty = Expr::empty();
        let out = empty.start_element(&schema, 0, &AttributesSet::EMPTY, acc.clone());
        assert!(Rc::ptr_eq(&out, &acc));
        let out = empty.text(&schema, Text::new("x"), &AttributesSet::EMPTY, acc.clone());
        assert!(Rc::ptr_eq(&out, &acc));
        let out = empty.end_element(&schema, &AttributesSet::EMPTY, acc.clone());
        assert!(Rc::ptr_eq(&out, &acc));
        let out = empty.expand(&schema, &AttributesSet::EMPTY, acc.clone());
        assert!(Rc::ptr_eq(&out, &acc));
    }

    #[test]
    fn test_deep_chain_drop_is_iterative() {
        let schema = tiny_schema();
        let mut chain = Expr::primitive(1);
        for _ in 0..200_000 {
            chain = Expr::after(&schema, Expr::primitive(1), chain);
        }
        drop(chain);
    }
}
