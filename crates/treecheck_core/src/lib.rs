//! Validation of structured tree documents against precompiled grammar
//! schemas.
//!
//! The engine computes Brzozowski-style derivatives over tree events: the
//! current state is an algebraic expression over primitive automaton states,
//! rewritten by each start-element, end-element, and text event. A document
//! is a member of the schema's language iff no rewrite collapses to the
//! empty set.
//!
//! [`core::validator::Validator`] is the per-document driver;
//! [`core::schema::SchemaBuilder`] assembles and seals the compiled grammar
//! it runs against.

pub mod core;
pub mod errors;
