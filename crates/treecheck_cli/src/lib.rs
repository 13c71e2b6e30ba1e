//! XML front-end for the tree-grammar validation engine: a streaming reader
//! adapter that turns documents into engine events, and the built-in sample
//! schema the command-line binary validates against.

pub mod sample;
pub mod xml;
