//! Core type definitions for Graphir.
//!
//! - Literal values ([`Value`]) carried by predicates, source ids and
//!   decoded engine results

mod value;

pub use value::Value;
