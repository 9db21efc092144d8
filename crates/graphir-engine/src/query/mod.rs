//! Traversal lowering pipeline.
//!
//! - **Traversal**: the step tree being compiled
//! - **Predicate**: comparison trees and their flattening into expressions
//! - **Expr**: pure-expression extraction from sub-traversals
//! - **Alias**: deterministic names for intermediate results
//! - **Lower**: the per-step rules for modulated steps
//! - **Builder**: the driver producing a linear operator program
//! - **Plan**: the operator IR

pub mod alias;
pub mod builder;
pub mod expr;
pub mod lower;
pub mod plan;
pub mod predicate;
pub mod traversal;

pub use alias::{Alias, AliasPrefix, StepPosition};
pub use builder::{CollectionBuilder, OpCollectionBuilder, lower, lower_with_config};
pub use expr::{ExprResult, extract};
pub use lower::ParentStep;
pub use plan::{IrOperator, JoinKind, OperatorProgram};
pub use predicate::{CompareOp, Predicate, PredicateValue};
pub use traversal::{Step, StepKind, Traversal};
