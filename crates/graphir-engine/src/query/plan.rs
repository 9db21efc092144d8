//! Intermediate operator programs.
//!
//! Lowering turns a traversal tree into a flat [`OperatorProgram`]: a list of
//! [`IrOperator`]s the execution engine consumes in order. Operators are
//! built once and never mutated after emission. Values computed by one
//! operator are referred to by later ones through `@alias` expressions.

use graphir_common::types::Value;
use graphir_common::utils::error::{Error, Result};
use serde::Serialize;

use super::alias::Alias;

/// A linear operator program.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OperatorProgram {
    /// Operators in execution order.
    pub operators: Vec<IrOperator>,
}

impl OperatorProgram {
    /// Creates a program from operators.
    pub fn new(operators: Vec<IrOperator>) -> Self {
        Self { operators }
    }

    /// Number of top-level operators.
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// Returns true if the program has no operators.
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Iterates over the top-level operators.
    pub fn iter(&self) -> std::slice::Iter<'_, IrOperator> {
        self.operators.iter()
    }

    /// Encodes the program into the engine's binary plan format.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be serialized.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl IntoIterator for OperatorProgram {
    type Item = IrOperator;
    type IntoIter = std::vec::IntoIter<IrOperator>;

    fn into_iter(self) -> Self::IntoIter {
        self.operators.into_iter()
    }
}

impl<'a> IntoIterator for &'a OperatorProgram {
    type Item = &'a IrOperator;
    type IntoIter = std::slice::Iter<'a, IrOperator>;

    fn into_iter(self) -> Self::IntoIter {
        self.operators.iter()
    }
}

/// An operator of the program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum IrOperator {
    /// Scan vertices or edges.
    Source(SourceOp),

    /// Expand from vertices to adjacent vertices or edges.
    Expand(ExpandOp),

    /// Get an endpoint of the current edge.
    GetV(GetVOp),

    /// Keep a window of the input.
    Limit(LimitOp),

    /// Bind the current record to a query-given alias.
    As(AsOp),

    /// Run a subprogram per input record and merge its result back.
    Apply(ApplyOp),

    /// Project expressions.
    Project(ProjectOp),

    /// Remove duplicates by key expressions.
    Dedup(DedupOp),

    /// Sort by key expressions.
    Order(OrderOp),

    /// Group by keys and aggregate values.
    Group(GroupOp),

    /// Filter by a boolean expression.
    Select(SelectOp),

    /// Random sampling.
    Sample(SampleOp),
}

impl IrOperator {
    /// Returns the operator's name for display and debugging.
    pub fn name(&self) -> &'static str {
        match self {
            IrOperator::Source(_) => "Source",
            IrOperator::Expand(_) => "Expand",
            IrOperator::GetV(_) => "GetV",
            IrOperator::Limit(_) => "Limit",
            IrOperator::As(_) => "As",
            IrOperator::Apply(_) => "Apply",
            IrOperator::Project(_) => "Project",
            IrOperator::Dedup(_) => "Dedup",
            IrOperator::Order(_) => "Order",
            IrOperator::Group(_) => "Group",
            IrOperator::Select(_) => "Select",
            IrOperator::Sample(_) => "Sample",
        }
    }

    /// Aliases this operator binds, in binding order.
    pub fn bound_aliases(&self) -> Vec<&Alias> {
        match self {
            IrOperator::As(op) => vec![&op.alias],
            IrOperator::Apply(op) => op.alias.iter().collect(),
            IrOperator::Project(op) => op.items.iter().filter_map(|i| i.alias.as_ref()).collect(),
            IrOperator::Group(op) => op
                .keys
                .iter()
                .map(|k| &k.alias)
                .chain(op.values.iter().map(|v| &v.alias))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Kind of graph element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElementKind {
    /// Vertices.
    Vertex,
    /// Edges.
    Edge,
}

/// Scan graph elements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceOp {
    /// What to scan.
    pub element: ElementKind,
    /// Ids to restrict the scan to; empty scans everything.
    pub ids: Vec<Value>,
}

/// Direction for edge expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpandDirection {
    /// Follow outgoing edges.
    Outgoing,
    /// Follow incoming edges.
    Incoming,
    /// Follow edges in either direction.
    Both,
}

/// Expand from vertices to their neighbors or incident edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandOp {
    /// Direction of expansion.
    pub direction: ExpandDirection,
    /// Whether the expansion yields adjacent vertices or the edges themselves.
    pub element: ElementKind,
    /// Edge label filter; empty accepts every label.
    pub labels: Vec<String>,
}

/// Which endpoint of an edge to get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GetVOpt {
    /// Source vertex.
    Start,
    /// Target vertex.
    End,
    /// Both endpoints.
    Both,
    /// The endpoint not traversed from.
    Other,
}

/// Get an endpoint of the current edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetVOp {
    /// Endpoint selection.
    pub opt: GetVOpt,
}

/// Keep records in `[lower, upper)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitOp {
    /// First record kept.
    pub lower: usize,
    /// First record dropped.
    pub upper: usize,
}

/// Bind the current record to an alias.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AsOp {
    /// Alias bound.
    pub alias: Alias,
}

/// How a subquery result merges back into the outer record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinKind {
    /// Attach the subquery result to the record.
    Inner,
    /// Keep records for which the subquery yields something.
    Semi,
    /// Keep records for which the subquery yields nothing.
    Anti,
}

/// Run a subprogram per input record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyOp {
    /// The nested program.
    pub subprogram: OperatorProgram,
    /// Merge semantics.
    pub join_kind: JoinKind,
    /// Column the result is bound to; none for existence tests.
    pub alias: Option<Alias>,
}

/// Project expressions into named columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectOp {
    /// Projected items.
    pub items: Vec<ProjectItem>,
}

/// A single projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectItem {
    /// Expression to compute.
    pub expression: String,
    /// Output column; none when the projection replaces the record.
    pub alias: Option<Alias>,
}

/// Remove duplicate records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DedupOp {
    /// Key expressions.
    pub keys: Vec<String>,
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortOrder {
    /// Ascending order.
    Ascending,
    /// Descending order.
    Descending,
    /// Random order.
    Shuffle,
}

/// A sort key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortKey {
    /// Expression to sort by.
    pub expression: String,
    /// Sort order.
    pub order: SortOrder,
}

/// Sort records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderOp {
    /// Sort keys in priority order.
    pub keys: Vec<SortKey>,
}

/// A grouping key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupKey {
    /// Key expression.
    pub expression: String,
    /// Output column.
    pub alias: Alias,
}

/// Aggregate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AggregateKind {
    /// Count records.
    Count,
    /// Count distinct values.
    CountDistinct,
    /// Sum values.
    Sum,
    /// Average values.
    Avg,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
    /// Collect into a list.
    ToList,
    /// Collect into a set.
    ToSet,
}

/// An aggregate value of a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateFunction {
    /// Aggregate operation.
    pub kind: AggregateKind,
    /// Aggregated expression; the current record when absent.
    pub source: Option<String>,
    /// Output column.
    pub alias: Alias,
}

/// Group records and aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupOp {
    /// Grouping keys; empty aggregates the whole input.
    pub keys: Vec<GroupKey>,
    /// Aggregates.
    pub values: Vec<AggregateFunction>,
}

/// Filter records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOp {
    /// Boolean expression.
    pub predicate: String,
}

/// Sample size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SampleAmount {
    /// A fixed number of records.
    Count(u64),
    /// A fraction of the input.
    Ratio(f64),
}

/// Random weighted sampling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleOp {
    /// How many records to keep.
    pub amount: SampleAmount,
    /// Random seed.
    pub seed: u64,
    /// Per-record weight expression.
    pub probability: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::alias::{AliasPrefix, StepPosition, allocate};

    #[test]
    fn test_apply_program_structure() {
        let alias = allocate(AliasPrefix::Default, &StepPosition::root().child(1), 0);
        let program = OperatorProgram::new(vec![
            IrOperator::Source(SourceOp {
                element: ElementKind::Vertex,
                ids: Vec::new(),
            }),
            IrOperator::Apply(ApplyOp {
                subprogram: OperatorProgram::new(vec![IrOperator::Expand(ExpandOp {
                    direction: ExpandDirection::Outgoing,
                    element: ElementKind::Vertex,
                    labels: vec!["knows".into()],
                })]),
                join_kind: JoinKind::Inner,
                alias: Some(alias.clone()),
            }),
            IrOperator::Order(OrderOp {
                keys: vec![SortKey {
                    expression: alias.as_expr(),
                    order: SortOrder::Descending,
                }],
            }),
        ]);

        assert_eq!(program.len(), 3);
        if let IrOperator::Apply(apply) = &program.operators[1] {
            assert_eq!(apply.join_kind, JoinKind::Inner);
            assert_eq!(apply.subprogram.len(), 1);
            assert_eq!(program.operators[1].bound_aliases(), vec![&alias]);
        } else {
            panic!("Expected Apply");
        }
        let names: Vec<_> = program.iter().map(IrOperator::name).collect();
        assert_eq!(names, vec!["Source", "Apply", "Order"]);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let program = OperatorProgram::new(vec![IrOperator::Select(SelectOp {
            predicate: "@.age > 30".into(),
        })]);
        let first = program.encode().unwrap();
        let second = program.clone().encode().unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_group_bound_aliases_keys_then_values() {
        let pos = StepPosition::root().child(0);
        let op = IrOperator::Group(GroupOp {
            keys: vec![GroupKey {
                expression: "@.name".into(),
                alias: allocate(AliasPrefix::GroupKeys, &pos, 0),
            }],
            values: vec![AggregateFunction {
                kind: AggregateKind::Count,
                source: None,
                alias: allocate(AliasPrefix::GroupValues, &pos, 0),
            }],
        });
        let names: Vec<_> = op.bound_aliases().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["~keys_0_0", "~values_0_0"]);
    }
}
