//! Traversal to operator program lowering.
//!
//! [`OpCollectionBuilder`] walks a traversal in step order. Modulated steps
//! are handed to their [`ParentStep`] rule; every other step maps directly to
//! one operator. Rules call back into the builder to lower their subqueries,
//! so nesting is handled by recursion with a nested [`StepPosition`].

use graphir_common::utils::error::{Error, LoweringError, Result};
use rayon::prelude::*;
use tracing::trace;

use super::alias::{self, Alias, AliasPrefix, StepPosition};
use super::expr;
use super::lower::ParentStep;
use super::lower::group::AggregateBuilder;
use super::plan::{
    AsOp, ElementKind, ExpandDirection, ExpandOp, GetVOp, GetVOpt, GroupOp, IrOperator, LimitOp,
    OperatorProgram, ProjectItem, ProjectOp, SelectOp, SourceOp,
};
use super::traversal::{Step, StepKind, Traversal};
use crate::config::LoweringConfig;

/// Lowers a traversal with the default configuration.
///
/// # Errors
///
/// Returns an error if any step violates a lowering rule.
pub fn lower(traversal: &Traversal) -> Result<OperatorProgram> {
    lower_with_config(traversal, LoweringConfig::default())
}

/// Lowers a traversal with the given configuration.
///
/// # Errors
///
/// Returns an error if any step violates a lowering rule.
pub fn lower_with_config(traversal: &Traversal, config: LoweringConfig) -> Result<OperatorProgram> {
    OpCollectionBuilder::new(config).build(traversal, &StepPosition::root())
}

/// Lowers sub-traversals into operator programs.
///
/// Lowering rules use this to materialize subqueries. Implementations must be
/// pure: the same traversal and scope always give the same program.
pub trait CollectionBuilder: Sync {
    /// Lowers `traversal`, whose steps are positioned under `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if any step violates a lowering rule.
    fn build(&self, traversal: &Traversal, scope: &StepPosition) -> Result<OperatorProgram>;
}

/// The default recursive collection builder.
#[derive(Debug, Clone, Default)]
pub struct OpCollectionBuilder {
    config: LoweringConfig,
}

impl OpCollectionBuilder {
    /// Creates a builder.
    pub fn new(config: LoweringConfig) -> Self {
        Self { config }
    }

    /// Lowers one step at `position`, including its trailing `as(..)`.
    fn lower_step(&self, step: &Step, position: &StepPosition) -> Result<Vec<IrOperator>> {
        let mut ops = match ParentStep::from_kind(&step.kind) {
            Some(parent) => parent.lower(self, &self.config, position)?,
            None => self.lower_elementary(step, position)?,
        };
        if let Some(label) = step.labels.first() {
            ops.push(IrOperator::As(AsOp {
                alias: Alias::named(label),
            }));
        }
        for op in &ops {
            trace!(position = %position, step = step.name(), operator = op.name(), "emitted operator");
        }
        Ok(ops)
    }

    fn lower_elementary(&self, step: &Step, position: &StepPosition) -> Result<Vec<IrOperator>> {
        let op = match &step.kind {
            StepKind::V(ids) => IrOperator::Source(SourceOp {
                element: ElementKind::Vertex,
                ids: ids.clone(),
            }),
            StepKind::E(ids) => IrOperator::Source(SourceOp {
                element: ElementKind::Edge,
                ids: ids.clone(),
            }),

            StepKind::Out(labels) => expand(ExpandDirection::Outgoing, ElementKind::Vertex, labels),
            StepKind::In(labels) => expand(ExpandDirection::Incoming, ElementKind::Vertex, labels),
            StepKind::Both(labels) => expand(ExpandDirection::Both, ElementKind::Vertex, labels),
            StepKind::OutE(labels) => expand(ExpandDirection::Outgoing, ElementKind::Edge, labels),
            StepKind::InE(labels) => expand(ExpandDirection::Incoming, ElementKind::Edge, labels),
            StepKind::BothE(labels) => expand(ExpandDirection::Both, ElementKind::Edge, labels),
            StepKind::OutV => get_v(GetVOpt::Start),
            StepKind::InV => get_v(GetVOpt::End),
            StepKind::BothV => get_v(GetVOpt::Both),
            StepKind::OtherV => get_v(GetVOpt::Other),

            // hasLabel() with no labels filters nothing
            StepKind::HasLabel(labels) if labels.is_empty() => return Ok(Vec::new()),
            StepKind::Has(_) | StepKind::HasLabel(_) | StepKind::Is(_) => {
                match expr::extract_steps(std::slice::from_ref(step)).single_expr() {
                    Some(predicate) => IrOperator::Select(SelectOp {
                        predicate: predicate.to_string(),
                    }),
                    None => return Err(invalid(step, position, "filter has no expression form")),
                }
            }

            StepKind::Values(_) | StepKind::Id | StepKind::Label => {
                match expr::extract_steps(std::slice::from_ref(step)).single_expr() {
                    Some(expression) => IrOperator::Project(ProjectOp {
                        items: vec![ProjectItem {
                            expression: expression.to_string(),
                            alias: None,
                        }],
                    }),
                    None => return Err(invalid(step, position, "property has no expression form")),
                }
            }

            StepKind::Count
            | StepKind::Fold
            | StepKind::Sum
            | StepKind::Mean
            | StepKind::Min
            | StepKind::Max => {
                let Some(aggregate) = AggregateBuilder::from_terminal(&step.kind) else {
                    return Err(invalid(step, position, "not an aggregate"));
                };
                IrOperator::Group(GroupOp {
                    keys: Vec::new(),
                    values: vec![aggregate.build(alias::allocate(
                        AliasPrefix::GroupValues,
                        position,
                        0,
                    ))],
                })
            }

            StepKind::Limit(n) => IrOperator::Limit(LimitOp {
                lower: 0,
                upper: *n,
            }),
            StepKind::Range(lower, upper) => {
                if lower > upper {
                    return Err(invalid(
                        step,
                        position,
                        format!("range({lower}, {upper}) is empty"),
                    ));
                }
                IrOperator::Limit(LimitOp {
                    lower: *lower,
                    upper: *upper,
                })
            }

            StepKind::Identity => return Ok(Vec::new()),

            StepKind::Select(_)
            | StepKind::Dedup(_)
            | StepKind::Sample(_)
            | StepKind::Order(_)
            | StepKind::Group(_)
            | StepKind::WherePredicate(_)
            | StepKind::WhereTraversal(_)
            | StepKind::Not(_) => {
                return Err(invalid(step, position, "modulated step lowered as elementary"));
            }
        };
        Ok(vec![op])
    }
}

impl CollectionBuilder for OpCollectionBuilder {
    fn build(&self, traversal: &Traversal, scope: &StepPosition) -> Result<OperatorProgram> {
        let lowered: Vec<Vec<IrOperator>> = if self.config.parallel && scope.is_root() {
            traversal
                .steps
                .par_iter()
                .enumerate()
                .map(|(i, step)| self.lower_step(step, &scope.child(i)))
                .collect::<Result<_>>()?
        } else {
            traversal
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| self.lower_step(step, &scope.child(i)))
                .collect::<Result<_>>()?
        };
        Ok(OperatorProgram::new(lowered.into_iter().flatten().collect()))
    }
}

fn expand(direction: ExpandDirection, element: ElementKind, labels: &[String]) -> IrOperator {
    IrOperator::Expand(ExpandOp {
        direction,
        element,
        labels: labels.to_vec(),
    })
}

fn get_v(opt: GetVOpt) -> IrOperator {
    IrOperator::GetV(GetVOp { opt })
}

fn invalid(
    step: &Step,
    position: &StepPosition,
    message: impl Into<String>,
) -> Error {
    LoweringError::invalid(format!("{}@{}", step.name(), position), message).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::plan::{AggregateKind, JoinKind};
    use crate::query::predicate::Predicate;
    use crate::query::traversal::{Comparator, Order, OrderStep};
    use graphir_common::types::Value;

    fn names(program: &OperatorProgram) -> Vec<&'static str> {
        program.iter().map(IrOperator::name).collect()
    }

    fn find_apply(program: &OperatorProgram) -> Option<&crate::query::plan::ApplyOp> {
        program.iter().find_map(|op| match op {
            IrOperator::Apply(a) => Some(a),
            _ => None,
        })
    }

    #[test]
    fn test_lower_simple_traversal() {
        let t = Traversal::identity()
            .v(vec![Value::Int64(1)])
            .out(&["knows"])
            .has("name", "josh")
            .values("age");
        let program = lower(&t).unwrap();
        assert_eq!(names(&program), vec!["Source", "Expand", "Select", "Project"]);
        match &program.operators[2] {
            IrOperator::Select(s) => assert_eq!(s.predicate, "@.name == \"josh\""),
            other => panic!("Expected Select, got {other:?}"),
        }
    }

    #[test]
    fn test_lower_navigation() {
        let t = Traversal::identity()
            .v(Vec::new())
            .out_e(&["created"])
            .step(StepKind::InV)
            .in_(&[]);
        let program = lower(&t).unwrap();
        match &program.operators[1] {
            IrOperator::Expand(e) => {
                assert_eq!(e.direction, ExpandDirection::Outgoing);
                assert_eq!(e.element, ElementKind::Edge);
                assert_eq!(e.labels, vec!["created".to_string()]);
            }
            other => panic!("Expected Expand, got {other:?}"),
        }
        assert_eq!(
            program.operators[2],
            IrOperator::GetV(GetVOp { opt: GetVOpt::End })
        );
    }

    #[test]
    fn test_lower_count() {
        let program = lower(&Traversal::identity().v(Vec::new()).count()).unwrap();
        match &program.operators[1] {
            IrOperator::Group(g) => {
                assert!(g.keys.is_empty());
                assert_eq!(g.values[0].kind, AggregateKind::Count);
                assert_eq!(g.values[0].alias.name(), "~values_1_0");
            }
            other => panic!("Expected Group, got {other:?}"),
        }
    }

    #[test]
    fn test_lower_limit_and_range() {
        let t = Traversal::identity()
            .v(Vec::new())
            .limit(5)
            .step(StepKind::Range(2, 4));
        let program = lower(&t).unwrap();
        assert_eq!(
            program.operators[1],
            IrOperator::Limit(LimitOp { lower: 0, upper: 5 })
        );
        assert_eq!(
            program.operators[2],
            IrOperator::Limit(LimitOp { lower: 2, upper: 4 })
        );
        assert!(lower(&Traversal::identity().step(StepKind::Range(4, 2))).is_err());
    }

    #[test]
    fn test_identity_emits_nothing() {
        let t = Traversal::identity().v(Vec::new()).step(StepKind::Identity);
        assert_eq!(lower(&t).unwrap().len(), 1);
    }

    #[test]
    fn test_label_emits_as() {
        let t = Traversal::identity().v(Vec::new()).as_("a").out(&[]);
        let program = lower(&t).unwrap();
        assert_eq!(names(&program), vec!["Source", "As", "Expand"]);
        assert_eq!(
            program.operators[1],
            IrOperator::As(AsOp {
                alias: Alias::named("a")
            })
        );
    }

    #[test]
    fn test_subquery_positions_are_nested() {
        let t = Traversal::identity().v(Vec::new()).step(StepKind::Order(OrderStep {
            comparators: vec![Comparator {
                by: Traversal::identity().out(&[]).count(),
                order: Order::Desc,
            }],
        }));
        let program = lower(&t).unwrap();
        let apply = find_apply(&program).unwrap();
        assert_eq!(apply.join_kind, JoinKind::Inner);
        assert_eq!(apply.alias.as_ref().unwrap().name(), "~expr_1_0");
        // count() inside the subquery is step 1 of sub 0 of step 1
        match &apply.subprogram.operators[1] {
            IrOperator::Group(g) => assert_eq!(g.values[0].alias.name(), "~values_1_0_1_0"),
            other => panic!("Expected Group, got {other:?}"),
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let t = Traversal::identity()
            .v(Vec::new())
            .as_("a")
            .out(&[])
            .step(StepKind::Not(Traversal::identity().out(&["knows"])))
            .step(StepKind::WhereTraversal(
                Traversal::identity().values("age").is(Predicate::gt(30)),
            ))
            .count();
        let sequential = lower(&t).unwrap();
        let parallel = lower_with_config(&t, LoweringConfig::new().with_parallel(true)).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_error_aborts_whole_program() {
        let t = Traversal::identity()
            .v(Vec::new())
            .step(StepKind::Sample(crate::query::traversal::SampleStep {
                amount: -1.0,
                seed: None,
                by: None,
            }));
        assert!(lower(&t).is_err());
    }
}
