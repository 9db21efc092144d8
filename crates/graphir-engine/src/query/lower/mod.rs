//! Lowering of modulated steps.
//!
//! Each modulated ("parent") step carries sub-traversals that produce keys,
//! values or predicate operands. For every such sub-traversal a rule decides
//! whether the value is a pure expression ([`expr::extract`]) or needs a
//! subquery, which is materialized as an [`ApplyOp`] bound to an allocated
//! alias. A rule emits its subqueries first and then exactly one operator of
//! its own, except existence tests, which are a single Semi or Anti apply.

mod dedup;
mod filter;
pub(crate) mod group;
mod order;
mod project;
mod sample;

use std::fmt;

use graphir_common::utils::error::{Error, LoweringError, Result};
use tracing::debug;

use super::alias::{self, Alias, AliasPrefix, StepPosition};
use super::builder::CollectionBuilder;
use super::expr::{self, ExprResult};
use super::plan::{ApplyOp, IrOperator, JoinKind};
use super::traversal::{
    DedupStep, GroupStep, OrderStep, SampleStep, SelectStep, StepKind, Traversal,
    WherePredicateStep,
};
use crate::config::LoweringConfig;

/// A step that carries sub-traversals, borrowed from the step tree.
#[derive(Debug, Clone, Copy)]
pub enum ParentStep<'a> {
    /// `select(keys..).by(..)`.
    Project(&'a SelectStep),
    /// `dedup(keys..).by(..)`.
    Dedup(&'a DedupStep),
    /// `sample(n).by(..)`.
    Sample(&'a SampleStep),
    /// `order().by(..)`.
    Order(&'a OrderStep),
    /// `group()` and `groupCount()`.
    Group(&'a GroupStep),
    /// `where(start, predicate).by(..)`.
    WherePredicate(&'a WherePredicateStep),
    /// `where(traversal)`.
    WhereTraversal(&'a Traversal),
    /// `not(traversal)`.
    Not(&'a Traversal),
}

impl<'a> ParentStep<'a> {
    /// Returns the parent step for `kind`, or `None` for elementary steps.
    pub fn from_kind(kind: &'a StepKind) -> Option<Self> {
        Some(match kind {
            StepKind::Select(s) => ParentStep::Project(s),
            StepKind::Dedup(s) => ParentStep::Dedup(s),
            StepKind::Sample(s) => ParentStep::Sample(s),
            StepKind::Order(s) => ParentStep::Order(s),
            StepKind::Group(s) => ParentStep::Group(s),
            StepKind::WherePredicate(s) => ParentStep::WherePredicate(s),
            StepKind::WhereTraversal(t) => ParentStep::WhereTraversal(t),
            StepKind::Not(t) => ParentStep::Not(t),
            _ => return None,
        })
    }

    /// Step name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ParentStep::Project(_) => "select",
            ParentStep::Dedup(_) => "dedup",
            ParentStep::Sample(_) => "sample",
            ParentStep::Order(_) => "order",
            ParentStep::Group(g) if g.count => "groupCount",
            ParentStep::Group(_) => "group",
            ParentStep::WherePredicate(_) | ParentStep::WhereTraversal(_) => "where",
            ParentStep::Not(_) => "not",
        }
    }

    /// Lowers the step at `position` into operators.
    ///
    /// Nested subqueries are built through `builder`.
    pub fn lower(
        &self,
        builder: &dyn CollectionBuilder,
        config: &LoweringConfig,
        position: &StepPosition,
    ) -> Result<Vec<IrOperator>> {
        let ctx = LoweringContext {
            builder,
            config,
            step: StepRef {
                name: self.name(),
                position,
            },
        };
        match *self {
            ParentStep::Project(s) => project::lower(s, &ctx),
            ParentStep::Dedup(s) => dedup::lower(s, &ctx),
            ParentStep::Sample(s) => sample::lower(s, &ctx),
            ParentStep::Order(s) => order::lower(s, &ctx),
            ParentStep::Group(s) => group::lower(s, &ctx),
            ParentStep::WherePredicate(s) => filter::where_predicate(s, &ctx),
            ParentStep::WhereTraversal(t) => filter::where_traversal(t, &ctx),
            ParentStep::Not(t) => filter::not(t, &ctx),
        }
    }
}

/// Identifies a step in error messages as `name@position`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepRef<'a> {
    pub name: &'static str,
    pub position: &'a StepPosition,
}

impl fmt::Display for StepRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.position)
    }
}

/// Everything a rule needs while lowering one step.
pub(crate) struct LoweringContext<'a> {
    builder: &'a dyn CollectionBuilder,
    pub config: &'a LoweringConfig,
    pub step: StepRef<'a>,
}

impl LoweringContext<'_> {
    pub fn invalid(&self, message: impl Into<String>) -> Error {
        LoweringError::invalid(self.step.to_string(), message).into()
    }

    pub fn unsupported(&self, message: impl Into<String>) -> Error {
        LoweringError::unsupported(self.step.to_string(), message).into()
    }

    pub fn alias(&self, prefix: AliasPrefix, sub_index: usize) -> Alias {
        alias::allocate(prefix, self.step.position, sub_index as u32)
    }

    pub fn tagged_alias(&self, prefix: AliasPrefix, tag: &str, sub_index: usize) -> Alias {
        alias::allocate_tagged(prefix, tag, self.step.position, sub_index as u32)
    }

    /// Requires `result` to hold exactly one entry and returns its
    /// expression, if it resolved.
    pub fn single(&self, result: &ExprResult) -> Result<Option<String>> {
        if result.len() != 1 {
            return Err(self.invalid(format!(
                "by() must yield exactly one expression, got {}",
                result.len()
            )));
        }
        Ok(result.single_expr().map(str::to_string))
    }

    /// Resolves a sub-traversal to one expression, materializing it under a
    /// default alias at `sub_index` when it is not pure.
    pub fn resolve(
        &self,
        traversal: &Traversal,
        sub_index: usize,
        ops: &mut Vec<IrOperator>,
    ) -> Result<String> {
        match self.single(&expr::extract(traversal))? {
            Some(expr) => Ok(expr),
            None => {
                let alias = self.alias(AliasPrefix::Default, sub_index);
                let (apply, expr) = self.materialize(traversal, alias, sub_index)?;
                ops.push(apply);
                Ok(expr)
            }
        }
    }

    /// Builds `traversal` as an Inner apply bound to `alias`, returning the
    /// operator and the expression referring to its result.
    ///
    /// Steps of the subquery are positioned under `sub_index` of this step.
    pub fn materialize(
        &self,
        traversal: &Traversal,
        alias: Alias,
        sub_index: usize,
    ) -> Result<(IrOperator, String)> {
        debug!(step = %self.step, alias = %alias, "materializing subquery");
        let subprogram = self
            .builder
            .build(traversal, &self.step.position.child(sub_index))?;
        let expr = alias.as_expr();
        let apply = IrOperator::Apply(ApplyOp {
            subprogram,
            join_kind: JoinKind::Inner,
            alias: Some(alias),
        });
        Ok((apply, expr))
    }

    /// Builds `traversal` as an unaliased existence test.
    pub fn exists(&self, traversal: &Traversal, join_kind: JoinKind) -> Result<IrOperator> {
        debug!(step = %self.step, join = ?join_kind, "materializing existence subquery");
        let subprogram = self.builder.build(traversal, &self.step.position.child(0))?;
        Ok(IrOperator::Apply(ApplyOp {
            subprogram,
            join_kind,
            alias: None,
        }))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::query::builder::OpCollectionBuilder;

    /// Lowers a single parent step at top-level position `index`.
    pub fn lower_at(kind: &StepKind, index: usize) -> Result<Vec<IrOperator>> {
        lower_with(kind, index, LoweringConfig::default())
    }

    pub fn lower_with(
        kind: &StepKind,
        index: usize,
        config: LoweringConfig,
    ) -> Result<Vec<IrOperator>> {
        let builder = OpCollectionBuilder::new(config.clone());
        let parent = ParentStep::from_kind(kind).expect("parent step");
        parent.lower(&builder, &config, &StepPosition::root().child(index))
    }

    pub fn names(ops: &[IrOperator]) -> Vec<&'static str> {
        ops.iter().map(IrOperator::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::query::traversal::Comparator;

    #[test]
    fn test_elementary_steps_are_not_parents() {
        assert!(ParentStep::from_kind(&StepKind::Count).is_none());
        assert!(ParentStep::from_kind(&StepKind::Out(Vec::new())).is_none());
        let group_count = StepKind::Group(GroupStep {
            count: true,
            ..GroupStep::default()
        });
        assert_eq!(
            ParentStep::from_kind(&group_count).map(|p| p.name()),
            Some("groupCount")
        );
    }

    #[test]
    fn test_step_ref_display() {
        let position = StepPosition::root().child(2).child(0).child(1);
        let step = StepRef {
            name: "order",
            position: &position,
        };
        assert_eq!(step.to_string(), "order@2.0.1");
    }

    #[test]
    fn test_error_names_step() {
        let kind = StepKind::Order(OrderStep {
            comparators: vec![Comparator {
                by: Traversal::identity().select_by(&["a", "b"], Vec::new()),
                ..Default::default()
            }],
        });
        let err = lower_at(&kind, 4).unwrap_err();
        match err {
            Error::Lowering(e) => assert_eq!(e.step(), "order@4"),
            other => panic!("Expected lowering error, got {other:?}"),
        }
        assert!(names(&[]).is_empty());
    }
}
