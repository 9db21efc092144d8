//! `group()` and `groupCount()` lowering.
//!
//! Keys resolve like order comparators. Values never become subqueries: the
//! aggregate comes from the value traversal's terminal step and whatever
//! precedes it must be a pure expression, which becomes the aggregate's
//! source.

use graphir_common::utils::error::Result;

use super::LoweringContext;
use crate::query::alias::{Alias, AliasPrefix};
use crate::query::expr;
use crate::query::plan::{AggregateFunction, AggregateKind, GroupKey, GroupOp, IrOperator};
use crate::query::traversal::{GroupStep, Step, StepKind, Traversal};

pub(super) fn lower(group: &GroupStep, ctx: &LoweringContext<'_>) -> Result<Vec<IrOperator>> {
    let mut ops = Vec::new();

    let key_traversals = group.key_traversals();
    let mut keys = Vec::with_capacity(key_traversals.len());
    for (i, key) in key_traversals.iter().enumerate() {
        let expression = ctx.resolve(key, i, &mut ops)?;
        let alias = key
            .end_step()
            .and_then(|s| s.labels.first())
            .map(Alias::named)
            .unwrap_or_else(|| ctx.alias(AliasPrefix::GroupKeys, i));
        keys.push(GroupKey { expression, alias });
    }

    let values = group
        .value_traversals()
        .iter()
        .enumerate()
        .map(|(i, value)| aggregate(value, ctx, ctx.alias(AliasPrefix::GroupValues, i)))
        .collect::<Result<Vec<_>>>()?;

    ops.push(IrOperator::Group(GroupOp { keys, values }));
    Ok(ops)
}

fn aggregate(
    value: &Traversal,
    ctx: &LoweringContext<'_>,
    alias: Alias,
) -> Result<AggregateFunction> {
    let Some((terminal, mut prefix)) = value.steps.split_last() else {
        return Err(ctx.invalid("group value by() must end in an aggregate step"));
    };
    let mut builder = AggregateBuilder::from_terminal(&terminal.kind).ok_or_else(|| {
        ctx.unsupported(format!(
            "{}() is not a supported group aggregate",
            terminal.name()
        ))
    })?;

    // A dedup right before the terminal makes the aggregate distinct. A bare
    // dedup() is dropped; a keyed or modulated one still names the source.
    if let Some((last, rest)) = prefix.split_last() {
        if let StepKind::Dedup(dedup) = &last.kind {
            builder = builder.distinct();
            if dedup.is_plain() {
                prefix = rest;
            }
        }
    }

    if !prefix.is_empty() {
        builder = builder.source(source_expr(prefix, ctx)?);
    }
    Ok(builder.build(alias))
}

/// The steps before an aggregate must resolve to one pure expression.
fn source_expr(prefix: &[Step], ctx: &LoweringContext<'_>) -> Result<String> {
    let resolved = expr::extract_steps(prefix);
    match ctx.single(&resolved)? {
        Some(e) => Ok(e),
        None => Err(ctx.unsupported("segment apply is unsupported")),
    }
}

/// Builds an [`AggregateFunction`] from a terminal step.
#[derive(Debug, Clone)]
pub(crate) struct AggregateBuilder {
    kind: AggregateKind,
    source: Option<String>,
}

impl AggregateBuilder {
    /// Returns `None` for steps that do not aggregate.
    pub fn from_terminal(kind: &StepKind) -> Option<Self> {
        let kind = match kind {
            StepKind::Count => AggregateKind::Count,
            StepKind::Fold => AggregateKind::ToList,
            StepKind::Sum => AggregateKind::Sum,
            StepKind::Mean => AggregateKind::Avg,
            StepKind::Min => AggregateKind::Min,
            StepKind::Max => AggregateKind::Max,
            _ => return None,
        };
        Some(Self { kind, source: None })
    }

    /// Switches to the distinct variant when there is one.
    pub fn distinct(self) -> Self {
        let kind = match self.kind {
            AggregateKind::Count => AggregateKind::CountDistinct,
            AggregateKind::ToList => AggregateKind::ToSet,
            other => other,
        };
        Self { kind, ..self }
    }

    pub fn source(self, source: String) -> Self {
        Self {
            source: Some(source),
            ..self
        }
    }

    pub fn build(self, alias: Alias) -> AggregateFunction {
        AggregateFunction {
            kind: self.kind,
            source: self.source,
            alias,
        }
    }
}
