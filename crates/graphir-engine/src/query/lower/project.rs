//! `select(keys..).by(..)` lowering.

use graphir_common::utils::error::Result;

use super::LoweringContext;
use crate::query::alias::AliasPrefix;
use crate::query::expr;
use crate::query::plan::{IrOperator, ProjectItem, ProjectOp};
use crate::query::traversal::SelectStep;

/// Emits one apply per key that needs a subquery, then a single projection.
///
/// A projection of exactly one key replaces the record and carries no alias.
pub(super) fn lower(select: &SelectStep, ctx: &LoweringContext<'_>) -> Result<Vec<IrOperator>> {
    if select.keys.is_empty() {
        return Err(ctx.invalid("select() requires at least one key"));
    }
    let resolved = expr::extract_select(select);
    if resolved.len() != select.keys.len() {
        return Err(ctx.invalid("select() keys must be distinct"));
    }

    let single = resolved.len() == 1;
    let mut ops = Vec::new();
    let mut items = Vec::with_capacity(resolved.len());
    for (i, (tag, resolved_expr)) in resolved.iter().enumerate() {
        let expression = match resolved_expr {
            Some(e) => e.to_string(),
            None => {
                let alias = ctx.tagged_alias(AliasPrefix::ProjectApply, tag, i);
                let (apply, e) = ctx.materialize(&select.by_for(i).rooted_at(tag), alias, i)?;
                ops.push(apply);
                e
            }
        };
        let alias = (!single).then(|| ctx.tagged_alias(AliasPrefix::ProjectTag, tag, i));
        items.push(ProjectItem { expression, alias });
    }
    ops.push(IrOperator::Project(ProjectOp { items }));
    Ok(ops)
}
