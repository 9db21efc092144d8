//! `dedup(keys..).by(..)` lowering.

use graphir_common::utils::error::Result;

use super::LoweringContext;
use crate::query::alias::AliasPrefix;
use crate::query::expr;
use crate::query::plan::{DedupOp, IrOperator};
use crate::query::traversal::DedupStep;

pub(super) fn lower(dedup: &DedupStep, ctx: &LoweringContext<'_>) -> Result<Vec<IrOperator>> {
    let resolved = expr::extract_dedup(dedup);
    if resolved.len() != dedup.tags().len() {
        return Err(ctx.invalid("dedup() keys must be distinct"));
    }
    let by = dedup.by_or_identity();

    let mut ops = Vec::new();
    let mut keys = Vec::with_capacity(resolved.len());
    for (i, (tag, resolved_expr)) in resolved.iter().enumerate() {
        match resolved_expr {
            Some(e) => keys.push(e.to_string()),
            None => {
                let alias = ctx.alias(AliasPrefix::Default, i);
                let (apply, e) = ctx.materialize(&by.rooted_at(tag), alias, i)?;
                ops.push(apply);
                keys.push(e);
            }
        }
    }
    ops.push(IrOperator::Dedup(DedupOp { keys }));
    Ok(ops)
}
