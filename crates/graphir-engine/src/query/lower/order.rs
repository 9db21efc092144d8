//! `order().by(..)` lowering.

use graphir_common::utils::error::Result;

use super::LoweringContext;
use crate::query::plan::{IrOperator, OrderOp, SortKey, SortOrder};
use crate::query::traversal::{Order, OrderStep};

/// Emits one sort key per comparator, in declaration order.
pub(super) fn lower(order: &OrderStep, ctx: &LoweringContext<'_>) -> Result<Vec<IrOperator>> {
    let comparators = order.comparators();
    let mut ops = Vec::new();
    let mut keys = Vec::with_capacity(comparators.len());
    for (i, comparator) in comparators.iter().enumerate() {
        let expression = ctx.resolve(&comparator.by, i, &mut ops)?;
        keys.push(SortKey {
            expression,
            order: sort_order(comparator.order),
        });
    }
    ops.push(IrOperator::Order(OrderOp { keys }));
    Ok(ops)
}

fn sort_order(order: Order) -> SortOrder {
    match order {
        Order::Asc => SortOrder::Ascending,
        Order::Desc => SortOrder::Descending,
        Order::Shuffle => SortOrder::Shuffle,
    }
}
