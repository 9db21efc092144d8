//! `sample(n).by(..)` lowering.

use graphir_common::utils::error::Result;

use super::LoweringContext;
use crate::query::plan::{IrOperator, SampleAmount, SampleOp};
use crate::query::traversal::SampleStep;

pub(super) fn lower(sample: &SampleStep, ctx: &LoweringContext<'_>) -> Result<Vec<IrOperator>> {
    let amount = sample_amount(sample.amount).ok_or_else(|| {
        ctx.invalid(format!(
            "sample amount must be a positive count or a ratio in (0, 1), got {}",
            sample.amount
        ))
    })?;
    let seed = sample.seed.unwrap_or(ctx.config.default_sample_seed);

    let mut ops = Vec::new();
    let probability = ctx.resolve(sample.by_or_identity(), 0, &mut ops)?;
    ops.push(IrOperator::Sample(SampleOp {
        amount,
        seed,
        probability,
    }));
    Ok(ops)
}

fn sample_amount(amount: f64) -> Option<SampleAmount> {
    if amount > 0.0 && amount < 1.0 {
        Some(SampleAmount::Ratio(amount))
    } else if amount >= 1.0 && amount.fract() == 0.0 && amount <= u64::MAX as f64 {
        Some(SampleAmount::Count(amount as u64))
    } else {
        None
    }
}
