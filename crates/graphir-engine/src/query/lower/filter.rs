//! `where(..)` and `not(..)` lowering.

use graphir_common::utils::error::Result;

use super::LoweringContext;
use crate::config::ModulatorPolicy;
use crate::query::alias::AliasPrefix;
use crate::query::expr;
use crate::query::plan::{IrOperator, JoinKind, SelectOp};
use crate::query::predicate::{self, Predicate, PredicateValue};
use crate::query::traversal::{IDENTITY, Traversal, WherePredicateStep};

/// Lowers `where(start, predicate).by(..)`.
///
/// The start operand and every comparison leaf resolve to an expression,
/// materializing subqueries under one sub-index counter shared by the whole
/// predicate. The bound predicate is flattened into a single filter.
pub(super) fn where_predicate(
    step: &WherePredicateStep,
    ctx: &LoweringContext<'_>,
) -> Result<Vec<IrOperator>> {
    let comparisons = step.predicate.leaf_count();
    if comparisons != step.select_keys.len() {
        return Err(ctx.invalid(format!(
            "where() needs one select key per comparison, got {} keys for {comparisons} comparisons",
            step.select_keys.len()
        )));
    }

    let mut binder = OperandBinder {
        ctx,
        modulators: ModulatorCursor::new(&step.bys, ctx.config.modulator_policy),
        keys: step.select_keys.iter(),
        next_sub: 0,
        ops: Vec::new(),
    };

    let start_key = step.start_key.as_deref().unwrap_or("");
    let start = binder.operand(start_key)?;
    let bound = binder.bind(&step.predicate)?;

    let mut ops = binder.ops;
    ops.push(IrOperator::Select(SelectOp {
        predicate: predicate::flatten(&start, &bound),
    }));
    Ok(ops)
}

/// Lowers `where(traversal)`: a filter when the traversal is pure, a semi
/// apply otherwise.
pub(super) fn where_traversal(
    traversal: &Traversal,
    ctx: &LoweringContext<'_>,
) -> Result<Vec<IrOperator>> {
    let op = match ctx.single(&expr::extract(traversal))? {
        Some(e) => IrOperator::Select(SelectOp { predicate: e }),
        None => ctx.exists(traversal, JoinKind::Semi)?,
    };
    Ok(vec![op])
}

/// Lowers `not(traversal)`: a negated filter when the traversal is pure, an
/// anti apply otherwise.
pub(super) fn not(traversal: &Traversal, ctx: &LoweringContext<'_>) -> Result<Vec<IrOperator>> {
    let op = match ctx.single(&expr::extract(traversal))? {
        Some(e) => IrOperator::Select(SelectOp {
            predicate: predicate::negate_expr(&e),
        }),
        None => ctx.exists(traversal, JoinKind::Anti)?,
    };
    Ok(vec![op])
}

struct OperandBinder<'c, 'a> {
    ctx: &'c LoweringContext<'a>,
    modulators: ModulatorCursor<'c>,
    keys: std::slice::Iter<'c, String>,
    next_sub: usize,
    ops: Vec<IrOperator>,
}

impl OperandBinder<'_, '_> {
    /// Rebuilds the predicate with every comparison bound to its operand.
    fn bind(&mut self, pred: &Predicate) -> Result<Predicate> {
        Ok(match pred {
            Predicate::Compare { op, .. } => {
                let Some(key) = self.keys.next() else {
                    return Err(self
                        .ctx
                        .invalid("where() has more comparisons than select keys"));
                };
                Predicate::Compare {
                    op: *op,
                    value: PredicateValue::Expr(self.operand(key)?),
                }
            }
            Predicate::And(children) => Predicate::And(self.bind_all(children)?),
            Predicate::Or(children) => Predicate::Or(self.bind_all(children)?),
            Predicate::Not(child) => Predicate::Not(Box::new(self.bind(child)?)),
        })
    }

    fn bind_all(&mut self, children: &[Predicate]) -> Result<Vec<Predicate>> {
        children.iter().map(|c| self.bind(c)).collect()
    }

    /// Resolves the next modulator applied to `tag`.
    fn operand(&mut self, tag: &str) -> Result<String> {
        let Some(by) = self.modulators.next() else {
            return Err(self.ctx.invalid(format!(
                "where() ran out of by() modulators after {}",
                self.modulators.consumed()
            )));
        };
        let traversal = by.rooted_at(tag);
        if let Some(e) = self.ctx.single(&expr::extract(&traversal))? {
            return Ok(e);
        }
        let sub = self.next_sub;
        self.next_sub += 1;
        let alias = self.ctx.alias(AliasPrefix::Default, sub);
        let (apply, e) = self.ctx.materialize(&traversal, alias, sub)?;
        self.ops.push(apply);
        Ok(e)
    }
}

/// Hands out `by(..)` modulators to predicate operands in order.
#[derive(Debug)]
struct ModulatorCursor<'a> {
    bys: &'a [Traversal],
    policy: ModulatorPolicy,
    next: usize,
}

impl<'a> ModulatorCursor<'a> {
    fn new(bys: &'a [Traversal], policy: ModulatorPolicy) -> Self {
        Self {
            bys,
            policy,
            next: 0,
        }
    }

    fn consumed(&self) -> usize {
        self.next
    }

    fn next(&mut self) -> Option<&'a Traversal> {
        let by = match (self.bys, self.policy) {
            ([], _) => Some(&IDENTITY),
            ([only], ModulatorPolicy::Broadcast) => Some(only),
            (bys, ModulatorPolicy::Cycle) => Some(&bys[self.next % bys.len()]),
            (bys, _) => bys.get(self.next),
        };
        self.next += 1;
        by
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::LoweringConfig;
    use crate::query::predicate::CompareOp;
    use crate::query::traversal::StepKind;
    use graphir_common::utils::error::{Error, LoweringError};

    fn leaf(op: CompareOp) -> Predicate {
        Predicate::Compare {
            op,
            value: PredicateValue::default(),
        }
    }

    fn where_step(
        start: &str,
        predicate: Predicate,
        keys: &[&str],
        bys: Vec<Traversal>,
    ) -> StepKind {
        StepKind::WherePredicate(WherePredicateStep {
            start_key: Some(start.to_string()),
            predicate,
            select_keys: keys.iter().map(|k| (*k).to_string()).collect(),
            bys,
        })
    }

    fn select_predicate(ops: &[IrOperator]) -> &str {
        match ops.last() {
            Some(IrOperator::Select(s)) => &s.predicate,
            other => panic!("Expected Select, got {other:?}"),
        }
    }

    #[test]
    fn test_single_by_serves_every_operand() {
        let kind = where_step(
            "a",
            leaf(CompareOp::Gt),
            &["b"],
            vec![Traversal::identity().values("age")],
        );
        let ops = lower_at(&kind, 2).unwrap();
        assert_eq!(select_predicate(&ops), "@a.age > @b.age");
    }

    #[test]
    fn test_two_leaf_and() {
        let kind = where_step(
            "a",
            leaf(CompareOp::Gt).and(leaf(CompareOp::Lt)),
            &["b", "c"],
            Vec::new(),
        );
        let ops = lower_at(&kind, 0).unwrap();
        assert_eq!(names(&ops), vec!["Select"]);
        assert_eq!(select_predicate(&ops), "@a > @b && @a < @c");
    }

    #[test]
    fn test_negated_compound() {
        let kind = where_step(
            "a",
            leaf(CompareOp::Eq).or(leaf(CompareOp::Eq)).negate(),
            &["b", "c"],
            Vec::new(),
        );
        let ops = lower_at(&kind, 0).unwrap();
        assert_eq!(select_predicate(&ops), "!(@a == @b || @a == @c)");
    }

    #[test]
    fn test_subquery_operands_share_counter() {
        let count = Traversal::identity().out(&[]).count();
        let kind = where_step(
            "a",
            leaf(CompareOp::Gt).and(leaf(CompareOp::Gt)),
            &["b", "c"],
            vec![count.clone(), Traversal::identity().values("x"), count],
        );
        let ops = lower_at(&kind, 4).unwrap();
        assert_eq!(names(&ops), vec!["Apply", "Apply", "Select"]);
        assert_eq!(
            select_predicate(&ops),
            "@~expr_4_0 > @b.x && @~expr_4_0 > @~expr_4_1"
        );
    }

    #[test]
    fn test_exhausted_modulators() {
        let kind = where_step(
            "a",
            leaf(CompareOp::Gt).and(leaf(CompareOp::Lt)),
            &["b", "c"],
            vec![
                Traversal::identity().values("x"),
                Traversal::identity().values("y"),
            ],
        );
        assert!(matches!(
            lower_at(&kind, 0),
            Err(Error::Lowering(LoweringError::InvalidStructure { .. }))
        ));

        let cycle = LoweringConfig::new().with_modulator_policy(ModulatorPolicy::Cycle);
        let ops = lower_with(&kind, 0, cycle).unwrap();
        assert_eq!(select_predicate(&ops), "@a.x > @b.y && @a.x < @c.x");
    }

    #[test]
    fn test_strict_policy_rejects_reuse() {
        let kind = where_step(
            "a",
            leaf(CompareOp::Gt),
            &["b"],
            vec![Traversal::identity().values("age")],
        );
        let strict = LoweringConfig::new().with_modulator_policy(ModulatorPolicy::Strict);
        assert!(lower_with(&kind, 0, strict).is_err());
    }

    #[test]
    fn test_key_count_mismatch() {
        let kind = where_step("a", leaf(CompareOp::Gt), &[], Vec::new());
        assert!(lower_at(&kind, 0).is_err());
        let kind = where_step("a", leaf(CompareOp::Gt), &["b", "c"], Vec::new());
        match lower_at(&kind, 3) {
            Err(Error::Lowering(LoweringError::InvalidStructure { step, message })) => {
                assert_eq!(step, "where@3");
                assert_eq!(
                    message,
                    "where() needs one select key per comparison, got 2 keys for 1 comparisons"
                );
            }
            other => panic!("Expected InvalidStructure, got {other:?}"),
        }
    }

    #[test]
    fn test_where_traversal_pure_and_semi() {
        let pure = StepKind::WhereTraversal(Traversal::identity().values("age").is(Predicate::gt(30)));
        let ops = lower_at(&pure, 1).unwrap();
        assert_eq!(select_predicate(&ops), "@.age > 30");

        let semi = StepKind::WhereTraversal(Traversal::identity().out(&["knows"]));
        let ops = lower_at(&semi, 1).unwrap();
        assert_eq!(ops.len(), 1);
        let IrOperator::Apply(apply) = &ops[0] else {
            panic!("Expected Apply");
        };
        assert_eq!(apply.join_kind, JoinKind::Semi);
        assert!(apply.alias.is_none());
    }

    #[test]
    fn test_not_pure_and_anti() {
        let pure = StepKind::Not(
            Traversal::identity()
                .select("a")
                .values("age")
                .is(Predicate::gt(30)),
        );
        let ops = lower_at(&pure, 0).unwrap();
        assert_eq!(select_predicate(&ops), "!@a.age > 30");

        let compound = StepKind::Not(
            Traversal::identity().has("x", 1).has("y", 2),
        );
        let ops = lower_at(&compound, 0).unwrap();
        assert_eq!(select_predicate(&ops), "!(@.x == 1 && @.y == 2)");

        let anti = StepKind::Not(Traversal::identity().in_(&[]));
        let ops = lower_at(&anti, 0).unwrap();
        let IrOperator::Apply(apply) = &ops[0] else {
            panic!("Expected Apply");
        };
        assert_eq!(apply.join_kind, JoinKind::Anti);
        assert!(apply.alias.is_none());
    }

    #[test]
    fn test_multi_tag_existence_filters_are_invalid() {
        let pair = Traversal::identity().select_by(&["a", "b"], Vec::new());
        for (kind, name) in [
            (StepKind::WhereTraversal(pair.clone()), "where@0"),
            (StepKind::Not(pair), "not@0"),
        ] {
            match lower_at(&kind, 0) {
                Err(Error::Lowering(LoweringError::InvalidStructure { step, .. })) => {
                    assert_eq!(step, name);
                }
                other => panic!("Expected InvalidStructure, got {other:?}"),
            }
        }
    }
}
