//! Property tests over generated traversal trees.

use std::collections::HashSet;

use graphir_engine::query::plan::IrOperator;
use graphir_engine::query::traversal::{
    Comparator, DedupStep, GroupStep, HasStep, Order, OrderStep, SampleStep, SelectStep, StepKind,
    WherePredicateStep,
};
use graphir_engine::query::{Alias, CompareOp, OperatorProgram, Predicate, PredicateValue, extract};
use graphir_engine::{LoweringConfig, Traversal, lower, lower_with_config};
use proptest::prelude::*;

fn t() -> Traversal {
    Traversal::identity()
}

fn tag() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["a", "b", "c"])
}

fn property() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["name", "age", "weight"])
}

fn order() -> impl Strategy<Value = Order> {
    prop_oneof![Just(Order::Asc), Just(Order::Desc), Just(Order::Shuffle)]
}

/// `by(..)` modulators: pure projections, navigations, and nested filters.
fn modulator() -> BoxedStrategy<Traversal> {
    let leaf = prop_oneof![
        Just(t()),
        property().prop_map(|p| t().values(p)),
        tag().prop_map(|k| t().select(k)),
        Just(t().label()),
        Just(t().out(&[]).count()),
        (property(), 0i64..100).prop_map(|(p, n)| t().values(p).is(Predicate::gt(n))),
    ];
    leaf.prop_recursive(2, 8, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(|m| t().out(&[]).step(StepKind::Not(m)).count()),
            inner.prop_map(|m| t().both(&[]).step(StepKind::WhereTraversal(m)).fold()),
        ]
    })
    .boxed()
}

fn leaf(op: CompareOp) -> Predicate {
    Predicate::Compare {
        op,
        value: PredicateValue::default(),
    }
}

fn parent_step() -> impl Strategy<Value = StepKind> {
    prop_oneof![
        prop::collection::vec(modulator(), 0..3)
            .prop_map(|bys| StepKind::Select(SelectStep::new(["a", "b"]).with_bys(bys))),
        modulator().prop_map(|by| StepKind::Dedup(DedupStep {
            keys: Vec::new(),
            by: Some(by),
        })),
        prop::collection::vec((modulator(), order()), 0..3).prop_map(|cs| {
            StepKind::Order(OrderStep {
                comparators: cs
                    .into_iter()
                    .map(|(by, order)| Comparator { by, order })
                    .collect(),
            })
        }),
        (prop::collection::vec(modulator(), 0..3), any::<bool>()).prop_map(|(keys, count)| {
            StepKind::Group(GroupStep {
                keys,
                values: Vec::new(),
                count,
            })
        }),
        modulator().prop_map(StepKind::WhereTraversal),
        modulator().prop_map(StepKind::Not),
        (modulator(), 1u32..20).prop_map(|(by, n)| {
            StepKind::Sample(SampleStep {
                amount: f64::from(n),
                seed: None,
                by: Some(by),
            })
        }),
        prop::collection::vec(modulator(), 0..2).prop_map(|bys| {
            StepKind::WherePredicate(WherePredicateStep {
                start_key: Some("a".into()),
                predicate: leaf(CompareOp::Gt).or(leaf(CompareOp::Eq)),
                select_keys: vec!["b".into(), "c".into()],
                bys,
            })
        }),
    ]
}

fn elementary_step() -> impl Strategy<Value = StepKind> {
    prop_oneof![
        Just(StepKind::Out(Vec::new())),
        Just(StepKind::In(vec!["knows".into()])),
        Just(StepKind::OutE(Vec::new())),
        Just(StepKind::InV),
        (property(), 0i64..100).prop_map(|(p, n)| {
            StepKind::Has(HasStep::KeyPredicate(p.to_string(), Predicate::gt(n)))
        }),
        Just(StepKind::Limit(10)),
    ]
}

/// `g.V().as('a').out().as('b').out().as('c')` followed by random steps.
fn traversal() -> impl Strategy<Value = Traversal> {
    let step = prop_oneof![3 => parent_step(), 1 => elementary_step()];
    prop::collection::vec(step, 1..6).prop_map(|steps| {
        let mut traversal = t()
            .v(Vec::new())
            .as_("a")
            .out(&[])
            .as_("b")
            .out(&[])
            .as_("c");
        for kind in steps {
            traversal = traversal.step(kind);
        }
        traversal
    })
}

fn generated_aliases<'a>(program: &'a OperatorProgram, out: &mut Vec<&'a Alias>) {
    for op in program {
        out.extend(op.bound_aliases().into_iter().filter(|a| !a.is_user_defined()));
        if let IrOperator::Apply(apply) = op {
            generated_aliases(&apply.subprogram, out);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn prop_lowering_is_deterministic(traversal in traversal()) {
        let first = lower(&traversal).expect("lowering should succeed");
        let second = lower(&traversal).expect("lowering should succeed");
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.encode().expect("encode"), second.encode().expect("encode"));
    }

    #[test]
    fn prop_parallel_matches_sequential(traversal in traversal()) {
        let sequential = lower(&traversal).expect("lowering should succeed");
        let parallel = lower_with_config(&traversal, LoweringConfig::new().with_parallel(true))
            .expect("lowering should succeed");
        prop_assert_eq!(sequential, parallel);
    }

    #[test]
    fn prop_generated_aliases_are_distinct(traversal in traversal()) {
        let program = lower(&traversal).expect("lowering should succeed");
        let mut aliases = Vec::new();
        generated_aliases(&program, &mut aliases);
        let unique: HashSet<_> = aliases.iter().copied().collect();
        prop_assert_eq!(unique.len(), aliases.len(), "duplicate alias in {:?}", aliases);
    }

    #[test]
    fn prop_extraction_is_referentially_transparent(by in modulator()) {
        let copy = by.clone();
        prop_assert_eq!(extract(&by), extract(&copy));
        prop_assert_eq!(extract(&by), extract(&by));
    }
}
