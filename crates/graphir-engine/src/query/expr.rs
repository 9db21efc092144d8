//! Expression extraction.
//!
//! Decides whether a sub-traversal denotes a pure symbolic value: a tag plus
//! an optional property access, or a boolean test on one, reachable without
//! navigating the graph. Pure sub-traversals become `@tag.property`
//! expressions; anything else must be materialized as a subquery by the
//! caller.
//!
//! | Sub-traversal              | Expression                       |
//! |----------------------------|----------------------------------|
//! | `identity()`               | `@`                              |
//! | `select('a').values('age')`| `@a.age`                         |
//! | `values('age').is(gt(30))` | `@.age > 30`                     |
//! | `has('name', 'marko')`     | `@.name == "marko"`              |
//! | `out().count()`            | none                             |

use indexmap::IndexMap;

use super::predicate::{self, Predicate};
use super::traversal::{DedupStep, HasStep, SelectStep, Step, StepKind, Traversal};
use graphir_common::types::Value;

/// Per-tag extraction result.
///
/// Entries are in declaration order. A `None` entry means the tag's value
/// needs a subquery.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExprResult {
    tag_exprs: IndexMap<String, Option<String>>,
}

impl ExprResult {
    fn single(tag: String, expr: Option<String>) -> Self {
        let mut tag_exprs = IndexMap::with_capacity(1);
        tag_exprs.insert(tag, expr);
        Self { tag_exprs }
    }

    /// Number of tag entries.
    pub fn len(&self) -> usize {
        self.tag_exprs.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.tag_exprs.is_empty()
    }

    /// Returns the entry for `tag`.
    pub fn get(&self, tag: &str) -> Option<Option<&str>> {
        self.tag_exprs.get(tag).map(Option::as_deref)
    }

    /// Iterates over `(tag, expression)` entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.tag_exprs
            .iter()
            .map(|(tag, expr)| (tag.as_str(), expr.as_deref()))
    }

    /// Returns the expression if there is exactly one entry and it resolved.
    pub fn single_expr(&self) -> Option<&str> {
        match self.tag_exprs.first() {
            Some((_, Some(expr))) if self.tag_exprs.len() == 1 => Some(expr.as_str()),
            _ => None,
        }
    }
}

/// Extracts expressions from a sub-traversal.
///
/// A traversal made of exactly one `select` or `dedup` step yields one entry
/// per selected tag. Any other traversal is resolved as a chain and yields a
/// single entry keyed by the tag it ends on, or by the empty tag when it
/// does not resolve.
pub fn extract(traversal: &Traversal) -> ExprResult {
    extract_steps(&traversal.steps)
}

/// Extracts expressions from a step slice; see [`extract`].
pub fn extract_steps(steps: &[Step]) -> ExprResult {
    match steps {
        [
            Step {
                kind: StepKind::Select(select),
                ..
            },
        ] => extract_select(select),
        [
            Step {
                kind: StepKind::Dedup(dedup),
                ..
            },
        ] => extract_dedup(dedup),
        steps => match resolve(Cursor::current(), steps) {
            Some(cursor) => {
                let tag = cursor.tag().to_string();
                ExprResult::single(tag, Some(cursor.into_expr()))
            }
            None => ExprResult::single(String::new(), None),
        },
    }
}

/// Extracts one entry per key of a `select(keys..).by(..)` step.
pub fn extract_select(select: &SelectStep) -> ExprResult {
    let tag_exprs = select
        .keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let expr = resolve(Cursor::at(key), &select.by_for(i).steps).map(Cursor::into_expr);
            (key.clone(), expr)
        })
        .collect();
    ExprResult { tag_exprs }
}

/// Extracts one entry per key of a `dedup(keys..).by(..)` step.
pub fn extract_dedup(dedup: &DedupStep) -> ExprResult {
    let by = dedup.by_or_identity();
    let tag_exprs = dedup
        .tags()
        .into_iter()
        .map(|tag| {
            let expr = resolve(Cursor::at(tag), &by.steps).map(Cursor::into_expr);
            (tag.to_string(), expr)
        })
        .collect();
    ExprResult { tag_exprs }
}

/// What a resolved chain currently denotes.
#[derive(Debug, Clone)]
enum Cursor {
    /// `@tag` or `@tag.property`.
    Value {
        tag: String,
        property: Option<String>,
    },
    /// A boolean test on the tag; parts are conjoined.
    Predicate {
        tag: String,
        parts: Vec<(String, bool)>,
    },
}

impl Cursor {
    fn current() -> Self {
        Self::at("")
    }

    fn at(tag: &str) -> Self {
        Cursor::Value {
            tag: tag.to_string(),
            property: None,
        }
    }

    fn tag(&self) -> &str {
        match self {
            Cursor::Value { tag, .. } | Cursor::Predicate { tag, .. } => tag,
        }
    }

    fn into_expr(self) -> String {
        match self {
            Cursor::Value { tag, property } => subject(&tag, property.as_deref()),
            Cursor::Predicate { parts, .. } => {
                predicate::conjoin(parts.iter().map(|(expr, compound)| (expr.as_str(), *compound)))
            }
        }
    }

    fn apply(self, step: &Step) -> Option<Cursor> {
        match &step.kind {
            StepKind::Identity => Some(self),
            StepKind::Select(select) if select.keys.len() == 1 => {
                let rooted = Cursor::at(&select.keys[0]);
                resolve(rooted, &select.by_for(0).steps)
            }
            StepKind::Values(key) => self.with_property(key),
            StepKind::Id => self.with_property("~id"),
            StepKind::Label => self.with_property("~label"),
            StepKind::Is(pred) => match self {
                Cursor::Value { tag, property } => {
                    let expr = predicate::flatten(&subject(&tag, property.as_deref()), pred);
                    Some(Cursor::Predicate {
                        tag,
                        parts: vec![(expr, pred.is_compound())],
                    })
                }
                Cursor::Predicate { .. } => None,
            },
            StepKind::Has(has) => {
                let tag = self.tag().to_string();
                self.with_tests(has_tests(&tag, has))
            }
            StepKind::HasLabel(labels) if labels.is_empty() => Some(self),
            StepKind::HasLabel(labels) => {
                let tag = self.tag().to_string();
                self.with_tests(vec![label_test(&tag, labels)])
            }
            _ => None,
        }
    }

    fn with_property(self, key: &str) -> Option<Cursor> {
        match self {
            Cursor::Value {
                tag,
                property: None,
            } => Some(Cursor::Value {
                tag,
                property: Some(key.to_string()),
            }),
            _ => None,
        }
    }

    /// Filters on properties of the tagged element itself.
    fn with_tests(self, tests: Vec<(String, bool)>) -> Option<Cursor> {
        match self {
            Cursor::Value {
                tag,
                property: None,
            } => Some(Cursor::Predicate { tag, parts: tests }),
            Cursor::Predicate { tag, mut parts } => {
                parts.extend(tests);
                Some(Cursor::Predicate { tag, parts })
            }
            Cursor::Value { .. } => None,
        }
    }
}

fn resolve(mut cursor: Cursor, steps: &[Step]) -> Option<Cursor> {
    for step in steps {
        cursor = cursor.apply(step)?;
    }
    Some(cursor)
}

fn subject(tag: &str, property: Option<&str>) -> String {
    match property {
        Some(p) => format!("@{tag}.{p}"),
        None => format!("@{tag}"),
    }
}

fn has_tests(tag: &str, has: &HasStep) -> Vec<(String, bool)> {
    match has {
        HasStep::Key(key) => vec![(subject(tag, Some(key)), false)],
        HasStep::KeyValue(key, value) => {
            vec![(predicate::flatten(&subject(tag, Some(key)), &Predicate::eq(value.clone())), false)]
        }
        HasStep::KeyPredicate(key, pred) => {
            vec![(predicate::flatten(&subject(tag, Some(key)), pred), pred.is_compound())]
        }
        HasStep::LabelKeyValue(label, key, value) => {
            let mut tests = vec![label_test(tag, std::slice::from_ref(label))];
            tests.extend(has_tests(tag, &HasStep::KeyValue(key.clone(), value.clone())));
            tests
        }
    }
}

fn label_test(tag: &str, labels: &[String]) -> (String, bool) {
    let label = subject(tag, Some("~label"));
    let pred = match labels {
        [only] => Predicate::eq(only.as_str()),
        _ => Predicate::within(labels.iter().map(|l| Value::from(l.as_str())).collect()),
    };
    (predicate::flatten(&label, &pred), false)
}
