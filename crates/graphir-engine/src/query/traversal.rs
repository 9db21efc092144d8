//! Traversal step trees.
//!
//! A [`Traversal`] is the parsed form of a traversal query: an ordered list
//! of [`Step`]s, where the modulated ("parent") steps carry nested
//! sub-traversals of their own (`by(..)` modulators, `where(..)` and `not(..)`
//! bodies). Trees are immutable once built; the lowering pass only reads them.
//!
//! All types round-trip through serde so trees can be supplied as JSON:
//!
//! ```json
//! {"steps": [{"kind": {"v": []}}, {"kind": {"out": ["knows"]}}, {"kind": "count"}]}
//! ```

use std::borrow::Cow;

use graphir_common::types::Value;
use serde::{Deserialize, Serialize};

use super::predicate::Predicate;

/// The identity traversal, shared by every defaulted modulator.
pub(crate) static IDENTITY: Traversal = Traversal { steps: Vec::new() };

/// An ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Traversal {
    /// Steps in evaluation order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Traversal {
    /// Creates a traversal from steps.
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// The empty traversal, evaluating to the current record.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Returns true if the traversal only contains identity steps.
    pub fn is_identity(&self) -> bool {
        self.steps
            .iter()
            .all(|s| matches!(s.kind, StepKind::Identity))
    }

    /// Returns the last step, if any.
    pub fn end_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Returns a copy of this traversal with `select(tag)` prepended.
    ///
    /// The empty tag denotes the current record and leaves the traversal
    /// unchanged.
    pub fn rooted_at(&self, tag: &str) -> Traversal {
        if tag.is_empty() {
            return self.clone();
        }
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.push(Step::new(StepKind::Select(SelectStep::new([tag]))));
        steps.extend(self.steps.iter().cloned());
        Traversal { steps }
    }

    fn then(mut self, kind: StepKind) -> Self {
        self.steps.push(Step::new(kind));
        self
    }

    /// Appends a `V(ids)` source step.
    pub fn v(self, ids: Vec<Value>) -> Self {
        self.then(StepKind::V(ids))
    }

    /// Appends `out(labels)`.
    pub fn out(self, labels: &[&str]) -> Self {
        self.then(StepKind::Out(to_strings(labels)))
    }

    /// Appends `in(labels)`.
    pub fn in_(self, labels: &[&str]) -> Self {
        self.then(StepKind::In(to_strings(labels)))
    }

    /// Appends `both(labels)`.
    pub fn both(self, labels: &[&str]) -> Self {
        self.then(StepKind::Both(to_strings(labels)))
    }

    /// Appends `outE(labels)`.
    pub fn out_e(self, labels: &[&str]) -> Self {
        self.then(StepKind::OutE(to_strings(labels)))
    }

    /// Appends `values(key)`.
    pub fn values(self, key: &str) -> Self {
        self.then(StepKind::Values(key.to_string()))
    }

    /// Appends `id()`.
    pub fn id(self) -> Self {
        self.then(StepKind::Id)
    }

    /// Appends `label()`.
    pub fn label(self) -> Self {
        self.then(StepKind::Label)
    }

    /// Appends `has(key, value)`.
    pub fn has(self, key: &str, value: impl Into<Value>) -> Self {
        self.then(StepKind::Has(HasStep::KeyValue(key.to_string(), value.into())))
    }

    /// Appends `has(key, predicate)`.
    pub fn has_where(self, key: &str, predicate: Predicate) -> Self {
        self.then(StepKind::Has(HasStep::KeyPredicate(key.to_string(), predicate)))
    }

    /// Appends `hasLabel(labels)`.
    pub fn has_label(self, labels: &[&str]) -> Self {
        self.then(StepKind::HasLabel(to_strings(labels)))
    }

    /// Appends `is(predicate)`.
    pub fn is(self, predicate: Predicate) -> Self {
        self.then(StepKind::Is(predicate))
    }

    /// Appends `select(key)`.
    pub fn select(self, key: &str) -> Self {
        self.then(StepKind::Select(SelectStep::new([key])))
    }

    /// Appends `select(keys..).by(..)..`.
    pub fn select_by(self, keys: &[&str], bys: Vec<Traversal>) -> Self {
        self.then(StepKind::Select(SelectStep::new(keys.iter().copied()).with_bys(bys)))
    }

    /// Appends `dedup()`.
    pub fn dedup(self) -> Self {
        self.then(StepKind::Dedup(DedupStep::default()))
    }

    /// Appends `count()`.
    pub fn count(self) -> Self {
        self.then(StepKind::Count)
    }

    /// Appends `fold()`.
    pub fn fold(self) -> Self {
        self.then(StepKind::Fold)
    }

    /// Appends `sum()`.
    pub fn sum(self) -> Self {
        self.then(StepKind::Sum)
    }

    /// Appends `limit(n)`.
    pub fn limit(self, n: usize) -> Self {
        self.then(StepKind::Limit(n))
    }

    /// Appends an arbitrary step.
    pub fn step(mut self, step: impl Into<Step>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Labels the last step (`as(label)`).
    pub fn as_(mut self, label: &str) -> Self {
        if let Some(last) = self.steps.last_mut() {
            last.labels.push(label.to_string());
        }
        self
    }
}

impl From<Vec<Step>> for Traversal {
    fn from(steps: Vec<Step>) -> Self {
        Self::new(steps)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// A node of the traversal tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// What the step does.
    pub kind: StepKind,
    /// `as(..)` labels attached to the step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl Step {
    /// Creates an unlabeled step.
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            labels: Vec::new(),
        }
    }

    /// Adds an `as(..)` label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Returns the step's name in traversal-language spelling.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

impl From<StepKind> for Step {
    fn from(kind: StepKind) -> Self {
        Self::new(kind)
    }
}

/// Kind of a step, together with the arguments and modulators it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    // ==================== Source steps ====================
    /// Start from vertices, optionally by id.
    V(Vec<Value>),
    /// Start from edges, optionally by id.
    E(Vec<Value>),

    // ==================== Navigation steps ====================
    /// Adjacent vertices via outgoing edges.
    Out(Vec<String>),
    /// Adjacent vertices via incoming edges.
    In(Vec<String>),
    /// Adjacent vertices in either direction.
    Both(Vec<String>),
    /// Outgoing edges.
    OutE(Vec<String>),
    /// Incoming edges.
    InE(Vec<String>),
    /// Incident edges.
    BothE(Vec<String>),
    /// Source vertex of the current edge.
    OutV,
    /// Target vertex of the current edge.
    InV,
    /// Both endpoints of the current edge.
    BothV,
    /// The endpoint not traversed from.
    OtherV,

    // ==================== Filter steps ====================
    /// Property filter.
    Has(HasStep),
    /// Label filter.
    HasLabel(Vec<String>),
    /// Filter on the current value.
    Is(Predicate),

    // ==================== Map steps ====================
    /// Property value.
    Values(String),
    /// Element id.
    Id,
    /// Element label.
    Label,
    /// The current record, unchanged.
    Identity,
    /// Pagination.
    Limit(usize),
    /// Pagination window `[lower, upper)`.
    Range(usize, usize),

    // ==================== Aggregate steps ====================
    /// Count records.
    Count,
    /// Collect records into a list.
    Fold,
    /// Sum values.
    Sum,
    /// Average values.
    Mean,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,

    // ==================== Modulated steps ====================
    /// `select(keys..).by(..)`: projection of tagged records.
    Select(SelectStep),
    /// `dedup(keys..).by(..)`.
    Dedup(DedupStep),
    /// `sample(n).by(..)`.
    Sample(SampleStep),
    /// `order().by(.., order)..`.
    Order(OrderStep),
    /// `group().by(key).by(value)` and `groupCount()`.
    Group(GroupStep),
    /// `where(start, predicate).by(..)`.
    WherePredicate(WherePredicateStep),
    /// `where(traversal)`: existence filter.
    WhereTraversal(Traversal),
    /// `not(traversal)`: non-existence filter.
    Not(Traversal),
}

impl StepKind {
    /// Returns the step's name in traversal-language spelling.
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::V(_) => "V",
            StepKind::E(_) => "E",
            StepKind::Out(_) => "out",
            StepKind::In(_) => "in",
            StepKind::Both(_) => "both",
            StepKind::OutE(_) => "outE",
            StepKind::InE(_) => "inE",
            StepKind::BothE(_) => "bothE",
            StepKind::OutV => "outV",
            StepKind::InV => "inV",
            StepKind::BothV => "bothV",
            StepKind::OtherV => "otherV",
            StepKind::Has(_) => "has",
            StepKind::HasLabel(_) => "hasLabel",
            StepKind::Is(_) => "is",
            StepKind::Values(_) => "values",
            StepKind::Id => "id",
            StepKind::Label => "label",
            StepKind::Identity => "identity",
            StepKind::Limit(_) => "limit",
            StepKind::Range(..) => "range",
            StepKind::Count => "count",
            StepKind::Fold => "fold",
            StepKind::Sum => "sum",
            StepKind::Mean => "mean",
            StepKind::Min => "min",
            StepKind::Max => "max",
            StepKind::Select(_) => "select",
            StepKind::Dedup(_) => "dedup",
            StepKind::Sample(_) => "sample",
            StepKind::Order(_) => "order",
            StepKind::Group(g) if g.count => "groupCount",
            StepKind::Group(_) => "group",
            StepKind::WherePredicate(_) | StepKind::WhereTraversal(_) => "where",
            StepKind::Not(_) => "not",
        }
    }
}

/// Arguments of a `has(..)` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HasStep {
    /// `has(key)`: the property exists.
    Key(String),
    /// `has(key, value)`.
    KeyValue(String, Value),
    /// `has(key, predicate)`.
    KeyPredicate(String, Predicate),
    /// `has(label, key, value)`.
    LabelKeyValue(String, String, Value),
}

/// `select(keys..)` with its `by(..)` modulators.
///
/// Modulators apply to keys cyclically: `select('a', 'b').by('name')`
/// projects the name of both.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectStep {
    /// Tags to select.
    pub keys: Vec<String>,
    /// `by(..)` modulators.
    #[serde(default)]
    pub bys: Vec<Traversal>,
}

impl SelectStep {
    /// Creates an unmodulated select.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            bys: Vec::new(),
        }
    }

    /// Sets the `by(..)` modulators.
    pub fn with_bys(mut self, bys: Vec<Traversal>) -> Self {
        self.bys = bys;
        self
    }

    /// Returns the modulator applied to the `index`-th key.
    pub fn by_for(&self, index: usize) -> &Traversal {
        if self.bys.is_empty() {
            &IDENTITY
        } else {
            &self.bys[index % self.bys.len()]
        }
    }
}

/// `dedup(keys..).by(..)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DedupStep {
    /// Tags to deduplicate on; empty means the current record.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Optional `by(..)` modulator.
    #[serde(default)]
    pub by: Option<Traversal>,
}

impl DedupStep {
    /// Returns the dedup tags, defaulting to the current record.
    pub fn tags(&self) -> Vec<&str> {
        if self.keys.is_empty() {
            vec![""]
        } else {
            self.keys.iter().map(String::as_str).collect()
        }
    }

    /// Returns the modulator, defaulting to identity.
    pub fn by_or_identity(&self) -> &Traversal {
        self.by.as_ref().unwrap_or(&IDENTITY)
    }

    /// True for a bare `dedup()` on the current record.
    pub fn is_plain(&self) -> bool {
        self.keys.is_empty() && self.by.as_ref().is_none_or(Traversal::is_identity)
    }
}

/// `sample(amount).by(..)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStep {
    /// Sample size: a count when integral and at least 1, a ratio in `(0, 1)`.
    pub amount: f64,
    /// Random seed; the configured default is used when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Probability (weight) modulator.
    #[serde(default)]
    pub by: Option<Traversal>,
}

impl SampleStep {
    /// Returns the probability modulator, defaulting to identity.
    pub fn by_or_identity(&self) -> &Traversal {
        self.by.as_ref().unwrap_or(&IDENTITY)
    }
}

/// Ordering direction of a comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
    /// Random order.
    Shuffle,
}

/// One `by(traversal, order)` of an `order()` step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Comparator {
    /// Sort key modulator.
    #[serde(default)]
    pub by: Traversal,
    /// Direction.
    #[serde(default)]
    pub order: Order,
}

/// `order().by(..)..`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderStep {
    /// Comparators in declaration order.
    #[serde(default)]
    pub comparators: Vec<Comparator>,
}

impl OrderStep {
    /// Returns the comparators, defaulting to identity ascending.
    pub fn comparators(&self) -> Cow<'_, [Comparator]> {
        if self.comparators.is_empty() {
            Cow::Owned(vec![Comparator::default()])
        } else {
            Cow::Borrowed(&self.comparators)
        }
    }
}

/// `group().by(key)..by(value)..` or `groupCount().by(key)..`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupStep {
    /// Key modulators.
    #[serde(default)]
    pub keys: Vec<Traversal>,
    /// Value modulators; each must end in an aggregate step.
    #[serde(default)]
    pub values: Vec<Traversal>,
    /// True for `groupCount()`.
    #[serde(default)]
    pub count: bool,
}

impl GroupStep {
    /// Returns the key modulators, defaulting to identity.
    pub fn key_traversals(&self) -> Cow<'_, [Traversal]> {
        if self.keys.is_empty() {
            Cow::Owned(vec![Traversal::identity()])
        } else {
            Cow::Borrowed(&self.keys)
        }
    }

    /// Returns the value modulators, defaulting to `count()` for
    /// `groupCount()` and `fold()` otherwise.
    pub fn value_traversals(&self) -> Cow<'_, [Traversal]> {
        if !self.values.is_empty() {
            return Cow::Borrowed(&self.values);
        }
        let terminal = if self.count {
            StepKind::Count
        } else {
            StepKind::Fold
        };
        Cow::Owned(vec![Traversal::new(vec![Step::new(terminal)])])
    }
}

/// `where(start, predicate).by(..)..`.
///
/// Each comparison leaf of `predicate` compares the start operand against the
/// record selected by the next entry of `select_keys`; operands consume the
/// `bys` modulators in order, start operand first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WherePredicateStep {
    /// Start tag; the current record when absent.
    #[serde(default)]
    pub start_key: Option<String>,
    /// Comparison tree.
    pub predicate: Predicate,
    /// Tags compared against, one per comparison leaf.
    #[serde(default)]
    pub select_keys: Vec<String>,
    /// `by(..)` modulators.
    #[serde(default)]
    pub bys: Vec<Traversal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_at_prepends_select() {
        let t = Traversal::identity().out(&[]).count();
        let rooted = t.rooted_at("a");
        assert_eq!(rooted.steps.len(), 3);
        assert_eq!(rooted.steps[0].name(), "select");
        assert_eq!(t.rooted_at(""), t);
    }

    #[test]
    fn test_select_bys_are_cyclic() {
        let sel = SelectStep::new(["a", "b", "c"]).with_bys(vec![
            Traversal::identity().values("name"),
            Traversal::identity().values("age"),
        ]);
        assert_eq!(sel.by_for(0), &Traversal::identity().values("name"));
        assert_eq!(sel.by_for(1), &Traversal::identity().values("age"));
        assert_eq!(sel.by_for(2), &Traversal::identity().values("name"));
        assert!(SelectStep::new(["a"]).by_for(3).is_identity());
    }

    #[test]
    fn test_group_defaults() {
        let group = GroupStep::default();
        assert_eq!(group.key_traversals().len(), 1);
        assert_eq!(
            group.value_traversals()[0].steps[0].kind,
            StepKind::Fold
        );

        let group_count = GroupStep {
            count: true,
            ..GroupStep::default()
        };
        assert_eq!(
            group_count.value_traversals()[0].steps[0].kind,
            StepKind::Count
        );
    }

    #[test]
    fn test_dedup_plain() {
        assert!(DedupStep::default().is_plain());
        assert!(
            !DedupStep {
                keys: vec!["a".into()],
                by: None
            }
            .is_plain()
        );
        assert_eq!(DedupStep::default().tags(), vec![""]);
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"steps": [
            {"kind": {"v": []}},
            {"kind": {"out": ["knows"]}, "labels": ["b"]},
            {"kind": {"order": {"comparators": [{"by": {"steps": [{"kind": {"values": "age"}}]}, "order": "desc"}]}}},
            {"kind": "count"}
        ]}"#;
        let t: Traversal = serde_json::from_str(json).unwrap();
        assert_eq!(t.steps.len(), 4);
        assert_eq!(t.steps[1].labels, vec!["b".to_string()]);
        assert_eq!(t.steps[3].kind, StepKind::Count);
        match &t.steps[2].kind {
            StepKind::Order(o) => assert_eq!(o.comparators[0].order, Order::Desc),
            other => panic!("Expected order, got {other:?}"),
        }
    }
}
