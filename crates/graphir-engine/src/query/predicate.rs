//! Predicate trees and their flattening into boolean expression strings.

use graphir_common::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A comparison tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Leaf comparison of the subject against `value`.
    Compare {
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand operand.
        #[serde(default)]
        value: PredicateValue,
    },
    /// All children hold.
    And(Vec<Predicate>),
    /// Any child holds.
    Or(Vec<Predicate>),
    /// The child does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    /// Creates a leaf comparison against a literal.
    pub fn compare(op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            op,
            value: PredicateValue::Literal(value.into()),
        }
    }

    /// `eq(value)`.
    pub fn eq(value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::Eq, value)
    }

    /// `lt(value)`.
    pub fn lt(value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::Lt, value)
    }

    /// `gt(value)`.
    pub fn gt(value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::Gt, value)
    }

    /// `within(values..)`.
    pub fn within(values: Vec<Value>) -> Self {
        Self::compare(CompareOp::Within, Value::List(values))
    }

    /// Conjunction with another predicate.
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut children) => {
                children.push(other);
                Predicate::And(children)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    /// Disjunction with another predicate.
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut children) => {
                children.push(other);
                Predicate::Or(children)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    /// Negation.
    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// True for a connective with more than one child, which renders with a
    /// top-level `&&` or `||`.
    pub fn is_compound(&self) -> bool {
        match self {
            Predicate::And(children) | Predicate::Or(children) => match children.as_slice() {
                [only] => only.is_compound(),
                _ => children.len() > 1,
            },
            Predicate::Compare { .. } | Predicate::Not(_) => false,
        }
    }

    /// Number of comparison leaves.
    pub fn leaf_count(&self) -> usize {
        match self {
            Predicate::Compare { .. } => 1,
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().map(Predicate::leaf_count).sum()
            }
            Predicate::Not(child) => child.leaf_count(),
        }
    }
}

/// Right-hand operand of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateValue {
    /// A constant.
    Literal(Value),
    /// A symbolic expression such as `@b.age`.
    Expr(String),
}

impl Default for PredicateValue {
    fn default() -> Self {
        PredicateValue::Literal(Value::Null)
    }
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateValue::Literal(v) => write!(f, "{v}"),
            PredicateValue::Expr(e) => f.write_str(e),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// Membership in a list.
    Within,
    /// Non-membership in a list.
    Without,
    /// String prefix.
    StartingWith,
    /// String suffix.
    EndingWith,
    /// Substring.
    Containing,
}

impl CompareOp {
    /// Returns the operator's spelling in the expression grammar.
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Within => "within",
            CompareOp::Without => "without",
            CompareOp::StartingWith => "startsWith",
            CompareOp::EndingWith => "endsWith",
            CompareOp::Containing => "contains",
        }
    }
}

/// Flattens `predicate` applied to `subject` into one boolean expression.
///
/// Compound children of a connective are parenthesized; negation renders
/// `!leaf` or `!(compound)`.
pub fn flatten(subject: &str, predicate: &Predicate) -> String {
    match predicate {
        Predicate::Compare { op, value } => format!("{subject} {} {value}", op.symbol()),
        Predicate::And(children) => join(subject, children, " && ", "true"),
        Predicate::Or(children) => join(subject, children, " || ", "false"),
        Predicate::Not(child) => negate(&flatten(subject, child), child.is_compound()),
    }
}

fn join(subject: &str, children: &[Predicate], sep: &str, empty: &str) -> String {
    match children {
        [] => empty.to_string(),
        [only] => flatten(subject, only),
        _ => children
            .iter()
            .map(|child| group(flatten(subject, child), child.is_compound()))
            .collect::<Vec<_>>()
            .join(sep),
    }
}

fn group(expr: String, compound: bool) -> String {
    if compound { format!("({expr})") } else { expr }
}

fn negate(expr: &str, compound: bool) -> String {
    if compound {
        format!("!({expr})")
    } else {
        format!("!{expr}")
    }
}

/// Joins already-flattened predicates with `&&`, parenthesizing compound
/// parts.
pub fn conjoin<'a>(parts: impl IntoIterator<Item = (&'a str, bool)>) -> String {
    let parts: Vec<_> = parts.into_iter().collect();
    match parts.as_slice() {
        [(only, _)] => (*only).to_string(),
        _ => parts
            .into_iter()
            .map(|(expr, compound)| group(expr.to_string(), compound))
            .collect::<Vec<_>>()
            .join(" && "),
    }
}

/// Negates a flattened expression.
///
/// Compoundness is detected textually: an expression containing `&&` or
/// `||` is wrapped in parentheses.
pub fn negate_expr(expr: &str) -> String {
    negate(expr, expr.contains("&&") || expr.contains("||"))
}
