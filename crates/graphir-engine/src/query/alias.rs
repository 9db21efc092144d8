//! Alias allocation.
//!
//! Every intermediate result that later operators refer to gets a generated
//! name. Names are a pure function of where the result originates: the
//! naming category, the [`StepPosition`] of the step that produced it, and a
//! sub-index within that step. There are no counters, so lowering the same
//! tree twice produces byte-identical aliases.
//!
//! ```text
//! ~expr_3_0          subquery 0 of the step at position 3
//! ~keys_1_2          group key 2 of the step at position 1
//! ~project[a]_4_0    projected tag `a` of the step at position 4
//! ~expr_2_0_1_0      subquery 0 of step 1 inside subquery 0 of step 2
//! ```

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Naming category of an allocated alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AliasPrefix {
    /// Generic subquery results.
    Default,
    /// Group keys.
    GroupKeys,
    /// Group values (aggregate outputs).
    GroupValues,
    /// Projected tags.
    ProjectTag,
    /// Subqueries computing a projected tag.
    ProjectApply,
}

impl AliasPrefix {
    fn stem(self) -> &'static str {
        match self {
            AliasPrefix::Default => "expr",
            AliasPrefix::GroupKeys => "keys",
            AliasPrefix::GroupValues => "values",
            AliasPrefix::ProjectTag => "project",
            AliasPrefix::ProjectApply => "apply",
        }
    }
}

/// Position of a step within a compiled query.
///
/// A top-level step has a one-element path holding its index. Steps inside
/// a subquery materialized for sub-index `s` of the step at `P` have the
/// path `P ++ [s, i]`, so positions never repeat across nesting depths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StepPosition {
    path: SmallVec<[u32; 4]>,
}

impl StepPosition {
    /// The scope of a top-level traversal.
    pub fn root() -> Self {
        Self::default()
    }

    /// Extends the path with one component.
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push(index as u32);
        Self { path }
    }

    /// Index of the step within its enclosing traversal.
    pub fn index(&self) -> usize {
        self.path.last().copied().unwrap_or(0) as usize
    }

    /// Returns true for the scope of a top-level traversal.
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Path components, outermost first.
    pub fn path(&self) -> &[u32] {
        &self.path
    }
}

impl fmt::Display for StepPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

/// Name of an intermediate result column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Alias {
    name: String,
    user_defined: bool,
}

impl Alias {
    /// An alias given by the query through `as(..)`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_defined: true,
        }
    }

    /// Alias name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if the name came from the query rather than the allocator.
    pub fn is_user_defined(&self) -> bool {
        self.user_defined
    }

    /// Expression referring to the aliased column.
    pub fn as_expr(&self) -> String {
        format!("@{}", self.name)
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Allocates the alias for `(prefix, position, sub_index)`.
pub fn allocate(prefix: AliasPrefix, position: &StepPosition, sub_index: u32) -> Alias {
    allocate_tagged(prefix, "", position, sub_index)
}

/// Allocates an alias that also carries the tag it was derived from.
pub fn allocate_tagged(
    prefix: AliasPrefix,
    tag: &str,
    position: &StepPosition,
    sub_index: u32,
) -> Alias {
    let mut name = format!("~{}", prefix.stem());
    if !tag.is_empty() {
        // Bracketed so tag text never reads as part of the path.
        name.push('[');
        for c in tag.chars() {
            if matches!(c, ']' | '\\') {
                name.push('\\');
            }
            name.push(c);
        }
        name.push(']');
    }
    for p in position.path() {
        name.push('_');
        name.push_str(&p.to_string());
    }
    name.push('_');
    name.push_str(&sub_index.to_string());
    Alias {
        name,
        user_defined: false,
    }
}
