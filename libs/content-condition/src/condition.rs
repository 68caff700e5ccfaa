//! Condition trees.
//!
//! A [`Condition`] is an entity-scoped boolean tree over columns and
//! relations. Column leaves hold a [`ColumnCondition`]; relation nodes hold a
//! nested [`Condition`] evaluated against the related entity.
//!
//! ## Truth constants
//!
//! | Form | Meaning |
//! |------|---------|
//! | `and: []` ([`Condition::always`]) | no filtering |
//! | `{ <primary>: never }` ([`Condition::never_on`]) | deny every row |
//! | `or: []` ([`Condition::never`]) | deny every row, primary unknown |

use serde::{Deserialize, Serialize};

use crate::value::FilterValue;

/// A condition on a single column value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnCondition {
    /// All nested conditions must hold.
    And(Vec<ColumnCondition>),
    /// At least one nested condition must hold.
    Or(Vec<ColumnCondition>),
    /// Negation.
    Not(Box<ColumnCondition>),
    /// `column = value`
    Eq(FilterValue),
    /// `column <> value`
    NotEq(FilterValue),
    /// `column IN (values)`
    In(Vec<FilterValue>),
    /// `column NOT IN (values)`
    NotIn(Vec<FilterValue>),
    /// `column < value`
    Lt(FilterValue),
    /// `column <= value`
    Lte(FilterValue),
    /// `column > value`
    Gt(FilterValue),
    /// `column >= value`
    Gte(FilterValue),
    /// `column IS NULL` when `true`, `IS NOT NULL` otherwise.
    IsNull(bool),
    /// Substring match.
    Contains(String),
    /// Prefix match.
    StartsWith(String),
    /// Suffix match.
    EndsWith(String),
    /// Never satisfied.
    Never,
    /// Always satisfied.
    Always,
}

impl ColumnCondition {
    /// `column IN (values)` from any convertible values.
    #[must_use]
    pub fn is_in<V: Into<FilterValue>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::In(values.into_iter().map(Into::into).collect())
    }

    /// `column = value`.
    #[must_use]
    pub fn eq(value: impl Into<FilterValue>) -> Self {
        Self::Eq(value.into())
    }
}

/// Boolean condition tree over an entity's columns and relations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    /// Conjunction. An empty conjunction is always true.
    And(Vec<Condition>),
    /// Disjunction. An empty disjunction is always false.
    Or(Vec<Condition>),
    /// Negation.
    Not(Box<Condition>),
    /// Condition on a column of the current entity.
    Column {
        field: String,
        condition: ColumnCondition,
    },
    /// Condition evaluated on the entity reached through `field`.
    Relation {
        field: String,
        condition: Box<Condition>,
    },
}

impl Default for Condition {
    /// Default is the empty (always true) condition.
    fn default() -> Self {
        Self::always()
    }
}

impl Condition {
    // ── Constructors ────────────────────────────────────────────────

    /// The empty condition: every row matches.
    #[must_use]
    pub fn always() -> Self {
        Self::And(Vec::new())
    }

    /// A condition no row matches, without referring to any column.
    #[must_use]
    pub fn never() -> Self {
        Self::Or(Vec::new())
    }

    /// Deny condition expressed on the primary column: `{ <primary>: never }`.
    #[must_use]
    pub fn never_on(primary: impl Into<String>) -> Self {
        Self::column(primary, ColumnCondition::Never)
    }

    /// Column leaf.
    #[must_use]
    pub fn column(field: impl Into<String>, condition: ColumnCondition) -> Self {
        Self::Column {
            field: field.into(),
            condition,
        }
    }

    /// Relation node.
    #[must_use]
    pub fn relation(field: impl Into<String>, condition: Condition) -> Self {
        Self::Relation {
            field: field.into(),
            condition: Box::new(condition),
        }
    }

    /// Conjunction of `parts`; a single part is returned unwrapped.
    #[must_use]
    pub fn all(parts: Vec<Condition>) -> Self {
        if parts.len() == 1 {
            parts.into_iter().next().unwrap_or_default()
        } else {
            Self::And(parts)
        }
    }

    // ── Inspection ──────────────────────────────────────────────────

    /// Returns `true` for the empty conjunction.
    #[must_use]
    pub fn is_always(&self) -> bool {
        matches!(self, Self::And(parts) if parts.is_empty())
    }

    /// Returns `true` for either deny form (`or: []` or `{ field: never }`).
    #[must_use]
    pub fn is_never(&self) -> bool {
        match self {
            Self::Or(parts) => parts.is_empty(),
            Self::Column { condition, .. } => *condition == ColumnCondition::Never,
            _ => false,
        }
    }

    // ── Rewriting ───────────────────────────────────────────────────

    /// Replace every subtree structurally equal to `find` with `replacement`.
    ///
    /// Equality is exact (deep `PartialEq`). The walk descends through
    /// `and`, `or` and `not` only; relation subtrees are compared as a whole
    /// but never entered.
    #[must_use]
    pub fn replace(&self, find: &Condition, replacement: &Condition) -> Condition {
        if self == find {
            return replacement.clone();
        }
        match self {
            Self::And(parts) => Self::And(
                parts
                    .iter()
                    .map(|p| p.replace(find, replacement))
                    .collect(),
            ),
            Self::Or(parts) => Self::Or(
                parts
                    .iter()
                    .map(|p| p.replace(find, replacement))
                    .collect(),
            ),
            Self::Not(inner) => Self::Not(Box::new(inner.replace(find, replacement))),
            Self::Column { .. } | Self::Relation { .. } => self.clone(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn published() -> Condition {
        Condition::column("isPublished", ColumnCondition::eq(true))
    }

    #[test]
    fn all_unwraps_single_part() {
        assert_eq!(Condition::all(vec![published()]), published());
        assert!(Condition::all(Vec::new()).is_always());
        assert!(matches!(
            Condition::all(vec![published(), published()]),
            Condition::And(parts) if parts.len() == 2
        ));
    }

    #[test]
    fn deny_forms_are_detected() {
        assert!(Condition::never().is_never());
        assert!(Condition::never_on("id").is_never());
        assert!(!Condition::always().is_never());
        assert!(!published().is_never());
    }

    #[test]
    fn replace_walks_boolean_nodes() {
        let tree = Condition::And(vec![
            Condition::Not(Box::new(published())),
            Condition::Or(vec![published(), Condition::never_on("id")]),
        ]);
        let replaced = tree.replace(&published(), &Condition::always());
        assert_eq!(
            replaced,
            Condition::And(vec![
                Condition::Not(Box::new(Condition::always())),
                Condition::Or(vec![Condition::always(), Condition::never_on("id")]),
            ])
        );
    }

    #[test]
    fn replace_does_not_enter_relations() {
        let tree = Condition::relation("article", published());
        assert_eq!(tree.replace(&published(), &Condition::always()), tree);

        let whole = tree.replace(&tree, &Condition::always());
        assert!(whole.is_always());
    }

    #[test]
    fn serializes_in_camel_case() {
        let json = serde_json::to_value(Condition::column(
            "title",
            ColumnCondition::StartsWith("a".to_owned()),
        ))
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "column": { "field": "title", "condition": { "startsWith": "a" } }
            })
        );
    }
}
