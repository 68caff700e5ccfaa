//! Resolved permission set.
//!
//! The compiled, read-only form of the ACL: entity → operation → field →
//! through-key → [`PredicateValue`]. Merging follows a fixed algebra:
//!
//! - `Allow` on either side of a key wins, and forces `Unknown` to `Allow`
//! - otherwise predicate lists are concatenated without duplicates, left first
//! - a key present on one side only is combined with the other side's
//!   fallback for it (`AnyRelation`, then `Root`)
//! - `Unknown` is then recomputed as the union over every key, so it is always
//!   an upper bound of every tracked traversal context

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::acl::{Operation, PredicateDefinition};
use crate::through::ThroughKey;

/// Shared predicate definition. Equality checks pointer identity first and
/// falls back to structural equality.
pub type PredicateRef = Arc<PredicateDefinition>;

/// Resolved value of a single through-key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PredicateValue {
    /// Unconditional grant.
    Allow,
    /// Ordered, duplicate-free set of predicates; a row must satisfy all of
    /// them.
    Predicates(Vec<PredicateRef>),
}

impl PredicateValue {
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub fn predicates(&self) -> Option<&[PredicateRef]> {
        match self {
            Self::Allow => None,
            Self::Predicates(list) => Some(list),
        }
    }

    fn absorb(&mut self, other: &PredicateValue) {
        match (self, other) {
            (Self::Allow, _) => {}
            (this, Self::Allow) => *this = Self::Allow,
            (Self::Predicates(list), Self::Predicates(items)) => union_into(list, items),
        }
    }
}

/// Append the items of `items` missing from `target`, preserving order.
pub fn union_into(target: &mut Vec<PredicateRef>, items: &[PredicateRef]) {
    for item in items {
        if !target.contains(item) {
            target.push(Arc::clone(item));
        }
    }
}

/// Returns `true` if every predicate of `subset` also occurs in `superset`.
#[must_use]
pub fn is_subset(subset: &[PredicateRef], superset: &[PredicateRef]) -> bool {
    subset.iter().all(|p| superset.contains(p))
}

/// Through-key → predicate value map of one field (or of `delete`).
///
/// The three sentinel keys have dedicated slots; named relations live in a
/// string-keyed map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedPredicates {
    root: Option<PredicateValue>,
    any_relation: Option<PredicateValue>,
    unknown: Option<PredicateValue>,
    relations: BTreeMap<String, PredicateValue>,
}

impl ResolvedPredicates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Self::insert`].
    #[must_use]
    pub fn with(mut self, key: ThroughKey, value: PredicateValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Exact lookup, no fallback.
    #[must_use]
    pub fn get(&self, key: &ThroughKey) -> Option<&PredicateValue> {
        match key {
            ThroughKey::Root => self.root.as_ref(),
            ThroughKey::AnyRelation => self.any_relation.as_ref(),
            ThroughKey::Unknown => self.unknown.as_ref(),
            ThroughKey::Relation(name) => self.relations.get(name),
        }
    }

    fn get_mut(&mut self, key: &ThroughKey) -> Option<&mut PredicateValue> {
        match key {
            ThroughKey::Root => self.root.as_mut(),
            ThroughKey::AnyRelation => self.any_relation.as_mut(),
            ThroughKey::Unknown => self.unknown.as_mut(),
            ThroughKey::Relation(name) => self.relations.get_mut(name),
        }
    }

    pub fn insert(&mut self, key: ThroughKey, value: PredicateValue) {
        match key {
            ThroughKey::Root => self.root = Some(value),
            ThroughKey::AnyRelation => self.any_relation = Some(value),
            ThroughKey::Unknown => self.unknown = Some(value),
            ThroughKey::Relation(name) => {
                self.relations.insert(name, value);
            }
        }
    }

    /// Grant `key` unconditionally.
    pub fn allow(&mut self, key: ThroughKey) {
        self.insert(key, PredicateValue::Allow);
    }

    /// Add `predicate` under `key`, unless the key already grants
    /// unconditionally.
    pub fn add_predicate(&mut self, key: ThroughKey, predicate: PredicateRef) {
        if let Some(value) = self.get_mut(&key) {
            value.absorb(&PredicateValue::Predicates(vec![predicate]));
        } else {
            self.insert(key, PredicateValue::Predicates(vec![predicate]));
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
            && self.any_relation.is_none()
            && self.unknown.is_none()
            && self.relations.is_empty()
    }

    /// All present keys: `Root`, `AnyRelation`, `Unknown`, then named
    /// relations in name order.
    pub fn iter(&self) -> impl Iterator<Item = (ThroughKey, &PredicateValue)> + '_ {
        [
            (ThroughKey::Root, self.root.as_ref()),
            (ThroughKey::AnyRelation, self.any_relation.as_ref()),
            (ThroughKey::Unknown, self.unknown.as_ref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .chain(
            self.relations
                .iter()
                .map(|(name, value)| (ThroughKey::Relation(name.clone()), value)),
        )
    }

    /// Resolve `key` with the traversal priority chain:
    ///
    /// 1. `Root` → the `Root` entry
    /// 2. `Unknown` → the `Unknown` entry
    /// 3. a named relation → its exact entry, if present
    /// 4. otherwise `AnyRelation`, then `Root`
    #[must_use]
    pub fn matching(&self, key: &ThroughKey) -> Option<&PredicateValue> {
        match key {
            ThroughKey::Root => self.root.as_ref(),
            ThroughKey::Unknown => self.unknown.as_ref(),
            ThroughKey::Relation(name) => self
                .relations
                .get(name)
                .or_else(|| self.relation_fallback()),
            ThroughKey::AnyRelation => self.relation_fallback(),
        }
    }

    fn relation_fallback(&self) -> Option<&PredicateValue> {
        self.any_relation.as_ref().or(self.root.as_ref())
    }

    /// Merge two maps (see the module docs for the algebra).
    ///
    /// Every key present on either side is combined with what the other
    /// side resolves for it through [`Self::matching`], so a key written out
    /// on one side only never shadows a wider fallback grant of the other.
    #[must_use]
    pub fn merge(&self, other: &ResolvedPredicates) -> ResolvedPredicates {
        let mut merged = ResolvedPredicates::new();
        for (key, _) in self.iter().chain(other.iter()) {
            if merged.get(&key).is_some() {
                continue;
            }
            let value = match (self.matching(&key), other.matching(&key)) {
                (Some(left), Some(right)) => {
                    let mut value = left.clone();
                    value.absorb(right);
                    value
                }
                (Some(only), None) | (None, Some(only)) => only.clone(),
                (None, None) => continue,
            };
            merged.insert(key, value);
        }
        merged.bound_unknown();
        merged
    }

    /// This map with `Unknown` recomputed as the upper bound of all keys.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.bound_unknown();
        self
    }

    fn bound_unknown(&mut self) {
        if self.iter().any(|(_, value)| value.is_allow()) {
            self.unknown = Some(PredicateValue::Allow);
            return;
        }
        let mut union = match &self.unknown {
            Some(PredicateValue::Predicates(list)) => list.clone(),
            _ => Vec::new(),
        };
        for (_, value) in self.iter() {
            if let Some(items) = value.predicates() {
                union_into(&mut union, items);
            }
        }
        if !union.is_empty() {
            self.unknown = Some(PredicateValue::Predicates(union));
        }
    }
}

/// Field name → resolved predicates.
pub type ResolvedFieldPermissions = BTreeMap<String, ResolvedPredicates>;

/// Resolved operations of one entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedEntityPermissions {
    pub create: ResolvedFieldPermissions,
    pub read: ResolvedFieldPermissions,
    pub update: ResolvedFieldPermissions,
    pub delete: ResolvedPredicates,
    pub custom_primary: bool,
}

impl ResolvedEntityPermissions {
    /// Field map of a field-level operation; `None` for `delete`.
    #[must_use]
    pub fn fields(&self, operation: Operation) -> Option<&ResolvedFieldPermissions> {
        match operation {
            Operation::Create => Some(&self.create),
            Operation::Read => Some(&self.read),
            Operation::Update => Some(&self.update),
            Operation::Delete => None,
        }
    }

    pub fn fields_mut(&mut self, operation: Operation) -> Option<&mut ResolvedFieldPermissions> {
        match operation {
            Operation::Create => Some(&mut self.create),
            Operation::Read => Some(&mut self.read),
            Operation::Update => Some(&mut self.update),
            Operation::Delete => None,
        }
    }

    #[must_use]
    pub fn merge(&self, other: &ResolvedEntityPermissions) -> ResolvedEntityPermissions {
        ResolvedEntityPermissions {
            create: merge_fields(&self.create, &other.create),
            read: merge_fields(&self.read, &other.read),
            update: merge_fields(&self.update, &other.update),
            delete: self.delete.merge(&other.delete),
            custom_primary: self.custom_primary || other.custom_primary,
        }
    }
}

fn merge_fields(
    left: &ResolvedFieldPermissions,
    right: &ResolvedFieldPermissions,
) -> ResolvedFieldPermissions {
    let mut merged = left.clone();
    for (field, predicates) in right {
        if let Some(existing) = merged.get_mut(field) {
            *existing = existing.merge(predicates);
        } else {
            merged.insert(field.clone(), predicates.clone());
        }
    }
    merged
}

/// Entity name → resolved entity permissions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedPermissions {
    entities: BTreeMap<String, ResolvedEntityPermissions>,
}

impl ResolvedPermissions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&ResolvedEntityPermissions> {
        self.entities.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, permissions: ResolvedEntityPermissions) {
        self.entities.insert(name.into(), permissions);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedEntityPermissions)> + '_ {
        self.entities.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&str, &mut ResolvedEntityPermissions)> + '_ {
        self.entities.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity-wise union; entities present on one side only pass through.
    #[must_use]
    pub fn merge(&self, other: &ResolvedPermissions) -> ResolvedPermissions {
        let mut merged = self.clone();
        for (name, permissions) in &other.entities {
            if let Some(existing) = merged.entities.get_mut(name) {
                *existing = existing.merge(permissions);
            } else {
                merged.entities.insert(name.clone(), permissions.clone());
            }
        }
        merged
    }
}

/// Outcome of a permission lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access<'a> {
    /// No rule grants access.
    Denied,
    /// Granted without any row condition.
    Allowed,
    /// Granted for rows satisfying all of these predicates.
    Conditional(&'a [PredicateRef]),
}

impl<'a> Access<'a> {
    /// Interpret a matched value. An empty predicate list grants nothing.
    #[must_use]
    pub fn from_value(value: Option<&'a PredicateValue>) -> Self {
        match value {
            None => Self::Denied,
            Some(PredicateValue::Allow) => Self::Allowed,
            Some(PredicateValue::Predicates(list)) if list.is_empty() => Self::Denied,
            Some(PredicateValue::Predicates(list)) => Self::Conditional(list),
        }
    }

    /// `true` unless denied.
    #[must_use]
    pub fn is_possible(self) -> bool {
        !matches!(self, Self::Denied)
    }

    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    #[must_use]
    pub fn predicates(self) -> Option<&'a [PredicateRef]> {
        match self {
            Self::Conditional(list) => Some(list),
            Self::Denied | Self::Allowed => None,
        }
    }
}
