//! Minimal data model view consumed by the ACL engine.
//!
//! Only what permission compilation needs is modelled: entities with their
//! primary key, and fields that are either columns or relations with a
//! direction and a target entity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default primary key field name used by [`Entity::new`].
pub const DEFAULT_PRIMARY: &str = "id";

/// The data model: entity name → entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub entities: BTreeMap<String, Entity>,
}

/// An entity of the relational store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    /// Primary key field name.
    pub primary: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Field>,
}

/// A field is either a plain column or a relation to another entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Field {
    Column {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column_type: Option<String>,
    },
    Relation(Relation),
}

/// Which side of a relation holds the join information.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationSide {
    Owning,
    Inverse,
}

/// A relation edge from the declaring entity to `target`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Target entity name.
    pub target: String,
    pub side: RelationSide,
    /// Name of the paired relation on the target entity, if the relation is
    /// bidirectional (`inversedBy` on the owning side, `ownedBy` on the
    /// inverse side).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<String>,
}

/// Traversal of `relation` from the source `entity`.
///
/// `target_relation` is the counterpart relation on the target entity that
/// points back to the source. It is required for eliminating predicates that
/// an enclosing query stage has already applied.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RelationContext {
    /// Source entity name.
    pub entity: String,
    /// Relation name on the source entity.
    pub relation: String,
    /// Counterpart relation name on the target entity.
    pub target_relation: Option<String>,
}

impl Model {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an entity.
    #[must_use]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Primary key field of `entity`.
    #[must_use]
    pub fn primary_of(&self, entity: &str) -> Option<&str> {
        self.entity(entity).map(|e| e.primary.as_str())
    }

    #[must_use]
    pub fn field(&self, entity: &str, field: &str) -> Option<&Field> {
        self.entity(entity)?.fields.get(field)
    }

    /// The relation `field` of `entity`, or `None` for columns and unknown fields.
    #[must_use]
    pub fn relation(&self, entity: &str, field: &str) -> Option<&Relation> {
        match self.field(entity, field)? {
            Field::Relation(relation) => Some(relation),
            Field::Column { .. } => None,
        }
    }

    #[must_use]
    pub fn is_relation(&self, entity: &str, field: &str) -> bool {
        self.relation(entity, field).is_some()
    }

    /// Describe the traversal of `relation` from `entity`.
    ///
    /// Returns `None` if `relation` is not a relation of `entity`.
    #[must_use]
    pub fn relation_context(&self, entity: &str, relation: &str) -> Option<RelationContext> {
        let rel = self.relation(entity, relation)?;
        Some(RelationContext {
            entity: entity.to_owned(),
            relation: relation.to_owned(),
            target_relation: rel.counterpart.clone(),
        })
    }
}

impl Entity {
    /// New entity with a `DEFAULT_PRIMARY` column as its primary key.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_primary(name, DEFAULT_PRIMARY)
    }

    /// New entity with a custom primary key column.
    #[must_use]
    pub fn with_primary(name: impl Into<String>, primary: impl Into<String>) -> Self {
        let primary = primary.into();
        let mut fields = BTreeMap::new();
        fields.insert(
            primary.clone(),
            Field::Column {
                column_type: Some("uuid".to_owned()),
            },
        );
        Self {
            name: name.into(),
            primary,
            fields,
        }
    }

    /// Add a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.fields
            .insert(name.into(), Field::Column { column_type: None });
        self
    }

    /// Add the owning side of a relation (`manyHasOne`, owning `oneHasOne`,
    /// owning `manyHasMany`).
    #[must_use]
    pub fn owning(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        inversed_by: Option<&str>,
    ) -> Self {
        self.fields.insert(
            name.into(),
            Field::Relation(Relation {
                target: target.into(),
                side: RelationSide::Owning,
                counterpart: inversed_by.map(str::to_owned),
            }),
        );
        self
    }

    /// Add the inverse side of a relation (`oneHasMany`, inverse `oneHasOne`,
    /// inverse `manyHasMany`).
    #[must_use]
    pub fn inverse(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        owned_by: impl Into<String>,
    ) -> Self {
        self.fields.insert(
            name.into(),
            Field::Relation(Relation {
                target: target.into(),
                side: RelationSide::Inverse,
                counterpart: Some(owned_by.into()),
            }),
        );
        self
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}
