//! ACL declarations.
//!
//! These are the already-validated, in-memory role declarations produced by
//! the schema loader. They deserialize from the JSON shapes used by the
//! schema files:
//!
//! ```json
//! {
//!   "roles": {
//!     "reader": {
//!       "inherits": ["public"],
//!       "entities": {
//!         "Article": {
//!           "predicates": { "pub": { "column": { "field": "isPublished", "condition": { "eq": true } } } },
//!           "operations": { "read": { "id": "pub", "title": true } }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use content_condition::{ColumnCondition, Condition};
use serde::{Deserialize, Serialize};

use crate::model::Model;

/// Separator between a variable prefix and the variable name.
pub const VARIABLE_PREFIX_SEPARATOR: &str = "__";

/// Prefix `variable` with `prefix` (`<prefix>__<variable>`).
#[must_use]
pub fn prefix_variable(prefix: &str, variable: &str) -> String {
    format!("{prefix}{VARIABLE_PREFIX_SEPARATOR}{variable}")
}

/// Data model plus ACL declarations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub model: Model,
    #[serde(default)]
    pub acl: AclSchema,
}

/// All declared roles.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclSchema {
    #[serde(default)]
    pub roles: BTreeMap<String, RoleDefinition>,
    /// Schema-wide default for "clients may supply primary keys on create".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_primary: Option<bool>,
}

impl AclSchema {
    #[must_use]
    pub fn with_role(mut self, name: impl Into<String>, role: RoleDefinition) -> Self {
        self.roles.insert(name.into(), role);
        self
    }
}

/// Declaration of a single role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    /// Roles whose permissions this role also receives.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherits: Vec<String>,
    /// Prefix for this role's predicate variables; defaults to the role name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_prefix: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableDefinition>,
    #[serde(default)]
    pub entities: BTreeMap<String, EntityPermissionsDeclaration>,
}

impl RoleDefinition {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn inherits<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inherits.extend(roles.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn variable_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.variable_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn variable(mut self, name: impl Into<String>, variable: VariableDefinition) -> Self {
        self.variables.insert(name.into(), variable);
        self
    }

    #[must_use]
    pub fn entity(
        mut self,
        name: impl Into<String>,
        permissions: EntityPermissionsDeclaration,
    ) -> Self {
        self.entities.insert(name.into(), permissions);
        self
    }
}

/// Per-entity predicates and operations of a role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPermissionsDeclaration {
    #[serde(default)]
    pub predicates: BTreeMap<String, PredicateDefinition>,
    #[serde(default)]
    pub operations: EntityOperationsDeclaration,
}

impl EntityPermissionsDeclaration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn predicate(mut self, name: impl Into<String>, definition: PredicateDefinition) -> Self {
        self.predicates.insert(name.into(), definition);
        self
    }

    /// Declare `field` for a field-level `operation`. `delete` is ignored;
    /// use [`Self::delete`].
    #[must_use]
    pub fn field(
        mut self,
        operation: Operation,
        field: impl Into<String>,
        predicate: PredicateDeclaration,
    ) -> Self {
        if let Some(fields) = self.operations.fields_mut(operation) {
            fields.insert(field.into(), predicate);
        }
        self
    }

    #[must_use]
    pub fn read(self, field: impl Into<String>, predicate: PredicateDeclaration) -> Self {
        self.field(Operation::Read, field, predicate)
    }

    #[must_use]
    pub fn create(self, field: impl Into<String>, predicate: PredicateDeclaration) -> Self {
        self.field(Operation::Create, field, predicate)
    }

    #[must_use]
    pub fn update(self, field: impl Into<String>, predicate: PredicateDeclaration) -> Self {
        self.field(Operation::Update, field, predicate)
    }

    #[must_use]
    pub fn delete(mut self, predicate: PredicateDeclaration) -> Self {
        self.operations.delete = Some(predicate);
        self
    }

    #[must_use]
    pub fn custom_primary(mut self) -> Self {
        self.operations.custom_primary = true;
        self
    }
}

/// Declared operations on an entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityOperationsDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<BTreeMap<String, PredicateDeclaration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<BTreeMap<String, PredicateDeclaration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<BTreeMap<String, PredicateDeclaration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<PredicateDeclaration>,
    /// This role may write the primary key directly.
    #[serde(default)]
    pub custom_primary: bool,
}

impl EntityOperationsDeclaration {
    /// Field map of a field-level operation.
    #[must_use]
    pub fn fields(&self, operation: Operation) -> Option<&BTreeMap<String, PredicateDeclaration>> {
        match operation {
            Operation::Read => self.read.as_ref(),
            Operation::Create => self.create.as_ref(),
            Operation::Update => self.update.as_ref(),
            Operation::Delete => None,
        }
    }

    fn fields_mut(
        &mut self,
        operation: Operation,
    ) -> Option<&mut BTreeMap<String, PredicateDeclaration>> {
        let slot = match operation {
            Operation::Read => &mut self.read,
            Operation::Create => &mut self.create,
            Operation::Update => &mut self.update,
            Operation::Delete => return None,
        };
        Some(slot.get_or_insert_with(BTreeMap::new))
    }
}

/// Content operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    /// Operations whose permissions are declared per field.
    pub const FIELD_LEVEL: [Operation; 3] = [Operation::Create, Operation::Read, Operation::Update];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate reference as declared on a field or on `delete`.
///
/// JSON forms: `true`, `false`, `"predicateName"`, or a list of
/// `{ "predicate": "name" | true, "through": ["relation", ...] | true }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateDeclaration {
    /// `true` grants unconditionally, `false` never grants.
    Flag(bool),
    /// Name of a predicate in the entity's predicate map.
    Named(String),
    /// Traversal-scoped list.
    Rich(Vec<RichPredicate>),
}

impl PredicateDeclaration {
    #[must_use]
    pub fn allow() -> Self {
        Self::Flag(true)
    }

    #[must_use]
    pub fn deny() -> Self {
        Self::Flag(false)
    }

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

/// One entry of a rich predicate list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichPredicate {
    pub predicate: PredicateTarget,
    /// Omitted: direct access only. `true`: through any relation. List:
    /// through exactly the named relations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<Through>,
}

impl RichPredicate {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            predicate: PredicateTarget::Named(name.into()),
            through: None,
        }
    }

    #[must_use]
    pub fn allow() -> Self {
        Self {
            predicate: PredicateTarget::Flag(true),
            through: None,
        }
    }

    #[must_use]
    pub fn through_any(mut self) -> Self {
        self.through = Some(Through::Any(true));
        self
    }

    #[must_use]
    pub fn through_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.through = Some(Through::Relations(
            relations.into_iter().map(Into::into).collect(),
        ));
        self
    }
}

/// Predicate of a rich entry: a name, or `true` for an unconditional grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateTarget {
    Flag(bool),
    Named(String),
}

/// Traversal scope of a rich entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Through {
    /// `true`: any relation. `false` is treated as omitted.
    Any(bool),
    Relations(Vec<String>),
}

/// A named, reusable condition over an entity's own fields and relations,
/// with variable placeholders at column and relation leaves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PredicateDefinition {
    And(Vec<PredicateDefinition>),
    Or(Vec<PredicateDefinition>),
    Not(Box<PredicateDefinition>),
    Column {
        field: String,
        condition: ColumnOperand,
    },
    Relation {
        field: String,
        condition: RelationOperand,
    },
}

/// Column leaf operand: a literal condition or a variable reference.
///
/// A bare JSON string is a variable name, except for the unit conditions
/// `"never"` and `"always"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnOperand {
    Condition(ColumnCondition),
    Variable(String),
}

/// Relation operand: a nested predicate on the target entity or a variable
/// reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationOperand {
    Where(Box<PredicateDefinition>),
    Variable(String),
}

impl PredicateDefinition {
    #[must_use]
    pub fn column(field: impl Into<String>, condition: ColumnCondition) -> Self {
        Self::Column {
            field: field.into(),
            condition: ColumnOperand::Condition(condition),
        }
    }

    #[must_use]
    pub fn column_variable(field: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::Column {
            field: field.into(),
            condition: ColumnOperand::Variable(variable.into()),
        }
    }

    #[must_use]
    pub fn relation(field: impl Into<String>, predicate: PredicateDefinition) -> Self {
        Self::Relation {
            field: field.into(),
            condition: RelationOperand::Where(Box::new(predicate)),
        }
    }

    #[must_use]
    pub fn relation_variable(field: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::Relation {
            field: field.into(),
            condition: RelationOperand::Variable(variable.into()),
        }
    }

    /// Rewrite every variable reference with `rename`.
    #[must_use]
    pub fn map_variables<F>(&self, rename: &F) -> Self
    where
        F: Fn(&str) -> String,
    {
        match self {
            Self::And(parts) => Self::And(parts.iter().map(|p| p.map_variables(rename)).collect()),
            Self::Or(parts) => Self::Or(parts.iter().map(|p| p.map_variables(rename)).collect()),
            Self::Not(inner) => Self::Not(Box::new(inner.map_variables(rename))),
            Self::Column { field, condition } => Self::Column {
                field: field.clone(),
                condition: match condition {
                    ColumnOperand::Variable(name) => ColumnOperand::Variable(rename(name)),
                    ColumnOperand::Condition(c) => ColumnOperand::Condition(c.clone()),
                },
            },
            Self::Relation { field, condition } => Self::Relation {
                field: field.clone(),
                condition: match condition {
                    RelationOperand::Variable(name) => RelationOperand::Variable(rename(name)),
                    RelationOperand::Where(inner) => {
                        RelationOperand::Where(Box::new(inner.map_variables(rename)))
                    }
                },
            },
        }
    }

    /// Every variable name referenced by this predicate, in tree order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::And(parts) | Self::Or(parts) => {
                for part in parts {
                    part.collect_variables(out);
                }
            }
            Self::Not(inner) => inner.collect_variables(out),
            Self::Column {
                condition: ColumnOperand::Variable(name),
                ..
            }
            | Self::Relation {
                condition: RelationOperand::Variable(name),
                ..
            } => out.push(name),
            Self::Relation {
                condition: RelationOperand::Where(inner),
                ..
            } => inner.collect_variables(out),
            Self::Column {
                condition: ColumnOperand::Condition(_),
                ..
            } => {}
        }
    }
}

/// Declared variable of a role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum VariableDefinition {
    /// Value supplied by the identity itself.
    Predefined { value: PredefinedVariable },
    /// Ids of `entity_name` rows assigned to the identity's membership.
    Entity {
        entity_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<ColumnCondition>,
    },
    /// Arbitrary column condition assigned to the membership.
    Condition {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<ColumnCondition>,
    },
}

/// Identity-provided variable values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredefinedVariable {
    #[serde(rename = "identityID")]
    IdentityId,
    #[serde(rename = "personID")]
    PersonId,
}

/// Bound value of a variable, substituted into predicates at compile time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableValue {
    /// Substituted at column leaves.
    Column(ColumnCondition),
    /// Substituted at relation leaves, evaluated on the relation target.
    Where(Condition),
}
