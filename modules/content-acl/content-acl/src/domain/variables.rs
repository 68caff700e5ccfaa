//! Variable binding and substitution.
//!
//! [`VariableMap`] holds the values of the (prefixed) variables of a role
//! set for one identity. [`VariableInjector`] substitutes them into predicate
//! definitions, producing plain [`Condition`] trees.
//!
//! Missing variables never widen access: an unbound column variable becomes
//! `never`, an unbound relation variable becomes `{ <target primary>: never }`.

use std::collections::BTreeMap;
use std::sync::Arc;

use content_acl_sdk::{
    AclError, ColumnOperand, PredefinedVariable, PredicateDefinition, RelationOperand, Schema,
    VariableDefinition, VariableValue, prefix_variable,
};
use content_condition::{ColumnCondition, Condition, FilterValue};
use tracing::{debug, warn};
use uuid::Uuid;

use super::roles::walk_roles;

/// Variable values carried by one role membership of an identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Membership {
    /// Entity variable name → assigned row ids.
    pub assigned: BTreeMap<String, Vec<FilterValue>>,
    /// Condition variable name → assigned condition.
    pub conditions: BTreeMap<String, ColumnCondition>,
}

/// The caller on whose behalf predicates are evaluated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub identity_id: Option<Uuid>,
    pub person_id: Option<Uuid>,
    /// Role name → values assigned through the membership in that role.
    pub memberships: BTreeMap<String, Membership>,
}

impl Identity {
    #[must_use]
    pub fn new(identity_id: Uuid) -> Self {
        Self {
            identity_id: Some(identity_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_person(mut self, person_id: Uuid) -> Self {
        self.person_id = Some(person_id);
        self
    }

    /// Assign row ids to an entity variable of the membership in `role`.
    #[must_use]
    pub fn assign<V: Into<FilterValue>>(
        mut self,
        role: impl Into<String>,
        variable: impl Into<String>,
        ids: impl IntoIterator<Item = V>,
    ) -> Self {
        self.membership(role)
            .assigned
            .insert(variable.into(), ids.into_iter().map(Into::into).collect());
        self
    }

    /// Assign a condition to a condition variable of the membership in
    /// `role`.
    #[must_use]
    pub fn assign_condition(
        mut self,
        role: impl Into<String>,
        variable: impl Into<String>,
        condition: ColumnCondition,
    ) -> Self {
        self.membership(role)
            .conditions
            .insert(variable.into(), condition);
        self
    }

    fn membership(&mut self, role: impl Into<String>) -> &mut Membership {
        self.memberships.entry(role.into()).or_default()
    }
}

/// Bound variable values, keyed by prefixed variable name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariableMap {
    values: BTreeMap<String, VariableValue>,
}

impl VariableMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: VariableValue) {
        self.values.insert(name.into(), value);
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: VariableValue) -> Self {
        self.insert(name, value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bind the declared variables of `roles` (inherited roles included) for
    /// `identity`, using the same prefixes as permission compilation.
    ///
    /// Values are taken from the membership in the declaring role, then from
    /// the membership in the active role that inherits it. Variables without
    /// a value and without a fallback stay unbound.
    ///
    /// # Errors
    /// Returns [`AclError`] for undeclared inherited roles and inheritance
    /// cycles.
    pub fn for_identity(
        schema: &Schema,
        roles: &[String],
        identity: &Identity,
        prefix: Option<&str>,
    ) -> Result<Self, AclError> {
        let mut variables = Self::new();
        walk_roles(&schema.acl, roles, prefix, &mut |visit| {
            let memberships: Vec<&Membership> = [visit.name, visit.member]
                .into_iter()
                .filter_map(|role| identity.memberships.get(role))
                .collect();
            for (name, definition) in &visit.definition.variables {
                if let Some(value) = bind(name, definition, identity, &memberships) {
                    variables.insert(prefix_variable(visit.prefix, name), value);
                }
            }
            Ok(())
        })?;
        Ok(variables)
    }
}

fn bind(
    name: &str,
    definition: &VariableDefinition,
    identity: &Identity,
    memberships: &[&Membership],
) -> Option<VariableValue> {
    let condition = match definition {
        VariableDefinition::Predefined { value } => {
            let id = match value {
                PredefinedVariable::IdentityId => identity.identity_id,
                PredefinedVariable::PersonId => identity.person_id,
            }?;
            ColumnCondition::is_in([id])
        }
        VariableDefinition::Entity { fallback, .. } => {
            match memberships.iter().find_map(|m| m.assigned.get(name)) {
                Some(ids) => ColumnCondition::In(ids.clone()),
                None => fallback.clone()?,
            }
        }
        VariableDefinition::Condition { fallback } => {
            match memberships.iter().find_map(|m| m.conditions.get(name)) {
                Some(condition) => condition.clone(),
                None => fallback.clone()?,
            }
        }
    };
    Some(VariableValue::Column(condition))
}

/// Substitutes bound variables into predicate definitions.
#[derive(Clone, Debug)]
pub struct VariableInjector {
    schema: Arc<Schema>,
    variables: VariableMap,
}

impl VariableInjector {
    #[must_use]
    pub fn new(schema: Arc<Schema>, variables: VariableMap) -> Self {
        Self { schema, variables }
    }

    #[must_use]
    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    /// Condition tree of `predicate`, evaluated on `entity`, with every
    /// variable reference replaced by its bound value.
    #[must_use]
    pub fn inject(&self, entity: &str, predicate: &PredicateDefinition) -> Condition {
        self.inject_on(Some(entity), predicate)
    }

    fn inject_on(&self, entity: Option<&str>, predicate: &PredicateDefinition) -> Condition {
        match predicate {
            PredicateDefinition::And(parts) => {
                Condition::And(parts.iter().map(|p| self.inject_on(entity, p)).collect())
            }
            PredicateDefinition::Or(parts) => {
                Condition::Or(parts.iter().map(|p| self.inject_on(entity, p)).collect())
            }
            PredicateDefinition::Not(inner) => {
                Condition::Not(Box::new(self.inject_on(entity, inner)))
            }
            PredicateDefinition::Column { field, condition } => {
                let condition = match condition {
                    ColumnOperand::Condition(condition) => condition.clone(),
                    ColumnOperand::Variable(name) => self.column_variable(name),
                };
                Condition::column(field.as_str(), condition)
            }
            PredicateDefinition::Relation { field, condition } => {
                let target = entity
                    .and_then(|e| self.schema.model.relation(e, field))
                    .map(|relation| relation.target.as_str());
                let nested = match condition {
                    RelationOperand::Where(inner) => self.inject_on(target, inner),
                    RelationOperand::Variable(name) => self.relation_variable(name, target),
                };
                Condition::relation(field.as_str(), nested)
            }
        }
    }

    fn column_variable(&self, name: &str) -> ColumnCondition {
        match self.variables.get(name) {
            Some(VariableValue::Column(condition)) => condition.clone(),
            Some(VariableValue::Where(_)) => {
                warn!(variable = %name, "Relation variable used on a column, substituting never");
                ColumnCondition::Never
            }
            None => {
                debug!(variable = %name, "Unbound variable, substituting never");
                ColumnCondition::Never
            }
        }
    }

    fn relation_variable(&self, name: &str, target: Option<&str>) -> Condition {
        let primary = target.and_then(|t| self.schema.model.primary_of(t));
        match (self.variables.get(name), primary) {
            (Some(VariableValue::Where(condition)), _) => condition.clone(),
            (Some(VariableValue::Column(condition)), Some(primary)) => {
                Condition::column(primary, condition.clone())
            }
            (None, Some(primary)) => {
                debug!(variable = %name, "Unbound variable, substituting never");
                Condition::never_on(primary)
            }
            (_, None) => {
                warn!(variable = %name, "Relation target is unknown, substituting never");
                Condition::never()
            }
        }
    }
}
