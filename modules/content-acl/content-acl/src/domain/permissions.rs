//! Read-only query facade over a compiled permission set.

use std::sync::Arc;

use content_acl_sdk::resolved::is_subset;
use content_acl_sdk::{
    Access, Operation, ResolvedEntityPermissions, ResolvedPermissions, Schema, ThroughKey,
};

/// Compiled permissions of one role set, bound to the schema they were
/// compiled from.
#[derive(Clone, Debug)]
pub struct Permissions {
    schema: Arc<Schema>,
    resolved: ResolvedPermissions,
    default_custom_primary: bool,
}

impl Permissions {
    #[must_use]
    pub fn new(
        schema: Arc<Schema>,
        resolved: ResolvedPermissions,
        default_custom_primary: bool,
    ) -> Self {
        Self {
            schema,
            resolved,
            default_custom_primary,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn resolved(&self) -> &ResolvedPermissions {
        &self.resolved
    }

    /// Primary key field of `entity`, if the model knows it.
    #[must_use]
    pub fn primary_field(&self, entity: &str) -> Option<&str> {
        self.schema.model.primary_of(entity)
    }

    // ── Entity level ────────────────────────────────────────────────

    /// Returns `true` if at least one field of `entity` (the entity itself
    /// for `delete`) is accessible for `operation` through `through`,
    /// possibly under a predicate.
    #[must_use]
    pub fn can_access_entity(
        &self,
        operation: Operation,
        entity: &str,
        through: &ThroughKey,
    ) -> bool {
        let Some(permissions) = self.resolved.entity(entity) else {
            return false;
        };
        match permissions.fields(operation) {
            None => Access::from_value(permissions.delete.matching(through)).is_possible(),
            Some(fields) => fields
                .values()
                .any(|predicates| Access::from_value(predicates.matching(through)).is_possible()),
        }
    }

    /// Row-level access of `entity`: the `delete` permission for deletes,
    /// the primary key permission otherwise.
    #[must_use]
    pub fn entity_predicate(
        &self,
        operation: Operation,
        entity: &str,
        through: &ThroughKey,
    ) -> Access<'_> {
        match operation {
            Operation::Delete => self
                .resolved
                .entity(entity)
                .map_or(Access::Denied, |p| Access::from_value(p.delete.matching(through))),
            _ => self.primary_access(operation, entity, through),
        }
    }

    // ── Field level ─────────────────────────────────────────────────

    /// Returns `true` if `field` is accessible for `operation`, possibly
    /// under a predicate. Always `false` for `delete`.
    #[must_use]
    pub fn can_access_field(
        &self,
        operation: Operation,
        entity: &str,
        field: &str,
        through: &ThroughKey,
    ) -> bool {
        self.field_access(operation, entity, field, through).is_possible()
    }

    /// Field-level access. A conditional grant whose predicates the row-level
    /// grant already implies collapses to [`Access::Allowed`].
    #[must_use]
    pub fn field_predicate(
        &self,
        operation: Operation,
        entity: &str,
        field: &str,
        through: &ThroughKey,
    ) -> Access<'_> {
        match self.field_access(operation, entity, field, through) {
            Access::Conditional(own) => match self.primary_access(operation, entity, through) {
                Access::Conditional(primary) if is_subset(own, primary) => Access::Allowed,
                _ => Access::Conditional(own),
            },
            other => other,
        }
    }

    /// Returns `true` if reading `field` requires a condition beyond the
    /// row-level one.
    #[must_use]
    pub fn has_extra_predicate(
        &self,
        operation: Operation,
        entity: &str,
        field: &str,
        through: &ThroughKey,
    ) -> bool {
        match (
            self.field_access(operation, entity, field, through),
            self.primary_access(operation, entity, through),
        ) {
            (Access::Denied, Access::Denied) | (Access::Allowed, Access::Allowed) => false,
            (Access::Conditional(own), Access::Conditional(primary)) => !is_subset(own, primary),
            _ => true,
        }
    }

    /// Whether clients may supply the primary key of `entity` on create.
    #[must_use]
    pub fn is_custom_primary_allowed(&self, entity: &str) -> bool {
        self.resolved
            .entity(entity)
            .is_some_and(|p| p.custom_primary)
            || self.default_custom_primary
    }

    fn entity_permissions(&self, entity: &str) -> Option<&ResolvedEntityPermissions> {
        self.resolved.entity(entity)
    }

    fn field_access(
        &self,
        operation: Operation,
        entity: &str,
        field: &str,
        through: &ThroughKey,
    ) -> Access<'_> {
        Access::from_value(
            self.entity_permissions(entity)
                .and_then(|p| p.fields(operation))
                .and_then(|fields| fields.get(field))
                .and_then(|predicates| predicates.matching(through)),
        )
    }

    fn primary_access(
        &self,
        operation: Operation,
        entity: &str,
        through: &ThroughKey,
    ) -> Access<'_> {
        match self.primary_field(entity) {
            Some(primary) => self.field_access(operation, entity, primary, through),
            None => Access::Denied,
        }
    }
}
