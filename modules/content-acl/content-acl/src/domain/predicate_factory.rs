//! Builds row-level conditions from resolved permissions.

use content_acl_sdk::resolved::union_into;
use content_acl_sdk::{
    Access, Operation, PredicateRef, RelationContext, ResolvedEntityPermissions, ThroughKey,
};
use content_condition::{ColumnCondition, Condition};

use super::permissions::Permissions;
use super::variables::VariableInjector;

/// Predicate compiler for one permission set and one variable binding.
pub struct PredicateFactory<'a> {
    permissions: &'a Permissions,
    injector: &'a VariableInjector,
}

impl<'a> PredicateFactory<'a> {
    #[must_use]
    pub fn new(permissions: &'a Permissions, injector: &'a VariableInjector) -> Self {
        Self {
            permissions,
            injector,
        }
    }

    /// Row-level condition: the primary key permission for field-level
    /// operations, the `delete` permission otherwise.
    #[must_use]
    pub fn create_row_predicate(&self, entity: &str, operation: Operation) -> Condition {
        self.create(entity, operation, &[], None)
    }

    /// Condition a row of `entity` must satisfy so that all of `fields` are
    /// accessible for `operation` under direct access.
    ///
    /// An empty `fields` list means the row itself (the primary key).
    /// `delete` ignores `fields`. When `relation_context` describes the
    /// relation through which `entity` is reached, conditions the enclosing
    /// entity already guarantees are reduced to an existence check.
    #[must_use]
    pub fn create(
        &self,
        entity: &str,
        operation: Operation,
        fields: &[&str],
        relation_context: Option<&RelationContext>,
    ) -> Condition {
        let Some(primary) = self.permissions.primary_field(entity) else {
            return Condition::never();
        };
        let Some(entity_permissions) = self.permissions.resolved().entity(entity) else {
            return Condition::never_on(primary);
        };
        let row = [primary];
        let fields = if fields.is_empty() { &row[..] } else { fields };
        match required_predicates(entity_permissions, operation, fields) {
            Some(predicates) => self.build_predicates(entity, &predicates, relation_context),
            None => Condition::never_on(primary),
        }
    }

    /// Inject and conjoin `predicates`. No predicates means no filtering.
    #[must_use]
    pub fn build_predicates(
        &self,
        entity: &str,
        predicates: &[PredicateRef],
        relation_context: Option<&RelationContext>,
    ) -> Condition {
        if predicates.is_empty() {
            return Condition::always();
        }
        let parts = predicates
            .iter()
            .map(|predicate| self.injector.inject(entity, predicate))
            .collect();
        self.optimize(Condition::all(parts), relation_context)
    }

    /// Replace the traversal back to the source entity, when it repeats the
    /// source's own read condition, with an existence check on the source
    /// primary key.
    #[must_use]
    pub fn optimize(
        &self,
        condition: Condition,
        relation_context: Option<&RelationContext>,
    ) -> Condition {
        let Some(context) = relation_context else {
            return condition;
        };
        let Some(target_relation) = context.target_relation.as_deref() else {
            return condition;
        };
        let source = self.create(
            &context.entity,
            Operation::Read,
            &[context.relation.as_str()],
            None,
        );
        if source.is_always() {
            return condition;
        }
        let Some(source_primary) = self.permissions.primary_field(&context.entity) else {
            return condition;
        };

        let find = Condition::relation(target_relation, source);
        let replacement = Condition::relation(
            target_relation,
            Condition::column(source_primary, ColumnCondition::Always),
        );
        condition.replace(&find, &replacement)
    }
}

/// Distinct predicates required by `fields` under direct access, or `None`
/// if any of them is denied.
fn required_predicates(
    permissions: &ResolvedEntityPermissions,
    operation: Operation,
    fields: &[&str],
) -> Option<Vec<PredicateRef>> {
    let mut required = Vec::new();
    let mut require = |access: Access<'_>| match access {
        Access::Denied => false,
        Access::Allowed => true,
        Access::Conditional(predicates) => {
            union_into(&mut required, predicates);
            true
        }
    };

    let granted = match permissions.fields(operation) {
        None => require(Access::from_value(
            permissions.delete.matching(&ThroughKey::Root),
        )),
        Some(declared) => fields.iter().all(|field| {
            require(Access::from_value(
                declared
                    .get(*field)
                    .and_then(|p| p.matching(&ThroughKey::Root)),
            ))
        }),
    };
    granted.then_some(required)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use content_acl_sdk::{
        AclSchema, Entity, EntityPermissionsDeclaration, Model, PredicateDeclaration,
        PredicateDefinition, RoleDefinition, Schema,
    };

    use crate::domain::permission_factory::PermissionFactory;
    use crate::domain::variables::VariableMap;

    fn published() -> PredicateDefinition {
        PredicateDefinition::column("isPublished", ColumnCondition::eq(true))
    }

    fn setup(role: RoleDefinition) -> (Permissions, VariableInjector) {
        let schema = Arc::new(Schema {
            model: Model::new()
                .with_entity(
                    Entity::new("Article")
                        .column("title")
                        .column("isPublished")
                        .owning("coverPhoto", "ImageUse", Some("articles")),
                )
                .with_entity(
                    Entity::new("ImageUse")
                        .column("url")
                        .inverse("articles", "Article", "coverPhoto"),
                ),
            acl: AclSchema::default().with_role("reader", role),
        });
        let resolved = PermissionFactory::new(&schema)
            .create(&["reader".to_owned()], None)
            .unwrap();
        let injector = VariableInjector::new(Arc::clone(&schema), VariableMap::new());
        (Permissions::new(schema, resolved, false), injector)
    }

    fn reader() -> RoleDefinition {
        RoleDefinition::new()
            .entity(
                "Article",
                EntityPermissionsDeclaration::new()
                    .predicate("pub", published())
                    .read("title", PredicateDeclaration::allow())
                    .read("coverPhoto", PredicateDeclaration::named("pub")),
            )
            .entity(
                "ImageUse",
                EntityPermissionsDeclaration::new()
                    .predicate("viaArticle", PredicateDefinition::relation("articles", published()))
                    .read("url", PredicateDeclaration::named("viaArticle")),
            )
    }

    #[test]
    fn denied_fields_produce_never() {
        let (permissions, injector) = setup(reader());
        let factory = PredicateFactory::new(&permissions, &injector);

        assert_eq!(
            factory.create("Article", Operation::Update, &["title"], None),
            Condition::never_on("id")
        );
        assert_eq!(
            factory.create("Article", Operation::Read, &["title", "missing"], None),
            Condition::never_on("id")
        );
        assert_eq!(
            factory.create_row_predicate("Article", Operation::Delete),
            Condition::never_on("id")
        );
        assert_eq!(
            factory.create_row_predicate("Ghost", Operation::Read),
            Condition::never()
        );
    }

    #[test]
    fn unconditional_fields_produce_always() {
        let (permissions, injector) = setup(reader());
        let factory = PredicateFactory::new(&permissions, &injector);

        assert!(
            factory
                .create("Article", Operation::Read, &["title"], None)
                .is_always()
        );
        assert!(
            factory
                .create_row_predicate("Article", Operation::Read)
                .is_always()
        );
    }

    #[test]
    fn conditional_fields_are_injected() {
        let (permissions, injector) = setup(reader());
        let factory = PredicateFactory::new(&permissions, &injector);

        assert_eq!(
            factory.create("Article", Operation::Read, &["title", "coverPhoto"], None),
            Condition::column("isPublished", ColumnCondition::eq(true))
        );
    }

    #[test]
    fn back_reference_is_reduced_to_existence_check() {
        let (permissions, injector) = setup(reader());
        let factory = PredicateFactory::new(&permissions, &injector);
        let context = permissions
            .schema()
            .model
            .relation_context("Article", "coverPhoto")
            .unwrap();

        assert_eq!(
            factory.create("ImageUse", Operation::Read, &[], None),
            Condition::relation(
                "articles",
                Condition::column("isPublished", ColumnCondition::eq(true))
            )
        );
        assert_eq!(
            factory.create("ImageUse", Operation::Read, &[], Some(&context)),
            Condition::relation("articles", Condition::column("id", ColumnCondition::Always))
        );
    }

    #[test]
    fn optimization_needs_counterpart_relation() {
        let (permissions, injector) = setup(reader());
        let factory = PredicateFactory::new(&permissions, &injector);
        let context = RelationContext {
            entity: "Article".to_owned(),
            relation: "coverPhoto".to_owned(),
            target_relation: None,
        };

        assert_eq!(
            factory.create("ImageUse", Operation::Read, &["url"], Some(&context)),
            Condition::relation(
                "articles",
                Condition::column("isPublished", ColumnCondition::eq(true))
            )
        );
    }

    #[test]
    fn delete_predicate_ignores_fields() {
        let (permissions, injector) = setup(RoleDefinition::new().entity(
            "Article",
            EntityPermissionsDeclaration::new()
                .predicate("pub", published())
                .delete(PredicateDeclaration::named("pub")),
        ));
        let factory = PredicateFactory::new(&permissions, &injector);

        assert_eq!(
            factory.create("Article", Operation::Delete, &["title"], None),
            Condition::column("isPublished", ColumnCondition::eq(true))
        );
    }
}
