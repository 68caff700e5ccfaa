//! Compiles role declarations into a [`ResolvedPermissions`] set.

use std::collections::BTreeMap;
use std::sync::Arc;

use content_acl_sdk::{
    AclError, Entity, EntityPermissionsDeclaration, Operation, PredicateDeclaration,
    PredicateRef, PredicateTarget, ResolvedEntityPermissions, ResolvedPermissions,
    ResolvedPredicates, Schema, Through, ThroughKey, prefix_variable,
};
use tracing::warn;

use super::roles::{RoleVisit, walk_roles};

/// Permission compiler over a schema.
pub struct PermissionFactory<'a> {
    schema: &'a Schema,
}

impl<'a> PermissionFactory<'a> {
    #[must_use]
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Compile the union of `roles` and everything they inherit.
    ///
    /// Variable references inside predicates are prefixed with `prefix`, or
    /// with each role's own prefix when `prefix` is `None`. The primary key
    /// permission of every field-level operation is the union of the
    /// permissions of all other fields.
    ///
    /// # Errors
    /// Returns [`AclError`] for undeclared inherited roles, inheritance
    /// cycles, undefined predicate names and entities missing from the
    /// model.
    #[tracing::instrument(skip_all, fields(roles = ?roles))]
    pub fn create(
        &self,
        roles: &[String],
        prefix: Option<&str>,
    ) -> Result<ResolvedPermissions, AclError> {
        let mut result = ResolvedPermissions::new();
        walk_roles(&self.schema.acl, roles, prefix, &mut |visit| {
            let own = self.resolve_role(visit)?;
            result = result.merge(&own);
            Ok(())
        })?;
        Ok(self.unify_primary_permissions(result))
    }

    fn resolve_role(&self, visit: RoleVisit<'_>) -> Result<ResolvedPermissions, AclError> {
        let mut resolved = ResolvedPermissions::new();
        for (entity_name, declaration) in &visit.definition.entities {
            let Some(entity) = self.schema.model.entity(entity_name) else {
                return Err(AclError::UnknownEntity {
                    role: visit.name.to_owned(),
                    entity: entity_name.clone(),
                });
            };
            let permissions = EntityResolver::new(visit, entity, declaration).resolve()?;
            resolved.insert(entity_name.clone(), permissions);
        }
        Ok(resolved)
    }

    fn unify_primary_permissions(
        &self,
        mut permissions: ResolvedPermissions,
    ) -> ResolvedPermissions {
        for (entity_name, entity_permissions) in permissions.iter_mut() {
            let Some(primary) = self.schema.model.primary_of(entity_name) else {
                continue;
            };
            for operation in Operation::FIELD_LEVEL {
                let Some(fields) = entity_permissions.fields_mut(operation) else {
                    continue;
                };
                if fields.is_empty() {
                    continue;
                }
                let union = fields
                    .iter()
                    .filter(|(name, _)| name.as_str() != primary)
                    .fold(ResolvedPredicates::new(), |acc, (_, predicates)| {
                        acc.merge(predicates)
                    });
                fields.insert(primary.to_owned(), union);
            }
        }
        permissions
    }
}

/// Resolves the declarations of one entity within one role.
struct EntityResolver<'s> {
    visit: RoleVisit<'s>,
    entity: &'s Entity,
    declaration: &'s EntityPermissionsDeclaration,
    predicates: BTreeMap<&'s str, PredicateRef>,
}

impl<'s> EntityResolver<'s> {
    fn new(
        visit: RoleVisit<'s>,
        entity: &'s Entity,
        declaration: &'s EntityPermissionsDeclaration,
    ) -> Self {
        let predicates = declaration
            .predicates
            .iter()
            .map(|(name, definition)| {
                let prefixed = definition.map_variables(&|v| prefix_variable(visit.prefix, v));
                (name.as_str(), Arc::new(prefixed))
            })
            .collect();
        Self {
            visit,
            entity,
            declaration,
            predicates,
        }
    }

    fn resolve(&self) -> Result<ResolvedEntityPermissions, AclError> {
        let operations = &self.declaration.operations;
        let mut resolved = ResolvedEntityPermissions {
            custom_primary: operations.custom_primary,
            ..ResolvedEntityPermissions::default()
        };

        for operation in Operation::FIELD_LEVEL {
            let (Some(declared), Some(target)) =
                (operations.fields(operation), resolved.fields_mut(operation))
            else {
                continue;
            };
            for (field, declaration) in declared {
                if !self.entity.has_field(field) {
                    warn!(
                        role = %self.visit.name,
                        entity = %self.entity.name,
                        field = %field,
                        operation = %operation,
                        "Permission declared for a field unknown to the model"
                    );
                }
                target.insert(field.clone(), self.resolve_declaration(declaration)?);
            }
        }

        if let Some(delete) = &operations.delete {
            resolved.delete = self.resolve_declaration(delete)?;
        }
        Ok(resolved)
    }

    fn resolve_declaration(
        &self,
        declaration: &PredicateDeclaration,
    ) -> Result<ResolvedPredicates, AclError> {
        let mut resolved = ResolvedPredicates::new();
        match declaration {
            PredicateDeclaration::Flag(true) => resolved.allow(ThroughKey::Root),
            PredicateDeclaration::Flag(false) => {}
            PredicateDeclaration::Named(name) => {
                resolved.add_predicate(ThroughKey::Root, self.lookup(name)?);
            }
            PredicateDeclaration::Rich(entries) => {
                for entry in entries {
                    let keys: Vec<ThroughKey> = match &entry.through {
                        None | Some(Through::Any(false)) => vec![ThroughKey::Root],
                        Some(Through::Any(true)) => vec![ThroughKey::AnyRelation],
                        Some(Through::Relations(names)) => {
                            names.iter().map(|n| ThroughKey::relation(n.as_str())).collect()
                        }
                    };
                    match &entry.predicate {
                        PredicateTarget::Flag(true) => {
                            for key in keys {
                                resolved.allow(key);
                            }
                        }
                        PredicateTarget::Flag(false) => {}
                        PredicateTarget::Named(name) => {
                            let predicate = self.lookup(name)?;
                            for key in keys {
                                resolved.add_predicate(key, Arc::clone(&predicate));
                            }
                        }
                    }
                }
            }
        }
        Ok(resolved.normalized())
    }

    fn lookup(&self, name: &str) -> Result<PredicateRef, AclError> {
        self.predicates
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| AclError::UndefinedPredicate {
                role: self.visit.name.to_owned(),
                entity: self.entity.name.clone(),
                predicate: name.to_owned(),
            })
    }
}
