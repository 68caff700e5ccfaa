//! Domain service for the content ACL module.

use std::sync::Arc;

use content_acl_sdk::{AclError, Schema};
use dashmap::DashMap;
use tracing::{debug, info};

use super::permission_factory::PermissionFactory;
use super::permissions::Permissions;
use super::variables::{Identity, VariableInjector, VariableMap};
use crate::config::AclConfig;

/// Content ACL resolver.
///
/// Owns the immutable schema and hands out compiled [`Permissions`] per
/// ordered role list. Compiled sets are memoized when
/// [`AclConfig::cache_role_sets`] is on; memoization never changes results.
pub struct AclResolver {
    schema: Arc<Schema>,
    config: AclConfig,
    cache: DashMap<Vec<String>, Arc<Permissions>>,
}

impl AclResolver {
    #[must_use]
    pub fn new(schema: Arc<Schema>, config: AclConfig) -> Self {
        info!(
            roles = schema.acl.roles.len(),
            entities = schema.model.entities.len(),
            cache_role_sets = config.cache_role_sets,
            "Content ACL resolver initialized"
        );
        Self {
            schema,
            config,
            cache: DashMap::new(),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Custom primary default: the configured override, else the schema
    /// default, else `false`.
    #[must_use]
    pub fn default_custom_primary(&self) -> bool {
        self.config
            .default_custom_primary
            .or(self.schema.acl.custom_primary)
            .unwrap_or(false)
    }

    /// Compiled permissions of `roles`.
    ///
    /// # Errors
    /// Returns [`AclError`] if the role declarations are inconsistent.
    #[tracing::instrument(skip_all, fields(roles = ?roles))]
    pub fn permissions(&self, roles: &[String]) -> Result<Arc<Permissions>, AclError> {
        if self.config.cache_role_sets
            && let Some(cached) = self.cache.get(roles)
        {
            debug!("Serving permissions from role set cache");
            return Ok(Arc::clone(cached.value()));
        }

        let resolved = PermissionFactory::new(&self.schema)
            .create(roles, self.config.variable_prefix.as_deref())
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to compile permissions"))?;
        let permissions = Arc::new(Permissions::new(
            Arc::clone(&self.schema),
            resolved,
            self.default_custom_primary(),
        ));

        if self.config.cache_role_sets {
            self.cache.insert(roles.to_vec(), Arc::clone(&permissions));
        }
        Ok(permissions)
    }

    /// Variable bindings of `roles` for `identity`.
    ///
    /// # Errors
    /// Returns [`AclError`] if the role declarations are inconsistent.
    pub fn variables(
        &self,
        roles: &[String],
        identity: &Identity,
    ) -> Result<VariableMap, AclError> {
        VariableMap::for_identity(
            &self.schema,
            roles,
            identity,
            self.config.variable_prefix.as_deref(),
        )
    }

    /// Injector over this resolver's model.
    #[must_use]
    pub fn injector(&self, variables: VariableMap) -> VariableInjector {
        VariableInjector::new(Arc::clone(&self.schema), variables)
    }

    /// Number of memoized role sets.
    #[must_use]
    pub fn cached_role_sets(&self) -> usize {
        self.cache.len()
    }

    /// Drop every memoized role set.
    pub fn clear(&self) {
        self.cache.clear();
    }
}
