//! Configuration for the content ACL module.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Environment variable prefix, e.g. `CONTENT_ACL_CACHE_ROLE_SETS=false`.
pub const ENV_PREFIX: &str = "CONTENT_ACL_";

/// Configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AclConfig {
    /// Overrides the schema-wide custom primary default.
    pub default_custom_primary: Option<bool>,
    /// Fixed variable prefix for every compiled role. Role prefixes apply
    /// when unset.
    pub variable_prefix: Option<String>,
    /// Memoize compiled permissions per role list.
    pub cache_role_sets: bool,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            default_custom_primary: None,
            variable_prefix: None,
            cache_role_sets: true,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid content ACL configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

impl AclConfig {
    /// Load defaults, then the optional YAML file, then `CONTENT_ACL_*`
    /// environment variables.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if a source cannot be parsed or
    /// carries unknown keys.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| ConfigError::Invalid(Box::new(e)))
    }
}
