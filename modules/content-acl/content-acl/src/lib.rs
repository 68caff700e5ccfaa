//! Content ACL Module
//!
//! Compiles role declarations into resolved permission sets, answers
//! access questions against them, binds identity variables, and turns
//! required permissions into row-level conditions.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;

pub use config::{AclConfig, ConfigError};
pub use domain::permission_factory::PermissionFactory;
pub use domain::permissions::Permissions;
pub use domain::predicate_factory::PredicateFactory;
pub use domain::service::AclResolver;
pub use domain::variables::{Identity, Membership, VariableInjector, VariableMap};
