#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Content ACL SDK
//!
//! Public types of the `content_acl` module:
//!
//! - [`Model`], [`Entity`], [`RelationContext`] - data model view
//! - [`Schema`], [`AclSchema`], [`RoleDefinition`] - role declarations
//! - [`PredicateDeclaration`], [`PredicateDefinition`] - predicate references and definitions
//! - [`ThroughKey`] - relation-traversal context
//! - [`ResolvedPermissions`], [`ResolvedPredicates`], [`Access`] - compiled permission set
//! - [`AclError`] - configuration errors
//!
//! ## Usage
//!
//! ```ignore
//! use content_acl_sdk::{Operation, ThroughKey};
//!
//! let permissions = resolver.permissions(&["reader".to_owned()])?;
//! if permissions.can_access_field(Operation::Read, "Article", "title", &ThroughKey::Root) {
//!     // select the column
//! }
//! ```

pub mod acl;
pub mod error;
pub mod model;
pub mod resolved;
pub mod through;

pub use acl::{
    AclSchema, ColumnOperand, EntityOperationsDeclaration, EntityPermissionsDeclaration,
    Operation, PredefinedVariable, PredicateDeclaration, PredicateDefinition, PredicateTarget,
    RelationOperand, RichPredicate, RoleDefinition, Schema, Through, VariableDefinition,
    VariableValue, prefix_variable,
};
pub use error::AclError;
pub use model::{Entity, Field, Model, Relation, RelationContext, RelationSide};
pub use resolved::{
    Access, PredicateRef, PredicateValue, ResolvedEntityPermissions, ResolvedFieldPermissions,
    ResolvedPermissions, ResolvedPredicates,
};
pub use through::ThroughKey;
