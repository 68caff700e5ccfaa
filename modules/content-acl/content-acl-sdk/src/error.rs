//! Error types for the content ACL engine.

use thiserror::Error;

/// Configuration errors detected while compiling role declarations into a
/// resolved permission set.
///
/// Access denial is never an error: lookups return a deny value instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AclError {
    /// A role inherits a role that is not declared in the ACL schema.
    #[error("role '{role}' inherits undeclared role '{inherited}'")]
    UndeclaredInheritedRole { role: String, inherited: String },

    /// Role inheritance forms a cycle.
    #[error("cyclic role inheritance: {chain}")]
    CyclicInheritance { chain: String },

    /// A field or delete declaration names a predicate the entity does not define.
    #[error("role '{role}' references undefined predicate '{predicate}' on entity '{entity}'")]
    UndefinedPredicate {
        role: String,
        entity: String,
        predicate: String,
    },

    /// A role declares permissions for an entity missing from the data model.
    #[error("role '{role}' declares permissions for unknown entity '{entity}'")]
    UnknownEntity { role: String, entity: String },
}
