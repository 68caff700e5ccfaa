use std::fmt;

/// Relation-traversal context under which a field or entity is accessed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThroughKey {
    /// Direct access: the entity is the root of the query.
    Root,
    /// Reached through some relation; matches generic "through any relation"
    /// rules.
    AnyRelation,
    /// Traversal context is not tracked (schema-shape decisions).
    Unknown,
    /// Reached through the relation with this name.
    Relation(String),
}

impl ThroughKey {
    #[must_use]
    pub fn relation(name: impl Into<String>) -> Self {
        Self::Relation(name.into())
    }
}

impl fmt::Display for ThroughKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("<root>"),
            Self::AnyRelation => f.write_str("<any relation>"),
            Self::Unknown => f.write_str("<unknown>"),
            Self::Relation(name) => f.write_str(name),
        }
    }
}
