use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scalar operand of a column condition.
///
/// Deserialization is untagged: JSON strings that parse as UUIDs become
/// [`FilterValue::Uuid`], every other string stays a [`FilterValue::String`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Boolean value (`isPublished`, flags).
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// UUID value (primary keys, identity ids).
    Uuid(Uuid),
    /// String value (enum members, slugs, locales).
    String(String),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(u) => write!(f, "{u}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<Uuid> for FilterValue {
    #[inline]
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<&Uuid> for FilterValue {
    #[inline]
    fn from(u: &Uuid) -> Self {
        Self::Uuid(*u)
    }
}

impl From<String> for FilterValue {
    #[inline]
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for FilterValue {
    #[inline]
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<i64> for FilterValue {
    #[inline]
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for FilterValue {
    #[inline]
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
