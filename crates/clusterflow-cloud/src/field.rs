//! Tri-state attribute values
//!
//! Declarative front-ends distinguish between an attribute that has not been
//! determined yet (`Unknown`, typically before the first apply), one that was
//! explicitly left out (`Null`) and one that carries a value. The difference
//! drives translation: unknown and null attributes are never sent to a remote
//! API, and a refreshed record replaces unknowns with explicit nulls.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value that may be unknown, explicitly null, or present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field<T> {
    /// Not determined yet
    Unknown,
    /// Explicitly absent
    Null,
    /// Present with a value
    Value(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unknown
    }
}

impl<T> Field<T> {
    /// Builds a field from an optional value, mapping `None` to `Null`
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Null,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for `Null` and `Value`
    pub fn is_known(&self) -> bool {
        !self.is_unknown()
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// The value, when present
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Field<&T> {
        match self {
            Self::Unknown => Field::Unknown,
            Self::Null => Field::Null,
            Self::Value(v) => Field::Value(v),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Self::Unknown => Field::Unknown,
            Self::Null => Field::Null,
            Self::Value(v) => Field::Value(f(v)),
        }
    }

    /// Replaces `Unknown` with `Null`, leaving known states untouched
    pub fn or_null(self) -> Self {
        match self {
            Self::Unknown => Self::Null,
            other => other,
        }
    }
}

impl Field<String> {
    /// The value when present and non-empty
    pub fn non_empty(&self) -> Option<&str> {
        self.value().map(String::as_str).filter(|s| !s.is_empty())
    }
}

impl Field<bool> {
    /// True only when the field holds `true`
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Value(true))
    }
}

/// Values that have a natural "nothing set" representation
///
/// Used when comparing a planned value against a stored record that never
/// carried the attribute: planning `false` or an empty list over an absent
/// attribute is not a change.
pub trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for bool {
    fn is_blank(&self) -> bool {
        !*self
    }
}

impl Blank for i64 {
    fn is_blank(&self) -> bool {
        *self == 0
    }
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Blank for BTreeMap<K, V> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unknown() {
        let field: Field<String> = Field::default();
        assert!(field.is_unknown());
        assert!(!field.is_known());
        assert_eq!(field.value(), None);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Field::from_option(Some(3)), Field::Value(3));
        assert_eq!(Field::<i64>::from_option(None), Field::Null);
    }

    #[test]
    fn test_or_null_only_replaces_unknown() {
        assert_eq!(Field::<bool>::Unknown.or_null(), Field::Null);
        assert_eq!(Field::Value(true).or_null(), Field::Value(true));
        assert_eq!(Field::<bool>::Null.or_null(), Field::Null);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(Field::Value("a".to_string()).non_empty(), Some("a"));
        assert_eq!(Field::Value(String::new()).non_empty(), None);
        assert_eq!(Field::<String>::Null.non_empty(), None);
    }

    #[test]
    fn test_serde_keeps_all_three_states() {
        let fields = vec![Field::Unknown, Field::Null, Field::Value(7_i64)];
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"["unknown","null",{"value":7}]"#);

        let back: Vec<Field<i64>> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fields);
    }
}
