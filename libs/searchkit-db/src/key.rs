//! Erased primary-key representation.
//!
//! A key is an ordered tuple of attribute values matching the entity's
//! primary-key attribute list, so single-column and composite (including
//! embedded) keys share one shape. Equality, hashing and ordering are
//! derived from the tuple.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// One primary-key attribute value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    I64(i64),
    String(String),
    Uuid(Uuid),
    DateTimeUtc(DateTime<Utc>),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::I64(v) => write!(f, "{v}"),
            KeyValue::String(v) => write!(f, "{v}"),
            KeyValue::Uuid(v) => write!(f, "{v}"),
            KeyValue::DateTimeUtc(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::I64(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::String(v.to_owned())
    }
}

impl From<Uuid> for KeyValue {
    fn from(v: Uuid) -> Self {
        KeyValue::Uuid(v)
    }
}

/// An ordered primary-key tuple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(pub Vec<KeyValue>);

impl EntityKey {
    /// Single-attribute key.
    #[must_use]
    pub fn single(value: impl Into<KeyValue>) -> Self {
        Self(vec![value.into()])
    }

    /// Composite key from attribute values in declared order.
    #[must_use]
    pub fn composite(values: impl IntoIterator<Item = KeyValue>) -> Self {
        Self(values.into_iter().collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_keys_order_by_attribute_sequence() {
        let a = EntityKey::composite([KeyValue::I64(1), KeyValue::I64(2)]);
        let b = EntityKey::composite([KeyValue::I64(1), KeyValue::I64(3)]);
        let c = EntityKey::composite([KeyValue::I64(2), KeyValue::I64(0)]);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a, EntityKey::composite([KeyValue::I64(1), KeyValue::I64(2)]));
    }

    #[test]
    fn keys_are_hashable() {
        let mut set = std::collections::HashSet::new();
        set.insert(EntityKey::single(7_i64));
        assert!(set.contains(&EntityKey::single(7_i64)));
    }
}
