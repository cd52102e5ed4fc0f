//! Record identity keys.

use std::fmt;
use std::hash::{Hash, Hasher};

use rowtrack_core::entity::EntityMeta;
use rowtrack_core::error::IdentityError;
use rowtrack_core::{Result, Value};

/// A record's primary-key values, in primary-key field order.
///
/// Keys compare and hash the way the change tracker compares values:
/// floats by bit pattern, nulls equal to each other. Baseline keys are
/// captured strictly and never hold nulls, so a lenient key with a null
/// component cannot collide with one.
#[derive(Debug, Clone)]
pub struct IdentityKey(Vec<Value>);

impl IdentityKey {
    /// Create a key from primary-key values.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Create a single-component key.
    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    /// The key's component values, in primary-key field order.
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Number of key components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the key has no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if any component is null.
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }
}

impl PartialEq for IdentityKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(other.0.iter()).all(|(a, b)| a.same_as(b))
    }
}

impl Eq for IdentityKey {}

impl Hash for IdentityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            hash_value(value, state);
        }
    }
}

/// Hash a value consistently with [`Value::same_as`].
fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        Value::Null => {}
        Value::Bool(v) => v.hash(state),
        Value::TinyInt(v) => v.hash(state),
        Value::SmallInt(v) => v.hash(state),
        Value::Int(v) => v.hash(state),
        Value::BigInt(v) => v.hash(state),
        Value::Float(v) => v.to_bits().hash(state),
        Value::Double(v) => v.to_bits().hash(state),
        Value::Decimal(v) => v.hash(state),
        Value::Text(v) => v.hash(state),
        Value::Bytes(v) => v.hash(state),
        Value::Date(v) => v.hash(state),
        Value::Time(v) => v.hash(state),
        Value::Timestamp(v) => v.hash(state),
        Value::Uuid(v) => v.hash(state),
        // Sorted-map serialization keeps this deterministic.
        Value::Json(v) => v.to_string().hash(state),
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            display_value(value, f)?;
        }
        write!(f, ")")
    }
}

fn display_value(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Null => write!(f, "null"),
        Value::Bool(v) => write!(f, "{}", v),
        Value::TinyInt(v) => write!(f, "{}", v),
        Value::SmallInt(v) => write!(f, "{}", v),
        Value::Int(v) => write!(f, "{}", v),
        Value::BigInt(v) => write!(f, "{}", v),
        Value::Float(v) => write!(f, "{}", v),
        Value::Double(v) => write!(f, "{}", v),
        Value::Decimal(s) => write!(f, "'{}'", s),
        Value::Text(s) => write!(f, "'{}'", s),
        Value::Bytes(b) => {
            write!(f, "0x")?;
            for byte in b {
                write!(f, "{:02x}", byte)?;
            }
            Ok(())
        }
        Value::Date(v) => write!(f, "{}", v),
        Value::Time(v) => write!(f, "{}", v),
        Value::Timestamp(v) => write!(f, "{}", v),
        Value::Uuid(b) => {
            for byte in b {
                write!(f, "{:02x}", byte)?;
            }
            Ok(())
        }
        Value::Json(v) => write!(f, "{}", v),
    }
}

/// Extract the primary-key values of a live row, erroring on the first
/// absent component.
///
/// Used wherever a record enters the baseline: at load and at refresh.
pub fn extract_key(meta: &EntityMeta, row: &[(&'static str, Value)]) -> Result<IdentityKey> {
    let mut values = Vec::with_capacity(meta.primary_key.len());
    for pk in &meta.primary_key {
        match field_value(row, pk.name) {
            Some(v) if !v.is_null() => values.push(v.clone()),
            _ => return Err(IdentityError::absent_key(meta.entity, pk.name).into()),
        }
    }
    Ok(IdentityKey::new(values))
}

/// Extract primary-key values without insisting they are present.
///
/// Absent components stay null. Live records are keyed leniently: a record
/// added with an unset key simply matches nothing in the baseline.
pub fn extract_key_lenient(meta: &EntityMeta, row: &[(&'static str, Value)]) -> IdentityKey {
    IdentityKey::new(
        meta.primary_key
            .iter()
            .map(|pk| field_value(row, pk.name).cloned().unwrap_or(Value::Null))
            .collect(),
    )
}

/// Look up a field value in a dumped row.
pub(crate) fn field_value<'a>(row: &'a [(&'static str, Value)], name: &str) -> Option<&'a Value> {
    row.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Author, author_meta};
    use rowtrack_core::IdentityErrorKind;
    use rowtrack_core::entity::Entity;
    use std::collections::HashMap;

    #[test]
    fn test_key_equality_and_hash() {
        let mut map = HashMap::new();
        map.insert(IdentityKey::single(f64::NAN), "nan");
        map.insert(IdentityKey::single(7i64), "seven");

        assert_eq!(map.get(&IdentityKey::single(f64::NAN)), Some(&"nan"));
        assert_eq!(map.get(&IdentityKey::single(7i64)), Some(&"seven"));
        assert_eq!(map.get(&IdentityKey::single(8i64)), None);

        // Component count is part of identity.
        let composite = IdentityKey::new(vec![Value::BigInt(1), Value::BigInt(2)]);
        assert_ne!(composite, IdentityKey::single(1i64));
    }

    #[test]
    fn test_key_display() {
        let key = IdentityKey::new(vec![Value::BigInt(1), Value::Text("alice".to_string())]);
        assert_eq!(key.to_string(), "(1, 'alice')");
        assert_eq!(IdentityKey::new(vec![Value::Null]).to_string(), "(null)");
    }

    #[test]
    fn test_extract_key_requires_all_components() {
        let meta = author_meta();
        let anonymous = Author {
            id: None,
            name: "nobody".to_string(),
        };
        let err = extract_key(&meta, &anonymous.to_record()).unwrap_err();
        assert_eq!(err.identity_kind(), Some(IdentityErrorKind::AbsentKey));

        let named = Author {
            id: Some(3),
            name: "alice".to_string(),
        };
        let key = extract_key(&meta, &named.to_record()).unwrap();
        assert_eq!(key, IdentityKey::single(3i64));
    }

    #[test]
    fn test_extract_key_lenient_keeps_nulls() {
        let meta = author_meta();
        let anonymous = Author {
            id: None,
            name: "nobody".to_string(),
        };
        let key = extract_key_lenient(&meta, &anonymous.to_record());
        assert!(key.has_null());
        assert_eq!(key.len(), 1);
    }
}
