//! Field definitions for tracked entities.

use crate::types::ScalarType;

/// Metadata about a tracked entity field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Rust field name
    pub name: &'static str,
    /// Store column name (may differ from field name)
    pub column: &'static str,
    /// Scalar type for this field
    pub scalar: ScalarType,
    /// Whether this field is part of the primary key
    pub primary_key: bool,
    /// Whether this field accepts absent values
    pub nullable: bool,
    /// Snapshot-tracked but never mapped to a store column
    pub excluded: bool,
    /// Name of the single-valued navigation this field keys, if any
    pub foreign_key: Option<&'static str>,
}

impl FieldDef {
    /// Create a new field definition with minimal required data.
    pub const fn new(name: &'static str, column: &'static str, scalar: ScalarType) -> Self {
        Self {
            name,
            column,
            scalar,
            primary_key: false,
            nullable: false,
            excluded: false,
            foreign_key: None,
        }
    }

    /// Set primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Keep the field snapshot-tracked but out of the store mapping.
    pub const fn excluded(mut self, value: bool) -> Self {
        self.excluded = value;
        self
    }

    /// Mark this field as the key behind the named single-valued navigation
    /// on the same entity.
    pub const fn foreign_key(mut self, navigation: &'static str) -> Self {
        self.foreign_key = Some(navigation);
        self
    }
}
