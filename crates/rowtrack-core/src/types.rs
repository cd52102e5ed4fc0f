//! Scalar type definitions and the storable-type allow-list.

/// Scalar kinds a tracked field can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    // Integer types
    TinyInt,
    SmallInt,
    Int,
    BigInt,

    // Floating point
    Float,
    Double,

    // Fixed precision
    Decimal,

    // Boolean
    Bool,

    // Text
    Text,

    // Binary
    Bytes,

    // Date/time types
    Date,
    Time,
    Timestamp,

    // UUID
    Uuid,

    // JSON
    Json,
}

impl ScalarType {
    /// Get the name of this scalar type.
    pub const fn name(&self) -> &'static str {
        match self {
            ScalarType::TinyInt => "tinyint",
            ScalarType::SmallInt => "smallint",
            ScalarType::Int => "integer",
            ScalarType::BigInt => "bigint",
            ScalarType::Float => "real",
            ScalarType::Double => "double",
            ScalarType::Decimal => "decimal",
            ScalarType::Bool => "boolean",
            ScalarType::Text => "text",
            ScalarType::Bytes => "bytes",
            ScalarType::Date => "date",
            ScalarType::Time => "time",
            ScalarType::Timestamp => "timestamp",
            ScalarType::Uuid => "uuid",
            ScalarType::Json => "json",
        }
    }

    /// Check if this type is an integer.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            ScalarType::TinyInt | ScalarType::SmallInt | ScalarType::Int | ScalarType::BigInt
        )
    }

    /// Check if this type is numeric.
    pub const fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(
                self,
                ScalarType::Float | ScalarType::Double | ScalarType::Decimal
            )
    }

    /// Check if this type is text-based.
    pub const fn is_text(&self) -> bool {
        matches!(self, ScalarType::Text)
    }

    /// Check if this type is a date/time type.
    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            ScalarType::Date | ScalarType::Time | ScalarType::Timestamp
        )
    }
}

/// The set of scalar types a session will snapshot and map to store columns.
///
/// Fields whose scalar type falls outside the set are invisible to both the
/// change tracker and the store mapping. Sessions default to
/// [`ScalarTypeSet::classic`]; pass a custom set to the session builder to
/// widen or narrow it.
#[derive(Debug, Clone)]
pub struct ScalarTypeSet {
    allowed: Vec<ScalarType>,
}

impl ScalarTypeSet {
    /// The long-standing default: booleans, integers, floats, decimals, text,
    /// temporal values, and UUIDs. Binary and JSON payloads stay opt-in
    /// through [`ScalarTypeSet::with`].
    pub fn classic() -> Self {
        Self {
            allowed: vec![
                ScalarType::Bool,
                ScalarType::TinyInt,
                ScalarType::SmallInt,
                ScalarType::Int,
                ScalarType::BigInt,
                ScalarType::Float,
                ScalarType::Double,
                ScalarType::Decimal,
                ScalarType::Text,
                ScalarType::Date,
                ScalarType::Time,
                ScalarType::Timestamp,
                ScalarType::Uuid,
            ],
        }
    }

    /// A set that admits nothing.
    pub fn empty() -> Self {
        Self {
            allowed: Vec::new(),
        }
    }

    /// Add a scalar type to the set.
    #[must_use]
    pub fn with(mut self, scalar: ScalarType) -> Self {
        if !self.allowed.contains(&scalar) {
            self.allowed.push(scalar);
        }
        self
    }

    /// Remove a scalar type from the set.
    #[must_use]
    pub fn without(mut self, scalar: ScalarType) -> Self {
        self.allowed.retain(|s| *s != scalar);
        self
    }

    /// Check whether a scalar type is admitted.
    pub fn contains(&self, scalar: ScalarType) -> bool {
        self.allowed.contains(&scalar)
    }

    /// Number of admitted scalar types.
    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    /// Check whether the set admits nothing.
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

impl Default for ScalarTypeSet {
    fn default() -> Self {
        Self::classic()
    }
}

/// Trait for Rust types that map onto a scalar type.
pub trait ScalarInfo {
    /// The scalar type for this Rust type.
    const SCALAR: ScalarType;

    /// Whether this type is nullable by default.
    const NULLABLE: bool = false;
}

impl ScalarInfo for i8 {
    const SCALAR: ScalarType = ScalarType::TinyInt;
}

impl ScalarInfo for i16 {
    const SCALAR: ScalarType = ScalarType::SmallInt;
}

impl ScalarInfo for i32 {
    const SCALAR: ScalarType = ScalarType::Int;
}

impl ScalarInfo for i64 {
    const SCALAR: ScalarType = ScalarType::BigInt;
}

impl ScalarInfo for f32 {
    const SCALAR: ScalarType = ScalarType::Float;
}

impl ScalarInfo for f64 {
    const SCALAR: ScalarType = ScalarType::Double;
}

impl ScalarInfo for bool {
    const SCALAR: ScalarType = ScalarType::Bool;
}

impl ScalarInfo for String {
    const SCALAR: ScalarType = ScalarType::Text;
}

impl ScalarInfo for Vec<u8> {
    const SCALAR: ScalarType = ScalarType::Bytes;
}

impl ScalarInfo for [u8; 16] {
    const SCALAR: ScalarType = ScalarType::Uuid;
}

impl ScalarInfo for serde_json::Value {
    const SCALAR: ScalarType = ScalarType::Json;
}

impl<T: ScalarInfo> ScalarInfo for Option<T> {
    const SCALAR: ScalarType = T::SCALAR;
    const NULLABLE: bool = true;
}
