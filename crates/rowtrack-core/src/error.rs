//! Error types for rowtrack operations.

use std::fmt;

/// The primary error type for all rowtrack operations.
#[derive(Debug)]
pub enum Error {
    /// Entity metadata or session wiring errors
    Configuration(ConfigurationError),
    /// Record identity errors (absent, unmatched, or ambiguous keys)
    Identity(IdentityError),
    /// Validation gate failures during save
    Validation(ValidationError),
    /// Backing store errors (connect, fetch, statement, transaction)
    Store(StoreError),
}

#[derive(Debug)]
pub struct ConfigurationError {
    pub entity: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct IdentityError {
    pub kind: IdentityErrorKind,
    pub entity: &'static str,
    pub field: Option<&'static str>,
    pub key: Option<String>,
    pub matches: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityErrorKind {
    /// A primary-key field carries no value where one is required
    AbsentKey,
    /// No tracked record carries the requested key
    NoMatch,
    /// More than one tracked record carries the same key
    Ambiguous,
}

/// Raised when the pre-save gate finds invalid records in a collection.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Registration name of the offending collection
    pub collection: String,
    /// Number of records that failed their checks
    pub invalid: usize,
}

#[derive(Debug)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Failed to open or close the store
    Connection,
    /// Failed to read column names or result sets
    Fetch,
    /// An insert, update, or delete statement failed
    Statement,
    /// Begin, commit, or rollback failed
    Transaction,
    /// A fetched value could not be decoded into the requested type
    Decode,
}

impl IdentityError {
    /// A record is missing a value for the named primary-key field.
    pub fn absent_key(entity: &'static str, field: &'static str) -> Self {
        Self {
            kind: IdentityErrorKind::AbsentKey,
            entity,
            field: Some(field),
            key: None,
            matches: 0,
        }
    }

    /// No record carries the given key.
    pub fn no_match(entity: &'static str, key: impl Into<String>) -> Self {
        Self {
            kind: IdentityErrorKind::NoMatch,
            entity,
            field: None,
            key: Some(key.into()),
            matches: 0,
        }
    }

    /// More than one record carries the given key.
    pub fn ambiguous(entity: &'static str, key: impl Into<String>, matches: usize) -> Self {
        Self {
            kind: IdentityErrorKind::Ambiguous,
            entity,
            field: None,
            key: Some(key.into()),
            matches,
        }
    }
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: StoreErrorKind,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl Error {
    /// Shorthand for an entity-level configuration error.
    pub fn configuration(entity: &'static str, message: impl Into<String>) -> Self {
        Error::Configuration(ConfigurationError {
            entity,
            message: message.into(),
        })
    }

    /// Shorthand for a store-level decode failure.
    pub fn decode(message: impl Into<String>) -> Self {
        Error::Store(StoreError::new(StoreErrorKind::Decode, message))
    }

    /// Does this error originate in the backing store rather than in tracking state?
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Store(_))
    }

    /// Identity kind, if this is an identity error.
    pub fn identity_kind(&self) -> Option<IdentityErrorKind> {
        match self {
            Error::Identity(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(e) => {
                write!(f, "Configuration error for '{}': {}", e.entity, e.message)
            }
            Error::Identity(e) => write!(f, "Identity error: {}", e),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Store(e) => write!(f, "Store error: {}", e.message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IdentityErrorKind::AbsentKey => {
                if let Some(field) = self.field {
                    write!(
                        f,
                        "primary-key field '{}' has no value on a record of '{}'",
                        field, self.entity
                    )
                } else {
                    write!(f, "a record of '{}' is missing its primary key", self.entity)
                }
            }
            IdentityErrorKind::NoMatch => write!(
                f,
                "no record of '{}' matches key {}",
                self.entity,
                self.key.as_deref().unwrap_or("<none>")
            ),
            IdentityErrorKind::Ambiguous => write!(
                f,
                "{} records of '{}' share key {}",
                self.matches,
                self.entity,
                self.key.as_deref().unwrap_or("<none>")
            ),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "collection '{}' has {} invalid record(s)",
            self.collection, self.invalid
        )
    }
}

impl std::error::Error for ValidationError {}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConfigurationError> for Error {
    fn from(err: ConfigurationError) -> Self {
        Error::Configuration(err)
    }
}

impl From<IdentityError> for Error {
    fn from(err: IdentityError) -> Self {
        Error::Identity(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::Store(err)
    }
}

/// Result type alias for rowtrack operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_displays() {
        let absent = Error::from(IdentityError::absent_key("book", "id"));
        assert_eq!(
            absent.to_string(),
            "Identity error: primary-key field 'id' has no value on a record of 'book'"
        );

        let ambiguous = Error::from(IdentityError::ambiguous("book", "(7)", 2));
        assert_eq!(
            ambiguous.to_string(),
            "Identity error: 2 records of 'book' share key (7)"
        );
        assert_eq!(
            ambiguous.identity_kind(),
            Some(IdentityErrorKind::Ambiguous)
        );
    }

    #[test]
    fn validation_display_names_collection_and_count() {
        let err = Error::Validation(ValidationError {
            collection: "books".to_string(),
            invalid: 3,
        });
        assert_eq!(
            err.to_string(),
            "Validation error: collection 'books' has 3 invalid record(s)"
        );
    }

    #[test]
    fn store_error_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = Error::from(StoreError::with_source(
            StoreErrorKind::Connection,
            "lost connection",
            io,
        ));

        assert!(err.is_store_error());
        assert_eq!(err.to_string(), "Store error: lost connection");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("pipe closed"));
    }

    #[test]
    fn decode_shorthand_kind() {
        let err = Error::decode("column 'age': expected integer, found text");
        match err {
            Error::Store(e) => assert_eq!(e.kind, StoreErrorKind::Decode),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
