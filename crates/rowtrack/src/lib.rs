//! rowtrack - snapshot-based change tracking over record stores.
//!
//! rowtrack loads typed collections from a backing store, watches them
//! change in memory, resolves the navigations declared between them,
//! and writes everything back in one transaction:
//!
//! - Entity metadata derived from plain structs and checked up front
//! - Baseline snapshots, with modifications found by diffing live records
//! - Navigation between collections, directly or across a junction type
//! - One-transaction saves with a validation gate and rollback on failure
//! - Pluggable store gateways behind a small trait surface
//!
//! # Quick Start
//!
//! ```ignore
//! use rowtrack::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Hero {
//!     id: Option<i64>,
//!     name: String,
//! }
//!
//! // impl Entity for Hero and impl Validate for Hero omitted;
//! // see the `Entity` docs for the full shape.
//!
//! fn rename_all(gateway: impl StoreGateway) -> Result<()> {
//!     let mut session = Session::builder(gateway)
//!         .collection::<Hero>("heroes")
//!         .build()?;
//!
//!     for hero in session.collection_mut::<Hero>().unwrap().iter_mut() {
//!         hero.name = hero.name.to_uppercase();
//!     }
//!     session.save()?;
//!     Ok(())
//! }
//! ```

// Re-export the public types from the member crates
pub use rowtrack_core::{
    // Errors
    ConfigurationError,
    ConnectionScope,
    // Entity metadata
    Entity,
    EntityMeta,
    Error,
    FieldDef,
    ForeignKey,
    FromValue,
    IdentityError,
    IdentityErrorKind,
    Issue,
    NavigationDef,
    NavigationKind,
    // Row data
    Record,
    RecordSchema,
    Result,
    ScalarInfo,
    ScalarType,
    ScalarTypeSet,
    StoreError,
    StoreErrorKind,
    // Store surface
    StoreGateway,
    StoreTransaction,
    // Validation
    Validate,
    ValidationError,
    Value,
};
pub use rowtrack_core::validate::rules;

pub use rowtrack_session::{
    ChangeTracker, IdentityKey, RecordId, SaveReport, Session, SessionBuilder, SessionConfig,
    Snapshot, TrackedCollection,
};

/// Everything a typical caller needs in one import.
///
/// ```ignore
/// use rowtrack::prelude::*;
/// ```
pub mod prelude {
    pub use crate::rules;
    pub use crate::{
        Entity, Error, FieldDef, IdentityKey, NavigationDef, Record, Result, SaveReport,
        ScalarType, ScalarTypeSet, Session, SessionBuilder, SessionConfig, StoreGateway,
        TrackedCollection, Validate, Value,
    };
}
