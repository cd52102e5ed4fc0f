//! Core types and traits for rowtrack.
//!
//! This crate provides the foundational abstractions for snapshot-based
//! change tracking:
//!
//! - `Entity` trait for struct-to-row mapping and derived `EntityMeta`
//! - `FieldDef` and `NavigationDef` static metadata tables
//! - `StoreGateway` trait for pluggable backing stores
//! - `Value` and `Record` for dynamically-typed row data
//! - `Validate` hook consulted by the pre-save gate

pub mod entity;
pub mod error;
pub mod field;
pub mod gateway;
pub mod record;
pub mod relation;
pub mod types;
pub mod validate;
pub mod value;

pub use entity::{Entity, EntityMeta, ForeignKey};
pub use error::{
    ConfigurationError, Error, IdentityError, IdentityErrorKind, Result, StoreError,
    StoreErrorKind, ValidationError,
};
pub use field::FieldDef;
pub use gateway::{ConnectionScope, StoreGateway, StoreTransaction};
pub use record::{FromValue, Record, RecordSchema};
pub use relation::{NavigationDef, NavigationKind};
pub use types::{ScalarInfo, ScalarType, ScalarTypeSet};
pub use validate::{Issue, Validate, rules};
pub use value::Value;
