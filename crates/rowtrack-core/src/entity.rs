//! Entity trait and derived metadata.

use std::collections::HashSet;

use crate::Result;
use crate::error::Error;
use crate::field::FieldDef;
use crate::record::Record;
use crate::relation::NavigationDef;
use crate::types::ScalarTypeSet;
use crate::validate::Validate;
use crate::value::Value;

/// A struct that can be tracked by a session.
///
/// Implementors describe themselves through static [`FieldDef`] and
/// [`NavigationDef`] tables; the session derives an [`EntityMeta`] from
/// those tables when the type is registered, using the session's scalar
/// allow-list to decide which fields are storable.
///
/// `to_record` hands over every field value keyed by field name, whether or
/// not the field is storable; the metadata decides what gets snapshotted and
/// what reaches the store. `from_record` rebuilds a value from a store row
/// keyed by column name. A fetched row carries the intersection of mapped
/// columns and store columns, so non-key reads should tolerate absent
/// columns (see [`Record::get_opt`]).
///
/// # Examples
///
/// ```ignore
/// struct Author {
///     id: i64,
///     name: String,
/// }
///
/// impl Entity for Author {
///     const ENTITY_NAME: &'static str = "author";
///
///     fn fields() -> &'static [FieldDef] {
///         static FIELDS: &[FieldDef] = &[
///             FieldDef::new("id", "id", ScalarType::BigInt).primary_key(true),
///             FieldDef::new("name", "name", ScalarType::Text),
///         ];
///         FIELDS
///     }
///
///     fn to_record(&self) -> Vec<(&'static str, Value)> {
///         vec![
///             ("id", Value::BigInt(self.id)),
///             ("name", Value::Text(self.name.clone())),
///         ]
///     }
///
///     fn from_record(record: &Record) -> Result<Self> {
///         Ok(Self {
///             id: record.get_named("id")?,
///             name: record.get_opt("name")?.unwrap_or_default(),
///         })
///     }
/// }
/// ```
pub trait Entity: Validate + PartialEq + Sized + 'static {
    /// Stable name of this entity, used to target navigations.
    const ENTITY_NAME: &'static str;

    /// Store table override. When `None`, the table is named after the
    /// collection the entity is registered under.
    const TABLE: Option<&'static str> = None;

    /// Static field metadata.
    fn fields() -> &'static [FieldDef];

    /// Static navigation metadata.
    fn navigations() -> &'static [NavigationDef] {
        &[]
    }

    /// Dump every field value, keyed by field name.
    fn to_record(&self) -> Vec<(&'static str, Value)>;

    /// Rebuild a value from a store row, keyed by column name.
    fn from_record(record: &Record) -> Result<Self>;
}

/// A foreign-key field paired with the single-valued navigation it keys.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    /// The field holding the referenced key value.
    pub field: &'static FieldDef,
    /// The navigation the field resolves.
    pub navigation: &'static NavigationDef,
}

/// Metadata derived for one registered entity type.
///
/// Groups the entity's static field table by role: `storable` fields are
/// snapshot-tracked, `mapped` fields additionally own a store column, and
/// `primary_key` fields identify records across both.
#[derive(Debug, Clone)]
pub struct EntityMeta {
    /// `ENTITY_NAME` of the described type.
    pub entity: &'static str,
    /// Store table backing the collection.
    pub table: String,
    /// The full static field table.
    pub fields: &'static [FieldDef],
    /// Fields forming the primary key, in declaration order.
    pub primary_key: Vec<&'static FieldDef>,
    /// Fields whose scalar type is admitted by the session's allow-list.
    pub storable: Vec<&'static FieldDef>,
    /// Storable fields that map to a store column.
    pub mapped: Vec<&'static FieldDef>,
    /// Foreign-key fields paired with the navigations they key.
    pub foreign_keys: Vec<ForeignKey>,
    /// The full static navigation table.
    pub navigations: &'static [NavigationDef],
}

impl EntityMeta {
    /// Derive metadata for `T` registered under `collection`.
    ///
    /// Errors if the field or navigation tables are inconsistent: duplicate
    /// names, a missing or unusable primary key, or foreign keys that do not
    /// line up with a single-valued navigation.
    pub fn derive<T: Entity>(collection: &str, scalars: &ScalarTypeSet) -> Result<Self> {
        let entity = T::ENTITY_NAME;
        let fields = T::fields();
        let navigations = T::navigations();

        let table = T::TABLE.unwrap_or(collection).to_string();
        if table.is_empty() {
            return Err(Error::configuration(entity, "table name is empty"));
        }

        let mut seen_fields = HashSet::new();
        for field in fields {
            if !seen_fields.insert(field.name) {
                return Err(Error::configuration(
                    entity,
                    format!("duplicate field '{}'", field.name),
                ));
            }
        }

        let storable: Vec<&'static FieldDef> =
            fields.iter().filter(|f| scalars.contains(f.scalar)).collect();
        let mapped: Vec<&'static FieldDef> =
            storable.iter().copied().filter(|f| !f.excluded).collect();

        let mut seen_columns = HashSet::new();
        for field in &mapped {
            if !seen_columns.insert(field.column) {
                return Err(Error::configuration(
                    entity,
                    format!("duplicate column '{}'", field.column),
                ));
            }
        }

        let primary_key: Vec<&'static FieldDef> =
            fields.iter().filter(|f| f.primary_key).collect();
        if primary_key.is_empty() {
            return Err(Error::configuration(entity, "no primary-key field"));
        }
        for pk in &primary_key {
            if !scalars.contains(pk.scalar) {
                return Err(Error::configuration(
                    entity,
                    format!(
                        "primary-key field '{}' has scalar type '{}' outside the storable set",
                        pk.name,
                        pk.scalar.name()
                    ),
                ));
            }
            if pk.excluded {
                return Err(Error::configuration(
                    entity,
                    format!("primary-key field '{}' is excluded from the store mapping", pk.name),
                ));
            }
        }

        let mut seen_navs = HashSet::new();
        for nav in navigations {
            if !seen_navs.insert(nav.field) {
                return Err(Error::configuration(
                    entity,
                    format!("duplicate navigation '{}'", nav.field),
                ));
            }
        }

        let mut foreign_keys: Vec<ForeignKey> = Vec::new();
        for field in fields {
            let Some(nav_name) = field.foreign_key else {
                continue;
            };
            let nav = navigations
                .iter()
                .find(|n| n.field == nav_name)
                .ok_or_else(|| {
                    Error::configuration(
                        entity,
                        format!(
                            "field '{}' references unknown navigation '{}'",
                            field.name, nav_name
                        ),
                    )
                })?;
            if !nav.is_single() {
                return Err(Error::configuration(
                    entity,
                    format!(
                        "field '{}' references collection navigation '{}'",
                        field.name, nav_name
                    ),
                ));
            }
            if foreign_keys.iter().any(|fk| fk.navigation.field == nav_name) {
                return Err(Error::configuration(
                    entity,
                    format!("navigation '{}' is keyed by more than one field", nav_name),
                ));
            }
            foreign_keys.push(ForeignKey {
                field,
                navigation: nav,
            });
        }

        for nav in navigations {
            if nav.is_single() && !foreign_keys.iter().any(|fk| fk.navigation.field == nav.field) {
                return Err(Error::configuration(
                    entity,
                    format!("single navigation '{}' has no foreign-key field", nav.field),
                ));
            }
        }

        Ok(Self {
            entity,
            table,
            fields,
            primary_key,
            storable,
            mapped,
            foreign_keys,
            navigations,
        })
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a navigation by name.
    pub fn navigation(&self, name: &str) -> Option<&'static NavigationDef> {
        self.navigations.iter().find(|n| n.field == name)
    }

    /// A junction joins two entities: its primary key is composite over
    /// exactly two foreign-key fields.
    pub fn is_junction(&self) -> bool {
        self.primary_key.len() == 2 && self.primary_key.iter().all(|f| f.foreign_key.is_some())
    }

    /// Column names of the primary-key fields, in declaration order.
    pub fn primary_key_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.primary_key.iter().map(|f| f.column)
    }

    /// Column names of the mapped fields, in declaration order.
    pub fn mapped_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.mapped.iter().map(|f| f.column)
    }
}
