//! Shared mock entities and a preset-rows gateway for unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use rowtrack_core::entity::{Entity, EntityMeta};
use rowtrack_core::error::{StoreError, StoreErrorKind};
use rowtrack_core::validate::{Issue, rules};
use rowtrack_core::{
    FieldDef, NavigationDef, Record, RecordSchema, Result, ScalarType, ScalarTypeSet,
    StoreGateway, StoreTransaction, Validate, Value,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Author {
    pub id: Option<i64>,
    pub name: String,
}

impl Validate for Author {
    fn validate(&self) -> Vec<Issue> {
        let mut issues = Vec::new();
        rules::required(&mut issues, "name", &self.name);
        issues
    }
}

impl Entity for Author {
    const ENTITY_NAME: &'static str = "author";

    fn fields() -> &'static [FieldDef] {
        static FIELDS: &[FieldDef] = &[
            FieldDef::new("id", "id", ScalarType::BigInt)
                .primary_key(true)
                .nullable(true),
            FieldDef::new("name", "name", ScalarType::Text),
        ];
        FIELDS
    }

    fn navigations() -> &'static [NavigationDef] {
        static NAVS: &[NavigationDef] = &[NavigationDef::collection("books", "book")];
        NAVS
    }

    fn to_record(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::from(self.id)),
            ("name", Value::Text(self.name.clone())),
        ]
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.get_opt("id")?,
            name: record.get_opt("name")?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Book {
    pub id: Option<i64>,
    pub title: String,
    pub author_id: Option<i64>,
    /// Tracked but never mapped to a column.
    pub notes: String,
}

impl Validate for Book {
    fn validate(&self) -> Vec<Issue> {
        let mut issues = Vec::new();
        rules::required(&mut issues, "title", &self.title);
        issues
    }
}

impl Entity for Book {
    const ENTITY_NAME: &'static str = "book";

    fn fields() -> &'static [FieldDef] {
        static FIELDS: &[FieldDef] = &[
            FieldDef::new("id", "id", ScalarType::BigInt)
                .primary_key(true)
                .nullable(true),
            FieldDef::new("title", "title", ScalarType::Text),
            FieldDef::new("author_id", "author_id", ScalarType::BigInt)
                .nullable(true)
                .foreign_key("author"),
            FieldDef::new("notes", "notes", ScalarType::Text).excluded(true),
        ];
        FIELDS
    }

    fn navigations() -> &'static [NavigationDef] {
        static NAVS: &[NavigationDef] = &[
            NavigationDef::single("author", "author"),
            NavigationDef::collection("tags", "tag"),
        ];
        NAVS
    }

    fn to_record(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::from(self.id)),
            ("title", Value::Text(self.title.clone())),
            ("author_id", Value::from(self.author_id)),
            ("notes", Value::Text(self.notes.clone())),
        ]
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.get_opt("id")?,
            title: record.get_opt("title")?.unwrap_or_default(),
            author_id: record.get_opt("author_id")?,
            notes: record.get_opt("notes")?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Tag {
    pub id: Option<i64>,
    pub label: String,
}

impl Validate for Tag {}

impl Entity for Tag {
    const ENTITY_NAME: &'static str = "tag";

    fn fields() -> &'static [FieldDef] {
        static FIELDS: &[FieldDef] = &[
            FieldDef::new("id", "id", ScalarType::BigInt)
                .primary_key(true)
                .nullable(true),
            FieldDef::new("label", "label", ScalarType::Text),
        ];
        FIELDS
    }

    fn navigations() -> &'static [NavigationDef] {
        static NAVS: &[NavigationDef] = &[NavigationDef::collection("books", "book")];
        NAVS
    }

    fn to_record(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::from(self.id)),
            ("label", Value::Text(self.label.clone())),
        ]
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.get_opt("id")?,
            label: record.get_opt("label")?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct BookTag {
    pub book_id: i64,
    pub tag_id: i64,
}

impl Validate for BookTag {}

impl Entity for BookTag {
    const ENTITY_NAME: &'static str = "book_tag";

    fn fields() -> &'static [FieldDef] {
        static FIELDS: &[FieldDef] = &[
            FieldDef::new("book_id", "book_id", ScalarType::BigInt)
                .primary_key(true)
                .foreign_key("book"),
            FieldDef::new("tag_id", "tag_id", ScalarType::BigInt)
                .primary_key(true)
                .foreign_key("tag"),
        ];
        FIELDS
    }

    fn navigations() -> &'static [NavigationDef] {
        static NAVS: &[NavigationDef] = &[
            NavigationDef::single("book", "book"),
            NavigationDef::single("tag", "tag"),
        ];
        NAVS
    }

    fn to_record(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("book_id", Value::BigInt(self.book_id)),
            ("tag_id", Value::BigInt(self.tag_id)),
        ]
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            book_id: record.get_named("book_id")?,
            tag_id: record.get_named("tag_id")?,
        })
    }
}

pub(crate) fn author_meta() -> EntityMeta {
    EntityMeta::derive::<Author>("authors", &ScalarTypeSet::classic()).unwrap()
}

pub(crate) fn book_meta() -> EntityMeta {
    EntityMeta::derive::<Book>("books", &ScalarTypeSet::classic()).unwrap()
}

pub(crate) fn tag_meta() -> EntityMeta {
    EntityMeta::derive::<Tag>("tags", &ScalarTypeSet::classic()).unwrap()
}

pub(crate) fn book_tag_meta() -> EntityMeta {
    EntityMeta::derive::<BookTag>("book_tags", &ScalarTypeSet::classic()).unwrap()
}

/// A gateway serving preset rows, with a no-op transaction.
pub(crate) struct TableGateway {
    tables: HashMap<String, (Vec<String>, Vec<Vec<Value>>)>,
    opened: bool,
}

impl TableGateway {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            opened: false,
        }
    }

    pub fn table(mut self, name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let columns = columns.iter().map(|c| (*c).to_string()).collect();
        self.tables.insert(name.to_string(), (columns, rows));
        self
    }

    fn require_open(&self) -> Result<()> {
        if self.opened {
            Ok(())
        } else {
            Err(StoreError::new(StoreErrorKind::Connection, "gateway not open").into())
        }
    }
}

impl StoreGateway for TableGateway {
    fn open(&mut self) -> Result<()> {
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.opened = false;
        Ok(())
    }

    fn fetch_column_names(&mut self, table: &str) -> Result<Vec<String>> {
        self.require_open()?;
        let (columns, _) = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::new(StoreErrorKind::Fetch, format!("unknown table '{table}'")))?;
        Ok(columns.clone())
    }

    fn fetch_result_set(&mut self, table: &str, columns: &[String]) -> Result<Vec<Record>> {
        self.require_open()?;
        let (stored, rows) = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::new(StoreErrorKind::Fetch, format!("unknown table '{table}'")))?;
        let indices = columns
            .iter()
            .map(|c| {
                stored.iter().position(|s| s == c).ok_or_else(|| {
                    StoreError::new(StoreErrorKind::Fetch, format!("unknown column '{c}'")).into()
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let schema = Arc::new(RecordSchema::new(columns.to_vec()));
        Ok(rows
            .iter()
            .map(|row| {
                Record::with_schema(
                    Arc::clone(&schema),
                    indices.iter().map(|&i| row[i].clone()).collect(),
                )
            })
            .collect())
    }

    fn start_transaction(&mut self) -> Result<Box<dyn StoreTransaction + '_>> {
        self.require_open()?;
        Ok(Box::new(NoopTransaction))
    }
}

struct NoopTransaction;

impl StoreTransaction for NoopTransaction {
    fn insert_records(
        &mut self,
        _table: &str,
        _columns: &[String],
        _rows: &[Vec<Value>],
    ) -> Result<()> {
        Ok(())
    }

    fn update_records(
        &mut self,
        _table: &str,
        _columns: &[String],
        _key_columns: &[String],
        _rows: &[Vec<Value>],
    ) -> Result<()> {
        Ok(())
    }

    fn delete_records(
        &mut self,
        _table: &str,
        _key_columns: &[String],
        _keys: &[Vec<Value>],
    ) -> Result<()> {
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
