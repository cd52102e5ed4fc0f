//! Store-facing passes shared by every registered collection.

use std::any::Any;

use rowtrack_core::entity::{Entity, EntityMeta};
use rowtrack_core::error::Error;
use rowtrack_core::{Result, StoreGateway, StoreTransaction, Value};

use crate::collection::TrackedCollection;
use crate::session::SessionConfig;

/// Row counts from one collection's share of a save.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PersistReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// One registered collection, seen without its record type.
///
/// The session drives loading and saving through this surface so that
/// collections of different entity types can share one pass order.
pub(crate) trait Persistable {
    fn name(&self) -> &str;

    fn meta(&self) -> &EntityMeta;

    /// Records failing their own validation rules.
    fn invalid_count(&self) -> usize;

    /// Pull the collection's table from the store and capture a baseline.
    fn load(&mut self, gateway: &mut dyn StoreGateway) -> Result<()>;

    /// Write pending insertions, modifications, and deletions, in that
    /// order, into an open transaction.
    fn persist(
        &self,
        tx: &mut dyn StoreTransaction,
        config: &SessionConfig,
    ) -> Result<PersistReport>;

    /// Rebuild the baseline from the held records and drop pending marks.
    fn refresh(&mut self) -> Result<()>;

    /// Dump every held record, in arena order.
    fn live_rows(&self) -> Vec<Vec<(&'static str, Value)>>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Entity> Persistable for TrackedCollection<T> {
    fn name(&self) -> &str {
        self.name()
    }

    fn meta(&self) -> &EntityMeta {
        self.meta()
    }

    fn invalid_count(&self) -> usize {
        self.invalid_count()
    }

    fn load(&mut self, gateway: &mut dyn StoreGateway) -> Result<()> {
        let table = self.meta().table.clone();
        let stored = gateway.fetch_column_names(&table)?;

        for column in self.meta().primary_key_columns() {
            if !stored.iter().any(|s| s == column) {
                return Err(Error::configuration(
                    self.meta().entity,
                    format!("store table '{table}' is missing key column '{column}'"),
                ));
            }
        }

        // Mapped columns absent from the table are left out of the load
        // and of every later write.
        let columns: Vec<String> = self
            .meta()
            .mapped_columns()
            .filter(|column| stored.iter().any(|s| s == column))
            .map(str::to_string)
            .collect();
        if columns.len() < self.meta().mapped.len() {
            tracing::debug!(
                collection = %TrackedCollection::name(self),
                missing = self.meta().mapped.len() - columns.len(),
                "mapped columns absent from store table"
            );
        }

        let fetched = gateway.fetch_result_set(&table, &columns)?;
        tracing::debug!(
            collection = %TrackedCollection::name(self),
            table = %table,
            rows = fetched.len(),
            "result set loaded"
        );
        let mut records = Vec::with_capacity(fetched.len());
        for record in &fetched {
            records.push(T::from_record(record)?);
        }
        self.set_columns(columns);
        self.install(records)
    }

    fn persist(
        &self,
        tx: &mut dyn StoreTransaction,
        config: &SessionConfig,
    ) -> Result<PersistReport> {
        let table = self.meta().table.clone();
        let columns = self.columns().to_vec();
        let key_columns: Vec<String> = self
            .meta()
            .primary_key_columns()
            .map(str::to_string)
            .collect();

        let insert_rows: Vec<Vec<Value>> = self
            .pending_inserts()
            .into_iter()
            .map(|record| self.column_values(record))
            .collect();
        let update_rows: Vec<Vec<Value>> = self
            .modified_records(config.exclude_removed_from_diff)?
            .into_iter()
            .map(|record| self.column_values(record))
            .collect();
        let delete_keys = self.removed_key_rows();
        tracing::debug!(
            collection = %TrackedCollection::name(self),
            inserts = insert_rows.len(),
            updates = update_rows.len(),
            deletes = delete_keys.len(),
            "writing pending changes"
        );

        let mut report = PersistReport::default();
        if !insert_rows.is_empty() {
            tx.insert_records(&table, &columns, &insert_rows)?;
            report.inserted = insert_rows.len();
        }
        if !update_rows.is_empty() {
            tx.update_records(&table, &columns, &key_columns, &update_rows)?;
            report.updated = update_rows.len();
        }
        if !delete_keys.is_empty() {
            tx.delete_records(&table, &key_columns, &delete_keys)?;
            report.deleted = delete_keys.len();
        }
        Ok(report)
    }

    fn refresh(&mut self) -> Result<()> {
        self.recapture()
    }

    fn live_rows(&self) -> Vec<Vec<(&'static str, Value)>> {
        self.live_rows()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
