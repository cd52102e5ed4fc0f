//! Backing-store abstraction.
//!
//! A [`StoreGateway`] is a stateful handle to one backing store. Sessions
//! open it for the duration of a load or a save and close it again before
//! returning, using [`ConnectionScope`] so the close runs on every exit
//! path. All statement execution happens inside a [`StoreTransaction`].

use crate::Result;
use crate::record::Record;
use crate::value::Value;

/// A handle to a backing store.
///
/// Implementations are free to map these calls onto SQL, an in-memory
/// table set, or anything else that can produce and accept rows. Fetch
/// calls are only made between a successful [`open`](StoreGateway::open)
/// and the matching [`close`](StoreGateway::close).
pub trait StoreGateway {
    /// Open the underlying connection.
    fn open(&mut self) -> Result<()>;

    /// Close the underlying connection.
    ///
    /// Called exactly once for every successful `open`, including when a
    /// load or save bails out early.
    fn close(&mut self) -> Result<()>;

    /// List the column names of a table.
    fn fetch_column_names(&mut self, table: &str) -> Result<Vec<String>>;

    /// Fetch every row of a table, projected onto `columns`.
    fn fetch_result_set(&mut self, table: &str, columns: &[String]) -> Result<Vec<Record>>;

    /// Begin a transaction.
    ///
    /// The returned transaction borrows the gateway; no other gateway call
    /// may run until it is committed or rolled back.
    fn start_transaction(&mut self) -> Result<Box<dyn StoreTransaction + '_>>;
}

/// A unit of statement execution with all-or-nothing semantics.
///
/// Dropping a transaction without committing must behave like
/// [`rollback`](StoreTransaction::rollback).
pub trait StoreTransaction {
    /// Insert one row per entry of `rows`, each listing a value per column.
    fn insert_records(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<()>;

    /// Update one row per entry of `rows`.
    ///
    /// `key_columns` is a subset of `columns`; a row is matched on its key
    /// column values and assigned the remaining columns.
    fn update_records(
        &mut self,
        table: &str,
        columns: &[String],
        key_columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<()>;

    /// Delete the rows matching each key, one entry of `keys` per row.
    fn delete_records(
        &mut self,
        table: &str,
        key_columns: &[String],
        keys: &[Vec<Value>],
    ) -> Result<()>;

    /// Make every statement in this transaction durable.
    fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every statement in this transaction.
    fn rollback(self: Box<Self>) -> Result<()>;
}

/// Opens a gateway and guarantees the close on drop.
///
/// Close failures during drop are logged rather than raised, so an error
/// already unwinding out of a load or save is not masked.
pub struct ConnectionScope<'a, G: StoreGateway + ?Sized> {
    gateway: &'a mut G,
}

impl<'a, G: StoreGateway + ?Sized> ConnectionScope<'a, G> {
    /// Open `gateway`, returning a scope that closes it again on drop.
    pub fn open(gateway: &'a mut G) -> Result<Self> {
        gateway.open()?;
        Ok(Self { gateway })
    }

    /// Access the open gateway.
    pub fn gateway(&mut self) -> &mut G {
        self.gateway
    }
}

impl<G: StoreGateway + ?Sized> Drop for ConnectionScope<'_, G> {
    fn drop(&mut self) {
        if let Err(e) = self.gateway.close() {
            tracing::warn!(error = %e, "failed to close store gateway");
        }
    }
}
