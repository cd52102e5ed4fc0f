//! An in-memory store gateway with transactional snapshots.
//!
//! Tables live behind a shared handle, so a cloned gateway reads and
//! writes the same rows. Transactions snapshot every table when they
//! start and restore the snapshot on rollback or when dropped without
//! finishing. Any store operation can be armed to fail once, which is
//! what the session tests lean on.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rowtrack_core::error::{StoreError, StoreErrorKind};
use rowtrack_core::{Record, RecordSchema, Result, StoreGateway, StoreTransaction, Value};

/// A store operation that can be armed to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOp {
    Connect,
    FetchColumns,
    FetchRows,
    Begin,
    Insert,
    Update,
    Delete,
    Commit,
    Rollback,
}

impl FailOp {
    fn kind(self) -> StoreErrorKind {
        match self {
            FailOp::Connect => StoreErrorKind::Connection,
            FailOp::FetchColumns | FailOp::FetchRows => StoreErrorKind::Fetch,
            FailOp::Insert | FailOp::Update | FailOp::Delete => StoreErrorKind::Statement,
            FailOp::Begin | FailOp::Commit | FailOp::Rollback => StoreErrorKind::Transaction,
        }
    }
}

#[derive(Debug, Clone)]
struct MemTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    tables: BTreeMap<String, MemTable>,
    armed: Vec<(FailOp, Option<String>)>,
}

impl StoreInner {
    fn check_failure(&mut self, op: FailOp, table: Option<&str>) -> Result<()> {
        let hit = self.armed.iter().position(|(wanted, filter)| {
            *wanted == op
                && match filter {
                    None => true,
                    Some(name) => table == Some(name.as_str()),
                }
        });
        if let Some(index) = hit {
            self.armed.remove(index);
            let detail = table.map(|t| format!(" on '{t}'")).unwrap_or_default();
            return Err(
                StoreError::new(op.kind(), format!("armed {op:?} failure{detail}")).into(),
            );
        }
        Ok(())
    }

    fn table_mut(&mut self, name: &str, kind: StoreErrorKind) -> Result<&mut MemTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::new(kind, format!("no table '{name}'")).into())
    }
}

fn lock(inner: &Mutex<StoreInner>) -> MutexGuard<'_, StoreInner> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

fn column_positions(table: &MemTable, name: &str, columns: &[String]) -> Result<Vec<usize>> {
    columns
        .iter()
        .map(|column| {
            table.columns.iter().position(|s| s == column).ok_or_else(|| {
                StoreError::new(
                    StoreErrorKind::Statement,
                    format!("no column '{column}' in '{name}'"),
                )
                .into()
            })
        })
        .collect()
}

/// A gateway over shared in-memory tables.
///
/// Cloning is cheap and shares the table data; the open state stays
/// per handle. This backs the integration tests, standing in for a
/// relational store without any of its setup.
#[derive(Debug, Clone)]
pub struct MemoryGateway {
    inner: Arc<Mutex<StoreInner>>,
    opened: bool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            opened: false,
        }
    }

    /// Create or replace a table with the given columns and no rows.
    pub fn create_table(&self, name: &str, columns: &[&str]) {
        let table = MemTable {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows: Vec::new(),
        };
        lock(&self.inner).tables.insert(name.to_string(), table);
    }

    /// Append rows given in the table's own column order.
    pub fn seed_rows(&self, name: &str, rows: Vec<Vec<Value>>) -> Result<()> {
        let mut inner = lock(&self.inner);
        inner
            .table_mut(name, StoreErrorKind::Statement)?
            .rows
            .extend(rows);
        Ok(())
    }

    /// Snapshot a table's rows for inspection.
    pub fn rows(&self, name: &str) -> Result<Vec<Vec<Value>>> {
        let mut inner = lock(&self.inner);
        Ok(inner.table_mut(name, StoreErrorKind::Fetch)?.rows.clone())
    }

    /// Arm the next matching operation, on any table, to fail.
    ///
    /// Armed failures stack; each fires once, in arming order per
    /// operation.
    pub fn fail_once(&self, op: FailOp) {
        lock(&self.inner).armed.push((op, None));
    }

    /// Arm the next matching operation against `table` to fail.
    pub fn fail_once_on(&self, op: FailOp, table: &str) {
        lock(&self.inner).armed.push((op, Some(table.to_string())));
    }

    fn require_open(&self) -> Result<()> {
        if self.opened {
            Ok(())
        } else {
            Err(StoreError::new(StoreErrorKind::Connection, "gateway not open").into())
        }
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreGateway for MemoryGateway {
    fn open(&mut self) -> Result<()> {
        lock(&self.inner).check_failure(FailOp::Connect, None)?;
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.opened = false;
        Ok(())
    }

    fn fetch_column_names(&mut self, table: &str) -> Result<Vec<String>> {
        self.require_open()?;
        let mut inner = lock(&self.inner);
        inner.check_failure(FailOp::FetchColumns, Some(table))?;
        Ok(inner.table_mut(table, StoreErrorKind::Fetch)?.columns.clone())
    }

    fn fetch_result_set(&mut self, table: &str, columns: &[String]) -> Result<Vec<Record>> {
        self.require_open()?;
        let mut inner = lock(&self.inner);
        inner.check_failure(FailOp::FetchRows, Some(table))?;
        let held = inner.table_mut(table, StoreErrorKind::Fetch)?;
        let indices = columns
            .iter()
            .map(|column| {
                held.columns.iter().position(|s| s == column).ok_or_else(|| {
                    StoreError::new(
                        StoreErrorKind::Fetch,
                        format!("no column '{column}' in '{table}'"),
                    )
                    .into()
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let schema = Arc::new(RecordSchema::new(columns.to_vec()));
        Ok(held
            .rows
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
        let mut inner = lock(&self.inner);
        inner.check_failure(FailOp::Begin, None)?;
        let saved = inner.tables.clone();
        drop(inner);
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            saved: Some(saved),
            finished: false,
        }))
    }
}

struct MemoryTransaction {
    inner: Arc<Mutex<StoreInner>>,
    saved: Option<BTreeMap<String, MemTable>>,
    finished: bool,
}

impl MemoryTransaction {
    fn restore(&mut self) {
        if let Some(saved) = self.saved.take() {
            lock(&self.inner).tables = saved;
        }
        self.finished = true;
    }
}

impl StoreTransaction for MemoryTransaction {
    fn insert_records(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<()> {
        let mut inner = lock(&self.inner);
        inner.check_failure(FailOp::Insert, Some(table))?;
        let held = inner.table_mut(table, StoreErrorKind::Statement)?;
        let positions = column_positions(held, table, columns)?;
        for row in rows {
            let mut stored = vec![Value::Null; held.columns.len()];
            for (value, &position) in row.iter().zip(&positions) {
                stored[position] = value.clone();
            }
            held.rows.push(stored);
        }
        Ok(())
    }

    fn update_records(
        &mut self,
        table: &str,
        columns: &[String],
        key_columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<()> {
        let mut inner = lock(&self.inner);
        inner.check_failure(FailOp::Update, Some(table))?;
        let held = inner.table_mut(table, StoreErrorKind::Statement)?;
        let positions = column_positions(held, table, columns)?;
        let key_positions = key_columns
            .iter()
            .map(|key| {
                columns.iter().position(|c| c == key).ok_or_else(|| {
                    StoreError::new(
                        StoreErrorKind::Statement,
                        format!("key column '{key}' is not among the written columns"),
                    )
                    .into()
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        for row in rows {
            let keys: Vec<(usize, &Value)> = key_positions
                .iter()
                .map(|&at| (positions[at], &row[at]))
                .collect();
            // A null key addresses no stored row.
            if keys.iter().any(|(_, value)| value.is_null()) {
                continue;
            }
            for stored in held.rows.iter_mut().filter(|stored| {
                keys.iter()
                    .all(|&(position, value)| stored[position].same_as(value))
            }) {
                for (i, &position) in positions.iter().enumerate() {
                    stored[position] = row[i].clone();
                }
            }
        }
        Ok(())
    }

    fn delete_records(
        &mut self,
        table: &str,
        key_columns: &[String],
        keys: &[Vec<Value>],
    ) -> Result<()> {
        let mut inner = lock(&self.inner);
        inner.check_failure(FailOp::Delete, Some(table))?;
        let held = inner.table_mut(table, StoreErrorKind::Statement)?;
        let key_positions = column_positions(held, table, key_columns)?;
        for key in keys {
            if key.iter().any(Value::is_null) {
                continue;
            }
            held.rows.retain(|stored| {
                !key_positions
                    .iter()
                    .zip(key)
                    .all(|(&position, value)| stored[position].same_as(value))
            });
        }
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        let armed = lock(&self.inner).check_failure(FailOp::Commit, None);
        match armed {
            Ok(()) => {
                self.saved = None;
                self.finished = true;
                Ok(())
            }
            Err(err) => {
                self.restore();
                Err(err)
            }
        }
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        let armed = lock(&self.inner).check_failure(FailOp::Rollback, None);
        match armed {
            Ok(()) => {
                self.restore();
                Ok(())
            }
            Err(err) => {
                // A failed rollback leaves whatever the transaction wrote.
                self.saved = None;
                self.finished = true;
                Err(err)
            }
        }
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("rolling back an abandoned transaction");
            self.restore();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryGateway {
        let store = MemoryGateway::new();
        store.create_table("users", &["id", "name"]);
        store
            .seed_rows(
                "users",
                vec![
                    vec![Value::BigInt(1), Value::Text("alice".into())],
                    vec![Value::BigInt(2), Value::Text("bob".into())],
                ],
            )
            .unwrap();
        store
    }

    fn strings(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| (*c).to_string()).collect()
    }

    #[test]
    fn test_fetch_projects_the_requested_columns() {
        let mut store = sample();
        store.open().unwrap();
        let records = store
            .fetch_result_set("users", &strings(&["name"]))
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get_named::<String>("name").unwrap(), "alice");
    }

    #[test]
    fn test_operations_require_an_open_gateway() {
        let mut store = sample();
        let err = store.fetch_column_names("users").unwrap_err();
        assert!(err.to_string().contains("not open"));
    }

    #[test]
    fn test_insert_fills_missing_columns_with_null() {
        let mut store = sample();
        store.open().unwrap();
        let mut tx = store.start_transaction().unwrap();
        tx.insert_records(
            "users",
            &strings(&["name"]),
            &[vec![Value::Text("carol".into())]],
        )
        .unwrap();
        tx.commit().unwrap();

        let rows = store.rows("users").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec![Value::Null, Value::Text("carol".into())]);
    }

    #[test]
    fn test_update_matches_on_keys_and_skips_null_keys() {
        let mut store = sample();
        store.open().unwrap();
        let mut tx = store.start_transaction().unwrap();
        tx.update_records(
            "users",
            &strings(&["id", "name"]),
            &strings(&["id"]),
            &[
                vec![Value::BigInt(1), Value::Text("alicia".into())],
                vec![Value::Null, Value::Text("ghost".into())],
            ],
        )
        .unwrap();
        tx.commit().unwrap();

        let rows = store.rows("users").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], Value::Text("alicia".into()));
        assert_eq!(rows[1][1], Value::Text("bob".into()));
    }

    #[test]
    fn test_unmatched_writes_touch_nothing() {
        let mut store = sample();
        store.open().unwrap();
        let mut tx = store.start_transaction().unwrap();
        tx.update_records(
            "users",
            &strings(&["id", "name"]),
            &strings(&["id"]),
            &[vec![Value::BigInt(99), Value::Text("nobody".into())]],
        )
        .unwrap();
        tx.delete_records("users", &strings(&["id"]), &[vec![Value::BigInt(99)]])
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(store.rows("users").unwrap().len(), 2);
    }

    #[test]
    fn test_delete_removes_matching_rows() {
        let mut store = sample();
        store.open().unwrap();
        let mut tx = store.start_transaction().unwrap();
        tx.delete_records("users", &strings(&["id"]), &[vec![Value::BigInt(1)]])
            .unwrap();
        tx.commit().unwrap();

        let rows = store.rows("users").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], Value::BigInt(2));
    }

    #[test]
    fn test_rollback_restores_the_snapshot() {
        let mut store = sample();
        store.open().unwrap();
        let mut tx = store.start_transaction().unwrap();
        tx.delete_records("users", &strings(&["id"]), &[vec![Value::BigInt(1)]])
            .unwrap();
        tx.rollback().unwrap();

        assert_eq!(store.rows("users").unwrap().len(), 2);
    }

    #[test]
    fn test_dropping_a_transaction_rolls_back() {
        let mut store = sample();
        store.open().unwrap();
        let mut tx = store.start_transaction().unwrap();
        tx.delete_records("users", &strings(&["id"]), &[vec![Value::BigInt(1)]])
            .unwrap();
        drop(tx);

        assert_eq!(store.rows("users").unwrap().len(), 2);
    }

    #[test]
    fn test_commit_failure_restores_the_snapshot() {
        let mut store = sample();
        store.fail_once(FailOp::Commit);
        store.open().unwrap();
        let mut tx = store.start_transaction().unwrap();
        tx.insert_records(
            "users",
            &strings(&["id", "name"]),
            &[vec![Value::BigInt(3), Value::Text("carol".into())]],
        )
        .unwrap();
        assert!(tx.commit().is_err());

        assert_eq!(store.rows("users").unwrap().len(), 2);
    }

    #[test]
    fn test_armed_failures_fire_once() {
        let mut store = sample();
        store.fail_once_on(FailOp::Insert, "users");
        store.open().unwrap();
        let mut tx = store.start_transaction().unwrap();
        let rows = [vec![Value::BigInt(3), Value::Text("carol".into())]];
        assert!(
            tx.insert_records("users", &strings(&["id", "name"]), &rows)
                .is_err()
        );
        tx.insert_records("users", &strings(&["id", "name"]), &rows)
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(store.rows("users").unwrap().len(), 3);
    }
}
