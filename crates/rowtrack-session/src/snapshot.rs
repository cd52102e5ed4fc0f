//! Baseline snapshots and change computation.

use std::collections::BTreeSet;

use rowtrack_core::entity::EntityMeta;
use rowtrack_core::error::IdentityError;
use rowtrack_core::{Result, Value};

use crate::collection::RecordId;
use crate::key::{IdentityKey, extract_key, extract_key_lenient, field_value};

const UNSET: &Value = &Value::Null;

/// A record's storable field values as they stood at capture time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    key: IdentityKey,
    fields: Vec<(&'static str, Value)>,
}

impl Snapshot {
    /// The captured record's identity.
    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    /// A captured field value by field name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        field_value(&self.fields, name)
    }
}

/// Snapshot-based change store for one collection.
///
/// The baseline is captured when records enter the session, at load and at
/// refresh. Adds and removals are marked as they happen; modifications are
/// computed on demand by scanning the baseline against live values. Records
/// without a baseline entry are never scanned, so fresh additions carry no
/// diff cost and may hold unset keys.
pub struct ChangeTracker<T> {
    entity: &'static str,
    baseline: Vec<Snapshot>,
    added: BTreeSet<RecordId>,
    removed: Vec<(T, IdentityKey)>,
}

impl<T> ChangeTracker<T> {
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            baseline: Vec::new(),
            added: BTreeSet::new(),
            removed: Vec::new(),
        }
    }

    /// Capture a fresh baseline from dumped live rows, replacing the
    /// previous one and clearing pending marks.
    ///
    /// Every row must carry its full key; a record cannot enter the
    /// baseline anonymously.
    #[tracing::instrument(level = "trace", skip(self, meta, rows), fields(entity = self.entity))]
    pub fn capture(
        &mut self,
        meta: &EntityMeta,
        rows: &[Vec<(&'static str, Value)>],
    ) -> Result<()> {
        let mut baseline = Vec::with_capacity(rows.len());
        for row in rows {
            let key = extract_key(meta, row)?;
            tracing::trace!(key = %key, "snapshot taken");
            let fields = meta
                .storable
                .iter()
                .map(|f| {
                    (
                        f.name,
                        field_value(row, f.name).cloned().unwrap_or(Value::Null),
                    )
                })
                .collect();
            baseline.push(Snapshot { key, fields });
        }
        self.baseline = baseline;
        self.added.clear();
        self.removed.clear();
        tracing::debug!(baseline = self.baseline.len(), "baseline captured");
        Ok(())
    }

    /// Number of baseline entries.
    pub fn baseline_len(&self) -> usize {
        self.baseline.len()
    }

    /// Mark an arena entry as pending insertion.
    pub fn mark_added(&mut self, id: RecordId) {
        tracing::trace!(entity = self.entity, id = id.0, "record marked added");
        self.added.insert(id);
    }

    /// Check whether an arena entry is pending insertion.
    pub fn is_added(&self, id: RecordId) -> bool {
        self.added.contains(&id)
    }

    /// Ids marked as pending insertion, in id order.
    ///
    /// Ids whose records have since left the arena stay marked; callers
    /// skip the ones they cannot resolve.
    pub fn added_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.added.iter().copied()
    }

    /// Store a record that left the arena, pending deletion.
    pub fn mark_removed(&mut self, record: T, key: IdentityKey) {
        tracing::trace!(entity = self.entity, key = %key, "record marked removed");
        self.removed.push((record, key));
    }

    /// Keys of the records pending deletion, in removal order.
    pub fn removed_keys(&self) -> impl Iterator<Item = &IdentityKey> {
        self.removed.iter().map(|(_, key)| key)
    }

    /// Number of records pending deletion.
    pub fn removed_len(&self) -> usize {
        self.removed.len()
    }

    /// Scan the baseline against dumped live rows and return the positions
    /// of rows whose storable fields changed.
    ///
    /// Each baseline entry must match exactly one live row by key:
    /// zero matches or several are identity errors. Removed records leave
    /// their baseline entries behind, so by default a removal makes the
    /// scan fail; `exclude_removed` skips the baseline entries whose keys
    /// were carried out by a removal.
    #[tracing::instrument(level = "debug", skip(self, meta, live), fields(entity = self.entity))]
    pub fn compute_modified(
        &self,
        meta: &EntityMeta,
        live: &[Vec<(&'static str, Value)>],
        exclude_removed: bool,
    ) -> Result<Vec<usize>> {
        let live_keys: Vec<IdentityKey> =
            live.iter().map(|row| extract_key_lenient(meta, row)).collect();

        let mut modified = Vec::new();
        for snapshot in &self.baseline {
            if exclude_removed && self.removed.iter().any(|(_, k)| k == snapshot.key()) {
                continue;
            }

            let matches: Vec<usize> = live_keys
                .iter()
                .enumerate()
                .filter(|(_, k)| *k == snapshot.key())
                .map(|(i, _)| i)
                .collect();

            match matches.as_slice() {
                [] => {
                    return Err(IdentityError::no_match(
                        self.entity,
                        snapshot.key().to_string(),
                    )
                    .into());
                }
                [index] => {
                    let row = &live[*index];
                    let changed = meta.storable.iter().any(|f| {
                        let before = snapshot.field(f.name).unwrap_or(UNSET);
                        let after = field_value(row, f.name).unwrap_or(UNSET);
                        !before.same_as(after)
                    });
                    if changed {
                        modified.push(*index);
                    }
                }
                many => {
                    return Err(IdentityError::ambiguous(
                        self.entity,
                        snapshot.key().to_string(),
                        many.len(),
                    )
                    .into());
                }
            }
        }
        tracing::debug!(modified = modified.len(), "change scan complete");
        Ok(modified)
    }
}
