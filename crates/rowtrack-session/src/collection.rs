//! Tracked collections: an arena of live records plus their change marks.

use rowtrack_core::entity::{Entity, EntityMeta};
use rowtrack_core::error::IdentityError;
use rowtrack_core::{Result, Value};

use crate::key::{IdentityKey, extract_key_lenient, field_value};
use crate::snapshot::ChangeTracker;

/// Handle to a record held by a [`TrackedCollection`].
///
/// Handles stay valid until the record is removed or the collection is
/// reloaded; they are never reused within one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub(crate) u64);

/// A session-owned set of records of one entity type.
///
/// The collection owns its records and watches them change: loading
/// captures a baseline, [`add`](Self::add) and [`remove`](Self::remove)
/// mark pending work, and in-place edits through
/// [`iter_mut`](Self::iter_mut) are found later by diffing against the
/// baseline.
pub struct TrackedCollection<T: Entity> {
    name: String,
    meta: EntityMeta,
    columns: Vec<String>,
    entries: Vec<(RecordId, T)>,
    next_id: u64,
    tracker: ChangeTracker<T>,
}

impl<T: Entity> TrackedCollection<T> {
    pub(crate) fn new(name: impl Into<String>, meta: EntityMeta) -> Self {
        Self {
            name: name.into(),
            meta,
            columns: Vec::new(),
            entries: Vec::new(),
            next_id: 1,
            tracker: ChangeTracker::new(T::ENTITY_NAME),
        }
    }

    /// The name this collection was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The derived metadata of the records held here.
    pub fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a record and mark it as pending insertion.
    ///
    /// The record is always taken, even when an equal one is already
    /// held. Its key fields may stay unset until the store assigns them.
    pub fn add(&mut self, record: T) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, record));
        self.tracker.mark_added(id);
        id
    }

    /// Remove the first record equal to `record`.
    ///
    /// Returns `false` when no held record matches, and only an actual
    /// removal is marked for deletion. A record that was added in this
    /// session keeps its insertion mark; the pending passes skip marks
    /// that no longer resolve.
    pub fn remove(&mut self, record: &T) -> bool {
        let Some(position) = self.entries.iter().position(|(_, held)| held == record) else {
            return false;
        };
        let (_, held) = self.entries.remove(position);
        let key = extract_key_lenient(&self.meta, &held.to_record());
        self.tracker.mark_removed(held, key);
        true
    }

    /// Remove records one by one, stopping at the first that is not held.
    ///
    /// Returns `false` on the first failed removal; records before it
    /// stay removed, records after it stay untouched.
    pub fn remove_range<'a>(&mut self, records: impl IntoIterator<Item = &'a T>) -> bool
    where
        T: 'a,
    {
        for record in records {
            if !self.remove(record) {
                return false;
            }
        }
        true
    }

    /// Remove every held record, marking each for deletion.
    pub fn clear(&mut self) {
        for (_, record) in self.entries.drain(..) {
            let key = extract_key_lenient(&self.meta, &record.to_record());
            self.tracker.mark_removed(record, key);
        }
    }

    pub fn contains(&self, record: &T) -> bool {
        self.entries.iter().any(|(_, held)| held == record)
    }

    pub fn get(&self, id: RecordId) -> Option<&T> {
        self.entries
            .iter()
            .find(|(held, _)| *held == id)
            .map(|(_, record)| record)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|(held, _)| *held == id)
            .map(|(_, record)| record)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, record)| record)
    }

    /// Iterate mutably; edits are picked up by the next change scan.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|(_, record)| record)
    }

    /// Look a record up by identity.
    ///
    /// Returns `Ok(None)` when no held record carries the key and an
    /// identity error when several do.
    pub fn find_by_key(&self, key: &IdentityKey) -> Result<Option<&T>> {
        let mut found = None;
        let mut matches = 0;
        for (_, record) in &self.entries {
            if extract_key_lenient(&self.meta, &record.to_record()) == *key {
                matches += 1;
                if found.is_none() {
                    found = Some(record);
                }
            }
        }
        match matches {
            0 => Ok(None),
            1 => Ok(found),
            n => Err(IdentityError::ambiguous(self.meta.entity, key.to_string(), n).into()),
        }
    }

    /// Number of records pending insertion, dangling marks included.
    pub fn pending_added(&self) -> usize {
        self.tracker.added_ids().count()
    }

    /// Number of records pending deletion.
    pub fn pending_removed(&self) -> usize {
        self.tracker.removed_len()
    }

    /// Records failing their own validation rules.
    pub(crate) fn invalid_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, record)| !record.validate().is_empty())
            .count()
    }

    /// Replace the held records and capture a fresh baseline.
    pub(crate) fn install(&mut self, records: Vec<T>) -> Result<()> {
        self.entries.clear();
        for record in records {
            let id = RecordId(self.next_id);
            self.next_id += 1;
            self.entries.push((id, record));
        }
        self.recapture()
    }

    /// Rebuild the baseline from the held records, clearing pending marks.
    pub(crate) fn recapture(&mut self) -> Result<()> {
        let rows = self.live_rows();
        self.tracker.capture(&self.meta, &rows)
    }

    /// The mapped columns found in the store when this collection loaded.
    pub(crate) fn columns(&self) -> &[String] {
        &self.columns
    }

    pub(crate) fn set_columns(&mut self, columns: Vec<String>) {
        self.columns = columns;
    }

    /// Dump every held record, in arena order.
    pub(crate) fn live_rows(&self) -> Vec<Vec<(&'static str, Value)>> {
        self.entries
            .iter()
            .map(|(_, record)| record.to_record())
            .collect()
    }

    /// Records whose insertion marks still resolve, in mark order.
    pub(crate) fn pending_inserts(&self) -> Vec<&T> {
        let mut records = Vec::new();
        for id in self.tracker.added_ids() {
            match self.get(id) {
                Some(record) => records.push(record),
                None => {
                    tracing::debug!(
                        collection = %self.name,
                        id = id.0,
                        "skipping insertion mark for a removed record"
                    );
                }
            }
        }
        records
    }

    /// Records whose storable fields drifted from the baseline.
    pub(crate) fn modified_records(&self, exclude_removed: bool) -> Result<Vec<&T>> {
        let rows = self.live_rows();
        let indices = self
            .tracker
            .compute_modified(&self.meta, &rows, exclude_removed)?;
        Ok(indices
            .into_iter()
            .map(|index| &self.entries[index].1)
            .collect())
    }

    /// Key values of the records pending deletion, in primary-key order.
    pub(crate) fn removed_key_rows(&self) -> Vec<Vec<Value>> {
        self.tracker
            .removed_keys()
            .map(|key| key.values().to_vec())
            .collect()
    }

    /// A record's values arranged in stored-column order.
    pub(crate) fn column_values(&self, record: &T) -> Vec<Value> {
        let row = record.to_record();
        self.columns
            .iter()
            .map(|column| {
                self.meta
                    .mapped
                    .iter()
                    .find(|f| f.column == column.as_str())
                    .and_then(|f| field_value(&row, f.name).cloned())
                    .unwrap_or(Value::Null)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Book, book_meta};

    fn loaded() -> TrackedCollection<Book> {
        let mut collection = TrackedCollection::new("books", book_meta());
        collection
            .install(vec![
                Book {
                    id: Some(1),
                    title: "Dune".to_string(),
                    author_id: Some(10),
                    notes: String::new(),
                },
                Book {
                    id: Some(2),
                    title: "Emma".to_string(),
                    author_id: Some(11),
                    notes: String::new(),
                },
            ])
            .unwrap();
        collection
    }

    #[test]
    fn test_add_marks_pending_insertion() {
        let mut books = loaded();
        let id = books.add(Book {
            id: None,
            title: "draft".to_string(),
            author_id: None,
            notes: String::new(),
        });
        assert_eq!(books.len(), 3);
        assert_eq!(books.pending_added(), 1);
        assert_eq!(books.get(id).map(|b| b.title.as_str()), Some("draft"));
    }

    #[test]
    fn test_remove_requires_a_held_record() {
        let mut books = loaded();
        let stranger = Book {
            id: Some(9),
            title: "nope".to_string(),
            author_id: None,
            notes: String::new(),
        };
        assert!(!books.remove(&stranger));
        assert_eq!(books.pending_removed(), 0);
        assert_eq!(books.len(), 2);
    }

    #[test]
    fn test_remove_marks_and_keeps_the_key() {
        let mut books = loaded();
        let dune = books.iter().next().cloned().unwrap();
        assert!(books.remove(&dune));
        assert_eq!(books.len(), 1);
        assert_eq!(books.pending_removed(), 1);
        assert_eq!(books.removed_key_rows(), vec![vec![Value::BigInt(1)]]);
    }

    #[test]
    fn test_remove_range_stops_at_first_failure() {
        let mut books = loaded();
        let dune = books.iter().next().cloned().unwrap();
        let stranger = Book {
            id: Some(9),
            title: "nope".to_string(),
            author_id: None,
            notes: String::new(),
        };
        let emma = books.iter().nth(1).cloned().unwrap();

        assert!(!books.remove_range([&dune, &stranger, &emma]));
        assert_eq!(books.pending_removed(), 1);
        assert!(books.contains(&emma));
    }

    #[test]
    fn test_add_then_remove_dangles_the_mark() {
        let mut books = loaded();
        let draft = Book {
            id: None,
            title: "draft".to_string(),
            author_id: None,
            notes: String::new(),
        };
        books.add(draft.clone());
        assert!(books.remove(&draft));

        assert_eq!(books.pending_added(), 1);
        assert!(books.pending_inserts().is_empty());
        assert_eq!(books.pending_removed(), 1);
    }

    #[test]
    fn test_clear_marks_everything_removed() {
        let mut books = loaded();
        books.clear();
        assert!(books.is_empty());
        assert_eq!(books.pending_removed(), 2);
    }

    #[test]
    fn test_find_by_key_distinguishes_outcomes() {
        let mut books = loaded();
        let key = IdentityKey::single(1i64);
        assert_eq!(
            books.find_by_key(&key).unwrap().map(|b| b.title.as_str()),
            Some("Dune")
        );
        assert!(books.find_by_key(&IdentityKey::single(9i64)).unwrap().is_none());

        books.add(Book {
            id: Some(1),
            title: "impostor".to_string(),
            author_id: None,
            notes: String::new(),
        });
        assert!(books.find_by_key(&key).is_err());
    }

    #[test]
    fn test_edits_surface_as_modified_records() {
        let mut books = loaded();
        for book in books.iter_mut() {
            if book.id == Some(2) {
                book.title = "Persuasion".to_string();
            }
        }
        let modified = books.modified_records(false).unwrap();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].title, "Persuasion");
    }

    #[test]
    fn test_column_values_follow_stored_order() {
        let mut books = loaded();
        books.set_columns(vec![
            "title".to_string(),
            "id".to_string(),
            "author_id".to_string(),
        ]);
        let dune = books.iter().next().cloned().unwrap();
        assert_eq!(
            books.column_values(&dune),
            vec![
                Value::Text("Dune".to_string()),
                Value::BigInt(1),
                Value::BigInt(10),
            ]
        );
    }
}
