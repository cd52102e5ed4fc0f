//! Session construction and the save protocol.

use std::fmt;

use rowtrack_core::entity::{Entity, EntityMeta};
use rowtrack_core::error::{Error, IdentityError, ValidationError};
use rowtrack_core::gateway::ConnectionScope;
use rowtrack_core::{Result, ScalarTypeSet, StoreGateway, Value};

use crate::collection::TrackedCollection;
use crate::key::{IdentityKey, extract_key_lenient, field_value};
use crate::persist::Persistable;
use crate::relations::{Link, RelationGraph};

/// Tunable behavior for a session's change scans and saves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Rebuild every baseline after a successful save, dropping pending
    /// marks. Off by default: marks survive the save, and a second save
    /// repeats the same work.
    pub refresh_baseline_after_save: bool,
    /// Skip baseline entries whose keys were carried out by removals
    /// when scanning for modifications. Off by default: a removal makes
    /// the scan fail with an identity error.
    pub exclude_removed_from_diff: bool,
}

/// Row counts from a successful save.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

struct Registration {
    name: String,
    entity: &'static str,
    build: Box<dyn FnOnce(&ScalarTypeSet) -> Result<Box<dyn Persistable>>>,
}

/// Configures a session before it touches the store.
///
/// Collections are registered here but loaded only by
/// [`build`](Self::build), so the scalar-type set and config may be set
/// in any order relative to the registrations.
pub struct SessionBuilder<G> {
    gateway: G,
    scalar_types: ScalarTypeSet,
    config: SessionConfig,
    registrations: Vec<Registration>,
}

impl<G: StoreGateway> SessionBuilder<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            scalar_types: ScalarTypeSet::classic(),
            config: SessionConfig::default(),
            registrations: Vec::new(),
        }
    }

    /// Register a collection of `T` under `name`.
    ///
    /// The name doubles as the store table name unless `T` declares one.
    #[must_use]
    pub fn collection<T: Entity>(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.registrations.push(Registration {
            name: name.clone(),
            entity: T::ENTITY_NAME,
            build: Box::new(move |types| {
                let meta = EntityMeta::derive::<T>(&name, types)?;
                Ok(Box::new(TrackedCollection::<T>::new(name, meta)) as Box<dyn Persistable>)
            }),
        });
        self
    }

    /// Restrict which scalar types count as storable.
    #[must_use]
    pub fn scalar_types(mut self, types: ScalarTypeSet) -> Self {
        self.scalar_types = types;
        self
    }

    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Derive metadata, load every collection over one connection, and
    /// resolve the navigation graph.
    ///
    /// Fails on the first metadata problem, store error, record whose
    /// key is incomplete, or reference that does not land on exactly
    /// one record.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn build(self) -> Result<Session<G>> {
        for (index, registration) in self.registrations.iter().enumerate() {
            for later in &self.registrations[index + 1..] {
                if later.name == registration.name {
                    return Err(Error::configuration(
                        later.entity,
                        format!("collection '{}' is registered twice", registration.name),
                    ));
                }
                if later.entity == registration.entity {
                    return Err(Error::configuration(
                        registration.entity,
                        format!(
                            "entity '{}' is registered in both '{}' and '{}'",
                            registration.entity, registration.name, later.name
                        ),
                    ));
                }
            }
        }

        let mut sets = Vec::with_capacity(self.registrations.len());
        for registration in self.registrations {
            sets.push((registration.build)(&self.scalar_types)?);
        }

        let mut gateway = self.gateway;
        {
            let mut scope = ConnectionScope::open(&mut gateway)?;
            for set in &mut sets {
                set.load(scope.gateway())?;
            }
        }

        let graph = RelationGraph::build(&sets)?;
        tracing::debug!(collections = sets.len(), "session loaded");

        Ok(Session {
            gateway,
            sets,
            graph,
            config: self.config,
        })
    }
}

/// A unit of work over one store.
///
/// The session owns its gateway and every loaded record. Connections
/// are scoped to loading and saving; between those the session works
/// entirely in memory.
pub struct Session<G> {
    gateway: G,
    sets: Vec<Box<dyn Persistable>>,
    graph: RelationGraph,
    config: SessionConfig,
}

impl<G> fmt::Debug for Session<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field(
                "collections",
                &self.sets.iter().map(|set| set.name()).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<G: StoreGateway> Session<G> {
    pub fn builder(gateway: G) -> SessionBuilder<G> {
        SessionBuilder::new(gateway)
    }

    /// The registered collection holding records of `T`, if any.
    pub fn collection<T: Entity>(&self) -> Option<&TrackedCollection<T>> {
        self.sets
            .iter()
            .find_map(|set| set.as_any().downcast_ref::<TrackedCollection<T>>())
    }

    pub fn collection_mut<T: Entity>(&mut self) -> Option<&mut TrackedCollection<T>> {
        self.sets
            .iter_mut()
            .find_map(|set| set.as_any_mut().downcast_mut::<TrackedCollection<T>>())
    }

    /// Follow a single-record navigation from `record`.
    ///
    /// Returns `Ok(None)` when the record's key field is unset. A set
    /// key field must land on exactly one target record; anything else
    /// is an identity error.
    pub fn related_one<C: Entity, O: Entity>(&self, record: &C, nav: &str) -> Result<Option<&O>> {
        let entry = self.graph.link(C::ENTITY_NAME, nav).ok_or_else(|| {
            Error::configuration(
                C::ENTITY_NAME,
                format!("no navigation '{nav}' on entity '{}'", C::ENTITY_NAME),
            )
        })?;
        let Link::Single { fk_field, target } = entry.link else {
            return Err(Error::configuration(
                C::ENTITY_NAME,
                format!("navigation '{nav}' is a collection, not a single record"),
            ));
        };
        let owners = self.typed_set::<O>(target)?;

        let row = record.to_record();
        let Some(value) = field_value(&row, fk_field) else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }
        let key = IdentityKey::new(vec![value.clone()]);
        match owners.find_by_key(&key)? {
            Some(owner) => Ok(Some(owner)),
            None => Err(IdentityError::no_match(O::ENTITY_NAME, key.to_string()).into()),
        }
    }

    /// Follow a collection navigation from `record`.
    ///
    /// Returns the held records pointing back at `record`, walking a
    /// junction collection when no direct key field links the two
    /// entities. A record whose own key is unset has no children yet.
    pub fn related_many<O: Entity, C: Entity>(&self, record: &O, nav: &str) -> Result<Vec<&C>> {
        let entry = self.graph.link(O::ENTITY_NAME, nav).ok_or_else(|| {
            Error::configuration(
                O::ENTITY_NAME,
                format!("no navigation '{nav}' on entity '{}'", O::ENTITY_NAME),
            )
        })?;
        let owner_set = self.typed_set::<O>(entry.owner)?;
        let row = record.to_record();

        match entry.link {
            Link::Single { .. } => Err(Error::configuration(
                O::ENTITY_NAME,
                format!("navigation '{nav}' is a single record, not a collection"),
            )),
            Link::Many { child, fk_field } => {
                let Some(wanted) = owner_key(owner_set.meta(), &row) else {
                    return Ok(Vec::new());
                };
                let children = self.typed_set::<C>(child)?;
                Ok(children
                    .iter()
                    .filter(|held| {
                        field_value(&held.to_record(), fk_field)
                            .is_some_and(|value| value.same_as(&wanted))
                    })
                    .collect())
            }
            Link::ManyVia {
                junction,
                owner_fk,
                target_fk,
                target,
            } => {
                let Some(wanted) = owner_key(owner_set.meta(), &row) else {
                    return Ok(Vec::new());
                };
                let targets = self.typed_set::<C>(target)?;
                let mut found = Vec::new();
                for junction_row in self.sets[junction].live_rows() {
                    let Some(owner_value) = field_value(&junction_row, owner_fk) else {
                        continue;
                    };
                    if !owner_value.same_as(&wanted) {
                        continue;
                    }
                    let Some(target_value) = field_value(&junction_row, target_fk) else {
                        continue;
                    };
                    if target_value.is_null() {
                        continue;
                    }
                    let target_key = IdentityKey::new(vec![target_value.clone()]);
                    match targets.find_by_key(&target_key)? {
                        Some(record) => found.push(record),
                        None => {
                            return Err(IdentityError::no_match(
                                C::ENTITY_NAME,
                                target_key.to_string(),
                            )
                            .into());
                        }
                    }
                }
                Ok(found)
            }
        }
    }

    /// Write every pending change to the store in one transaction.
    ///
    /// All collections are checked against their validation rules
    /// first; the first one holding invalid records aborts the save
    /// before a connection is opened. Collections are then persisted in
    /// registration order, each inserting, updating, and deleting in
    /// turn. Any failure rolls the transaction back and returns the
    /// store's error unchanged; the session stays usable and a later
    /// save starts over.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn save(&mut self) -> Result<SaveReport> {
        for set in &self.sets {
            let invalid = set.invalid_count();
            if invalid > 0 {
                return Err(ValidationError {
                    collection: set.name().to_string(),
                    invalid,
                }
                .into());
            }
        }

        let mut report = SaveReport::default();
        {
            let mut scope = ConnectionScope::open(&mut self.gateway)?;
            let mut tx = scope.gateway().start_transaction()?;

            let mut failure = None;
            for set in &self.sets {
                match set.persist(tx.as_mut(), &self.config) {
                    Ok(part) => {
                        report.inserted += part.inserted;
                        report.updated += part.updated;
                        report.deleted += part.deleted;
                    }
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
            match failure {
                Some(err) => {
                    tracing::debug!(error = %err, "rolling back failed save");
                    if let Err(rollback_err) = tx.rollback() {
                        tracing::error!(
                            error = %rollback_err,
                            "rollback failed after a persist error"
                        );
                    }
                    return Err(err);
                }
                None => {
                    tx.commit()?;
                    tracing::debug!(
                        inserted = report.inserted,
                        updated = report.updated,
                        deleted = report.deleted,
                        "transaction committed"
                    );
                }
            }
        }

        if self.config.refresh_baseline_after_save {
            for set in &mut self.sets {
                set.refresh()?;
            }
        }
        Ok(report)
    }

    fn typed_set<T: Entity>(&self, index: usize) -> Result<&TrackedCollection<T>> {
        self.sets[index]
            .as_any()
            .downcast_ref::<TrackedCollection<T>>()
            .ok_or_else(|| {
                Error::configuration(
                    T::ENTITY_NAME,
                    format!(
                        "collection '{}' holds a different entity",
                        self.sets[index].name()
                    ),
                )
            })
    }
}

/// The key component a collection navigation filters by, if fully set.
///
/// Collection owners always carry single-component keys; a record whose
/// key is still unset owns nothing yet.
fn owner_key(meta: &EntityMeta, row: &[(&'static str, Value)]) -> Option<Value> {
    let key = extract_key_lenient(meta, row);
    if key.has_null() {
        None
    } else {
        Some(key.values()[0].clone())
    }
}
