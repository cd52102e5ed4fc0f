//! Navigation graph: how registered collections reach each other.
//!
//! The graph is built once per session, after every collection has
//! loaded. Building checks the declared shapes, then walks every
//! record's scalar references so that a dangling key surfaces before
//! the session is handed out.

use std::collections::HashMap;

use rowtrack_core::Result;
use rowtrack_core::entity::EntityMeta;
use rowtrack_core::error::{Error, IdentityError};
use rowtrack_core::relation::NavigationDef;

use crate::key::{IdentityKey, extract_key_lenient, field_value};
use crate::persist::Persistable;

/// How one navigation is answered at runtime.
///
/// Collection indices refer to the session's registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    /// The record's scalar key field points at one owning record.
    Single {
        fk_field: &'static str,
        target: usize,
    },
    /// The record's key filters the child collection by its key field.
    Many {
        child: usize,
        fk_field: &'static str,
    },
    /// The record's key walks a junction, then the far collection.
    ManyVia {
        junction: usize,
        owner_fk: &'static str,
        target_fk: &'static str,
        target: usize,
    },
}

#[derive(Debug)]
pub(crate) struct LinkEntry {
    pub owner: usize,
    pub entity: &'static str,
    pub field: &'static str,
    pub link: Link,
}

#[derive(Debug)]
pub(crate) struct RelationGraph {
    links: Vec<LinkEntry>,
}

impl RelationGraph {
    /// Build and check the graph over loaded collections.
    #[tracing::instrument(level = "debug", skip(sets))]
    pub(crate) fn build(sets: &[Box<dyn Persistable>]) -> Result<Self> {
        let mut by_entity = HashMap::new();
        for (index, set) in sets.iter().enumerate() {
            by_entity.insert(set.meta().entity, index);
        }

        let mut links = Vec::new();
        for (owner, set) in sets.iter().enumerate() {
            let meta = set.meta();
            for nav in meta.navigations {
                let Some(&target) = by_entity.get(nav.target) else {
                    return Err(Error::configuration(
                        meta.entity,
                        format!(
                            "navigation '{}' targets unregistered entity '{}'",
                            nav.field, nav.target
                        ),
                    ));
                };
                let link = if nav.is_single() {
                    single_link(meta, nav, sets[target].meta(), target)?
                } else {
                    collection_link(meta, nav, sets, target)?
                };
                links.push(LinkEntry {
                    owner,
                    entity: meta.entity,
                    field: nav.field,
                    link,
                });
            }
        }

        let graph = Self { links };
        graph.validate(sets)?;
        tracing::debug!(links = graph.links.len(), "navigation graph resolved");
        Ok(graph)
    }

    pub(crate) fn link(&self, entity: &str, field: &str) -> Option<&LinkEntry> {
        self.links
            .iter()
            .find(|entry| entry.entity == entity && entry.field == field)
    }

    /// Resolve every non-null scalar reference against its target
    /// collection, in registration order.
    fn validate(&self, sets: &[Box<dyn Persistable>]) -> Result<()> {
        let keys: Vec<Vec<IdentityKey>> = sets
            .iter()
            .map(|set| {
                let meta = set.meta();
                set.live_rows()
                    .iter()
                    .map(|row| extract_key_lenient(meta, row))
                    .collect()
            })
            .collect();

        for entry in &self.links {
            let Link::Single { fk_field, target } = entry.link else {
                continue;
            };
            let target_entity = sets[target].meta().entity;
            for row in sets[entry.owner].live_rows() {
                let Some(value) = field_value(&row, fk_field) else {
                    continue;
                };
                if value.is_null() {
                    continue;
                }
                let key = IdentityKey::new(vec![value.clone()]);
                match keys[target].iter().filter(|k| **k == key).count() {
                    1 => {}
                    0 => {
                        return Err(
                            IdentityError::no_match(target_entity, key.to_string()).into()
                        );
                    }
                    n => {
                        return Err(
                            IdentityError::ambiguous(target_entity, key.to_string(), n).into()
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

fn single_key_guard(meta: &EntityMeta, nav: &NavigationDef, keyed: &EntityMeta) -> Result<()> {
    if keyed.primary_key.len() == 1 {
        Ok(())
    } else {
        Err(Error::configuration(
            meta.entity,
            format!(
                "navigation '{}' needs a single-component key on '{}'",
                nav.field, keyed.entity
            ),
        ))
    }
}

fn single_link(
    meta: &EntityMeta,
    nav: &NavigationDef,
    target_meta: &EntityMeta,
    target: usize,
) -> Result<Link> {
    let Some(fk) = meta
        .foreign_keys
        .iter()
        .find(|fk| fk.navigation.field == nav.field)
    else {
        return Err(Error::configuration(
            meta.entity,
            format!("single navigation '{}' has no foreign-key field", nav.field),
        ));
    };
    single_key_guard(meta, nav, target_meta)?;
    Ok(Link::Single {
        fk_field: fk.field.name,
        target,
    })
}

fn collection_link(
    meta: &EntityMeta,
    nav: &NavigationDef,
    sets: &[Box<dyn Persistable>],
    target: usize,
) -> Result<Link> {
    let child_meta = sets[target].meta();
    let direct: Vec<&'static str> = child_meta
        .foreign_keys
        .iter()
        .filter(|fk| fk.navigation.target == meta.entity)
        .map(|fk| fk.field.name)
        .collect();

    match direct.as_slice() {
        [fk_field] => {
            single_key_guard(meta, nav, meta)?;
            Ok(Link::Many {
                child: target,
                fk_field,
            })
        }
        [] => junction_link(meta, nav, sets, target),
        many => Err(Error::configuration(
            meta.entity,
            format!(
                "{} foreign keys on '{}' point at '{}'",
                many.len(),
                child_meta.entity,
                meta.entity
            ),
        )),
    }
}

fn junction_link(
    meta: &EntityMeta,
    nav: &NavigationDef,
    sets: &[Box<dyn Persistable>],
    target: usize,
) -> Result<Link> {
    let target_meta = sets[target].meta();
    let mut candidates = Vec::new();
    for (junction, junction_set) in sets.iter().enumerate() {
        let junction_meta = junction_set.meta();
        if !junction_meta.is_junction() {
            continue;
        }
        let keyed_fks = || {
            junction_meta
                .foreign_keys
                .iter()
                .filter(|fk| fk.field.primary_key)
        };
        let owner_side: Vec<&'static str> = keyed_fks()
            .filter(|fk| fk.navigation.target == meta.entity)
            .map(|fk| fk.field.name)
            .collect();
        let target_side: Vec<&'static str> = keyed_fks()
            .filter(|fk| fk.navigation.target == target_meta.entity)
            .map(|fk| fk.field.name)
            .collect();
        if let ([owner_fk], [target_fk]) = (owner_side.as_slice(), target_side.as_slice()) {
            if owner_fk != target_fk {
                candidates.push((junction, *owner_fk, *target_fk));
            }
        }
    }

    match candidates.as_slice() {
        [] => Err(Error::configuration(
            meta.entity,
            format!(
                "no foreign key or junction links '{}' to '{}'",
                meta.entity, target_meta.entity
            ),
        )),
        [(junction, owner_fk, target_fk)] => {
            single_key_guard(meta, nav, meta)?;
            single_key_guard(meta, nav, target_meta)?;
            Ok(Link::ManyVia {
                junction: *junction,
                owner_fk,
                target_fk,
                target,
            })
        }
        many => Err(Error::configuration(
            meta.entity,
            format!(
                "{} junction types link '{}' to '{}'",
                many.len(),
                meta.entity,
                target_meta.entity
            ),
        )),
    }
}
