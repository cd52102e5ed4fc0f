//! Navigation metadata for tracked entities.
//!
//! Navigations are declared as static metadata on each [`Entity`] and
//! resolved by the session after all collections have loaded. A resolved
//! navigation is a lookup key into the session's record arena, never an
//! owning link between records.
//!
//! [`Entity`]: crate::entity::Entity

/// The shape of a navigation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// Points at a single record of the target entity.
    Single,
    /// Collects every target record whose foreign key points back here.
    Collection,
}

/// Metadata about a navigation between entities.
#[derive(Debug, Clone, Copy)]
pub struct NavigationDef {
    /// Name of the navigation field.
    pub field: &'static str,
    /// `ENTITY_NAME` of the target entity.
    pub target: &'static str,
    /// Shape of the navigation.
    pub kind: NavigationKind,
}

impl NavigationDef {
    /// A navigation that points at one record of `target`.
    #[must_use]
    pub const fn single(field: &'static str, target: &'static str) -> Self {
        Self {
            field,
            target,
            kind: NavigationKind::Single,
        }
    }

    /// A navigation that collects every `target` record pointing back here.
    #[must_use]
    pub const fn collection(field: &'static str, target: &'static str) -> Self {
        Self {
            field,
            target,
            kind: NavigationKind::Collection,
        }
    }

    /// Check if this navigation is single-valued.
    #[must_use]
    pub const fn is_single(&self) -> bool {
        matches!(self.kind, NavigationKind::Single)
    }
}
