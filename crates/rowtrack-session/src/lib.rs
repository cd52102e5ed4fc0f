//! Change-tracking sessions over a record store.
//!
//! A [`Session`] loads registered collections through a store gateway,
//! watches their records change, resolves navigations between them,
//! and writes everything back in one transaction. Between loading and
//! saving it works entirely in memory.

pub mod collection;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod key;
mod persist;
mod relations;
pub mod session;
pub mod snapshot;

pub use collection::{RecordId, TrackedCollection};
pub use key::IdentityKey;
pub use session::{SaveReport, Session, SessionBuilder, SessionConfig};
pub use snapshot::{ChangeTracker, Snapshot};
