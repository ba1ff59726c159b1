//! Store access used as a matching fallback.
//!
//! Some filters reference entities other than the changed one (for example
//! `Datastream/Thing/@iot.id eq 1` on an observation). Those cannot be
//! answered from the event alone, so the matcher asks the store whether the
//! entity, as now persisted, satisfies the filter.

use crate::error::{FilterError, Result};
use crate::expr::Expression;
use sensorthings_types::{EntityType, Id};

/// Query capability of the backing store.
pub trait PersistenceManager: Send + Sync {
    /// Whether the stored entity `entity_type(id)` satisfies `filter`.
    fn entity_matches(&self, entity_type: EntityType, id: &Id, filter: &Expression)
    -> Result<bool>;
}

/// A manager without a store. Every fallback query fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStore;

impl PersistenceManager for NoStore {
    fn entity_matches(
        &self,
        entity_type: EntityType,
        id: &Id,
        filter: &Expression,
    ) -> Result<bool> {
        Err(FilterError::Store(format!(
            "no store configured to check {}({}) against {}",
            entity_type.plural(),
            id,
            filter
        )))
    }
}
