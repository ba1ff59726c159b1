use sensorthings_types::{Entity, Property};
use std::collections::HashSet;
use std::sync::Arc;

/// An entity was created or updated.
#[derive(Debug, Clone)]
pub struct EntityChangedEvent {
    pub entity: Arc<Entity>,
    /// Properties touched by the change. `None` for a creation, where no
    /// field-level diff exists.
    pub changed: Option<HashSet<Property>>,
}

impl EntityChangedEvent {
    pub fn created(entity: impl Into<Arc<Entity>>) -> Self {
        Self {
            entity: entity.into(),
            changed: None,
        }
    }

    pub fn updated<P: Into<Property>>(
        entity: impl Into<Arc<Entity>>,
        changed: impl IntoIterator<Item = P>,
    ) -> Self {
        Self {
            entity: entity.into(),
            changed: Some(changed.into_iter().map(Into::into).collect()),
        }
    }
}

/// A formatted payload ready for publication on its topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub topic: String,
    pub payload: String,
}
