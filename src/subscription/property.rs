//! Subscriptions on a single property, e.g. `v1.1/Things(1)/name`.

use super::query_from_topic;
use crate::error::{FilterError, Result};
use sensorthings_types::{Entity, EntityProperty, EntityType, Id, PathElement, Property, ResourcePath};
use std::collections::{BTreeSet, HashSet};

/// Fires when the subscribed property of a matching entity changes, and
/// publishes that property alone.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySubscription {
    entity_type: EntityType,
    property: EntityProperty,
    /// Set when the entity element of the path carries an id.
    id_matcher: Option<Id>,
    select: BTreeSet<String>,
}

impl PropertySubscription {
    /// The path must end with an entity element followed by a property
    /// element, and the topic must not carry query options.
    pub(crate) fn from_path(topic: &str, path: &ResourcePath) -> Result<Self> {
        if !query_from_topic(topic).is_empty() {
            return Err(FilterError::invalid_topic(
                topic,
                "query options not allowed for subscription on a property",
            ));
        }

        let [.., entity, PathElement::Property(property)] = path.elements() else {
            return Err(FilterError::invalid_topic(
                topic,
                "a property subscription needs an entity followed by a property",
            ));
        };
        let PathElement::Entity { entity_type, id } = entity else {
            return Err(FilterError::invalid_topic(
                topic,
                format!("{entity} does not address a single entity"),
            ));
        };
        if !entity_type.has_property(*property) {
            return Err(FilterError::invalid_topic(
                topic,
                format!("{} has no property {}", entity_type, property.wire_name()),
            ));
        }

        Ok(Self {
            entity_type: *entity_type,
            property: *property,
            id_matcher: id.clone(),
            select: BTreeSet::from([property.wire_name().to_string()]),
        })
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn property(&self) -> EntityProperty {
        self.property
    }

    pub fn id_matcher(&self) -> Option<&Id> {
        self.id_matcher.as_ref()
    }

    /// Wire names the notification is restricted to.
    pub fn selection(&self) -> &BTreeSet<String> {
        &self.select
    }

    /// Identity and relevance checks, cheapest first. A creation event
    /// (no changed set) is never relevant.
    pub(crate) fn accepts(&self, entity: &Entity, changed: Option<&HashSet<Property>>) -> bool {
        if let Some(id) = &self.id_matcher
            && entity.id() != Some(id)
        {
            return false;
        }
        changed.is_some_and(|fields| fields.contains(&Property::Entity(self.property)))
    }
}
