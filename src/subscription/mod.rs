//! Live subscriptions on resource paths.
//!
//! A subscription is created from a topic and its resolved path, and then
//! asked, for every changed entity, whether the change concerns it and how to
//! render the notification. Three shapes exist:
//!
//! - `Things(1)/name`: one property. Fires only when that property changed.
//! - `Things(1)`: one entity. Fires on any change of it.
//! - `Things(1)/Datastreams`: a collection, optionally narrowed by a client
//!   filter.
//!
//! Ancestors in the path scope the subscription: on `Datastreams(5)/Observations`
//! only observations whose `Datastream/@iot.id` is 5 match.

mod event;
mod property;
mod registry;

pub use event::{EntityChangedEvent, Notification};
pub use property::PropertySubscription;
pub use registry::{DispatchReport, SubscriptionRegistry};

use crate::compile::evaluate;
use crate::error::{FilterError, Result};
use crate::expr::{Expression, PropertyPath};
use crate::format::EntityFormatter;
use crate::persistence::PersistenceManager;
use sensorthings_types::{
    Entity, EntityProperty, EntityType, Id, PathElement, Property, ResourcePath,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// The query part of a topic, after `?`. Empty when there is none.
pub fn query_from_topic(topic: &str) -> &str {
    topic.split_once('?').map_or("", |(_, query)| query)
}

/// Lifecycle of a subscription. `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    Active,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionKind {
    Property(PropertySubscription),
    /// A single entity, by id or reached through a single-valued link.
    Entity { id: Option<Id> },
    EntitySet,
}

impl SubscriptionKind {
    pub fn name(&self) -> &'static str {
        match self {
            SubscriptionKind::Property(_) => "property",
            SubscriptionKind::Entity { .. } => "entity",
            SubscriptionKind::EntitySet => "entity set",
        }
    }
}

#[derive(Debug)]
pub struct Subscription {
    topic: String,
    entity_type: EntityType,
    kind: SubscriptionKind,
    filter: Option<Expression>,
    service_root_url: String,
    removed: AtomicBool,
}

impl Subscription {
    /// Validate the topic and path and build the subscription.
    ///
    /// Fails with [`FilterError::InvalidSubscriptionTopic`] for an empty
    /// path, a path whose elements are not linked, or query options on a
    /// property or single-entity topic.
    pub fn create(topic: &str, path: &ResourcePath, service_root_url: &str) -> Result<Self> {
        let last = path
            .last()
            .ok_or_else(|| FilterError::invalid_topic(topic, "empty resource path"))?;

        let (entity_type, kind, subscribed) = match last {
            PathElement::Property(_) => {
                let property = PropertySubscription::from_path(topic, path)?;
                (
                    property.entity_type(),
                    SubscriptionKind::Property(property),
                    path.len() - 2,
                )
            }
            PathElement::Entity { entity_type, id } => {
                if !query_from_topic(topic).is_empty() {
                    return Err(FilterError::invalid_topic(
                        topic,
                        "query options not allowed for subscription on an entity",
                    ));
                }
                (
                    *entity_type,
                    SubscriptionKind::Entity { id: id.clone() },
                    path.len() - 1,
                )
            }
            PathElement::EntitySet(entity_type) => {
                (*entity_type, SubscriptionKind::EntitySet, path.len() - 1)
            }
        };

        let filter = ancestor_filter(topic, path, subscribed)?;
        log::debug!(
            "Created {} subscription on '{}' for {}{}",
            kind.name(),
            topic,
            entity_type.plural(),
            filter
                .as_ref()
                .map(|f| format!(" where {f}"))
                .unwrap_or_default()
        );

        Ok(Self {
            topic: topic.to_string(),
            entity_type,
            kind,
            filter,
            service_root_url: service_root_url.to_string(),
            removed: AtomicBool::new(false),
        })
    }

    /// Narrow an entity-set subscription with a client filter.
    ///
    /// Parsing the `$filter` option is the caller's job; only entity-set
    /// subscriptions accept one.
    pub fn with_query_filter(mut self, query_filter: Expression) -> Result<Self> {
        if !matches!(self.kind, SubscriptionKind::EntitySet) {
            return Err(FilterError::invalid_topic(
                &self.topic,
                format!("query options not allowed for {} subscriptions", self.kind.name()),
            ));
        }
        self.filter = Some(match self.filter.take() {
            Some(path_filter) => Expression::and(path_filter, query_filter),
            None => query_filter,
        });
        Ok(self)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn kind(&self) -> &SubscriptionKind {
        &self.kind
    }

    /// Combined path and client filter, if any.
    pub fn filter(&self) -> Option<&Expression> {
        self.filter.as_ref()
    }

    pub fn service_root_url(&self) -> &str {
        &self.service_root_url
    }

    pub fn state(&self) -> SubscriptionState {
        if self.removed.load(Ordering::Acquire) {
            SubscriptionState::Removed
        } else {
            SubscriptionState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }

    /// Whether a change of `entity` concerns this subscription.
    ///
    /// Never fails: filter errors and store failures are logged and count as
    /// no match.
    pub fn matches(
        &self,
        persistence: &dyn PersistenceManager,
        entity: &Entity,
        changed: Option<&HashSet<Property>>,
    ) -> bool {
        if entity.entity_type() != self.entity_type {
            return false;
        }
        let accepted = match &self.kind {
            SubscriptionKind::Property(property) => property.accepts(entity, changed),
            SubscriptionKind::Entity { id: Some(id) } => entity.id() == Some(id),
            SubscriptionKind::Entity { id: None } | SubscriptionKind::EntitySet => true,
        };
        if !accepted {
            log::trace!("'{}' skips {:?}", self.topic, entity.id());
            return false;
        }
        self.matches_filter(persistence, entity)
    }

    fn matches_filter(&self, persistence: &dyn PersistenceManager, entity: &Entity) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };
        match evaluate(filter, entity) {
            Ok(matched) => matched,
            Err(FilterError::RequiresStore(path)) => {
                let Some(id) = entity.id() else {
                    log::warn!(
                        "Cannot check '{}' through {} for an entity without id",
                        self.topic,
                        path
                    );
                    return false;
                };
                match persistence.entity_matches(self.entity_type, id, filter) {
                    Ok(matched) => matched,
                    Err(e) => {
                        log::warn!("Store check of '{}' for {} failed: {}", self.topic, id, e);
                        false
                    }
                }
            }
            Err(e) => {
                log::warn!("Filter {} of '{}' failed: {}", filter, self.topic, e);
                false
            }
        }
    }

    /// Render the notification payload for a matched entity.
    pub fn format_message(
        &self,
        formatter: &dyn EntityFormatter,
        entity: &Entity,
    ) -> Result<String> {
        let select = match &self.kind {
            SubscriptionKind::Property(property) => Some(property.selection()),
            SubscriptionKind::Entity { .. } | SubscriptionKind::EntitySet => None,
        };
        formatter.write_entity(entity, select, &self.service_root_url)
    }
}

/// Scope implied by the ancestors of the subscribed element.
///
/// Walks back from the subscribed entity, collecting navigation hops, up to
/// the nearest ancestor with an id: `Things(1)/Datastreams/Observations`
/// yields `Datastream/Thing/@iot.id = 1`.
fn ancestor_filter(
    topic: &str,
    path: &ResourcePath,
    subscribed: usize,
) -> Result<Option<Expression>> {
    let elements = path.elements();
    let Some(mut child) = elements.get(subscribed).and_then(PathElement::entity_type) else {
        return Err(FilterError::invalid_topic(
            topic,
            "path does not address an entity",
        ));
    };

    let mut hops = Vec::new();
    for element in elements[..subscribed].iter().rev() {
        let Some(parent) = element.entity_type() else {
            return Err(FilterError::invalid_topic(
                topic,
                format!("property {element} can only end a path"),
            ));
        };
        let hop = child.navigation_to(parent).ok_or_else(|| {
            FilterError::invalid_topic(topic, format!("{child} has no link to {parent}"))
        })?;
        hops.push(hop);
        if let Some(id) = element.id() {
            return Ok(Some(Expression::eq(
                Expression::path(PropertyPath::through(&hops, EntityProperty::Id)),
                Expression::constant(id),
            )));
        }
        child = parent;
    }
    Ok(None)
}
