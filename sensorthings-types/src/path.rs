//! Resolved resource paths.
//!
//! A path such as `Datastreams(5)/Thing/name` arrives here already parsed
//! into typed elements; this module only models the result.

use crate::entity::{EntityProperty, EntityType, Id};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a resource path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathElement {
    /// A collection, e.g. `Things` or `Datastreams(5)/Observations`.
    EntitySet(EntityType),
    /// A single entity, either by id (`Things(1)`) or reached through a
    /// single-valued navigation link (`Datastreams(5)/Thing`).
    Entity {
        entity_type: EntityType,
        id: Option<Id>,
    },
    /// A plain property of the preceding entity.
    Property(EntityProperty),
}

impl PathElement {
    pub fn entity_type(&self) -> Option<EntityType> {
        match self {
            PathElement::EntitySet(t) => Some(*t),
            PathElement::Entity { entity_type, .. } => Some(*entity_type),
            PathElement::Property(_) => None,
        }
    }

    pub fn id(&self) -> Option<&Id> {
        match self {
            PathElement::Entity { id, .. } => id.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::EntitySet(t) => f.write_str(t.plural()),
            PathElement::Entity {
                entity_type,
                id: Some(id),
            } => write!(f, "{}({})", entity_type.plural(), id),
            PathElement::Entity {
                entity_type,
                id: None,
            } => f.write_str(entity_type.name()),
            PathElement::Property(p) => f.write_str(p.wire_name()),
        }
    }
}

/// An ordered sequence of path elements.
///
/// # Examples
///
/// ```
/// use sensorthings_types::entity::{EntityProperty, EntityType};
/// use sensorthings_types::path::ResourcePath;
///
/// let path = ResourcePath::new()
///     .entity(EntityType::Thing, 1)
///     .property(EntityProperty::Name);
/// assert_eq!(path.to_string(), "Things(1)/name");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcePath {
    elements: Vec<PathElement>,
}

impl ResourcePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: Vec<PathElement>) -> Self {
        Self { elements }
    }

    /// Append an entity-set element.
    pub fn set(mut self, entity_type: EntityType) -> Self {
        self.elements.push(PathElement::EntitySet(entity_type));
        self
    }

    /// Append an entity addressed by id.
    pub fn entity(mut self, entity_type: EntityType, id: impl Into<Id>) -> Self {
        self.elements.push(PathElement::Entity {
            entity_type,
            id: Some(id.into()),
        });
        self
    }

    /// Append a single entity reached through a navigation link.
    pub fn navigate(mut self, entity_type: EntityType) -> Self {
        self.elements.push(PathElement::Entity {
            entity_type,
            id: None,
        });
        self
    }

    pub fn property(mut self, property: EntityProperty) -> Self {
        self.elements.push(PathElement::Property(property));
        self
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn last(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// The last element that names an entity by id, with its type.
    pub fn identified_element(&self) -> Option<(EntityType, &Id)> {
        self.elements.iter().rev().find_map(|e| match e {
            PathElement::Entity {
                entity_type,
                id: Some(id),
            } => Some((*entity_type, id)),
            _ => None,
        })
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            element.fmt(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let path = ResourcePath::new()
            .entity(EntityType::Datastream, 5)
            .navigate(EntityType::Thing)
            .property(EntityProperty::Description);
        assert_eq!(path.to_string(), "Datastreams(5)/Thing/description");

        let path = ResourcePath::new()
            .entity(EntityType::Thing, "abc")
            .set(EntityType::Datastream);
        assert_eq!(path.to_string(), "Things('abc')/Datastreams");
    }

    #[test]
    fn test_identified_element_is_the_last_id() {
        let path = ResourcePath::new()
            .entity(EntityType::Thing, 1)
            .set(EntityType::Datastream);
        assert_eq!(
            path.identified_element(),
            Some((EntityType::Thing, &Id::Long(1)))
        );

        let path = ResourcePath::new().set(EntityType::Thing);
        assert_eq!(path.identified_element(), None);
    }
}
