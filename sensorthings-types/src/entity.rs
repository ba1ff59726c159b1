//! Entity model: the closed set of entity types, their properties, and the
//! in-memory representation of a changed entity.

use crate::error::ParseError;
use crate::time::{Instant, Interval, TimeDuration, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The kinds of entity a server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Thing,
    Location,
    HistoricalLocation,
    Datastream,
    MultiDatastream,
    Sensor,
    ObservedProperty,
    Observation,
    FeatureOfInterest,
}

impl EntityType {
    pub const ALL: [EntityType; 9] = [
        EntityType::Thing,
        EntityType::Location,
        EntityType::HistoricalLocation,
        EntityType::Datastream,
        EntityType::MultiDatastream,
        EntityType::Sensor,
        EntityType::ObservedProperty,
        EntityType::Observation,
        EntityType::FeatureOfInterest,
    ];

    /// Singular name, e.g. `Thing`.
    pub fn name(&self) -> &'static str {
        match self {
            EntityType::Thing => "Thing",
            EntityType::Location => "Location",
            EntityType::HistoricalLocation => "HistoricalLocation",
            EntityType::Datastream => "Datastream",
            EntityType::MultiDatastream => "MultiDatastream",
            EntityType::Sensor => "Sensor",
            EntityType::ObservedProperty => "ObservedProperty",
            EntityType::Observation => "Observation",
            EntityType::FeatureOfInterest => "FeatureOfInterest",
        }
    }

    /// Entity-set name used in paths, e.g. `Things`.
    pub fn plural(&self) -> &'static str {
        match self {
            EntityType::Thing => "Things",
            EntityType::Location => "Locations",
            EntityType::HistoricalLocation => "HistoricalLocations",
            EntityType::Datastream => "Datastreams",
            EntityType::MultiDatastream => "MultiDatastreams",
            EntityType::Sensor => "Sensors",
            EntityType::ObservedProperty => "ObservedProperties",
            EntityType::Observation => "Observations",
            EntityType::FeatureOfInterest => "FeaturesOfInterest",
        }
    }

    /// Navigation properties available on this entity type.
    pub fn navigation_properties(&self) -> &'static [NavigationProperty] {
        use NavigationProperty as N;
        match self {
            EntityType::Thing => &[
                N::Locations,
                N::HistoricalLocations,
                N::Datastreams,
                N::MultiDatastreams,
            ],
            EntityType::Location => &[N::Things, N::HistoricalLocations],
            EntityType::HistoricalLocation => &[N::Thing, N::Locations],
            EntityType::Datastream => &[N::Thing, N::Sensor, N::ObservedProperty, N::Observations],
            EntityType::MultiDatastream => &[
                N::Thing,
                N::Sensor,
                N::ObservedProperties,
                N::Observations,
            ],
            EntityType::Sensor => &[N::Datastreams, N::MultiDatastreams],
            EntityType::ObservedProperty => &[N::Datastreams, N::MultiDatastreams],
            EntityType::Observation => &[N::Datastream, N::MultiDatastream, N::FeatureOfInterest],
            EntityType::FeatureOfInterest => &[N::Observations],
        }
    }

    /// The navigation property leading from this type to `target`, if the
    /// two types are related.
    pub fn navigation_to(&self, target: EntityType) -> Option<NavigationProperty> {
        self.navigation_properties()
            .iter()
            .copied()
            .find(|nav| nav.target() == target)
    }

    /// Whether entities of this type carry the given property.
    pub fn has_property(&self, property: EntityProperty) -> bool {
        use EntityProperty as P;
        match property {
            P::Id | P::SelfLink => true,
            P::Name | P::Description => !matches!(
                self,
                EntityType::HistoricalLocation | EntityType::Observation
            ),
            P::Properties => matches!(
                self,
                EntityType::Thing
                    | EntityType::Location
                    | EntityType::Datastream
                    | EntityType::MultiDatastream
                    | EntityType::Sensor
                    | EntityType::ObservedProperty
                    | EntityType::FeatureOfInterest
            ),
            P::EncodingType => matches!(
                self,
                EntityType::Location | EntityType::Sensor | EntityType::FeatureOfInterest
            ),
            P::Location => *self == EntityType::Location,
            P::Feature => *self == EntityType::FeatureOfInterest,
            P::Metadata => *self == EntityType::Sensor,
            P::Definition => *self == EntityType::ObservedProperty,
            P::Time => *self == EntityType::HistoricalLocation,
            P::UnitOfMeasurement => *self == EntityType::Datastream,
            P::UnitOfMeasurements | P::MultiObservationDataTypes => {
                *self == EntityType::MultiDatastream
            }
            P::ObservationType | P::ObservedArea => {
                matches!(self, EntityType::Datastream | EntityType::MultiDatastream)
            }
            P::PhenomenonTime => matches!(
                self,
                EntityType::Datastream | EntityType::MultiDatastream | EntityType::Observation
            ),
            P::ResultTime => matches!(
                self,
                EntityType::Datastream | EntityType::MultiDatastream | EntityType::Observation
            ),
            P::ValidTime | P::Result | P::ResultQuality | P::Parameters => {
                *self == EntityType::Observation
            }
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityType {
    type Err = ParseError;

    /// Accepts both the singular and the entity-set name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.name() == s || t.plural() == s)
            .ok_or_else(|| ParseError::UnknownEntityType(s.to_string()))
    }
}

/// A link from one entity type to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NavigationProperty {
    Thing,
    Things,
    Locations,
    HistoricalLocations,
    Datastream,
    Datastreams,
    MultiDatastream,
    MultiDatastreams,
    Sensor,
    ObservedProperty,
    ObservedProperties,
    Observations,
    FeatureOfInterest,
}

impl NavigationProperty {
    pub fn name(&self) -> &'static str {
        match self {
            NavigationProperty::Thing => "Thing",
            NavigationProperty::Things => "Things",
            NavigationProperty::Locations => "Locations",
            NavigationProperty::HistoricalLocations => "HistoricalLocations",
            NavigationProperty::Datastream => "Datastream",
            NavigationProperty::Datastreams => "Datastreams",
            NavigationProperty::MultiDatastream => "MultiDatastream",
            NavigationProperty::MultiDatastreams => "MultiDatastreams",
            NavigationProperty::Sensor => "Sensor",
            NavigationProperty::ObservedProperty => "ObservedProperty",
            NavigationProperty::ObservedProperties => "ObservedProperties",
            NavigationProperty::Observations => "Observations",
            NavigationProperty::FeatureOfInterest => "FeatureOfInterest",
        }
    }

    pub fn target(&self) -> EntityType {
        match self {
            NavigationProperty::Thing | NavigationProperty::Things => EntityType::Thing,
            NavigationProperty::Locations => EntityType::Location,
            NavigationProperty::HistoricalLocations => EntityType::HistoricalLocation,
            NavigationProperty::Datastream | NavigationProperty::Datastreams => {
                EntityType::Datastream
            }
            NavigationProperty::MultiDatastream | NavigationProperty::MultiDatastreams => {
                EntityType::MultiDatastream
            }
            NavigationProperty::Sensor => EntityType::Sensor,
            NavigationProperty::ObservedProperty | NavigationProperty::ObservedProperties => {
                EntityType::ObservedProperty
            }
            NavigationProperty::Observations => EntityType::Observation,
            NavigationProperty::FeatureOfInterest => EntityType::FeatureOfInterest,
        }
    }

    /// Whether the link points at a collection rather than a single entity.
    pub fn is_set(&self) -> bool {
        matches!(
            self,
            NavigationProperty::Things
                | NavigationProperty::Locations
                | NavigationProperty::HistoricalLocations
                | NavigationProperty::Datastreams
                | NavigationProperty::MultiDatastreams
                | NavigationProperty::ObservedProperties
                | NavigationProperty::Observations
        )
    }
}

impl fmt::Display for NavigationProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A plain (non-navigation) entity attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityProperty {
    Id,
    SelfLink,
    Name,
    Description,
    Definition,
    EncodingType,
    Location,
    Feature,
    Metadata,
    Properties,
    Time,
    UnitOfMeasurement,
    UnitOfMeasurements,
    ObservationType,
    MultiObservationDataTypes,
    ObservedArea,
    PhenomenonTime,
    ResultTime,
    ValidTime,
    Result,
    ResultQuality,
    Parameters,
}

impl EntityProperty {
    pub const ALL: [EntityProperty; 22] = [
        EntityProperty::Id,
        EntityProperty::SelfLink,
        EntityProperty::Name,
        EntityProperty::Description,
        EntityProperty::Definition,
        EntityProperty::EncodingType,
        EntityProperty::Location,
        EntityProperty::Feature,
        EntityProperty::Metadata,
        EntityProperty::Properties,
        EntityProperty::Time,
        EntityProperty::UnitOfMeasurement,
        EntityProperty::UnitOfMeasurements,
        EntityProperty::ObservationType,
        EntityProperty::MultiObservationDataTypes,
        EntityProperty::ObservedArea,
        EntityProperty::PhenomenonTime,
        EntityProperty::ResultTime,
        EntityProperty::ValidTime,
        EntityProperty::Result,
        EntityProperty::ResultQuality,
        EntityProperty::Parameters,
    ];

    /// Stable external name, as it appears in JSON payloads and filters.
    pub fn wire_name(&self) -> &'static str {
        match self {
            EntityProperty::Id => "@iot.id",
            EntityProperty::SelfLink => "@iot.selfLink",
            EntityProperty::Name => "name",
            EntityProperty::Description => "description",
            EntityProperty::Definition => "definition",
            EntityProperty::EncodingType => "encodingType",
            EntityProperty::Location => "location",
            EntityProperty::Feature => "feature",
            EntityProperty::Metadata => "metadata",
            EntityProperty::Properties => "properties",
            EntityProperty::Time => "time",
            EntityProperty::UnitOfMeasurement => "unitOfMeasurement",
            EntityProperty::UnitOfMeasurements => "unitOfMeasurements",
            EntityProperty::ObservationType => "observationType",
            EntityProperty::MultiObservationDataTypes => "multiObservationDataTypes",
            EntityProperty::ObservedArea => "observedArea",
            EntityProperty::PhenomenonTime => "phenomenonTime",
            EntityProperty::ResultTime => "resultTime",
            EntityProperty::ValidTime => "validTime",
            EntityProperty::Result => "result",
            EntityProperty::ResultQuality => "resultQuality",
            EntityProperty::Parameters => "parameters",
        }
    }

    /// Declared kind of the property's values.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            EntityProperty::PhenomenonTime | EntityProperty::ValidTime => ValueKind::Interval,
            EntityProperty::ResultTime | EntityProperty::Time => ValueKind::Instant,
            _ => ValueKind::Scalar,
        }
    }
}

impl fmt::Display for EntityProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for EntityProperty {
    type Err = ParseError;

    /// Accepts the wire name, plus `id` and `selfLink` without the `@iot.` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => return Ok(EntityProperty::Id),
            "selfLink" => return Ok(EntityProperty::SelfLink),
            _ => {}
        }
        EntityProperty::ALL
            .into_iter()
            .find(|p| p.wire_name() == s)
            .ok_or_else(|| ParseError::UnknownProperty(s.to_string()))
    }
}

/// Any addressable attribute: a plain property or a navigation link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Property {
    Entity(EntityProperty),
    Navigation(NavigationProperty),
}

impl Property {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Property::Entity(p) => p.wire_name(),
            Property::Navigation(n) => n.name(),
        }
    }
}

impl From<EntityProperty> for Property {
    fn from(p: EntityProperty) -> Self {
        Property::Entity(p)
    }
}

impl From<NavigationProperty> for Property {
    fn from(n: NavigationProperty) -> Self {
        Property::Navigation(n)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Entity identifier. Stores use either numeric or string keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Long(i64),
    Text(String),
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Long(v) => write!(f, "{v}"),
            Id::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<i64> for Id {
    fn from(v: i64) -> Self {
        Id::Long(v)
    }
}

impl From<i32> for Id {
    fn from(v: i32) -> Self {
        Id::Long(i64::from(v))
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::Text(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::Text(s)
    }
}

/// A property value as held by an in-memory entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Instant(Instant),
    Duration(TimeDuration),
    Interval(Interval),
    /// Free-form JSON (`properties`, `parameters`, geometries...).
    Json(serde_json::Value),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Integer(_) | Value::Number(_) | Value::Text(_) | Value::Json(_) => {
                ValueKind::Scalar
            },
            Value::Instant(_) => ValueKind::Instant,
            Value::Duration(_) => ValueKind::Duration,
            Value::Interval(_) => ValueKind::Interval,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&Id> for Value {
    fn from(id: &Id) -> Self {
        match id {
            Id::Long(v) => Value::Integer(*v),
            Id::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Instant> for Value {
    fn from(v: Instant) -> Self {
        Value::Instant(v)
    }
}

impl From<Interval> for Value {
    fn from(v: Interval) -> Self {
        Value::Interval(v)
    }
}

impl From<TimeDuration> for Value {
    fn from(v: TimeDuration) -> Self {
        Value::Duration(v)
    }
}

/// An entity as delivered by a change event.
///
/// Single-valued navigation links are kept as the id of the linked entity,
/// which is enough to evaluate `Datastream/@iot.id eq 5` without a store
/// round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    entity_type: EntityType,
    id: Option<Id>,
    properties: BTreeMap<EntityProperty, Value>,
    links: BTreeMap<NavigationProperty, Id>,
}

impl Entity {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            id: None,
            properties: BTreeMap::new(),
            links: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<Id>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, property: EntityProperty, value: impl Into<Value>) -> Self {
        self.set_property(property, value);
        self
    }

    pub fn with_link(mut self, navigation: NavigationProperty, id: impl Into<Id>) -> Self {
        self.links.insert(navigation, id.into());
        self
    }

    pub fn set_property(&mut self, property: EntityProperty, value: impl Into<Value>) {
        match property {
            EntityProperty::Id => {
                if let Some(id) = value_to_id(value.into()) {
                    self.id = Some(id);
                }
            }
            _ => {
                self.properties.insert(property, value.into());
            }
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    /// Value of a plain property; `@iot.id` is served from the identity.
    pub fn get(&self, property: EntityProperty) -> Option<Value> {
        match property {
            EntityProperty::Id => self.id.as_ref().map(Value::from),
            _ => self.properties.get(&property).cloned(),
        }
    }

    /// Id of the entity behind a single-valued navigation link.
    pub fn link(&self, navigation: NavigationProperty) -> Option<&Id> {
        self.links.get(&navigation)
    }

    /// Stored plain properties, ordered by property.
    pub fn properties(&self) -> impl Iterator<Item = (&EntityProperty, &Value)> {
        self.properties.iter()
    }

    pub fn links(&self) -> impl Iterator<Item = (&NavigationProperty, &Id)> {
        self.links.iter()
    }
}

fn value_to_id(value: Value) -> Option<Id> {
    match value {
        Value::Integer(n) => Some(Id::Long(n)),
        Value::Number(n) if n.fract() == 0.0 => Some(Id::Long(n as i64)),
        Value::Text(s) => Some(Id::Text(s)),
        _ => None,
    }
}
