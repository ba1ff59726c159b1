//! # sensorthings-types
//!
//! Value types shared by the filter compiler and the subscription matcher:
//!
//! - **Temporal values**: `Instant`, `TimeDuration`, `Interval`, `TemporalValue`
//! - **Entity model**: `EntityType`, `EntityProperty`, `NavigationProperty`,
//!   `Property`, `Id`, `Value`, `Entity`
//! - **Resource paths**: `ResourcePath`, `PathElement`
//!
//! Temporal values serialize as their ISO 8601 literals.
//!
//! ## Examples
//!
//! ```rust
//! use sensorthings_types::time::{Instant, Interval};
//!
//! let day = Interval::parse("2020-01-01T00:00:00Z/2020-01-02T00:00:00Z").unwrap();
//! let noon = Instant::parse("2020-01-01T12:00:00Z").unwrap();
//! assert!(day.start() < noon && noon < day.end());
//! ```

pub mod entity;
pub mod error;
pub mod path;
pub mod time;

pub use entity::{Entity, EntityProperty, EntityType, Id, NavigationProperty, Property, Value};
pub use error::ParseError;
pub use path::{PathElement, ResourcePath};
pub use time::{Instant, Interval, TemporalValue, TimeDuration, ValueKind};
