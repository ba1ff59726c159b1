//! Filter algebra, query compilation and live subscription matching for
//! SensorThings-style entity servers.
//!
//! One set of operator rules drives both the SQL compiler used by the query
//! layer and the in-memory evaluator used to decide which subscriptions a
//! changed entity concerns.
//!
//! ```rust
//! use sensorthings_filter::prelude::*;
//!
//! let filter = Expression::compare(
//!     ComparisonOp::GreaterThan,
//!     Expression::property(EntityProperty::Result),
//!     Expression::constant(20),
//! );
//!
//! let sql = PostgresBackend::new(EntityType::Observation).compile(&filter)?;
//! assert_eq!(sql.sql, "\"result\" > $1");
//!
//! let registry = RegistryBuilder::new().build()?;
//! let path = ResourcePath::new().entity(EntityType::Thing, 1).set(EntityType::Datastream);
//! let mut rx = registry.subscribe("v1.1/Things(1)/Datastreams", &path, "http://localhost/v1.1")?;
//!
//! let datastream = Entity::new(EntityType::Datastream)
//!     .with_id(7)
//!     .with_link(NavigationProperty::Thing, 1);
//! registry.notify(&EntityChangedEvent::created(datastream));
//! assert!(rx.try_recv().is_ok());
//! # Ok::<(), sensorthings_filter::FilterError>(())
//! ```

pub mod builder;
pub mod compile;
pub mod compute;
pub mod config;
pub mod error;
pub mod expr;
pub mod format;
pub mod persistence;
pub mod subscription;

pub use builder::RegistryBuilder;
pub use config::Config;
pub use error::{FilterError, Result};

pub use compile::{EntityEvaluator, NativeCondition, PostgresBackend, TimestampType, Truth, evaluate};

pub use expr::{ArithmeticOp, ComparisonOp, Constant, Expression, LogicalOp, PropertyPath};

pub use format::{EntityFormatter, JsonFormatter};
pub use persistence::{NoStore, PersistenceManager};

pub use subscription::{
    DispatchReport, EntityChangedEvent, Notification, Subscription, SubscriptionKind,
    SubscriptionRegistry, SubscriptionState,
};

pub use sensorthings_types::{
    Entity, EntityProperty, EntityType, Id, Instant, Interval, NavigationProperty, PathElement,
    Property, ResourcePath, TimeDuration, Value, ValueKind,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Config, FilterError, RegistryBuilder, Result};

    pub use crate::{ArithmeticOp, ComparisonOp, Expression, LogicalOp, PropertyPath};

    pub use crate::{PostgresBackend, TimestampType, evaluate};

    pub use crate::{EntityChangedEvent, Notification, SubscriptionRegistry};

    pub use sensorthings_types::{
        Entity, EntityProperty, EntityType, Id, Instant, Interval, NavigationProperty,
        ResourcePath, TimeDuration,
    };
}
