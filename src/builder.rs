//! Registry builder
//!
//! Assembles a [`SubscriptionRegistry`] from a configuration, an entity
//! formatter and an optional store used for relational filter checks.

use crate::config::Config;
use crate::error::{FilterError, Result};
use crate::format::{EntityFormatter, JsonFormatter};
use crate::persistence::{NoStore, PersistenceManager};
use crate::subscription::SubscriptionRegistry;
use std::sync::Arc;

/// Builder for a subscription registry.
pub struct RegistryBuilder {
    config: Config,
    formatter: Option<Arc<dyn EntityFormatter>>,
    persistence: Option<Arc<dyn PersistenceManager>>,
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("config", &self.config)
            .field("custom_formatter", &self.formatter.is_some())
            .field("store", &self.persistence.is_some())
            .finish()
    }
}

impl RegistryBuilder {
    /// Create a builder with the default configuration, JSON payloads and
    /// no store.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            formatter: None,
            persistence: None,
        }
    }

    /// Set the registry configuration (buffer size, fallback, casts).
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Per-topic notification buffer.
    pub fn notification_buffer(mut self, capacity: usize) -> Self {
        self.config = self.config.clone().with_notification_buffer(capacity);
        self
    }

    /// Serialize payloads with a custom formatter.
    pub fn formatter(mut self, formatter: Arc<dyn EntityFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Store used to re-check filters that reach beyond the changed entity.
    pub fn persistence(mut self, persistence: Arc<dyn PersistenceManager>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Validate the configuration and build the registry.
    pub fn build(self) -> Result<SubscriptionRegistry> {
        self.config.validate().map_err(FilterError::InvalidConfig)?;

        if self.config.store_fallback && self.persistence.is_none() {
            log::debug!("Store fallback enabled without a store; relational filters will not match");
        }

        let formatter = self
            .formatter
            .unwrap_or_else(|| Arc::new(JsonFormatter::new()));
        let persistence = self.persistence.unwrap_or_else(|| Arc::new(NoStore));
        Ok(SubscriptionRegistry::with_parts(
            self.config,
            formatter,
            persistence,
        ))
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expression;
    use crate::subscription::EntityChangedEvent;
    use sensorthings_types::{Entity, EntityType, Id, ResourcePath};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_builder_default() {
        let registry = RegistryBuilder::new().build().unwrap();
        assert_eq!(registry.config().notification_buffer, 256);
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = Config {
            notification_buffer: 0,
            ..Config::default()
        };
        assert!(matches!(
            RegistryBuilder::new().config(config).build(),
            Err(FilterError::InvalidConfig(_))
        ));
    }

    /// Answers every store check with a fixed result and counts calls.
    struct FixedStore {
        answer: bool,
        calls: AtomicUsize,
    }

    impl PersistenceManager for FixedStore {
        fn entity_matches(
            &self,
            _entity_type: EntityType,
            _id: &Id,
            _filter: &Expression,
        ) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    fn location_event() -> EntityChangedEvent {
        EntityChangedEvent::created(Entity::new(EntityType::Location).with_id(3))
    }

    #[test]
    fn test_builder_store_fallback() {
        let store = Arc::new(FixedStore {
            answer: true,
            calls: AtomicUsize::new(0),
        });
        let registry = RegistryBuilder::new()
            .persistence(store.clone())
            .build()
            .unwrap();
        let path = ResourcePath::new()
            .entity(EntityType::Thing, 1)
            .set(EntityType::Location);
        let mut rx = registry.subscribe("v1.1/Things(1)/Locations", &path, "").unwrap();

        let report = registry.notify(&location_event());
        assert_eq!(report.matched, 1);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_builder_store_fallback_disabled() {
        let store = Arc::new(FixedStore {
            answer: true,
            calls: AtomicUsize::new(0),
        });
        let registry = RegistryBuilder::new()
            .config(Config::default().with_store_fallback(false))
            .persistence(store.clone())
            .build()
            .unwrap();
        let path = ResourcePath::new()
            .entity(EntityType::Thing, 1)
            .set(EntityType::Location);
        let _rx = registry.subscribe("v1.1/Things(1)/Locations", &path, "").unwrap();

        assert_eq!(registry.notify(&location_event()).matched, 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }
}
