//! Topic-keyed registry of live subscriptions.
//!
//! # Thread Safety
//!
//! Both maps are [`DashMap`]s, so subscribe, unsubscribe and event dispatch
//! run concurrently from any number of threads. Lock order is always
//! `topics` then `by_type`; dispatch never holds both.
//!
//! Dispatch works on a snapshot of the subscriptions of the event's entity
//! type and hands payloads to per-topic [`broadcast`] channels, which never
//! block the sender. A receiver that falls behind by more than
//! [`Config::notification_buffer`] messages lags and loses the oldest ones;
//! other topics are unaffected.

use super::{EntityChangedEvent, Notification, Subscription, SubscriptionState};
use crate::config::Config;
use crate::error::Result;
use crate::expr::Expression;
use crate::format::{EntityFormatter, JsonFormatter};
use crate::persistence::{NoStore, PersistenceManager};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sensorthings_types::{EntityType, ResourcePath};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;

struct TopicEntry {
    subscription: Arc<Subscription>,
    sender: broadcast::Sender<Notification>,
    /// Live `subscribe` calls for this topic.
    subscribers: usize,
}

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscriptions whose match succeeded.
    pub matched: usize,
    /// Matched subscriptions whose payload reached at least one receiver.
    pub delivered: usize,
    /// Matched subscriptions whose payload could not be formatted.
    pub failed: usize,
}

pub struct SubscriptionRegistry {
    config: Config,
    formatter: Arc<dyn EntityFormatter>,
    persistence: Arc<dyn PersistenceManager>,
    topics: DashMap<String, TopicEntry>,
    by_type: DashMap<EntityType, BTreeSet<String>>,
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("config", &self.config)
            .field("topics", &self.topics.len())
            .finish_non_exhaustive()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl SubscriptionRegistry {
    /// Registry with JSON payloads and no store fallback.
    pub fn new(config: Config) -> Self {
        Self::with_parts(config, Arc::new(JsonFormatter::new()), Arc::new(NoStore))
    }

    pub(crate) fn with_parts(
        config: Config,
        formatter: Arc<dyn EntityFormatter>,
        persistence: Arc<dyn PersistenceManager>,
    ) -> Self {
        Self {
            config,
            formatter,
            persistence,
            topics: DashMap::new(),
            by_type: DashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to a topic.
    ///
    /// Subscribers of the same topic share one subscription. The topic is
    /// validated before anything is registered.
    pub fn subscribe(
        &self,
        topic: &str,
        path: &ResourcePath,
        service_root_url: &str,
    ) -> Result<broadcast::Receiver<Notification>> {
        self.register(topic, || Subscription::create(topic, path, service_root_url))
    }

    /// Subscribe to an entity-set topic narrowed by an already parsed
    /// `$filter`.
    pub fn subscribe_filtered(
        &self,
        topic: &str,
        path: &ResourcePath,
        service_root_url: &str,
        query_filter: Expression,
    ) -> Result<broadcast::Receiver<Notification>> {
        self.register(topic, || {
            Subscription::create(topic, path, service_root_url)?.with_query_filter(query_filter)
        })
    }

    fn register(
        &self,
        topic: &str,
        create: impl FnOnce() -> Result<Subscription>,
    ) -> Result<broadcast::Receiver<Notification>> {
        match self.topics.entry(topic.to_string()) {
            Entry::Occupied(mut entry) => {
                let entry = entry.get_mut();
                entry.subscribers += 1;
                log::debug!("Topic '{}' now has {} subscribers", topic, entry.subscribers);
                Ok(entry.sender.subscribe())
            }
            Entry::Vacant(vacant) => {
                let subscription = Arc::new(create()?);
                let (sender, receiver) = broadcast::channel(self.config.notification_buffer);
                self.by_type
                    .entry(subscription.entity_type())
                    .or_default()
                    .insert(topic.to_string());
                vacant.insert(TopicEntry {
                    subscription,
                    sender,
                    subscribers: 1,
                });
                log::debug!("Registered topic '{}'", topic);
                Ok(receiver)
            }
        }
    }

    /// Drop one subscriber of `topic`. The subscription is removed with its
    /// last subscriber. Returns `false` for an unknown topic.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        let Entry::Occupied(mut entry) = self.topics.entry(topic.to_string()) else {
            return false;
        };

        let remaining = {
            let entry = entry.get_mut();
            entry.subscribers = entry.subscribers.saturating_sub(1);
            entry.subscribers
        };
        if remaining > 0 {
            return true;
        }

        // Unindex while the topic is still locked so a concurrent subscribe
        // of the same topic cannot be unindexed by mistake.
        let entity_type = entry.get().subscription.entity_type();
        if let Some(mut topics) = self.by_type.get_mut(&entity_type) {
            topics.remove(topic);
        }
        self.by_type.remove_if(&entity_type, |_, topics| topics.is_empty());

        let removed = entry.remove();
        removed.subscription.mark_removed();
        log::debug!("Removed topic '{}'", topic);
        true
    }

    /// Match an event against every subscription of its entity type and
    /// publish the payloads.
    pub fn notify(&self, event: &EntityChangedEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        let entity = event.entity.as_ref();

        let topics: Vec<String> = match self.by_type.get(&entity.entity_type()) {
            Some(topics) => topics.iter().cloned().collect(),
            None => return report,
        };
        let targets: Vec<(Arc<Subscription>, broadcast::Sender<Notification>)> = topics
            .iter()
            .filter_map(|topic| {
                self.topics
                    .get(topic)
                    .map(|e| (Arc::clone(&e.subscription), e.sender.clone()))
            })
            .collect();

        let persistence: &dyn PersistenceManager = if self.config.store_fallback {
            self.persistence.as_ref()
        } else {
            &NoStore
        };

        for (subscription, sender) in targets {
            if !subscription.matches(persistence, entity, event.changed.as_ref()) {
                continue;
            }
            report.matched += 1;

            let payload = match subscription.format_message(self.formatter.as_ref(), entity) {
                Ok(payload) => payload,
                Err(e) => {
                    log::warn!(
                        "Failed to format notification for '{}': {}",
                        subscription.topic(),
                        e
                    );
                    report.failed += 1;
                    continue;
                }
            };

            // Removed while matching: drop rather than deliver.
            if !subscription.is_active() {
                continue;
            }

            let notification = Notification {
                topic: subscription.topic().to_string(),
                payload,
            };
            match sender.send(notification) {
                Ok(receivers) => {
                    log::trace!("'{}' delivered to {} receivers", subscription.topic(), receivers);
                    report.delivered += 1;
                }
                Err(_) => log::trace!("'{}' has no receivers", subscription.topic()),
            }
        }
        report
    }

    /// Number of registered topics.
    pub fn subscription_count(&self) -> usize {
        self.topics.len()
    }

    /// Registered topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.iter().map(|e| e.key().clone()).collect();
        topics.sort();
        topics
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn subscription(&self, topic: &str) -> Option<Arc<Subscription>> {
        self.topics.get(topic).map(|e| Arc::clone(&e.subscription))
    }

    /// State of a registered topic. `None` if it was never registered or
    /// has already been removed.
    pub fn state(&self, topic: &str) -> Option<SubscriptionState> {
        self.topics.get(topic).map(|e| e.subscription.state())
    }
}
