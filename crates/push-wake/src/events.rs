//! Wake event hub
//!
//! Two typed topics: registration events keyed by subscriber, and push
//! delivery outcomes keyed by correlation id. A publish reaches only the
//! listeners registered under its key. Listeners are detached when their
//! [`Subscription`] is dropped, so every exit path of a waiter releases its
//! subscriptions exactly once.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

use crate::types::{CorrelationId, SubscriberKey};

/// A contact binding observed by the registrar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationEvent {
    pub subscriber: String,
    pub realm: String,
    /// Raw Contact header value
    pub contact: String,
    pub call_id: String,
    /// Signalling profile the registration came in on
    pub profile: String,
    /// Refresh of an existing binding rather than a new one
    #[serde(default)]
    pub update_only: bool,
}

impl RegistrationEvent {
    pub fn key(&self) -> SubscriberKey {
        SubscriberKey::new(&self.subscriber, &self.realm)
    }
}

/// Result of a push that was sent on behalf of a wake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushOutcome {
    pub correlation_id: CorrelationId,
    /// At least one token accepted the push
    pub delivered: bool,
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Topic<K, E> {
    listeners: DashMap<K, Vec<(u64, Listener<E>)>>,
    next_id: AtomicU64,
}

impl<K, E> Topic<K, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    E: 'static,
{
    fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
        })
    }

    fn subscribe(self: &Arc<Self>, key: K, listener: Listener<E>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.entry(key.clone()).or_default().push((id, listener));

        let topic: Weak<Self> = Arc::downgrade(self);
        Subscription {
            release: Some(Box::new(move || {
                if let Some(topic) = topic.upgrade() {
                    topic.remove(&key, id);
                }
            })),
        }
    }

    fn remove(&self, key: &K, id: u64) {
        if let Some(mut entry) = self.listeners.get_mut(key) {
            entry.retain(|(listener_id, _)| *listener_id != id);
        }
        self.listeners.remove_if(key, |_, listeners| listeners.is_empty());
    }

    fn publish(&self, key: &K, event: &E) -> usize {
        // Listeners run after the shard lock is released so they may
        // subscribe or unsubscribe themselves.
        let targets: Vec<Listener<E>> = match self.listeners.get(key) {
            Some(entry) => entry.iter().map(|(_, listener)| listener.clone()).collect(),
            None => return 0,
        };
        for listener in &targets {
            listener(event);
        }
        targets.len()
    }

    fn count(&self) -> usize {
        self.listeners.iter().map(|entry| entry.value().len()).sum()
    }
}

/// Handle for one listener; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Unsubscribe now
    pub fn cancel(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Multiplexes registration and push-outcome events to the wakes waiting on them
#[derive(Clone)]
pub struct WakeEventHub {
    registrations: Arc<Topic<SubscriberKey, RegistrationEvent>>,
    outcomes: Arc<Topic<CorrelationId, PushOutcome>>,
}

impl Default for WakeEventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeEventHub {
    pub fn new() -> Self {
        Self {
            registrations: Topic::new(),
            outcomes: Topic::new(),
        }
    }

    /// Listen for registrations of one subscriber
    pub fn subscribe_registrations<F>(&self, key: SubscriberKey, listener: F) -> Subscription
    where
        F: Fn(&RegistrationEvent) + Send + Sync + 'static,
    {
        trace!("Registration listener added for {}", key);
        self.registrations.subscribe(key, Arc::new(listener))
    }

    /// Listen for the outcome of one correlated push
    pub fn subscribe_outcome<F>(&self, correlation_id: CorrelationId, listener: F) -> Subscription
    where
        F: Fn(&PushOutcome) + Send + Sync + 'static,
    {
        trace!("Outcome listener added for {}", correlation_id);
        self.outcomes.subscribe(correlation_id, Arc::new(listener))
    }

    /// Returns how many listeners saw the event
    pub fn publish_registration(&self, event: &RegistrationEvent) -> usize {
        self.registrations.publish(&event.key(), event)
    }

    pub fn publish_outcome(&self, outcome: &PushOutcome) -> usize {
        self.outcomes.publish(&outcome.correlation_id, outcome)
    }

    /// Listeners currently attached, both topics
    pub fn active_subscriptions(&self) -> usize {
        self.registrations.count() + self.outcomes.count()
    }
}
