//! Per-wake shared state
//!
//! A [`WakeRequest`] is what event listeners and the waiting coordinator have
//! in common. Its signal slot moves from `Pending` to a final value at most
//! once; whoever writes first wins and later offers are dropped.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use super::destination::Destination;
use crate::events::{PushOutcome, RegistrationEvent};
use crate::types::{CorrelationId, SubscriberKey};

/// Value of the signal slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    Pending,
    /// The wake push reached no device
    PushDeliveryFailed,
    /// The device registered; dial here
    RegistrationDestination(Destination),
}

#[derive(Debug)]
pub struct WakeRequest {
    correlation_id: CorrelationId,
    key: SubscriberKey,
    user: String,
    realm: String,
    timeout: Duration,
    wait_any_register: bool,
    deadline: Instant,
    outcome: Mutex<SignalOutcome>,
    signal: Notify,
}

impl WakeRequest {
    pub fn new(
        correlation_id: CorrelationId,
        user: &str,
        realm: &str,
        timeout: Duration,
        wait_any_register: bool,
    ) -> Self {
        Self {
            correlation_id,
            key: SubscriberKey::new(user, realm),
            user: user.to_string(),
            realm: realm.to_string(),
            timeout,
            wait_any_register,
            deadline: Instant::now() + timeout,
            outcome: Mutex::new(SignalOutcome::Pending),
            signal: Notify::new(),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn key(&self) -> &SubscriberKey {
        &self.key
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Budget left before the deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Current slot value
    pub fn outcome(&self) -> SignalOutcome {
        self.outcome.lock().clone()
    }

    /// Wait until a writer commits a value; a commit that happened before
    /// the call is not lost
    pub async fn signalled(&self) {
        self.signal.notified().await
    }

    /// Offer a registration; `true` if it resolved the wake
    pub fn offer_registration(&self, event: &RegistrationEvent) -> bool {
        if event.update_only {
            debug!("[{}] Ignoring refresh-only registration of {}", self.correlation_id, self.key);
            return false;
        }
        if event.key() != self.key {
            return false;
        }
        let Some(destination) = Destination::from_registration(
            event,
            &self.user,
            &self.realm,
            self.timeout,
            self.wait_any_register,
            &self.correlation_id,
        ) else {
            debug!("[{}] Registration of {} has no usable contact", self.correlation_id, self.key);
            return false;
        };
        self.commit(SignalOutcome::RegistrationDestination(destination))
    }

    /// Offer a push outcome; `true` if it failed the wake
    ///
    /// Only an undelivered push for this wake counts, and only when the wake
    /// is not waiting for any registration regardless of the push.
    pub fn offer_push_outcome(&self, outcome: &PushOutcome) -> bool {
        if outcome.correlation_id != self.correlation_id || outcome.delivered || self.wait_any_register {
            return false;
        }
        self.commit(SignalOutcome::PushDeliveryFailed)
    }

    fn commit(&self, value: SignalOutcome) -> bool {
        {
            let mut slot = self.outcome.lock();
            if *slot != SignalOutcome::Pending {
                debug!("[{}] Signal already set, dropping {:?}", self.correlation_id, value);
                return false;
            }
            *slot = value;
        }
        self.signal.notify_one();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(update_only: bool) -> RegistrationEvent {
        RegistrationEvent {
            subscriber: "alice".to_string(),
            realm: "example.com".to_string(),
            contact: "<sip:alice@10.0.0.5>".to_string(),
            call_id: "reg-1".to_string(),
            profile: "external".to_string(),
            update_only,
        }
    }

    fn request(wait_any: bool) -> WakeRequest {
        WakeRequest::new(
            CorrelationId::from("w-1"),
            "alice",
            "example.com",
            Duration::from_secs(30),
            wait_any,
        )
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let req = request(false);
        assert!(req.offer_registration(&registration(false)));
        assert!(!req.offer_push_outcome(&PushOutcome {
            correlation_id: CorrelationId::from("w-1"),
            delivered: false,
        }));
        assert!(matches!(req.outcome(), SignalOutcome::RegistrationDestination(_)));
        // The permit stored by the commit is still there
        req.signalled().await;
    }

    #[test]
    fn test_update_only_and_foreign_events_are_ignored() {
        let req = request(false);
        assert!(!req.offer_registration(&registration(true)));

        let mut other = registration(false);
        other.subscriber = "bob".to_string();
        assert!(!req.offer_registration(&other));

        assert!(!req.offer_push_outcome(&PushOutcome {
            correlation_id: CorrelationId::from("w-2"),
            delivered: false,
        }));
        assert_eq!(req.outcome(), SignalOutcome::Pending);
    }

    #[test]
    fn test_push_failure_ignored_when_waiting_for_any_register() {
        let req = request(true);
        let failed = PushOutcome {
            correlation_id: CorrelationId::from("w-1"),
            delivered: false,
        };
        assert!(!req.offer_push_outcome(&failed));
        assert_eq!(req.outcome(), SignalOutcome::Pending);

        let strict = request(false);
        assert!(strict.offer_push_outcome(&failed));
        assert_eq!(strict.outcome(), SignalOutcome::PushDeliveryFailed);
    }
}
