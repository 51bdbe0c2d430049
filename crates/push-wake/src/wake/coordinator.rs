//! Wake coordinator
//!
//! Drives one wake from trigger to terminal state:
//!
//! ```text
//! Idle -> AwaitingSignal -> Resolved(destination)
//!                        -> Expired
//!                        -> Aborted(reason)
//! ```
//!
//! While awaiting, the loop sleeps until either a listener commits a signal
//! or the tick elapses, then re-checks in fixed order: cancellation, session
//! liveness, push failure, resolution, deadline. The first check that holds
//! decides the terminal state. Subscriptions are guards held for the life of
//! the wake, so they are released on every exit.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::destination::Destination;
use super::request::{SignalOutcome, WakeRequest};
use super::session::{CallCause, CallLeg, CallSession, OriginateRequest, OriginationGateway};
use super::trigger::WakeTrigger;
use crate::context::PushWakeContext;
use crate::error::PushWakeError;
use crate::events::{Subscription, WakeEventHub};
use crate::push::dispatcher::{PushDispatcher, PushRequest};
use crate::push::payload::Notification;
use crate::types::{CorrelationId, PushKind};

/// Why a wake stopped before resolving
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Cancelled through the wake's token
    Cancelled,
    /// The calling leg went away
    SessionGone,
    /// The wake push reached no device
    PushNotDelivered,
    /// No realm in the number and none configured
    NoRealm,
}

/// Terminal (and initial) states of a wake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeState {
    Idle,
    AwaitingSignal,
    Resolved(Destination),
    Expired,
    Aborted(AbortReason),
}

impl WakeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WakeState::Resolved(_) | WakeState::Expired | WakeState::Aborted(_))
    }

    fn cause(&self) -> CallCause {
        match self {
            WakeState::Expired => CallCause::NoAnswer,
            WakeState::Aborted(AbortReason::PushNotDelivered) | WakeState::Aborted(AbortReason::NoRealm) => {
                CallCause::NoRouteDestination
            }
            WakeState::Aborted(AbortReason::Cancelled) | WakeState::Aborted(AbortReason::SessionGone) => {
                CallCause::OriginatorCancel
            }
            _ => CallCause::NormalClearing,
        }
    }
}

/// How a wake ended
#[derive(Debug, Clone)]
pub struct WakeReport {
    pub correlation_id: CorrelationId,
    pub state: WakeState,
    /// From trigger to terminal state, origination not included
    pub waited: Duration,
    pub result: Result<CallLeg, CallCause>,
}

impl WakeReport {
    pub fn is_connected(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Default)]
struct WaitGuards {
    registration: Option<Subscription>,
    outcome: Option<Subscription>,
}

pub struct WakeCoordinator {
    ctx: Arc<PushWakeContext>,
    dispatcher: Arc<PushDispatcher>,
    hub: WakeEventHub,
    gateway: Arc<dyn OriginationGateway>,
}

impl WakeCoordinator {
    pub fn new(
        ctx: Arc<PushWakeContext>,
        dispatcher: Arc<PushDispatcher>,
        hub: WakeEventHub,
        gateway: Arc<dyn OriginationGateway>,
    ) -> Self {
        Self {
            ctx,
            dispatcher,
            hub,
            gateway,
        }
    }

    /// Wake the trigger's subscriber and, once it registers, place the call
    pub async fn wake(
        &self,
        trigger: WakeTrigger,
        session: Arc<dyn CallSession>,
        cancel: CancellationToken,
    ) -> WakeReport {
        let correlation_id = CorrelationId::new();
        let span = info_span!("push_wake", correlation = %correlation_id, user = %trigger.user);
        self.run(correlation_id, trigger, session, cancel).instrument(span).await
    }

    async fn run(
        &self,
        correlation_id: CorrelationId,
        trigger: WakeTrigger,
        session: Arc<dyn CallSession>,
        cancel: CancellationToken,
    ) -> WakeReport {
        let started = Instant::now();
        let settings = self.ctx.settings();

        let realm = trigger
            .realm
            .clone()
            .or_else(|| settings.config.default_realm.clone())
            .filter(|realm| !realm.is_empty());
        let Some(realm) = realm else {
            warn!("No realm for '{}' and no default_realm configured", trigger.user);
            return finish(correlation_id, WakeState::Aborted(AbortReason::NoRealm), started);
        };

        let timeout = trigger.timeout.unwrap_or_else(|| settings.config.default_wake_timeout());
        let request = Arc::new(WakeRequest::new(
            correlation_id.clone(),
            &trigger.user,
            &realm,
            timeout,
            trigger.wait_any_register,
        ));
        if let Some(previous) = &trigger.continues {
            debug!("Fallback leg of wake {}", previous);
        }

        // Subscribe before the push goes out so no early event is missed
        let mut guards = WaitGuards::default();
        let listener = request.clone();
        guards.registration = Some(self.hub.subscribe_registrations(request.key().clone(), move |event| {
            if listener.offer_registration(event) {
                debug!("Registration resolved wake {}", listener.correlation_id());
            }
        }));
        if !trigger.wait_any_register {
            let listener = request.clone();
            guards.outcome = Some(self.hub.subscribe_outcome(correlation_id.clone(), move |outcome| {
                if listener.offer_push_outcome(outcome) {
                    debug!("Push failure ended wake {}", listener.correlation_id());
                }
            }));
        }

        info!(
            "Waking {} for up to {:?} (any register: {}, push: {})",
            request.key(),
            timeout,
            trigger.wait_any_register,
            !trigger.suppress_push
        );
        if !trigger.suppress_push {
            self.send_wake_push(
                &correlation_id,
                &trigger.user,
                &realm,
                &settings.config.voip_app,
                &settings.config.wake_body,
            );
        }

        let state = await_signal(&request, session.as_ref(), &cancel, settings.config.tick_interval()).await;
        let waited = started.elapsed();

        // No further events are of interest past this point
        drop(guards);
        let destination = match state {
            WakeState::Resolved(destination) => destination,
            other => {
                info!("Wake of {} ended: {:?} after {:?}", request.key(), other, waited);
                return finish(correlation_id, other, started);
            }
        };

        let remaining = request.remaining().max(Duration::from_secs(1));
        let dial_string = destination.dial_string();
        info!("Wake of {} resolved after {:?}, dialling {}", request.key(), waited, dial_string);

        let result = self
            .gateway
            .originate(OriginateRequest {
                destination: destination.clone(),
                dial_string,
                timeout: remaining,
                caller_id_name: trigger.caller_id_name.clone(),
                caller_id_number: trigger.caller_id_number.clone(),
            })
            .await;
        match &result {
            Ok(leg) => info!("Wake call to {} connected on leg {}", request.key(), leg.id),
            Err(cause) => info!("Wake call to {} failed: {}", request.key(), cause),
        }

        WakeReport {
            correlation_id,
            state: WakeState::Resolved(destination),
            waited,
            result,
        }
    }

    fn send_wake_push(&self, correlation_id: &CorrelationId, user: &str, realm: &str, app_id: &str, body: &str) {
        let dispatcher = self.dispatcher.clone();
        let request = PushRequest {
            correlation_id: Some(correlation_id.clone()),
            kind: PushKind::VoiceWake,
            app_id: app_id.to_string(),
            subscriber: user.to_string(),
            realm: realm.to_string(),
            notification: Notification::wake(body),
        };
        tokio::spawn(
            async move {
                match dispatcher.notify_subscriber(request).await {
                    Ok(report) => debug!("Wake push sent: {}", report),
                    Err(PushWakeError::NotFound(what)) => debug!("Wake push not sent, no {}", what),
                    Err(e) => warn!("Wake push failed: {}", e),
                }
            }
            .in_current_span(),
        );
    }
}

async fn await_signal(
    request: &WakeRequest,
    session: &dyn CallSession,
    cancel: &CancellationToken,
    tick: Duration,
) -> WakeState {
    loop {
        if cancel.is_cancelled() {
            return WakeState::Aborted(AbortReason::Cancelled);
        }
        if !session.is_live() {
            return WakeState::Aborted(AbortReason::SessionGone);
        }
        match request.outcome() {
            SignalOutcome::PushDeliveryFailed => return WakeState::Aborted(AbortReason::PushNotDelivered),
            SignalOutcome::RegistrationDestination(destination) => return WakeState::Resolved(destination),
            SignalOutcome::Pending => {}
        }
        let now = Instant::now();
        if now >= request.deadline() {
            return WakeState::Expired;
        }

        let nap = (request.deadline() - now).min(tick);
        tokio::select! {
            _ = request.signalled() => {}
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(nap) => {}
        }
    }
}

fn finish(correlation_id: CorrelationId, state: WakeState, started: Instant) -> WakeReport {
    let cause = state.cause();
    WakeReport {
        correlation_id,
        state,
        waited: started.elapsed(),
        result: Err(cause),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_causes() {
        assert_eq!(WakeState::Expired.cause(), CallCause::NoAnswer);
        assert_eq!(
            WakeState::Aborted(AbortReason::PushNotDelivered).cause(),
            CallCause::NoRouteDestination
        );
        assert_eq!(
            WakeState::Aborted(AbortReason::SessionGone).cause(),
            CallCause::OriginatorCancel
        );
        assert!(!WakeState::AwaitingSignal.is_terminal());
        assert!(WakeState::Expired.is_terminal());
    }
}
