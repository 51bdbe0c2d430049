//! Wake flow tests
//!
//! Run on a paused clock so deadlines and ticks are exact.

mod common;

use common::*;
use rvoip_push_wake::wake::coordinator::AbortReason;
use rvoip_push_wake::wake::request::{SignalOutcome, WakeRequest};
use rvoip_push_wake::{CallCause, CorrelationId, PushKind, WakeState, WakeTrigger};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Store a VoIP token for a user through a registration
async fn seed_token(h: &Harness, user: &str, token: &str) {
    let contact = push_contact(&format!("{}@10.0.0.9", user), token);
    h.service.on_registration(&registration(user, "seed", &contact)).await;
}

fn spawn_registration(h: &Harness, after: Duration, event: rvoip_push_wake::RegistrationEvent) {
    let service = h.service.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        service.on_registration(&event).await;
    });
}

#[tokio::test(start_paused = true)]
async fn test_registration_resolves_and_dials() {
    let h = harness();
    seed_token(&h, "alice", "tok-a").await;

    spawn_registration(
        &h,
        Duration::from_secs(4),
        registration("alice", "reg-77", "\"Alice\" <sip:alice@10.0.0.5:5060;transport=tls>"),
    );

    let trigger = WakeTrigger::new("alice@example.com")
        .with_timeout(Duration::from_secs(20))
        .with_caller_id(Some("Front Desk".to_string()), Some("100".to_string()));
    let report = h.service.wake(trigger, MockSession::new(), CancellationToken::new()).await;

    let WakeState::Resolved(destination) = &report.state else {
        panic!("expected resolution, got {:?}", report.state);
    };
    assert_eq!(destination.call_id, "reg-77");
    assert_eq!(report.waited, Duration::from_secs(4));
    assert_eq!(report.result.as_ref().unwrap().id, "leg-1");

    let requests = h.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].timeout, Duration::from_secs(16));
    assert_eq!(requests[0].caller_id_name.as_deref(), Some("Front Desk"));
    assert_eq!(requests[0].caller_id_number.as_deref(), Some("100"));
    assert!(requests[0].dial_string.starts_with(
        "[registration_token=reg-77,originate_timeout=20]sofia/external/sip:alice@10.0.0.5:5060;transport=tls:_:"
    ));
    assert!(requests[0].dial_string.ends_with("push_wake/alice@example.com"));

    // Exactly one wake push, body only
    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].profile, "com.acme.phone-voip");
    assert_eq!(sent[0].tokens, vec!["tok-a".to_string()]);
    assert_eq!(sent[0].payload, json!({"aps": {"alert": {"body": "WakeUP"}}}));

    assert_eq!(h.service.hub().active_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_expires_within_one_tick_of_deadline() {
    for (timeout_ms, tick_ms) in [(3_000u64, 500u64), (1_000, 400), (2_500, 999)] {
        let mut config = test_config();
        config.tick_interval_ms = tick_ms;
        let h = harness_with(config);

        let trigger = WakeTrigger::new("bob@example.com").with_timeout(Duration::from_millis(timeout_ms));
        let report = h.service.wake(trigger, MockSession::new(), CancellationToken::new()).await;

        assert_eq!(report.state, WakeState::Expired);
        assert_eq!(report.result, Err(CallCause::NoAnswer));
        let deadline = Duration::from_millis(timeout_ms);
        assert!(report.waited >= deadline, "waited {:?}", report.waited);
        assert!(report.waited < deadline + Duration::from_millis(tick_ms), "waited {:?}", report.waited);
        assert!(h.gateway.requests().is_empty());
        assert_eq!(h.service.hub().active_subscriptions(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_zero_tokens_sends_nothing_but_still_waits() {
    let h = harness();

    spawn_registration(
        &h,
        Duration::from_secs(7),
        registration("alice", "reg-1", "<sip:alice@10.0.0.5>"),
    );
    let report = h
        .service
        .wake(WakeTrigger::new("alice@example.com"), MockSession::new(), CancellationToken::new())
        .await;

    assert!(h.transport.sent().is_empty());
    assert!(matches!(report.state, WakeState::Resolved(_)));
    assert_eq!(report.waited, Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_zero_tokens_times_out_after_default_window() {
    let h = harness();
    let report = h
        .service
        .wake(WakeTrigger::new("alice@example.com"), MockSession::new(), CancellationToken::new())
        .await;

    assert!(h.transport.sent().is_empty());
    assert_eq!(report.state, WakeState::Expired);
    assert!(report.waited >= Duration::from_secs(60));
    assert!(report.waited < Duration::from_millis(60_500));
}

#[tokio::test(start_paused = true)]
async fn test_update_only_registration_does_not_resolve() {
    let h = harness();

    let mut refresh = registration("alice", "reg-refresh", "<sip:alice@10.0.0.5>");
    refresh.update_only = true;
    spawn_registration(&h, Duration::from_secs(1), refresh);
    spawn_registration(
        &h,
        Duration::from_secs(3),
        registration("alice", "reg-new", "<sip:alice@10.0.0.6>"),
    );

    let report = h
        .service
        .wake(
            WakeTrigger::new("alice@example.com").with_timeout(Duration::from_secs(10)),
            MockSession::new(),
            CancellationToken::new(),
        )
        .await;

    let WakeState::Resolved(destination) = &report.state else {
        panic!("expected resolution, got {:?}", report.state);
    };
    assert_eq!(destination.call_id, "reg-new");
    assert_eq!(destination.contact_uri, "sip:alice@10.0.0.6");
    assert_eq!(report.waited, Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_push_failure_aborts_wake() {
    let h = harness();
    seed_token(&h, "carol", "tok-c").await;
    h.transport.fail("tok-c");

    let report = h
        .service
        .wake(WakeTrigger::new("carol@example.com"), MockSession::new(), CancellationToken::new())
        .await;

    assert_eq!(report.state, WakeState::Aborted(AbortReason::PushNotDelivered));
    assert_eq!(report.result, Err(CallCause::NoRouteDestination));
    assert!(report.waited < Duration::from_secs(1));
    assert!(h.gateway.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_any_register_mode_ignores_push_failure() {
    let h = harness();
    seed_token(&h, "carol", "tok-c").await;
    h.transport.fail("tok-c");
    spawn_registration(
        &h,
        Duration::from_secs(2),
        registration("carol", "reg-9", "<sip:carol@10.0.0.7>"),
    );

    let trigger = WakeTrigger::new("carol@example.com").wait_any_register(true);
    let report = h.service.wake(trigger, MockSession::new(), CancellationToken::new()).await;

    assert!(matches!(report.state, WakeState::Resolved(_)));
    assert!(h.gateway.requests()[0].dial_string.contains("push_wake_any_register=1"));
}

#[tokio::test(start_paused = true)]
async fn test_session_gone_beats_registration_in_same_tick() {
    let h = harness();
    let session = MockSession::new();

    let service = h.service.clone();
    let caller = session.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        caller.hang_up();
        service
            .on_registration(&registration("dave", "reg-late", "<sip:dave@10.0.0.8>"))
            .await;
    });

    let report = h
        .service
        .wake(WakeTrigger::new("dave@example.com"), session, CancellationToken::new())
        .await;

    assert_eq!(report.state, WakeState::Aborted(AbortReason::SessionGone));
    assert_eq!(report.result, Err(CallCause::OriginatorCancel));
    assert!(h.gateway.requests().is_empty());
    assert_eq!(h.service.hub().active_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_ends_wake() {
    let h = harness();
    let cancel = CancellationToken::new();

    let trigger_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger_cancel.cancel();
    });

    let report = h
        .service
        .wake(WakeTrigger::new("erin@example.com"), MockSession::new(), cancel)
        .await;

    assert_eq!(report.state, WakeState::Aborted(AbortReason::Cancelled));
    assert!(report.waited >= Duration::from_secs(5));
    assert!(report.waited < Duration::from_millis(5_500));
}

#[tokio::test(start_paused = true)]
async fn test_suppressed_push_and_fallback_leg() {
    let h = harness();
    seed_token(&h, "frank", "tok-f").await;

    let vars: HashMap<String, String> = [
        ("originate_timeout".to_string(), "2".to_string()),
        ("push_wake_correlation".to_string(), "w-earlier".to_string()),
    ]
    .into_iter()
    .collect();
    let trigger = WakeTrigger::from_variables("frank@example.com", &vars);
    let report = h.service.wake(trigger, MockSession::new(), CancellationToken::new()).await;

    assert!(h.transport.sent().is_empty());
    assert_eq!(report.state, WakeState::Expired);
    assert_eq!(report.waited, Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_missing_realm_aborts_immediately() {
    let mut config = test_config();
    config.default_realm = None;
    let h = harness_with(config);

    let report = h
        .service
        .wake(WakeTrigger::new("1001"), MockSession::new(), CancellationToken::new())
        .await;
    assert_eq!(report.state, WakeState::Aborted(AbortReason::NoRealm));
    assert_eq!(report.result, Err(CallCause::NoRouteDestination));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_registrations_dial_once() {
    let h = harness();
    for i in 0..8u64 {
        spawn_registration(
            &h,
            Duration::from_secs(3),
            registration("gina", &format!("reg-{}", i), &format!("<sip:gina@10.0.1.{}>", i)),
        );
    }

    let report = h
        .service
        .wake(WakeTrigger::new("gina@example.com"), MockSession::new(), CancellationToken::new())
        .await;

    assert!(matches!(report.state, WakeState::Resolved(_)));
    assert_eq!(h.gateway.requests().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_at_most_one_registration_wins_under_contention() {
    let request = Arc::new(WakeRequest::new(
        CorrelationId::from("w-race"),
        "hank",
        "example.com",
        Duration::from_secs(30),
        false,
    ));

    let mut handles = Vec::new();
    for i in 0..32 {
        let request = request.clone();
        handles.push(tokio::spawn(async move {
            let event = registration("hank", &format!("reg-{}", i), "<sip:hank@10.0.2.1>");
            (i, request.offer_registration(&event))
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let (i, won) = handle.await.unwrap();
        if won {
            winners.push(i);
        }
    }

    assert_eq!(winners.len(), 1);
    match request.outcome() {
        SignalOutcome::RegistrationDestination(destination) => {
            assert_eq!(destination.call_id, format!("reg-{}", winners[0]));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_message_tokens_are_not_used_for_wake() {
    let h = harness();
    let contact = format!("<sip:ivy@10.0.0.3;app-id={};pn-im-tok=chat-only>", APP);
    h.service.on_registration(&registration("ivy", "seed", &contact)).await;
    assert_eq!(
        h.service.registry().lookup("ivy", REALM, PushKind::Message).await.len(),
        1
    );

    let report = h
        .service
        .wake(
            WakeTrigger::new("ivy@example.com").with_timeout(Duration::from_secs(1)),
            MockSession::new(),
            CancellationToken::new(),
        )
        .await;
    assert!(h.transport.sent().is_empty());
    assert_eq!(report.state, WakeState::Expired);
}
