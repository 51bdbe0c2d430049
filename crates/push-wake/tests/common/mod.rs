//! Shared mocks for push-wake integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rvoip_push_wake::push::payload::Payload;
use rvoip_push_wake::push::profile::{AuthMode, PushProfile};
use rvoip_push_wake::push::transport::{DeliveryStatus, PushTransport, TokenOutcome};
use rvoip_push_wake::wake::session::OriginateRequest;
use rvoip_push_wake::{
    CallCause, CallLeg, CallSession, MemoryTokenStore, OriginationGateway, ProfileConfig, PushKind, PushWake,
    PushWakeConfig, PushWakeContext, PushWakeError, RegistrationEvent, Result,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const APP: &str = "com.acme.phone";
pub const REALM: &str = "example.com";

/// One recorded transport call
#[derive(Debug, Clone)]
pub struct SentBatch {
    pub profile: String,
    pub tokens: Vec<String>,
    pub payload: serde_json::Value,
}

/// Transport answering from a script; tokens not in the script are delivered
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<HashMap<String, DeliveryStatus>>,
    sent: Mutex<Vec<SentBatch>>,
    fail_all: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, token: &str, status: DeliveryStatus) {
        self.script.lock().insert(token.to_string(), status);
    }

    pub fn reject(&self, token: &str) {
        self.answer(
            token,
            DeliveryStatus::InvalidToken {
                reason: "Unregistered".to_string(),
            },
        );
    }

    pub fn fail(&self, token: &str) {
        self.answer(
            token,
            DeliveryStatus::Failed {
                reason: "HTTP 503".to_string(),
            },
        );
    }

    pub fn fail_everything(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn sent(&self) -> Vec<SentBatch> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl PushTransport for MockTransport {
    async fn deliver(&self, profile: &PushProfile, tokens: &[String], payload: &Payload) -> Result<Vec<TokenOutcome>> {
        self.sent.lock().push(SentBatch {
            profile: profile.name.clone(),
            tokens: tokens.to_vec(),
            payload: payload.as_json().clone(),
        });

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(PushWakeError::transport("connection refused"));
        }

        let script = self.script.lock();
        Ok(tokens
            .iter()
            .map(|token| TokenOutcome {
                token: token.clone(),
                status: script.get(token).cloned().unwrap_or(DeliveryStatus::Delivered),
            })
            .collect())
    }
}

/// Calling leg whose liveness the test controls
pub struct MockSession {
    live: AtomicBool,
}

impl MockSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            live: AtomicBool::new(true),
        })
    }

    pub fn hang_up(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

impl CallSession for MockSession {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Gateway recording every originate
#[derive(Default)]
pub struct MockGateway {
    requests: Mutex<Vec<OriginateRequest>>,
    refuse_with: Mutex<Option<CallCause>>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refuse(&self, cause: CallCause) {
        *self.refuse_with.lock() = Some(cause);
    }

    pub fn requests(&self) -> Vec<OriginateRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl OriginationGateway for MockGateway {
    async fn originate(&self, request: OriginateRequest) -> std::result::Result<CallLeg, CallCause> {
        let n = {
            let mut requests = self.requests.lock();
            requests.push(request);
            requests.len()
        };
        match self.refuse_with.lock().clone() {
            Some(cause) => Err(cause),
            None => Ok(CallLeg {
                id: format!("leg-{}", n),
            }),
        }
    }
}

pub fn profile(kind: PushKind) -> ProfileConfig {
    ProfileConfig {
        app_id: APP.to_string(),
        kind,
        target: "https://push.example.net/3/device/{token}".to_string(),
        auth: AuthMode::None,
        template: None,
        connect_timeout_ms: 1_000,
        total_timeout_ms: 5_000,
    }
}

pub fn test_config() -> PushWakeConfig {
    let mut config = PushWakeConfig::new(APP);
    config.default_realm = Some(REALM.to_string());
    config.tick_interval_ms = 500;
    config.profiles = vec![profile(PushKind::VoiceWake), profile(PushKind::Message)];
    config
}

pub struct Harness {
    pub service: Arc<PushWake>,
    pub transport: Arc<MockTransport>,
    pub gateway: Arc<MockGateway>,
}

pub fn harness_with(config: PushWakeConfig) -> Harness {
    let ctx = PushWakeContext::load(config).expect("test config is valid");
    let transport = MockTransport::new();
    let gateway = MockGateway::new();
    let service = PushWake::new(ctx, Arc::new(MemoryTokenStore::new()), transport.clone(), gateway.clone());
    Harness {
        service: Arc::new(service),
        transport,
        gateway,
    }
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn registration(user: &str, call_id: &str, contact: &str) -> RegistrationEvent {
    RegistrationEvent {
        subscriber: user.to_string(),
        realm: REALM.to_string(),
        contact: contact.to_string(),
        call_id: call_id.to_string(),
        profile: "external".to_string(),
        update_only: false,
    }
}

/// Contact of a device advertising a VoIP token
pub fn push_contact(host: &str, voip_token: &str) -> String {
    format!("<sip:{}:5060;transport=tls;app-id={};pn-voip-tok={}>", host, APP, voip_token)
}

/// Let spawned tasks (background invalidation, wake pushes) run
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
