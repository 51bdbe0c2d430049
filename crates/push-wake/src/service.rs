//! Push-wake service
//!
//! Wires context, registry, event hub, dispatcher and coordinator together
//! and exposes the operations the switching side calls into.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::admin;
use crate::config::PushWakeConfig;
use crate::context::PushWakeContext;
use crate::error::Result;
use crate::events::{PushOutcome, RegistrationEvent, WakeEventHub};
use crate::ingest::ingest_registration;
use crate::push::dispatcher::PushDispatcher;
use crate::push::http::HttpPushTransport;
use crate::push::transport::PushTransport;
use crate::registry::{SqliteTokenStore, TokenRegistry, TokenStore};
use crate::wake::coordinator::{WakeCoordinator, WakeReport};
use crate::wake::session::{CallSession, OriginationGateway};
use crate::wake::trigger::WakeTrigger;

pub struct PushWake {
    ctx: Arc<PushWakeContext>,
    registry: TokenRegistry,
    hub: WakeEventHub,
    dispatcher: Arc<PushDispatcher>,
    coordinator: WakeCoordinator,
}

impl PushWake {
    /// Build over an explicit store and transport
    pub fn new(
        ctx: Arc<PushWakeContext>,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn PushTransport>,
        gateway: Arc<dyn OriginationGateway>,
    ) -> Self {
        let registry = TokenRegistry::new(store);
        let hub = WakeEventHub::new();
        let dispatcher = Arc::new(PushDispatcher::new(ctx.clone(), registry.clone(), transport, hub.clone()));
        let coordinator = WakeCoordinator::new(ctx.clone(), dispatcher.clone(), hub.clone(), gateway);
        Self {
            ctx,
            registry,
            hub,
            dispatcher,
            coordinator,
        }
    }

    /// Validate the configuration, open the SQLite store and use the HTTP transport
    pub async fn start(config: PushWakeConfig, gateway: Arc<dyn OriginationGateway>) -> Result<Self> {
        let ctx = PushWakeContext::load(config)?;
        let settings = ctx.settings();
        let store = SqliteTokenStore::connect(&settings.config.database_url, settings.config.max_db_connections).await?;
        info!("Push-wake started");
        Ok(Self::new(ctx, Arc::new(store), Arc::new(HttpPushTransport::new()), gateway))
    }

    /// A registrar event: store its tokens and let waiting wakes see it
    pub async fn on_registration(&self, event: &RegistrationEvent) {
        let stored = ingest_registration(&self.registry, event).await;
        let woken = self.hub.publish_registration(event);
        debug!(
            "Registration of {}: {} token(s) stored, {} wake(s) notified",
            event.key(),
            stored,
            woken
        );
    }

    /// A push outcome reported from outside this service
    pub fn on_push_outcome(&self, outcome: &PushOutcome) {
        self.hub.publish_outcome(outcome);
    }

    pub async fn wake(
        &self,
        trigger: WakeTrigger,
        session: Arc<dyn CallSession>,
        cancel: CancellationToken,
    ) -> WakeReport {
        self.coordinator.wake(trigger, session, cancel).await
    }

    /// Run an admin push command; returns the text reply
    pub async fn admin_command(&self, input: &str) -> String {
        admin::execute(&self.dispatcher, input).await
    }

    /// Swap in a new configuration; the running one stays on error
    pub fn reload(&self, config: PushWakeConfig) -> Result<u64> {
        self.ctx.reload(config)
    }

    pub fn context(&self) -> &Arc<PushWakeContext> {
        &self.ctx
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn hub(&self) -> &WakeEventHub {
        &self.hub
    }

    pub fn dispatcher(&self) -> &Arc<PushDispatcher> {
        &self.dispatcher
    }

    pub async fn shutdown(self) {
        self.registry.close().await;
        info!("Push-wake stopped");
    }
}
