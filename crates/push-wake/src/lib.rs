//! # Push-Wake
//!
//! Push-notification wake-up for mobile SIP subscribers in RVoIP.
//!
//! Mobile clients drop their SIP registration to save power and advertise
//! push tokens in their Contact instead. This crate:
//! - Stores those tokens per subscriber (SQLite through sqlx, or in memory)
//! - Renders and sends pushes through per-app provider profiles
//! - Wakes a subscriber for an incoming call, waits for the device to
//!   register again and bridges the call to the fresh contact
//! - Answers administrative push commands
//!
//! ## Architecture
//!
//! All state hangs off an explicit [`PushWakeContext`]. Registrar events and
//! push outcomes flow through a typed [`WakeEventHub`]; each wake holds its
//! subscriptions as guards and waits on a notification with a liveness tick.

pub mod admin;
pub mod config;
pub mod contact;
pub mod context;
pub mod error;
pub mod events;
pub mod ingest;
pub mod logging;
pub mod parser;
pub mod push;
pub mod registry;
pub mod service;
pub mod types;
pub mod wake;

pub use config::{ProfileConfig, PushWakeConfig};
pub use context::PushWakeContext;
pub use error::{PushWakeError, Result};
pub use events::{PushOutcome, RegistrationEvent, Subscription, WakeEventHub};
pub use logging::{setup_logging, LoggingConfig};
pub use push::{HttpPushTransport, Notification, PushDispatcher, PushTransport, SendReport};
pub use registry::{MemoryTokenStore, SqliteTokenStore, TokenRegistry, TokenStore};
pub use service::PushWake;
pub use types::{CorrelationId, DeviceToken, Platform, PushKind, SubscriberKey, TokenRef};
pub use wake::{CallCause, CallLeg, CallSession, OriginationGateway, WakeReport, WakeState, WakeTrigger};

use std::sync::Arc;

/// Set up logging from the configuration and start the service
///
/// A global subscriber installed by the host application is left in place.
pub async fn init(config: PushWakeConfig, gateway: Arc<dyn OriginationGateway>) -> Result<PushWake> {
    let logging = LoggingConfig::from_config(&config)?;
    if tracing::dispatcher::has_been_set() {
        tracing::debug!("Global subscriber already installed, keeping it");
    } else {
        setup_logging(logging)?;
    }
    PushWake::start(config, gateway).await
}
