//! Registration ingestion
//!
//! Turns registrar events into token registry upserts. Refresh-only
//! registrations are skipped, as are contacts without push parameters.

use tracing::debug;

use crate::contact::PushParams;
use crate::events::RegistrationEvent;
use crate::registry::TokenRegistry;
use crate::types::PushKind;

/// Store the push tokens carried by a registration; returns how many were stored
pub async fn ingest_registration(registry: &TokenRegistry, event: &RegistrationEvent) -> usize {
    if event.update_only {
        debug!("Skipping refresh-only registration for {}", event.key());
        return 0;
    }

    let Some(params) = PushParams::parse(&event.contact) else {
        debug!("Registration of {} carries no push parameters", event.key());
        return 0;
    };

    let tokens = [
        (PushKind::VoiceWake, params.voip_token.as_deref()),
        (PushKind::Message, params.im_token.as_deref()),
    ];

    let mut stored = 0;
    for (kind, token) in tokens {
        let Some(token) = token else { continue };
        let outcome = registry
            .register(
                &event.subscriber,
                &event.realm,
                kind,
                &params.app_id,
                token,
                params.platform.clone(),
            )
            .await;
        if outcome.is_some() {
            stored += 1;
        }
    }
    stored
}
