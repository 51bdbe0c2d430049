//! Push dispatcher
//!
//! Builds the payload for a profile, fans it out to a set of tokens and
//! classifies the result. Provider rejections remove the token from the
//! registry when the caller allows it. A correlated send publishes its
//! outcome on the event hub so a waiting wake can react.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::payload::{Notification, Payload};
use super::profile::PushProfile;
use super::transport::{PushTransport, SendReport, TokenOutcome};
use crate::context::PushWakeContext;
use crate::error::{PushWakeError, Result};
use crate::events::{PushOutcome, WakeEventHub};
use crate::registry::TokenRegistry;
use crate::types::{CorrelationId, PushKind};

/// What to do with tokens the provider rejects permanently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTokenPolicy {
    /// Remove them from the registry
    Invalidate,
    /// Leave the registry alone (explicit token lists from admin commands)
    Keep,
}

/// A push addressed to a subscriber rather than to tokens
#[derive(Debug, Clone)]
pub struct PushRequest {
    /// Set for pushes a wake is waiting on
    pub correlation_id: Option<CorrelationId>,
    pub kind: PushKind,
    pub app_id: String,
    pub subscriber: String,
    pub realm: String,
    pub notification: Notification,
}

pub struct PushDispatcher {
    ctx: Arc<PushWakeContext>,
    registry: TokenRegistry,
    transport: Arc<dyn PushTransport>,
    hub: WakeEventHub,
}

impl PushDispatcher {
    pub fn new(
        ctx: Arc<PushWakeContext>,
        registry: TokenRegistry,
        transport: Arc<dyn PushTransport>,
        hub: WakeEventHub,
    ) -> Self {
        Self {
            ctx,
            registry,
            transport,
            hub,
        }
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Find a profile in the current configuration
    pub fn profile(&self, app_id: &str, kind: PushKind) -> Option<Arc<PushProfile>> {
        self.ctx.settings().profiles.locate(app_id, kind)
    }

    pub fn build_payload(&self, profile: &PushProfile, notification: &Notification) -> Payload {
        profile.template.render(notification)
    }

    /// Deliver one payload to every token
    ///
    /// The whole batch is bounded by the profile's total timeout. Tokens the
    /// transport did not report on count as failed.
    pub async fn send(
        &self,
        profile: &PushProfile,
        tokens: &[String],
        payload: &Payload,
        policy: InvalidTokenPolicy,
    ) -> SendReport {
        if tokens.is_empty() {
            debug!("No tokens to send to via '{}'", profile.name);
            return SendReport::default();
        }

        debug!("Sending via '{}' to {} token(s): {}", profile.name, tokens.len(), payload);
        let delivered =
            tokio::time::timeout(profile.total_timeout, self.transport.deliver(profile, tokens, payload)).await;

        let outcomes = match delivered {
            Ok(Ok(outcomes)) => outcomes,
            Ok(Err(e)) => {
                warn!("Push via '{}' failed: {}", profile.name, e);
                tokens.iter().map(|t| TokenOutcome::failed(t, e.to_string())).collect()
            }
            Err(_) => {
                let err = PushWakeError::Timeout(format!(
                    "push via '{}' after {:?}",
                    profile.name, profile.total_timeout
                ));
                warn!("{}", err);
                tokens.iter().map(|t| TokenOutcome::failed(t, err.to_string())).collect()
            }
        };
        let report = complete_report(tokens, outcomes);

        if self.ctx.settings().config.debug {
            for outcome in &report.outcomes {
                debug!("  {} -> {:?}", outcome.token, outcome.status);
            }
        }
        info!("Push via '{}': {}", profile.name, report);

        if policy == InvalidTokenPolicy::Invalidate {
            for rejection in report.rejections() {
                let PushWakeError::ProviderRejected { token, .. } = &rejection else {
                    continue;
                };
                info!("{}, invalidating", rejection);
                // Fire and forget
                drop(self.registry.invalidate(token));
            }
        }
        report
    }

    /// Look up the subscriber's tokens and push to them
    ///
    /// `NotFound` when there is no profile or no token for the profile's app;
    /// nothing is published in that case. Otherwise, if the request is
    /// correlated, its outcome is published on the hub.
    pub async fn notify_subscriber(&self, request: PushRequest) -> Result<SendReport> {
        let Some(profile) = self.profile(&request.app_id, request.kind) else {
            debug!("No {} profile for app '{}'", request.kind, request.app_id);
            return Err(PushWakeError::not_found(format!(
                "profile '{}-{}'",
                request.app_id, request.kind
            )));
        };

        let tokens: Vec<String> = self
            .registry
            .lookup(&request.subscriber, &request.realm, request.kind)
            .await
            .into_iter()
            .filter(|t| t.app_id == profile.app_id)
            .map(|t| t.token)
            .collect();
        if tokens.is_empty() {
            debug!(
                "No {} tokens for {}@{} (app '{}')",
                request.kind, request.subscriber, request.realm, profile.app_id
            );
            return Err(PushWakeError::not_found(format!(
                "{} tokens for {}@{}",
                request.kind, request.subscriber, request.realm
            )));
        }

        let payload = self.build_payload(&profile, &request.notification);
        let report = self.send(&profile, &tokens, &payload, InvalidTokenPolicy::Invalidate).await;

        if let Some(correlation_id) = request.correlation_id {
            let outcome = PushOutcome {
                correlation_id,
                delivered: report.is_success(),
            };
            let listeners = self.hub.publish_outcome(&outcome);
            debug!(
                "Published push outcome {} (delivered: {}) to {} listener(s)",
                outcome.correlation_id, outcome.delivered, listeners
            );
        }
        Ok(report)
    }
}

/// Exactly one outcome per requested token
fn complete_report(tokens: &[String], mut outcomes: Vec<TokenOutcome>) -> SendReport {
    let requested: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    outcomes.retain(|o| requested.contains(o.token.as_str()));

    let reported: HashSet<String> = outcomes.iter().map(|o| o.token.clone()).collect();
    for token in tokens {
        if !reported.contains(token) {
            outcomes.push(TokenOutcome::failed(token, "no outcome reported"));
        }
    }
    SendReport { outcomes }
}
