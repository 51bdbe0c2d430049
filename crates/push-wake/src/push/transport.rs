//! Push transport abstraction
//!
//! The transport is whatever actually talks to the push provider. It gets a
//! profile, a batch of tokens and a rendered payload, and must answer with one
//! [`TokenOutcome`] per token. A transport-wide failure (nothing could be sent
//! at all) is reported as `Err`, and the dispatcher turns it into a failed
//! outcome for every token of the batch.

use async_trait::async_trait;
use std::fmt;

use super::payload::Payload;
use super::profile::PushProfile;
use crate::error::{PushWakeError, Result};

/// Per-token delivery result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Provider accepted the push
    Delivered,
    /// Provider says the token will never work again
    InvalidToken { reason: String },
    /// Anything else: network trouble, throttling, provider 5xx
    Failed { reason: String },
}

/// Outcome for one token of a send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOutcome {
    pub token: String,
    pub status: DeliveryStatus,
}

impl TokenOutcome {
    pub fn delivered(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            status: DeliveryStatus::Delivered,
        }
    }

    pub fn invalid(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            status: DeliveryStatus::InvalidToken { reason: reason.into() },
        }
    }

    pub fn failed(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            status: DeliveryStatus::Failed { reason: reason.into() },
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self.status, DeliveryStatus::Delivered)
    }
}

/// Overall classification of a send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Every token delivered
    Delivered,
    /// At least one, but not every, token delivered. Still a success.
    PartialSuccess,
    /// No token delivered
    Failed,
    /// Nothing to send to
    NoTokens,
}

/// Result of fanning one payload out to a set of tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    pub outcomes: Vec<TokenOutcome>,
}

impl SendReport {
    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_delivered()).count()
    }

    /// Tokens the provider rejected permanently
    pub fn invalid_tokens(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| match o.status {
            DeliveryStatus::InvalidToken { .. } => Some(o.token.as_str()),
            _ => None,
        })
    }

    /// Permanent rejections as errors, one per token
    pub fn rejections(&self) -> impl Iterator<Item = PushWakeError> + '_ {
        self.outcomes.iter().filter_map(|o| match &o.status {
            DeliveryStatus::InvalidToken { reason } => Some(PushWakeError::rejected(&o.token, reason)),
            _ => None,
        })
    }

    pub fn status(&self) -> SendStatus {
        let delivered = self.delivered_count();
        if self.outcomes.is_empty() {
            SendStatus::NoTokens
        } else if delivered == self.outcomes.len() {
            SendStatus::Delivered
        } else if delivered > 0 {
            SendStatus::PartialSuccess
        } else {
            SendStatus::Failed
        }
    }

    /// At least one token delivered
    pub fn is_success(&self) -> bool {
        self.delivered_count() > 0
    }
}

impl fmt::Display for SendReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} delivered", self.delivered_count(), self.outcomes.len())
    }
}

/// Something that can deliver a payload to push tokens
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn deliver(&self, profile: &PushProfile, tokens: &[String], payload: &Payload) -> Result<Vec<TokenOutcome>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_classification() {
        let mut report = SendReport::default();
        assert_eq!(report.status(), SendStatus::NoTokens);
        assert!(!report.is_success());

        report.outcomes.push(TokenOutcome::delivered("a"));
        assert_eq!(report.status(), SendStatus::Delivered);

        report.outcomes.push(TokenOutcome::invalid("b", "Unregistered"));
        assert_eq!(report.status(), SendStatus::PartialSuccess);
        assert!(report.is_success());
        assert_eq!(report.invalid_tokens().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(
            report.rejections().collect::<Vec<_>>(),
            vec![PushWakeError::rejected("b", "Unregistered")]
        );
        assert_eq!(report.to_string(), "1/2 delivered");

        let failed = SendReport {
            outcomes: vec![TokenOutcome::failed("c", "timeout")],
        };
        assert_eq!(failed.status(), SendStatus::Failed);
    }
}
