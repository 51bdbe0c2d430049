//! Core types for push-wake

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PushWakeError;

/// What a push token is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushKind {
    /// VoIP wake-up pushes (`pn-voip-tok`)
    #[serde(rename = "voip", alias = "voice", alias = "voice-wake")]
    VoiceWake,
    /// Instant message pushes (`pn-im-tok`)
    #[serde(rename = "im", alias = "message")]
    Message,
}

impl PushKind {
    /// Name used in storage and profile keys
    pub fn as_str(&self) -> &'static str {
        match self {
            PushKind::VoiceWake => "voip",
            PushKind::Message => "im",
        }
    }
}

impl fmt::Display for PushKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PushKind {
    type Err = PushWakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "voip" | "voice" | "voice-wake" => Ok(PushKind::VoiceWake),
            "im" | "message" => Ok(PushKind::Message),
            other => Err(PushWakeError::InvalidCommand(format!("unknown push kind '{}'", other))),
        }
    }
}

/// Push platform a token belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Apns,
    Fcm,
    Other(String),
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Platform::Apns => "apns",
            Platform::Fcm => "fcm",
            Platform::Other(name) => name,
        }
    }

    /// Parse a `pn-provider` style name; unknown names are kept verbatim
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "apns" | "apple" | "ios" => Platform::Apns,
            "fcm" | "gcm" | "android" => Platform::Fcm,
            other => Platform::Other(other.to_string()),
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Apns
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored device push token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceToken {
    pub subscriber: String,
    pub realm: String,
    pub kind: PushKind,
    pub platform: Platform,
    pub token: String,
    pub app_id: String,
    pub last_seen: DateTime<Utc>,
}

/// What a lookup hands back: enough to address one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRef {
    pub platform: Platform,
    pub app_id: String,
    pub token: String,
}

impl From<&DeviceToken> for TokenRef {
    fn from(token: &DeviceToken) -> Self {
        TokenRef {
            platform: token.platform.clone(),
            app_id: token.app_id.clone(),
            token: token.token.clone(),
        }
    }
}

/// `user@realm`, compared case-insensitively like the registrar does
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberKey {
    user: String,
    realm: String,
}

impl SubscriberKey {
    pub fn new(user: &str, realm: &str) -> Self {
        Self {
            user: user.trim().to_ascii_lowercase(),
            realm: realm.trim().to_ascii_lowercase(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }
}

impl fmt::Display for SubscriberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.realm)
    }
}

/// Links a wake push to its delivery-outcome event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_kind_aliases() {
        assert_eq!("voice".parse::<PushKind>().unwrap(), PushKind::VoiceWake);
        assert_eq!("VOIP".parse::<PushKind>().unwrap(), PushKind::VoiceWake);
        assert_eq!("message".parse::<PushKind>().unwrap(), PushKind::Message);
        assert!("sms".parse::<PushKind>().is_err());

        let kind: PushKind = serde_json::from_str("\"voice-wake\"").unwrap();
        assert_eq!(kind, PushKind::VoiceWake);
        assert_eq!(serde_json::to_string(&PushKind::Message).unwrap(), "\"im\"");
    }

    #[test]
    fn test_subscriber_key_is_case_insensitive() {
        assert_eq!(
            SubscriberKey::new("Alice", "Example.COM"),
            SubscriberKey::new("alice", "example.com")
        );
        assert_eq!(SubscriberKey::new("Alice", "example.com").to_string(), "alice@example.com");
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!(Platform::parse(""), Platform::Apns);
        assert_eq!(Platform::parse("Android"), Platform::Fcm);
        assert_eq!(Platform::parse("webpush"), Platform::Other("webpush".to_string()));
    }
}
