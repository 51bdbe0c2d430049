//! Administrative push command
//!
//! Accepts a JSON document and answers with a one-line text reply:
//!
//! ```json
//! {"app_id": "com.acme", "type": "im", "payload": {"body": "hi"}, "tokens": ["abc"]}
//! ```
//!
//! Instead of `tokens`, `user` and `realm` may name a subscriber whose stored
//! tokens are used. Tokens given explicitly are never invalidated, whatever
//! the provider says about them. Fields of the wrong JSON type are ignored
//! rather than failing the whole command.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{PushWakeError, Result};
use crate::push::dispatcher::{InvalidTokenPolicy, PushDispatcher};
use crate::push::payload::{lenient_name, lenient_text, Notification};
use crate::types::PushKind;

pub const USAGE: &str = r#"{"app_id":"","type":"[im|voip]","payload":{"body":"","sound":"","badge":0,"content_available":false,"action_key":"","image":"","category":"","custom":[{"name":"","value":""}]},"tokens":[""]}"#;

pub const REPLY_SENT: &str = "Sent";
pub const REPLY_NOT_SENT: &str = "Not sent";

const MISSING_TARGET: &str = "app_id/type not set";

#[derive(Debug, Deserialize)]
struct RawCommand {
    #[serde(default, deserialize_with = "lenient_name")]
    app_id: String,
    #[serde(default, rename = "type", deserialize_with = "lenient_name")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    tokens: Value,
    #[serde(default, deserialize_with = "lenient_text")]
    user: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    realm: Option<String>,
}

/// Who the command pushes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    Tokens(Vec<String>),
    Subscriber { user: String, realm: String },
}

/// A parsed admin push command
#[derive(Debug, Clone, PartialEq)]
pub struct AdminCommand {
    pub app_id: String,
    pub kind: PushKind,
    pub notification: Option<Notification>,
    pub recipients: Recipients,
}

impl AdminCommand {
    pub fn parse(input: &str) -> Result<Self> {
        let raw: RawCommand = serde_json::from_str(input)?;
        if raw.app_id.trim().is_empty() || raw.kind.trim().is_empty() {
            return Err(PushWakeError::InvalidCommand(MISSING_TARGET.to_string()));
        }
        let kind: PushKind = raw.kind.parse()?;

        // Non-string entries are skipped
        let tokens: Vec<String> = raw
            .tokens
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let recipients = match (tokens.is_empty(), raw.user, raw.realm) {
            (false, _, _) => Recipients::Tokens(tokens),
            (true, Some(user), Some(realm)) if !user.is_empty() && !realm.is_empty() => {
                Recipients::Subscriber { user, realm }
            }
            _ => Recipients::Tokens(Vec::new()),
        };

        Ok(Self {
            app_id: raw.app_id.trim().to_string(),
            kind,
            notification: raw
                .payload
                .filter(Value::is_object)
                .and_then(|payload| serde_json::from_value(payload).ok()),
            recipients,
        })
    }
}

/// Run one admin command and produce its reply
pub async fn execute(dispatcher: &PushDispatcher, input: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return format!("USAGE: {}", USAGE);
    }

    let command = match AdminCommand::parse(input) {
        Ok(command) => command,
        Err(PushWakeError::InvalidCommand(msg)) if msg == MISSING_TARGET => {
            return format!("{}. USAGE: {}", MISSING_TARGET, USAGE);
        }
        Err(e) => {
            debug!("Rejected admin command: {}", e);
            return format!("Wrong JSON data. USAGE: {}", USAGE);
        }
    };

    send(dispatcher, command).await
}

async fn send(dispatcher: &PushDispatcher, command: AdminCommand) -> String {
    let Some(profile) = dispatcher.profile(&command.app_id, command.kind) else {
        info!("Admin push: no profile '{}-{}'", command.app_id, command.kind);
        return format!("Profile '{}-{}' not found.", command.app_id, command.kind);
    };
    let Some(notification) = command.notification else {
        info!("Admin push: payload not set");
        return REPLY_NOT_SENT.to_string();
    };

    let (tokens, policy) = match command.recipients {
        Recipients::Tokens(tokens) => (tokens, InvalidTokenPolicy::Keep),
        Recipients::Subscriber { user, realm } => {
            let tokens: Vec<String> = dispatcher
                .registry()
                .lookup(&user, &realm, command.kind)
                .await
                .into_iter()
                .filter(|t| t.app_id == profile.app_id)
                .map(|t| t.token)
                .collect();
            (tokens, InvalidTokenPolicy::Invalidate)
        }
    };
    if tokens.is_empty() {
        info!("Admin push: no tokens");
        return REPLY_NOT_SENT.to_string();
    }

    let payload = dispatcher.build_payload(&profile, &notification);
    let report = dispatcher.send(&profile, &tokens, &payload, policy).await;
    if report.is_success() {
        REPLY_SENT.to_string()
    } else {
        REPLY_NOT_SENT.to_string()
    }
}
