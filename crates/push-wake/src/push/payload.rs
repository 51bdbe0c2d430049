//! Notification descriptors and payload templates
//!
//! A profile template is a JSON object whose string leaves may be
//! placeholders. A leaf that is exactly `"${name}"` is replaced by the typed
//! value (number stays a number, bool stays a bool) or dropped when the
//! notification has no such field. A member whose value is `"${custom}"` is
//! replaced by the notification's custom fields, merged into the enclosing
//! object. Objects left empty by substitution are pruned.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Built-in APNs-style layout used when a profile has no template
pub const DEFAULT_TEMPLATE: &str = r#"{
    "aps": {
        "alert": {
            "body": "${body}",
            "action-loc-key": "${action_key}",
            "launch-image": "${image}"
        },
        "sound": "${sound}",
        "badge": "${badge}",
        "category": "${category}",
        "content-available": "${content_available}"
    },
    "custom": "${custom}"
}"#;

const CUSTOM_PLACEHOLDER: &str = "${custom}";

/// One custom key/value carried in the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    #[serde(default, deserialize_with = "lenient_name")]
    pub name: String,
    /// `None` when the key was absent; an explicit JSON null is `Some(Null)`
    #[serde(default, deserialize_with = "present_value")]
    pub value: Option<Value>,
}

/// Strings are kept, any other JSON type counts as absent
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

pub(crate) fn lenient_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_text(deserializer).map(Option::unwrap_or_default)
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl CustomField {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Only scalar values travel; arrays and objects are ignored
    fn scalar(&self) -> Option<&Value> {
        match self.value.as_ref()? {
            Value::Array(_) | Value::Object(_) => None,
            other => Some(other),
        }
    }
}

/// Provider-independent description of a push
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default, deserialize_with = "lenient_text")]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sound: Option<String>,
    /// Only positive badge counts are sent
    #[serde(default, alias = "barge", deserialize_with = "positive_count")]
    pub badge: Option<u32>,
    /// `true` maps to 1, numbers are kept, anything else is dropped
    #[serde(default, deserialize_with = "content_available_flag")]
    pub content_available: Option<u32>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub action_key: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub category: Option<String>,
    /// Entries that are not `{name, value}` objects are dropped
    #[serde(default, deserialize_with = "custom_fields")]
    pub custom: Vec<CustomField>,
}

fn positive_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_u64())
        .filter(|n| *n > 0)
        .map(|n| n.min(u32::MAX as u64) as u32))
}

fn custom_fields<'de, D>(deserializer: D) -> Result<Vec<CustomField>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn content_available_flag<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(true)) => Some(1),
        Some(Value::Number(n)) => n.as_u64().map(|n| n.min(u32::MAX as u64) as u32),
        _ => None,
    })
}

impl Notification {
    /// The body-only notification used to wake a device
    pub fn wake(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Default::default()
        }
    }

    pub fn with_custom(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.push(CustomField::new(name, value));
        self
    }

    /// Resolve one placeholder name; empty strings count as absent
    fn lookup(&self, name: &str) -> Option<Value> {
        fn text(s: &Option<String>) -> Option<Value> {
            s.as_deref().filter(|s| !s.is_empty()).map(|s| Value::String(s.to_string()))
        }
        match name {
            "body" => text(&self.body),
            "sound" => text(&self.sound),
            "action_key" => text(&self.action_key),
            "image" => text(&self.image),
            "category" => text(&self.category),
            "badge" => self.badge.map(Value::from),
            "content_available" => self.content_available.map(Value::from),
            _ => None,
        }
    }
}

/// Rendered provider payload
#[derive(Debug, Clone, PartialEq)]
pub struct Payload(Value);

impl Payload {
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Serializing a Value cannot fail
        serde_json::to_vec(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parsed profile template
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadTemplate(Map<String, Value>);

impl Default for PayloadTemplate {
    fn default() -> Self {
        match serde_json::from_str(DEFAULT_TEMPLATE) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self(Map::new()),
        }
    }
}

impl PayloadTemplate {
    /// Parse a template; it must be a JSON object
    pub fn parse(raw: &str) -> Result<Self, String> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Err("payload template must be a JSON object".to_string()),
            Err(e) => Err(format!("payload template is not valid JSON: {}", e)),
        }
    }

    /// Substitute a notification into the template
    pub fn render(&self, notification: &Notification) -> Payload {
        let rendered = render_object(&self.0, notification).unwrap_or_default();
        Payload(Value::Object(rendered))
    }
}

fn placeholder_name(s: &str) -> Option<&str> {
    s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}'))
}

fn render_object(template: &Map<String, Value>, notification: &Notification) -> Option<Map<String, Value>> {
    let mut out = Map::new();
    let mut merge_custom = false;

    for (key, value) in template {
        if value.as_str() == Some(CUSTOM_PLACEHOLDER) {
            merge_custom = true;
            continue;
        }
        if let Some(rendered) = render_value(value, notification) {
            out.insert(key.clone(), rendered);
        }
    }

    if merge_custom {
        for field in &notification.custom {
            let Some(value) = field.scalar() else {
                debug!("Skipping non-scalar custom field '{}'", field.name);
                continue;
            };
            if field.name.is_empty() {
                continue;
            }
            if out.contains_key(&field.name) {
                debug!("Custom field '{}' collides with a template key, skipped", field.name);
                continue;
            }
            out.insert(field.name.clone(), value.clone());
        }
    }

    if out.is_empty() && !template.is_empty() {
        None
    } else {
        Some(out)
    }
}

fn render_value(value: &Value, notification: &Notification) -> Option<Value> {
    match value {
        Value::String(s) => match placeholder_name(s) {
            Some(name) => notification.lookup(name),
            None if s.contains("${") => Some(Value::String(interpolate(s, notification))),
            None => Some(value.clone()),
        },
        Value::Object(map) => render_object(map, notification).map(Value::Object),
        Value::Array(items) => Some(Value::Array(
            items.iter().filter_map(|item| render_value(item, notification)).collect(),
        )),
        other => Some(other.clone()),
    }
}

/// Textual substitution for placeholders embedded in a longer string
fn interpolate(s: &str, notification: &Notification) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match notification.lookup(name) {
                    Some(Value::String(text)) => out.push_str(&text),
                    Some(other) => out.push_str(&other.to_string()),
                    None => {}
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_wake_body_only() {
        let payload = PayloadTemplate::default().render(&Notification::wake("WakeUP"));
        assert_eq!(payload.as_json(), &json!({"aps": {"alert": {"body": "WakeUP"}}}));
    }

    #[test]
    fn test_mistyped_fields_are_dropped() {
        let notification: Notification = serde_json::from_value(json!({
            "body": "Hi",
            "category": 7,
            "sound": ["a"],
            "image": null,
            "custom": [{"name": 5, "value": "x"}, "loose", {"name": "room", "value": "r1"}]
        }))
        .unwrap();
        assert_eq!(notification.body.as_deref(), Some("Hi"));
        assert_eq!(notification.category, None);
        assert_eq!(notification.sound, None);
        assert_eq!(notification.custom.len(), 2);

        let payload = PayloadTemplate::default().render(&notification);
        assert_eq!(payload.as_json(), &json!({"aps": {"alert": {"body": "Hi"}}, "room": "r1"}));

        let scalar: Notification = serde_json::from_value(json!({"body": "x", "custom": "nope"})).unwrap();
        assert!(scalar.custom.is_empty());
    }

    #[test]
    fn test_full_notification_keeps_types() {
        let notification: Notification = serde_json::from_value(json!({
            "body": "Missed call",
            "sound": "ring.caf",
            "barge": 3,
            "content_available": true,
            "category": "CALL",
            "custom": [
                {"name": "video", "value": false},
                {"name": "retry", "value": 2},
                {"name": "ratio", "value": 1.5},
                {"name": "caller", "value": "bob"},
                {"name": "extra", "value": null},
                {"name": "list", "value": [1, 2]}
            ]
        }))
        .unwrap();

        let payload = PayloadTemplate::default().render(&notification);
        assert_eq!(
            payload.as_json(),
            &json!({
                "aps": {
                    "alert": {"body": "Missed call"},
                    "sound": "ring.caf",
                    "badge": 3,
                    "category": "CALL",
                    "content-available": 1
                },
                "video": false,
                "retry": 2,
                "ratio": 1.5,
                "caller": "bob",
                "extra": null
            })
        );
    }

    #[test]
    fn test_non_positive_badge_is_dropped() {
        let notification: Notification = serde_json::from_value(json!({"badge": 0, "body": "x"})).unwrap();
        assert_eq!(notification.badge, None);
        let notification: Notification = serde_json::from_value(json!({"badge": "7"})).unwrap();
        assert_eq!(notification.badge, None);
    }

    #[test]
    fn test_custom_template_with_interpolation() {
        let template = PayloadTemplate::parse(
            r#"{"data": {"title": "Call for ${body}", "type": "wake", "extra": "${custom}"}, "priority": "high"}"#,
        )
        .unwrap();
        let notification = Notification::wake("alice").with_custom("call_id", "c-1");
        assert_eq!(
            template.render(&notification).as_json(),
            &json!({"data": {"title": "Call for alice", "type": "wake", "call_id": "c-1"}, "priority": "high"})
        );
    }

    #[test]
    fn test_custom_cannot_override_template_keys() {
        let notification = Notification::wake("hi").with_custom("aps", "oops");
        let payload = PayloadTemplate::default().render(&notification);
        assert_eq!(payload.as_json()["aps"]["alert"]["body"], json!("hi"));
    }

    #[test]
    fn test_template_must_be_object() {
        assert!(PayloadTemplate::parse("\"text\"").is_err());
        assert!(PayloadTemplate::parse("{broken").is_err());
    }
}
