//! Wake triggers
//!
//! A trigger is what the call routing hands over when a call is dialled to
//! `push_wake/<user>[@<realm>]`, together with the channel variables that
//! tune the wake.

use std::collections::HashMap;
use std::time::Duration;

use crate::types::CorrelationId;

pub const VAR_ORIGINATE_TIMEOUT: &str = "originate_timeout";
pub const VAR_ANY_REGISTER: &str = "push_wake_any_register";
pub const VAR_SUPPRESS: &str = "push_wake_suppress";
pub const VAR_CORRELATION: &str = "push_wake_correlation";
pub const VAR_CALLER_ID_NAME: &str = "origination_caller_id_name";
pub const VAR_CALLER_ID_NUMBER: &str = "origination_caller_id_number";

/// Request to wake one subscriber and bridge the call to it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WakeTrigger {
    pub user: String,
    /// Realm from the dialled number, if it had one
    pub realm: Option<String>,
    /// Overrides the configured wake window
    pub timeout: Option<Duration>,
    /// Any registration of the user resolves the wake, push outcome ignored
    pub wait_any_register: bool,
    /// Do not send the wake push, only wait
    pub suppress_push: bool,
    pub caller_id_name: Option<String>,
    pub caller_id_number: Option<String>,
    /// Set when this wake is the fallback leg of an earlier one
    pub continues: Option<CorrelationId>,
}

impl WakeTrigger {
    /// Trigger for `user[@realm]` with default options
    pub fn new(number: &str) -> Self {
        let number = number.trim();
        let (user, realm) = match number.split_once('@') {
            Some((user, realm)) if !realm.trim().is_empty() => (user, Some(realm.trim().to_string())),
            Some((user, _)) => (user, None),
            None => (number, None),
        };
        Self {
            user: user.trim().to_string(),
            realm,
            ..Default::default()
        }
    }

    /// Trigger for `user[@realm]` tuned by channel variables
    pub fn from_variables(number: &str, variables: &HashMap<String, String>) -> Self {
        let mut trigger = Self::new(number);
        let get = |name: &str| variables.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        trigger.timeout = get(VAR_ORIGINATE_TIMEOUT)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        trigger.wait_any_register = get(VAR_ANY_REGISTER).map(is_true).unwrap_or(false);
        trigger.continues = get(VAR_CORRELATION).map(CorrelationId::from);
        // A fallback leg never re-sends the push
        trigger.suppress_push = get(VAR_SUPPRESS).map(is_true).unwrap_or(false) || trigger.continues.is_some();
        trigger.caller_id_name = get(VAR_CALLER_ID_NAME).map(str::to_string);
        trigger.caller_id_number = get(VAR_CALLER_ID_NUMBER).map(str::to_string);
        trigger
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn wait_any_register(mut self, enabled: bool) -> Self {
        self.wait_any_register = enabled;
        self
    }

    pub fn suppress_push(mut self, suppressed: bool) -> Self {
        self.suppress_push = suppressed;
        self
    }

    pub fn with_caller_id(mut self, name: Option<String>, number: Option<String>) -> Self {
        self.caller_id_name = name;
        self.caller_id_number = number;
        self
    }
}

/// Switch-style truthiness: yes/on/true/t/enabled/active/allow or a non-zero number
pub fn is_true(value: &str) -> bool {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        return n != 0;
    }
    matches!(
        value.to_ascii_lowercase().as_str(),
        "yes" | "on" | "true" | "t" | "enabled" | "active" | "allow"
    )
}
