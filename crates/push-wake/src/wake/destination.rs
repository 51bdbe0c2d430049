//! Dial destinations built from a fresh registration
//!
//! The dial string has two legs separated by `:_:`. The first targets the
//! contact that just registered, tagged with the registration call id. The
//! second is a fallback back into push-wake for the same user, with push
//! suppressed so that a failed first leg does not wake the device again.

use std::fmt;
use std::time::Duration;

use crate::contact::contact_uri;
use crate::events::RegistrationEvent;
use crate::types::CorrelationId;

/// Endpoint name of the fallback leg
pub const PUSH_WAKE_ENDPOINT: &str = "push_wake";

/// Where a resolved wake should be dialled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub call_id: String,
    pub profile: String,
    pub contact_uri: String,
    pub user: String,
    pub realm: String,
    /// Whole-second originate timeout carried on both legs
    pub timeout_secs: u64,
    pub wait_any_register: bool,
    pub correlation_id: CorrelationId,
}

impl Destination {
    /// `None` when the registration carries no usable contact URI
    pub fn from_registration(
        event: &RegistrationEvent,
        user: &str,
        realm: &str,
        timeout: Duration,
        wait_any_register: bool,
        correlation_id: &CorrelationId,
    ) -> Option<Self> {
        let contact_uri = contact_uri(&event.contact)?;
        Some(Self {
            call_id: event.call_id.clone(),
            profile: event.profile.clone(),
            contact_uri,
            user: user.to_string(),
            realm: realm.to_string(),
            timeout_secs: timeout.as_secs().max(1),
            wait_any_register,
            correlation_id: correlation_id.clone(),
        })
    }

    pub fn dial_string(&self) -> String {
        format!(
            "[registration_token={call_id},originate_timeout={secs}]sofia/{profile}/{uri}\
             :_:[originate_timeout={secs},push_wake_suppress=true,push_wake_any_register={any},push_wake_correlation={corr}]\
             {endpoint}/{user}@{realm}",
            call_id = self.call_id,
            secs = self.timeout_secs,
            profile = self.profile,
            uri = self.contact_uri,
            any = u8::from(self.wait_any_register),
            corr = self.correlation_id,
            endpoint = PUSH_WAKE_ENDPOINT,
            user = self.user,
            realm = self.realm,
        )
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dial_string())
    }
}
