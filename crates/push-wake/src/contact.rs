//! Contact header parsing
//!
//! Mobile clients advertise their push tokens as Contact parameters:
//! `pn-voip-tok`, `pn-im-tok`, `app-id` and optionally `pn-provider`. Names
//! match case-insensitively; the grammar lives in [`crate::parser::contact`].

use crate::parser::contact::{contact_value, ContactValue};
use crate::types::Platform;

const VOIP_TOKEN: &str = "pn-voip-tok";
const IM_TOKEN: &str = "pn-im-tok";
const APP_ID: &str = "app-id";
const PROVIDER: &str = "pn-provider";

fn parse(contact: &str) -> Option<ContactValue> {
    contact_value(contact.as_bytes()).ok().map(|(_, value)| value)
}

/// The URI inside a Contact value
///
/// Skips an optional display name and returns what is between `<` and `>`.
/// A Contact without angle brackets yields its addr-spec.
pub fn contact_uri(contact: &str) -> Option<String> {
    parse(contact).map(|value| value.uri).filter(|uri| !uri.is_empty())
}

/// Value of one Contact parameter, case-insensitive on the name
pub fn contact_param(contact: &str, name: &str) -> Option<String> {
    parse(contact)?.param(name).map(str::to_string)
}

/// Push parameters a client put in its Contact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushParams {
    pub app_id: String,
    pub voip_token: Option<String>,
    pub im_token: Option<String>,
    pub platform: Platform,
}

impl PushParams {
    /// `None` unless the Contact names an app and at least one token
    pub fn parse(contact: &str) -> Option<Self> {
        let value = parse(contact)?;
        let voip_token = value.param(VOIP_TOKEN).map(str::to_string);
        let im_token = value.param(IM_TOKEN).map(str::to_string);
        if voip_token.is_none() && im_token.is_none() {
            return None;
        }
        let app_id = value.param(APP_ID)?.to_string();
        let platform = value.param(PROVIDER).map(Platform::parse).unwrap_or_default();

        Some(Self {
            app_id,
            voip_token,
            im_token,
            platform,
        })
    }
}
