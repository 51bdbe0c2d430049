//! Push profiles, payloads and delivery

pub mod dispatcher;
pub mod http;
pub mod payload;
pub mod profile;
pub mod transport;

pub use dispatcher::{InvalidTokenPolicy, PushDispatcher, PushRequest};
pub use http::HttpPushTransport;
pub use payload::{CustomField, Notification, Payload, PayloadTemplate};
pub use profile::{AuthMode, ProfileCatalog, PushProfile};
pub use transport::{DeliveryStatus, PushTransport, SendReport, SendStatus, TokenOutcome};
