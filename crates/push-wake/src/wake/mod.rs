//! Wake-then-bridge flow

pub mod coordinator;
pub mod destination;
pub mod request;
pub mod session;
pub mod trigger;

pub use coordinator::{AbortReason, WakeCoordinator, WakeReport, WakeState};
pub use destination::{Destination, PUSH_WAKE_ENDPOINT};
pub use request::{SignalOutcome, WakeRequest};
pub use session::{CallCause, CallLeg, CallSession, OriginateRequest, OriginationGateway};
pub use trigger::WakeTrigger;
