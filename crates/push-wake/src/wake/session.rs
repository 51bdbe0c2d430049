//! Call-control seams of a wake
//!
//! The coordinator needs two things from the switching side: whether the
//! calling leg is still there, and a way to originate the resolved call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::destination::Destination;

/// The calling leg a wake is working for
pub trait CallSession: Send + Sync {
    /// `false` once the caller hung up or the leg was torn down
    fn is_live(&self) -> bool;
}

/// Hangup causes a wake can end with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallCause {
    /// Wake push could not be delivered or the target is unknown
    NoRouteDestination,
    /// Nobody registered within the wake window
    NoAnswer,
    NoUserResponse,
    /// The calling leg went away or the wake was cancelled
    OriginatorCancel,
    UserBusy,
    CallRejected,
    NormalClearing,
    Other(String),
}

impl fmt::Display for CallCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallCause::NoRouteDestination => "NO_ROUTE_DESTINATION",
            CallCause::NoAnswer => "NO_ANSWER",
            CallCause::NoUserResponse => "NO_USER_RESPONSE",
            CallCause::OriginatorCancel => "ORIGINATOR_CANCEL",
            CallCause::UserBusy => "USER_BUSY",
            CallCause::CallRejected => "CALL_REJECTED",
            CallCause::NormalClearing => "NORMAL_CLEARING",
            CallCause::Other(cause) => cause,
        };
        f.write_str(name)
    }
}

/// An originated, answered (or at least established) outbound leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallLeg {
    pub id: String,
}

/// Everything the gateway needs to place the resolved call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginateRequest {
    pub destination: Destination,
    pub dial_string: String,
    /// What is left of the wake window
    pub timeout: Duration,
    pub caller_id_name: Option<String>,
    pub caller_id_number: Option<String>,
}

/// Places outbound calls
#[async_trait]
pub trait OriginationGateway: Send + Sync {
    async fn originate(&self, request: OriginateRequest) -> Result<CallLeg, CallCause>;
}
