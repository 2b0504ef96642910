//! Ingress checks for remote requests
//!
//! Every mutating request carries the caller identity supplied by the
//! transport. Requests are checked here before they touch state:
//! - Caller is not the resource owner: DROP
//! - Privileged request from a non-host: DROP
//! - Payload outside sane bounds: DROP
//!
//! A rejection is never an error for the sender. It is logged at debug level
//! and the request is discarded.

use shared::{ClientId, HOST_CLIENT_ID};

/// Reason a request was dropped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// Caller does not own the resource it tried to mutate
    #[error("client {caller} does not own resource of client {owner}")]
    NotOwner { caller: ClientId, owner: ClientId },
    /// Only the host may issue this request
    #[error("client {caller} is not the host")]
    NotHost { caller: ClientId },
    /// Payload outside the accepted range
    #[error("value {value} outside [0, {max}]")]
    OutOfBounds { value: i64, max: i64 },
    /// Payload names nothing to act on
    #[error("empty payload")]
    EmptyPayload,
    /// Request refers to state the authority no longer holds
    #[error("stale request")]
    Stale,
    /// Same action already processed in this evaluation window
    #[error("duplicate request")]
    Duplicate,
    /// Target already reached a terminal state
    #[error("target already in terminal state")]
    Terminal,
    /// Target entity does not exist
    #[error("unknown entity")]
    UnknownEntity,
    /// Request is not valid in the current session phase
    #[error("not allowed in current phase")]
    WrongPhase,
}

/// Checks that the caller owns the resource
pub fn authorize(caller: ClientId, owner: ClientId) -> Result<(), Rejection> {
    if caller == owner {
        Ok(())
    } else {
        Err(Rejection::NotOwner { caller, owner })
    }
}

/// Checks that the caller is the hosting participant
pub fn authorize_host(caller: ClientId) -> Result<(), Rejection> {
    if caller == HOST_CLIENT_ID {
        Ok(())
    } else {
        Err(Rejection::NotHost { caller })
    }
}

/// Validates a damage amount against `[0, cap]`
///
/// The wire carries a signed value so that negative amounts from a buggy or
/// hostile client are caught here instead of wrapping.
pub fn validate_damage(amount: i32, cap: i32) -> Result<u32, Rejection> {
    if amount < 0 || amount > cap {
        return Err(Rejection::OutOfBounds {
            value: amount as i64,
            max: cap as i64,
        });
    }
    Ok(amount as u32)
}
