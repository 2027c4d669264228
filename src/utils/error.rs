//! The `error` module defines the error type shared by the broker core, the
//! server composition and the client roles.
//!
//! Every variant maps onto a WAMP error URI (see [`WampError::uri`]) so the
//! transport can report failures to the remote peer without knowing the
//! variant set.

use thiserror::Error;

use crate::broker::id::{SessionId, SubscriptionId};

pub type Result<T> = std::result::Result<T, WampError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WampError {
    #[error("no such subscription: {0}")]
    NoSuchSubscription(SubscriptionId),

    #[error("no such procedure: {0}")]
    NoSuchProcedure(String),

    #[error("procedure already registered: {0}")]
    ProcedureAlreadyExists(String),

    #[error("no such session: {0}")]
    NoSuchSession(SessionId),

    #[error("invalid uri: {0:?}")]
    InvalidUri(String),

    #[error("session limit of {0} reached")]
    SessionLimitReached(usize),

    #[error("session {0} is closed")]
    SessionClosed(SessionId),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("connection to the router was lost")]
    Disconnected,

    #[error("{uri}: {message}")]
    Remote { uri: String, message: String },
}

impl WampError {
    pub const NO_SUCH_SUBSCRIPTION: &'static str = "wamp.error.no_such_subscription";
    pub const NO_SUCH_PROCEDURE: &'static str = "wamp.error.no_such_procedure";
    pub const PROCEDURE_ALREADY_EXISTS: &'static str = "wamp.error.procedure_already_exists";
    pub const NO_SUCH_SESSION: &'static str = "wamp.error.no_such_session";
    pub const INVALID_URI: &'static str = "wamp.error.invalid_uri";
    pub const PROTOCOL_VIOLATION: &'static str = "wamp.error.protocol_violation";
    pub const GOODBYE_AND_OUT: &'static str = "wamp.close.goodbye_and_out";
    pub const SYSTEM_SHUTDOWN: &'static str = "wamp.close.system_shutdown";
    pub const CANCELED: &'static str = "wamp.error.canceled";

    /// The WAMP error URI reported to the remote peer.
    pub fn uri(&self) -> &str {
        match self {
            WampError::NoSuchSubscription(_) => Self::NO_SUCH_SUBSCRIPTION,
            WampError::NoSuchProcedure(_) => Self::NO_SUCH_PROCEDURE,
            WampError::ProcedureAlreadyExists(_) => Self::PROCEDURE_ALREADY_EXISTS,
            WampError::NoSuchSession(_) => Self::NO_SUCH_SESSION,
            WampError::InvalidUri(_) => Self::INVALID_URI,
            WampError::SessionLimitReached(_) => Self::SYSTEM_SHUTDOWN,
            WampError::ProtocolViolation(_) => Self::PROTOCOL_VIOLATION,
            WampError::SessionClosed(_) | WampError::Transport(_) | WampError::Disconnected => {
                Self::CANCELED
            }
            WampError::Remote { uri, .. } => uri,
        }
    }

    /// Rebuilds an error received from the router.
    pub fn remote(uri: impl Into<String>, message: impl Into<String>) -> Self {
        WampError::Remote {
            uri: uri.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_identifier() {
        assert_eq!(
            WampError::NoSuchSubscription(100).to_string(),
            "no such subscription: 100"
        );
        assert_eq!(
            WampError::InvalidUri("a..b".into()).to_string(),
            "invalid uri: \"a..b\""
        );
    }

    #[test]
    fn uri_mapping() {
        assert_eq!(
            WampError::NoSuchSubscription(1).uri(),
            "wamp.error.no_such_subscription"
        );
        assert_eq!(
            WampError::remote("com.example.oops", "boom").uri(),
            "com.example.oops"
        );
        assert_eq!(WampError::Disconnected.uri(), WampError::CANCELED);
    }
}
