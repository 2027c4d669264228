//! The requester side of the broker.
//!
//! A [`SessionHandle`] is how the core talks back to a connected session:
//! acknowledgements, events, RPC results and errors. The transport owns the
//! implementation. Every method must return promptly (queue the message,
//! don't wait on the socket) so that one slow session never holds up a
//! fan-out to the others.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::broker::id::{PublicationId, RequestId, SessionId, SubscriptionId};
use crate::broker::message::{CallResult, EventPayload};
use crate::utils::{Result, WampError};

/// The request an error reply refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Subscribe,
    Unsubscribe,
    Publish,
    Call,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::Subscribe => "subscribe",
            RequestKind::Unsubscribe => "unsubscribe",
            RequestKind::Publish => "publish",
            RequestKind::Call => "call",
        };
        f.write_str(name)
    }
}

pub trait SessionHandle<M>: Send + Sync {
    fn session_id(&self) -> SessionId;

    fn event(
        &self,
        subscription_id: SubscriptionId,
        publication_id: PublicationId,
        payload: EventPayload<M>,
    ) -> Result<()>;

    fn subscribed(&self, request_id: RequestId, subscription_id: SubscriptionId) -> Result<()>;

    fn unsubscribed(&self, request_id: RequestId, subscription_id: SubscriptionId) -> Result<()>;

    fn published(&self, request_id: RequestId, publication_id: PublicationId) -> Result<()>;

    fn result(&self, request_id: RequestId, result: CallResult<M>) -> Result<()>;

    fn error(&self, kind: RequestKind, request_id: RequestId, error: &WampError) -> Result<()>;
}

pub type SharedSession<M> = Arc<dyn SessionHandle<M>>;

/// One SUBSCRIBE as seen by the container.
pub struct SubscribeRequest<M> {
    pub request_id: RequestId,
    pub session: SharedSession<M>,
}

/// One UNSUBSCRIBE as seen by the container.
pub struct UnsubscribeRequest<M> {
    pub request_id: RequestId,
    pub session: SharedSession<M>,
}

impl<M> SubscribeRequest<M> {
    pub fn new(request_id: RequestId, session: SharedSession<M>) -> Self {
        Self { request_id, session }
    }
}

impl<M> UnsubscribeRequest<M> {
    pub fn new(request_id: RequestId, session: SharedSession<M>) -> Self {
        Self { request_id, session }
    }
}
