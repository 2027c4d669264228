use std::fmt;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{
    CallResult, EventPayload, PublicationId, RequestId, RequestKind, SessionHandle, SessionId,
    SubscriptionId,
};
use crate::transport::message::{ServerMessage, encode};
use crate::utils::{Result, WampError};

/// The router's handle on one WebSocket connection. Frames are queued on the
/// connection's writer channel, so sending never waits on the socket.
pub struct WebSocketSession {
    id: SessionId,
    sender: UnboundedSender<WsMessage>,
}

impl WebSocketSession {
    pub fn new(id: SessionId, sender: UnboundedSender<WsMessage>) -> Self {
        Self { id, sender }
    }

    pub fn send(&self, message: &ServerMessage) -> Result<()> {
        let frame = encode(message)?;
        self.sender
            .send(frame)
            .map_err(|_| WampError::SessionClosed(self.id))
    }
}

impl SessionHandle<Value> for WebSocketSession {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn event(
        &self,
        subscription_id: SubscriptionId,
        publication_id: PublicationId,
        payload: EventPayload<Value>,
    ) -> Result<()> {
        trace!("Event {publication_id} on {subscription_id} to session {}", self.id);
        self.send(&ServerMessage::event(subscription_id, publication_id, payload))
    }

    fn subscribed(&self, request_id: RequestId, subscription_id: SubscriptionId) -> Result<()> {
        self.send(&ServerMessage::Subscribed {
            request_id,
            subscription_id,
        })
    }

    fn unsubscribed(&self, request_id: RequestId, subscription_id: SubscriptionId) -> Result<()> {
        self.send(&ServerMessage::Unsubscribed {
            request_id,
            subscription_id,
        })
    }

    fn published(&self, request_id: RequestId, publication_id: PublicationId) -> Result<()> {
        self.send(&ServerMessage::Published {
            request_id,
            publication_id,
        })
    }

    fn result(&self, request_id: RequestId, result: CallResult<Value>) -> Result<()> {
        self.send(&ServerMessage::result(request_id, result))
    }

    fn error(&self, kind: RequestKind, request_id: RequestId, error: &WampError) -> Result<()> {
        self.send(&ServerMessage::error(kind, request_id, error))
    }
}

impl fmt::Debug for WebSocketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketSession")
            .field("id", &self.id)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}
