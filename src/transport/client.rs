//! WebSocket client connector
//!
//! [`connect`] opens a session on a router and wires a
//! [`TopicContainerProxy`] to it: outbound requests are queued on a writer
//! task, inbound router messages are routed into the proxy by a reader task.

use std::sync::Arc;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::spawn;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{
    Arguments, ArgumentsKeywords, EventPayload, PublishOptions, RequestId, SessionId,
    SubscribeOptions, SubscriptionId,
};
use crate::client::{ServerProxy, TopicContainerProxy};
use crate::transport::message::{ClientMessage, ServerMessage, encode};
use crate::utils::{Result, WampError};

type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub struct WebSocketServerProxy {
    sender: UnboundedSender<WsMessage>,
}

impl WebSocketServerProxy {
    fn send(&self, message: &ClientMessage) -> Result<()> {
        let frame = encode(message)?;
        self.sender
            .send(frame)
            .map_err(|_| WampError::Disconnected)
    }
}

impl ServerProxy<Value> for WebSocketServerProxy {
    fn subscribe(&self, request_id: RequestId, options: SubscribeOptions, topic: &str) -> Result<()> {
        self.send(&ClientMessage::Subscribe {
            request_id,
            topic: topic.to_string(),
            options,
        })
    }

    fn unsubscribe(&self, request_id: RequestId, subscription_id: SubscriptionId) -> Result<()> {
        self.send(&ClientMessage::Unsubscribe {
            request_id,
            subscription_id,
        })
    }

    fn publish(
        &self,
        request_id: RequestId,
        options: PublishOptions,
        topic: &str,
        arguments: Option<Arguments<Value>>,
        arguments_keywords: Option<ArgumentsKeywords<Value>>,
    ) -> Result<()> {
        self.send(&ClientMessage::Publish {
            request_id,
            topic: topic.to_string(),
            options,
            arguments,
            arguments_keywords,
        })
    }
}

/// An open session with a router.
pub struct WampConnection {
    session_id: SessionId,
    client: Arc<TopicContainerProxy<Value>>,
    proxy: Arc<WebSocketServerProxy>,
    reader: JoinHandle<()>,
}

impl WampConnection {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn client(&self) -> &Arc<TopicContainerProxy<Value>> {
        &self.client
    }

    pub fn heartbeat(&self) -> Result<()> {
        self.proxy.send(&ClientMessage::Heartbeat {})
    }

    /// Say goodbye and wait for the router to close the session.
    pub async fn close(self) -> Result<()> {
        self.proxy.send(&ClientMessage::Goodbye {})?;
        self.reader
            .await
            .map_err(|e| WampError::Transport(e.to_string()))
    }
}

pub async fn connect(url: &str) -> Result<WampConnection> {
    let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|e| WampError::Transport(e.to_string()))?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(msg).await {
                warn!("Failed to send message to router: {e}");
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let proxy = Arc::new(WebSocketServerProxy { sender: tx });
    proxy.send(&ClientMessage::Hello {})?;

    let session_id = match next_server_message(&mut ws_receiver).await {
        Some(ServerMessage::Welcome { session_id }) => session_id,
        Some(ServerMessage::Goodbye { reason }) => {
            return Err(WampError::remote(reason, "session refused"));
        }
        Some(other) => {
            return Err(WampError::ProtocolViolation(format!(
                "expected welcome, got {other:?}"
            )));
        }
        None => return Err(WampError::Disconnected),
    };
    info!("Connected to {url} as session {session_id}");

    let server: Arc<dyn ServerProxy<Value>> = proxy.clone();
    let client = Arc::new(TopicContainerProxy::new(server));
    let reader = spawn(read_loop(ws_receiver, client.clone()));

    Ok(WampConnection {
        session_id,
        client,
        proxy,
        reader,
    })
}

async fn next_server_message(receiver: &mut WsReader) -> Option<ServerMessage> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            WsMessage::Text(text) => match serde_json::from_str(&text) {
                Ok(message) => return Some(message),
                Err(err) => warn!("Invalid router message: {err}"),
            },
            WsMessage::Close(_) => return None,
            _ => {}
        }
    }
    None
}

async fn read_loop(mut receiver: WsReader, client: Arc<TopicContainerProxy<Value>>) {
    while let Some(message) = next_server_message(&mut receiver).await {
        match message {
            ServerMessage::Subscribed {
                request_id,
                subscription_id,
            } => client.subscribed(request_id, subscription_id),
            ServerMessage::Unsubscribed {
                request_id,
                subscription_id,
            } => client.unsubscribed(request_id, subscription_id),
            ServerMessage::Published {
                request_id,
                publication_id,
            } => client.published(request_id, publication_id),
            ServerMessage::Event {
                subscription_id,
                publication_id,
                details,
                arguments,
                arguments_keywords,
            } => client.event(
                subscription_id,
                publication_id,
                EventPayload::from_parts(details, arguments, arguments_keywords),
            ),
            ServerMessage::Error {
                request_id,
                error,
                message,
                ..
            } => client.error(request_id, WampError::remote(error, message)),
            ServerMessage::Result { request_id, .. } => {
                debug!("Ignoring call result for request {request_id}")
            }
            ServerMessage::Welcome { session_id } => {
                warn!("Unexpected welcome for session {session_id}")
            }
            ServerMessage::Goodbye { reason } => {
                info!("Router closed the session: {reason}");
                break;
            }
        }
    }
    client.connection_lost();
}
