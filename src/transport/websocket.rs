//! WebSocket transport
//!
//! Translates JSON wire messages into calls on a [`WampServer`]. Each
//! connection:
//! - gets a session ID and a [`WebSocketSession`] backed by an unbounded
//!   channel drained by a dedicated writer task
//! - must open with `hello`; anything else first closes the connection with
//!   a protocol violation
//! - is cleaned up exactly once, by the reader after it stops reading; a
//!   failing writer only tells the reader to stop

use std::io;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::SessionHandle;
use crate::server::WampServer;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::transport::session::WebSocketSession;
use crate::utils::WampError;

pub async fn start_websocket_server(addr: &str, server: Arc<WampServer<Value>>) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server listening on ws://{}", listener.local_addr()?);
    serve(listener, server).await;
    Ok(())
}

/// Accept connections on an already bound listener until it fails.
pub async fn serve(listener: TcpListener, server: Arc<WampServer<Value>>) {
    while let Ok((stream, peer)) = listener.accept().await {
        spawn(handle_connection(stream, peer, server.clone()));
    }
    error!("Listener stopped accepting connections");
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, server: Arc<WampServer<Value>>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {peer} failed: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let session_id = server.auxiliary().next_session_id();
    let session = Arc::new(WebSocketSession::new(session_id, tx));
    debug!("Connection from {peer} is session {session_id}");

    let writer_closed = Arc::new(Notify::new());

    {
        let writer_closed = writer_closed.clone();

        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!("Failed to send message to session {session_id}: {e}");
                    break;
                }
            }

            let _ = ws_sender.close().await;
            writer_closed.notify_one();
            debug!("Send loop closed for session {session_id}");
        });
    }

    let mut welcomed = false;
    loop {
        let msg = tokio::select! {
            biased;
            _ = writer_closed.notified() => break,
            msg = ws_receiver.next() => msg,
        };
        let Some(Ok(msg)) = msg else {
            break;
        };
        let text = match msg {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => {
                if handle_client_message(&server, &session, &mut welcomed, message).is_break() {
                    break;
                }
            }
            Err(err) => warn!(
                "Invalid client message from session {session_id}: {err} | {}",
                text.chars().take(100).collect::<String>()
            ),
        }
    }

    // nothing is read after this point, so the session cannot come back
    let removed = server.auxiliary().disconnect(session_id);
    debug!("Cleaned up session {session_id}, {removed} subscription(s) dropped");
    info!("Session {session_id} ({peer}) disconnected");
}

/// Apply one decoded client message. `Break` means the connection should be
/// closed once the queued replies are flushed.
pub(crate) fn handle_client_message(
    server: &WampServer<Value>,
    session: &Arc<WebSocketSession>,
    welcomed: &mut bool,
    message: ClientMessage,
) -> ControlFlow<()> {
    let session_id = session.session_id();

    match message {
        ClientMessage::Hello {} if !*welcomed => match server.auxiliary().hello(session_id) {
            Ok(_) => {
                *welcomed = true;
                reply(session, &ServerMessage::Welcome { session_id });
            }
            Err(e) => {
                warn!("Refusing session {session_id}: {e}");
                reply(session, &ServerMessage::goodbye(e.uri()));
                return ControlFlow::Break(());
            }
        },
        ClientMessage::Hello {} => return violation(session, "hello on an open session"),
        _ if !*welcomed => return violation(session, "message before hello"),
        _ if !server.auxiliary().is_open(session_id) => {
            debug!("Session {session_id} is already closed, dropping its request");
            return ControlFlow::Break(());
        }
        ClientMessage::Goodbye {} => {
            reply(session, &ServerMessage::goodbye(WampError::GOODBYE_AND_OUT));
            return ControlFlow::Break(());
        }
        ClientMessage::Heartbeat {} => {
            if let Err(e) = server.auxiliary().heartbeat(session_id) {
                warn!("Heartbeat from session {session_id} failed: {e}");
            }
        }
        // failures below are already reported to the session
        ClientMessage::Subscribe {
            request_id,
            topic,
            options,
        } => {
            let _ = server
                .pubsub()
                .subscribe(session.clone(), request_id, options, &topic);
        }
        ClientMessage::Unsubscribe {
            request_id,
            subscription_id,
        } => {
            let _ = server
                .pubsub()
                .unsubscribe(session.clone(), request_id, subscription_id);
        }
        ClientMessage::Publish {
            request_id,
            topic,
            options,
            arguments,
            arguments_keywords,
        } => {
            server.pubsub().publish(
                session.clone(),
                request_id,
                options,
                &topic,
                arguments,
                arguments_keywords,
            );
        }
        ClientMessage::Call {
            request_id,
            procedure,
            arguments,
            arguments_keywords,
        } => {
            server.rpc().call(
                session.clone(),
                request_id,
                &procedure,
                arguments,
                arguments_keywords,
            );
        }
    }
    ControlFlow::Continue(())
}

fn reply(session: &WebSocketSession, message: &ServerMessage) {
    if let Err(e) = session.send(message) {
        debug!("Dropping reply: {e}");
    }
}

fn violation(session: &WebSocketSession, reason: &str) -> ControlFlow<()> {
    warn!(
        "Protocol violation by session {}: {reason}",
        session.session_id()
    );
    reply(session, &ServerMessage::goodbye(WampError::PROTOCOL_VIOLATION));
    ControlFlow::Break(())
}
