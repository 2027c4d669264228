//! JSON-over-WebSocket transport.
//!
//! It defines the wire messages exchanged between peers, the router-side
//! WebSocket server that forwards client requests to a [`WampServer`], and a
//! client connector that drives a [`TopicContainerProxy`] over a socket.
//!
//! [`WampServer`]: crate::server::WampServer
//! [`TopicContainerProxy`]: crate::client::TopicContainerProxy

pub mod client;
pub mod message;
pub mod session;
pub mod websocket;


pub use client::{WampConnection, WebSocketServerProxy, connect};
pub use message::{ClientMessage, ServerMessage};
pub use session::WebSocketSession;
pub use websocket::{serve, start_websocket_server};
