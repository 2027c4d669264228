//! # wampsub
//!
//! `wampsub` is the publish/subscribe core of a WAMP-style router, with a
//! JSON-over-WebSocket transport in front of it.
//!
//! ## Core Modules
//!
//! - `broker`: The topic container that maps subscribe requests onto shared
//!   registrations and fans publications out to their subscribers.
//! - `server`: Composition of the PubSub, RPC and auxiliary (session) servers.
//! - `client`: Client-side subscriber and publisher roles and the cache of topic proxies.
//! - `config`: Layered settings (defaults, `config/default.toml`, environment).
//! - `transport`: JSON wire protocol, the WebSocket router loop and a client connector.
//! - `utils`: Contains shared utilities, such as error handling and logging.
//!
//! The broker, server and client layers are generic over the message type
//! carried in event and call arguments; the transport fixes it to
//! `serde_json::Value`.

pub mod broker;
pub mod client;
pub mod config;
pub mod server;
pub mod transport;
pub mod utils;
