//! The `server` module composes the router-side services on top of the
//! broker core: pub/sub request handling, a procedure registry for RPC, and
//! session lifecycle.

pub mod auxiliary;
pub mod builder;
pub mod pubsub;
pub mod rpc;

pub use auxiliary::{AuxiliaryServer, SessionInfo};
pub use builder::{DefaultServerBuilder, ServerBuilder, WampServer};
pub use pubsub::PubSubServer;
pub use rpc::{Procedure, RpcServer};
