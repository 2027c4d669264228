//! Client-side roles: subscriber, publisher and the topic proxy cache.

mod container;
mod proxy;
mod publisher;
mod subscriber;
mod topic;

#[cfg(test)]
mod tests;

pub use container::{TopicContainerProxy, TopicHandle};
pub use proxy::{EventHandler, ServerProxy};
pub use publisher::WampPublisher;
pub use subscriber::{ClientSubscription, WampSubscriber};
pub use topic::TopicProxy;
