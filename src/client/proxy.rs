//! Outbound side of a client session.
//!
//! `ServerProxy` sends requests to the router. Implementations only queue
//! the message; replies come back through the inbound methods of
//! `TopicContainerProxy`.

use crate::broker::{
    Arguments, ArgumentsKeywords, EventPayload, PublicationId, PublishOptions, RequestId,
    SubscribeOptions, SubscriptionId,
};
use crate::utils::Result;

pub trait ServerProxy<M>: Send + Sync {
    fn subscribe(&self, request_id: RequestId, options: SubscribeOptions, topic: &str) -> Result<()>;

    fn unsubscribe(&self, request_id: RequestId, subscription_id: SubscriptionId) -> Result<()>;

    fn publish(
        &self,
        request_id: RequestId,
        options: PublishOptions,
        topic: &str,
        arguments: Option<Arguments<M>>,
        arguments_keywords: Option<ArgumentsKeywords<M>>,
    ) -> Result<()>;
}

/// Receives the events of one local subscription.
pub trait EventHandler<M>: Send + Sync {
    fn on_event(&self, publication_id: PublicationId, payload: &EventPayload<M>);
}

impl<M, F> EventHandler<M> for F
where
    F: Fn(PublicationId, &EventPayload<M>) + Send + Sync,
{
    fn on_event(&self, publication_id: PublicationId, payload: &EventPayload<M>) {
        self(publication_id, payload)
    }
}
