use std::fmt;
use std::sync::Arc;

use crate::broker::{
    Arguments, ArgumentsKeywords, PublicationId, PublishOptions, SubscribeOptions, WampMessage,
};
use crate::client::proxy::EventHandler;
use crate::client::publisher::WampPublisher;
use crate::client::subscriber::{ClientSubscription, WampSubscriber};
use crate::utils::Result;

/// Client-side view of one topic URI.
pub struct TopicProxy<M> {
    topic: String,
    subscriber: Arc<WampSubscriber<M>>,
    publisher: Arc<WampPublisher<M>>,
}

impl<M> TopicProxy<M> {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<M: WampMessage> TopicProxy<M> {
    pub(crate) fn new(
        topic: impl Into<String>,
        subscriber: Arc<WampSubscriber<M>>,
        publisher: Arc<WampPublisher<M>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            subscriber,
            publisher,
        }
    }

    pub async fn subscribe(
        &self,
        options: SubscribeOptions,
        handler: Arc<dyn EventHandler<M>>,
    ) -> Result<ClientSubscription> {
        self.subscriber.subscribe(&self.topic, options, handler).await
    }

    pub async fn unsubscribe(&self, subscription: ClientSubscription) -> Result<()> {
        self.subscriber.unsubscribe(subscription).await
    }

    pub async fn publish(
        &self,
        options: PublishOptions,
        arguments: Option<Arguments<M>>,
        arguments_keywords: Option<ArgumentsKeywords<M>>,
    ) -> Result<Option<PublicationId>> {
        self.publisher
            .publish(&self.topic, options, arguments, arguments_keywords)
            .await
    }
}

impl<M> fmt::Debug for TopicProxy<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicProxy").field("topic", &self.topic).finish()
    }
}
