//! Lazily populated cache of topic proxies.
//!
//! `get_topic` hands out a `TopicHandle` and counts it as a holder of the
//! cached proxy. The entry is evicted when its last holder releases, either
//! explicitly through `TopicHandle::release` or by dropping the handle. A
//! later `get_topic` for the same URI builds a fresh proxy.

use std::ops::Deref;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::broker::{
    EventPayload, PublicationId, RequestId, SequentialIdAllocator, SubscriptionId, WampMessage,
};
use crate::client::proxy::ServerProxy;
use crate::client::publisher::WampPublisher;
use crate::client::subscriber::WampSubscriber;
use crate::client::topic::TopicProxy;
use crate::utils::WampError;

struct CachedTopic<M> {
    proxy: Arc<TopicProxy<M>>,
    holders: usize,
}

type TopicCache<M> = Arc<DashMap<String, CachedTopic<M>>>;

pub struct TopicContainerProxy<M> {
    subscriber: Arc<WampSubscriber<M>>,
    publisher: Arc<WampPublisher<M>>,
    topics: TopicCache<M>,
}

impl<M: WampMessage> TopicContainerProxy<M> {
    pub fn new(server: Arc<dyn ServerProxy<M>>) -> Self {
        let request_ids = Arc::new(SequentialIdAllocator::new());
        Self {
            subscriber: Arc::new(WampSubscriber::new(server.clone(), request_ids.clone())),
            publisher: Arc::new(WampPublisher::new(server, request_ids)),
            topics: Arc::new(DashMap::new()),
        }
    }

    /// The cached proxy for `topic`, created on first request. Concurrent
    /// callers for the same URI get the same instance.
    pub fn get_topic(&self, topic: &str) -> TopicHandle<M> {
        let proxy = {
            let mut cached = self
                .topics
                .entry(topic.to_string())
                .or_insert_with(|| {
                    debug!("Caching topic proxy for {topic}");
                    CachedTopic {
                        proxy: Arc::new(TopicProxy::new(
                            topic,
                            self.subscriber.clone(),
                            self.publisher.clone(),
                        )),
                        holders: 0,
                    }
                });
            cached.holders += 1;
            cached.proxy.clone()
        };

        TopicHandle {
            proxy,
            topics: self.topics.clone(),
            released: false,
        }
    }

    pub fn is_cached(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn cached_topics(&self) -> usize {
        self.topics.len()
    }

    pub fn subscriber(&self) -> &Arc<WampSubscriber<M>> {
        &self.subscriber
    }

    pub fn publisher(&self) -> &Arc<WampPublisher<M>> {
        &self.publisher
    }

    // Inbound messages from the router.

    pub fn event(
        &self,
        subscription_id: SubscriptionId,
        publication_id: PublicationId,
        payload: EventPayload<M>,
    ) {
        self.subscriber.event(subscription_id, publication_id, payload);
    }

    pub fn subscribed(&self, request_id: RequestId, subscription_id: SubscriptionId) {
        self.subscriber.subscribed(request_id, subscription_id);
    }

    pub fn unsubscribed(&self, request_id: RequestId, subscription_id: SubscriptionId) {
        self.subscriber.unsubscribed(request_id, subscription_id);
    }

    pub fn published(&self, request_id: RequestId, publication_id: PublicationId) {
        self.publisher.published(request_id, publication_id);
    }

    pub fn error(&self, request_id: RequestId, error: WampError) {
        if !self.subscriber.error(request_id, error.clone()) && !self.publisher.error(request_id, error) {
            warn!("Error reply for unknown request {request_id}");
        }
    }

    pub fn connection_lost(&self) {
        self.subscriber.connection_lost();
        self.publisher.connection_lost();
    }
}

/// A counted reference to a cached `TopicProxy`.
pub struct TopicHandle<M> {
    proxy: Arc<TopicProxy<M>>,
    topics: TopicCache<M>,
    released: bool,
}

impl<M> TopicHandle<M> {
    pub fn proxy(&self) -> &Arc<TopicProxy<M>> {
        &self.proxy
    }

    /// Give up this reference. Same as dropping the handle.
    pub fn release(mut self) {
        self.release_entry();
    }

    fn release_entry(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // only the entry this handle was issued for; a rebuilt proxy for the
        // same URI is left alone
        match self.topics.entry(self.proxy.topic().to_string()) {
            Entry::Occupied(mut cached) if Arc::ptr_eq(&cached.get().proxy, &self.proxy) => {
                cached.get_mut().holders -= 1;
                if cached.get().holders == 0 {
                    debug!("Evicting topic proxy for {}", cached.key());
                    cached.remove();
                }
            }
            _ => debug!("Topic proxy for {} is no longer cached", self.proxy.topic()),
        }
    }
}

impl<M> Deref for TopicHandle<M> {
    type Target = TopicProxy<M>;

    fn deref(&self) -> &Self::Target {
        &self.proxy
    }
}

impl<M> Drop for TopicHandle<M> {
    fn drop(&mut self) {
        self.release_entry();
    }
}
