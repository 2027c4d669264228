//! Client subscriber role
//!
//! Several local handlers can share one remote subscription: the router
//! hands back the same subscription ID for the same topic and options, so
//! the subscriber keys its handlers by that ID and only sends UNSUBSCRIBE
//! when the last local handler goes away.
//!
//! A handler is attached when the `subscribed` reply is processed, before
//! the waiting caller resumes, so an event that follows the reply
//! immediately is not lost.
//!
//! While the last handler's UNSUBSCRIBE is in flight the router can still
//! acknowledge a new subscribe with the doomed ID. Such a subscribe is held
//! back and sent again once the UNSUBSCRIBE is answered.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::broker::{
    EventPayload, IdAllocator, PublicationId, RequestId, SequentialIdAllocator, SubscribeOptions,
    SubscriptionId, WampMessage,
};
use crate::client::proxy::{EventHandler, ServerProxy};
use crate::utils::{Result, WampError};

/// One local subscription: the shared remote ID plus this handler's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientSubscription {
    pub subscription_id: SubscriptionId,
    pub local_id: u64,
}

type Handler<M> = Arc<dyn EventHandler<M>>;

struct PendingSubscribe<M> {
    topic: String,
    options: SubscribeOptions,
    handler: Handler<M>,
    local_id: u64,
    reply: oneshot::Sender<Result<ClientSubscription>>,
}

pub struct WampSubscriber<M> {
    proxy: Arc<dyn ServerProxy<M>>,
    request_ids: Arc<SequentialIdAllocator>,
    local_ids: SequentialIdAllocator,
    pending_subscribe: DashMap<RequestId, PendingSubscribe<M>>,
    pending_unsubscribe: DashMap<RequestId, (SubscriptionId, oneshot::Sender<Result<()>>)>,
    handlers: DashMap<SubscriptionId, Vec<(u64, Handler<M>)>>,
    /// Subscriptions with an UNSUBSCRIBE in flight, and the subscribes
    /// acknowledged for them meanwhile. Locked after `handlers`, never before.
    unsubscribing: DashMap<SubscriptionId, Vec<PendingSubscribe<M>>>,
}

impl<M: WampMessage> WampSubscriber<M> {
    pub fn new(proxy: Arc<dyn ServerProxy<M>>, request_ids: Arc<SequentialIdAllocator>) -> Self {
        Self {
            proxy,
            request_ids,
            local_ids: SequentialIdAllocator::new(),
            pending_subscribe: DashMap::new(),
            pending_unsubscribe: DashMap::new(),
            handlers: DashMap::new(),
            unsubscribing: DashMap::new(),
        }
    }

    pub async fn subscribe(
        &self,
        topic: &str,
        options: SubscribeOptions,
        handler: Handler<M>,
    ) -> Result<ClientSubscription> {
        let request_id = self.request_ids.next_id();
        let (reply, response) = oneshot::channel();
        self.pending_subscribe.insert(
            request_id,
            PendingSubscribe {
                topic: topic.to_string(),
                options: options.clone(),
                handler,
                local_id: self.local_ids.next_id(),
                reply,
            },
        );

        if let Err(e) = self.proxy.subscribe(request_id, options, topic) {
            self.pending_subscribe.remove(&request_id);
            return Err(e);
        }
        response.await.map_err(|_| WampError::Disconnected)?
    }

    /// Detach a local handler; the remote subscription is released with it
    /// when no other local handler uses it.
    pub async fn unsubscribe(&self, subscription: ClientSubscription) -> Result<()> {
        if !self.detach(subscription)? {
            return Ok(());
        }

        let response = self.send_unsubscribe(subscription.subscription_id)?;
        response.await.map_err(|_| WampError::Disconnected)?
    }

    pub fn subscribed(&self, request_id: RequestId, subscription_id: SubscriptionId) {
        let Some((_, pending)) = self.pending_subscribe.remove(&request_id) else {
            warn!("Subscribed reply for unknown request {request_id}");
            return;
        };

        let (local_id, reply) = {
            let entry = self.handlers.entry(subscription_id);
            // the router may ack an ID our own UNSUBSCRIBE is about to destroy
            if let Some(mut parked) = self.unsubscribing.get_mut(&subscription_id) {
                debug!("Subscribe request {request_id} got {subscription_id}, which is being released");
                parked.push(pending);
                return;
            }
            entry.or_default().push((pending.local_id, pending.handler));
            (pending.local_id, pending.reply)
        };

        let subscription = ClientSubscription {
            subscription_id,
            local_id,
        };
        if reply.send(Ok(subscription)).is_err() {
            // caller gave up waiting
            debug!("Subscribe request {request_id} was abandoned, releasing {subscription_id}");
            if let Ok(true) = self.detach(subscription) {
                if let Err(e) = self.send_unsubscribe(subscription_id) {
                    warn!("Failed to release abandoned subscription {subscription_id}: {e}");
                }
            }
        }
    }

    pub fn unsubscribed(&self, request_id: RequestId, subscription_id: SubscriptionId) {
        match self.pending_unsubscribe.remove(&request_id) {
            Some((_, (released, reply))) => {
                self.finish_unsubscribe(released);
                let _ = reply.send(Ok(()));
            }
            None => debug!("Unsubscribed reply for untracked request {request_id} ({subscription_id})"),
        }
    }

    pub fn event(
        &self,
        subscription_id: SubscriptionId,
        publication_id: PublicationId,
        payload: EventPayload<M>,
    ) {
        // cloned out so handlers run without holding the map shard
        let handlers: Vec<Handler<M>> = self
            .handlers
            .get(&subscription_id)
            .map(|entry| entry.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!("Event {publication_id} for unknown subscription {subscription_id}");
            return;
        }
        for handler in handlers {
            handler.on_event(publication_id, &payload);
        }
    }

    /// Fails the pending request `request_id`, if it is one of ours.
    pub fn error(&self, request_id: RequestId, error: WampError) -> bool {
        if let Some((_, pending)) = self.pending_subscribe.remove(&request_id) {
            let _ = pending.reply.send(Err(error));
            return true;
        }
        if let Some((_, (released, reply))) = self.pending_unsubscribe.remove(&request_id) {
            self.finish_unsubscribe(released);
            let _ = reply.send(Err(error));
            return true;
        }
        false
    }

    /// Fails every pending request and forgets all handlers.
    pub fn connection_lost(&self) {
        let subscribes: Vec<RequestId> = self.pending_subscribe.iter().map(|e| *e.key()).collect();
        for request_id in subscribes {
            self.error(request_id, WampError::Disconnected);
        }
        let unsubscribes: Vec<RequestId> =
            self.pending_unsubscribe.iter().map(|e| *e.key()).collect();
        for request_id in unsubscribes {
            if let Some((_, (_, reply))) = self.pending_unsubscribe.remove(&request_id) {
                let _ = reply.send(Err(WampError::Disconnected));
            }
        }
        self.handlers.clear();

        let released: Vec<SubscriptionId> = self.unsubscribing.iter().map(|e| *e.key()).collect();
        for subscription_id in released {
            if let Some((_, parked)) = self.unsubscribing.remove(&subscription_id) {
                for pending in parked {
                    let _ = pending.reply.send(Err(WampError::Disconnected));
                }
            }
        }
    }

    /// Number of local handlers attached to `subscription_id`.
    pub fn handler_count(&self, subscription_id: SubscriptionId) -> usize {
        self.handlers
            .get(&subscription_id)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    /// `Ok(true)` when the detached handler was the last one. The
    /// subscription is then marked as being released.
    fn detach(&self, subscription: ClientSubscription) -> Result<bool> {
        let unknown = WampError::NoSuchSubscription(subscription.subscription_id);
        match self.handlers.entry(subscription.subscription_id) {
            Entry::Occupied(mut entry) => {
                let handlers = entry.get_mut();
                let before = handlers.len();
                handlers.retain(|(local_id, _)| *local_id != subscription.local_id);
                if handlers.len() == before {
                    return Err(unknown);
                }
                if handlers.is_empty() {
                    self.unsubscribing.entry(subscription.subscription_id).or_default();
                    entry.remove();
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(_) => Err(unknown),
        }
    }

    fn send_unsubscribe(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<oneshot::Receiver<Result<()>>> {
        let request_id = self.request_ids.next_id();
        let (reply, response) = oneshot::channel();
        self.pending_unsubscribe.insert(request_id, (subscription_id, reply));

        if let Err(e) = self.proxy.unsubscribe(request_id, subscription_id) {
            self.pending_unsubscribe.remove(&request_id);
            self.finish_unsubscribe(subscription_id);
            return Err(e);
        }
        Ok(response)
    }

    /// The release of `subscription_id` is over, whatever its outcome.
    /// Subscribes parked on it go out again under fresh request IDs.
    fn finish_unsubscribe(&self, subscription_id: SubscriptionId) {
        let Some((_, parked)) = self.unsubscribing.remove(&subscription_id) else {
            return;
        };
        for pending in parked {
            self.resubscribe(pending);
        }
    }

    fn resubscribe(&self, pending: PendingSubscribe<M>) {
        let request_id = self.request_ids.next_id();
        let topic = pending.topic.clone();
        let options = pending.options.clone();
        self.pending_subscribe.insert(request_id, pending);

        if let Err(e) = self.proxy.subscribe(request_id, options, &topic) {
            warn!("Failed to resubscribe to {topic}: {e}");
            if let Some((_, pending)) = self.pending_subscribe.remove(&request_id) {
                let _ = pending.reply.send(Err(e));
            }
        }
    }
}
