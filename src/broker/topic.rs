//! Topic registration
//!
//! A `TopicRegistration` holds the live subscribers of one subscription key.
//! All subscribers of a registration share its subscription ID, which is the
//! identity the remote peers see.
//!
//! Concurrency note: the subscriber list has its own lock. Publishing takes
//! it for reading, so publishers never contend with each other; subscribe and
//! unsubscribe take it for writing and send their acknowledgement while
//! holding it, so an `event` can never overtake a `subscribed`, and nothing
//! is delivered to a session after its `unsubscribed`. Structural changes to
//! the registration set are the container's business, not this type's.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::broker::id::{PublicationId, SessionId, SubscriptionId};
use crate::broker::matcher::SubscriptionKey;
use crate::broker::message::{Arguments, ArgumentsKeywords, EventDetails, WampMessage};
use crate::broker::options::{MatchPolicy, PublishOptions, SubscribeOptions};
use crate::broker::serializer::EventSerializer;
use crate::broker::session::{SharedSession, SubscribeRequest, UnsubscribeRequest};
use crate::utils::{Result, WampError};

/// Outcome of removing a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Other subscribers are still attached.
    Remaining(usize),
    /// This removal took the last subscriber. Reported once per transition.
    Emptied,
}

struct SubscriberEntry<M> {
    session: SharedSession<M>,
    options: SubscribeOptions,
}

pub struct TopicRegistration<M> {
    subscription_id: SubscriptionId,
    key: SubscriptionKey,
    serializer: Arc<dyn EventSerializer<M>>,
    subscribers: RwLock<Vec<SubscriberEntry<M>>>,
}

impl<M: WampMessage> TopicRegistration<M> {
    pub fn new(
        subscription_id: SubscriptionId,
        key: SubscriptionKey,
        serializer: Arc<dyn EventSerializer<M>>,
    ) -> Self {
        Self {
            subscription_id,
            key,
            serializer,
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.subscribers
            .read()
            .iter()
            .any(|entry| entry.session.session_id() == session)
    }

    pub fn sessions(&self) -> Vec<SessionId> {
        self.subscribers
            .read()
            .iter()
            .map(|entry| entry.session.session_id())
            .collect()
    }

    /// Acknowledge `request` with this registration's ID and attach it.
    /// Appends unconditionally; the container filters repeats.
    pub fn subscribe(&self, request: SubscribeRequest<M>, options: SubscribeOptions) {
        let mut subscribers = self.subscribers.write();
        if let Err(e) = request
            .session
            .subscribed(request.request_id, self.subscription_id)
        {
            warn!(
                "Failed to acknowledge subscription {} to session {}: {e}",
                self.subscription_id,
                request.session.session_id()
            );
        }
        subscribers.push(SubscriberEntry {
            session: request.session,
            options,
        });
    }

    /// Detach the requesting session and acknowledge.
    pub fn unsubscribe(&self, request: &UnsubscribeRequest<M>) -> Result<Removal> {
        let session_id = request.session.session_id();
        let mut subscribers = self.subscribers.write();
        let removal = Self::remove_entry(&mut subscribers, session_id)
            .ok_or(WampError::NoSuchSubscription(self.subscription_id))?;

        if let Err(e) = request
            .session
            .unsubscribed(request.request_id, self.subscription_id)
        {
            warn!(
                "Failed to acknowledge unsubscribe of {} to session {session_id}: {e}",
                self.subscription_id
            );
        }
        Ok(removal)
    }

    /// Detach a session without acknowledging; used when it has gone away.
    pub fn remove_session(&self, session: SessionId) -> Option<Removal> {
        Self::remove_entry(&mut self.subscribers.write(), session)
    }

    fn remove_entry(
        subscribers: &mut Vec<SubscriberEntry<M>>,
        session: SessionId,
    ) -> Option<Removal> {
        let position = subscribers
            .iter()
            .position(|entry| entry.session.session_id() == session)?;
        subscribers.remove(position);

        Some(if subscribers.is_empty() {
            Removal::Emptied
        } else {
            Removal::Remaining(subscribers.len())
        })
    }

    /// Deliver one publication to every admitted subscriber and return how
    /// many deliveries the sessions accepted. A failing session is logged and
    /// skipped.
    pub fn publish(
        &self,
        publication_id: PublicationId,
        options: &PublishOptions,
        topic: &str,
        arguments: Option<&Arguments<M>>,
        arguments_keywords: Option<&ArgumentsKeywords<M>>,
    ) -> usize {
        let subscribers = self.subscribers.read();
        let mut delivered = 0;

        for entry in subscribers.iter() {
            let session_id = entry.session.session_id();
            if !options.admits(session_id) {
                continue;
            }

            let details = EventDetails {
                topic: (entry.options.match_policy != MatchPolicy::Exact)
                    .then(|| topic.to_string()),
                publisher: if options.disclose_me {
                    options.publisher
                } else {
                    None
                },
            };
            let payload = self.serializer.shape(details, arguments, arguments_keywords);

            match entry
                .session
                .event(self.subscription_id, publication_id, payload)
            {
                Ok(()) => {
                    trace!(
                        "Delivered publication {publication_id} on {} to session {session_id}",
                        self.subscription_id
                    );
                    delivered += 1;
                }
                Err(e) => warn!(
                    "Failed to deliver publication {publication_id} to session {session_id}: {e}"
                ),
            }
        }

        delivered
    }
}

impl<M> fmt::Debug for TopicRegistration<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicRegistration")
            .field("subscription_id", &self.subscription_id)
            .field("key", &self.key)
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}
