//! Topic container
//!
//! The container is the single authority mapping subscribe requests to
//! registrations. It keeps two indexes over the live registrations, by
//! subscription key and by subscription ID, and they always agree: a
//! registration is in both or in neither.
//!
//! Concurrency and usage notes:
//! - Every structural change (create on first subscribe, destroy when the
//!   last subscriber leaves) and every subscriber attach/detach runs under one
//!   container-wide mutex. Lookup, attach and destroy therefore cannot
//!   interleave for the same key, so a registration is never destroyed
//!   between being found and being used.
//! - The indexes are `DashMap`s: lookups of unrelated keys only take a shard
//!   read lock and never wait for the structural mutex.
//! - `publish` never takes the structural mutex. It snapshots the matching
//!   registrations and fans out through each registration's read lock; a
//!   registration destroyed after the snapshot has no subscribers left, so
//!   nothing is delivered through it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, warn};

use crate::broker::id::{
    IdAllocator, PublicationId, SequentialIdAllocator, SessionId, SubscriptionId,
};
use crate::broker::matcher::{SubscriptionKey, TopicMatcher, WampTopicMatcher};
use crate::broker::message::{Arguments, ArgumentsKeywords, WampMessage};
use crate::broker::options::{PublishOptions, SubscribeOptions};
use crate::broker::serializer::{EventSerializer, WampEventSerializer};
use crate::broker::session::{SubscribeRequest, UnsubscribeRequest};
use crate::broker::topic::{Removal, TopicRegistration};
use crate::config::BrokerSettings;
use crate::utils::{Result, WampError};

type Registration<M> = Arc<TopicRegistration<M>>;

pub struct TopicContainer<M> {
    matcher: Arc<dyn TopicMatcher>,
    serializer: Arc<dyn EventSerializer<M>>,
    ids: Arc<dyn IdAllocator>,
    structure: Mutex<()>,
    by_key: DashMap<SubscriptionKey, Registration<M>>,
    by_id: DashMap<SubscriptionId, Registration<M>>,
    pattern_registrations: AtomicUsize,
}

impl<M: WampMessage> Default for TopicContainer<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: WampMessage> TopicContainer<M> {
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(WampTopicMatcher),
            Arc::new(WampEventSerializer),
            Arc::new(SequentialIdAllocator::new()),
        )
    }

    pub fn from_settings(settings: &BrokerSettings) -> Self {
        Self::with_parts(
            Arc::new(WampTopicMatcher),
            Arc::new(WampEventSerializer),
            Arc::new(SequentialIdAllocator::starting_at(settings.first_id)),
        )
    }

    pub fn with_parts(
        matcher: Arc<dyn TopicMatcher>,
        serializer: Arc<dyn EventSerializer<M>>,
        ids: Arc<dyn IdAllocator>,
    ) -> Self {
        Self {
            matcher,
            serializer,
            ids,
            structure: Mutex::new(()),
            by_key: DashMap::new(),
            by_id: DashMap::new(),
            pattern_registrations: AtomicUsize::new(0),
        }
    }

    /// Attach the requesting session to the registration for
    /// `(topic, options)`, creating it on first use. Returns the
    /// registration's subscription ID, shared by all its subscribers.
    ///
    /// A session that is already attached to the same registration is
    /// acknowledged again with the same ID and is not attached twice.
    pub fn subscribe(
        &self,
        request: SubscribeRequest<M>,
        options: SubscribeOptions,
        topic: &str,
    ) -> Result<SubscriptionId> {
        let key = self.matcher.subscription_key(topic, &options)?;
        let guard = self.structure.lock();

        let existing = self.by_key.get(&key).map(|entry| entry.value().clone());
        let registration = match existing {
            Some(registration) => registration,
            None => self.create_registration(&guard, key),
        };
        let subscription_id = registration.subscription_id();
        let session_id = request.session.session_id();

        if registration.contains(session_id) {
            debug!("Session {session_id} already subscribed to {subscription_id}");
            if let Err(e) = request
                .session
                .subscribed(request.request_id, subscription_id)
            {
                warn!("Failed to acknowledge subscription {subscription_id} to session {session_id}: {e}");
            }
            return Ok(subscription_id);
        }

        registration.subscribe(request, options);
        debug!(
            "Session {session_id} subscribed to {} as {subscription_id}",
            registration.key()
        );
        Ok(subscription_id)
    }

    /// Detach the requesting session from `subscription_id`. Destroys the
    /// registration when that was its last subscriber.
    pub fn unsubscribe(
        &self,
        request: UnsubscribeRequest<M>,
        subscription_id: SubscriptionId,
    ) -> Result<()> {
        let guard = self.structure.lock();

        let registration = self
            .by_id
            .get(&subscription_id)
            .map(|entry| entry.value().clone())
            .ok_or(WampError::NoSuchSubscription(subscription_id))?;

        match registration.unsubscribe(&request)? {
            Removal::Emptied => self.destroy(&guard, &registration),
            Removal::Remaining(left) => debug!(
                "Session {} unsubscribed from {subscription_id}, {left} subscriber(s) left",
                request.session.session_id()
            ),
        }
        Ok(())
    }

    /// Fan a publication out to every registration matching `topic` and
    /// return its freshly allocated publication ID. Succeeds whether or not
    /// anyone is subscribed.
    pub fn publish(
        &self,
        options: &PublishOptions,
        topic: &str,
        arguments: Option<Arguments<M>>,
        arguments_keywords: Option<ArgumentsKeywords<M>>,
    ) -> PublicationId {
        let publication_id = self.ids.next_id();
        let targets = self.matching(topic);

        let delivered: usize = targets
            .iter()
            .map(|registration| {
                registration.publish(
                    publication_id,
                    options,
                    topic,
                    arguments.as_ref(),
                    arguments_keywords.as_ref(),
                )
            })
            .sum();

        debug!(
            "Publication {publication_id} to {topic} reached {} registration(s), {delivered} delivery(ies)",
            targets.len()
        );
        publication_id
    }

    /// Drop a departed session from every registration, destroying the ones
    /// it leaves empty. Returns how many subscriptions it held.
    pub fn remove_session(&self, session: SessionId) -> usize {
        let guard = self.structure.lock();

        let registrations: Vec<Registration<M>> = self
            .by_id
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut removed = 0;
        for registration in registrations {
            match registration.remove_session(session) {
                Some(Removal::Emptied) => {
                    removed += 1;
                    self.destroy(&guard, &registration);
                }
                Some(Removal::Remaining(_)) => removed += 1,
                None => {}
            }
        }

        if removed > 0 {
            debug!("Removed session {session} from {removed} subscription(s)");
        }
        removed
    }

    /// The live subscription ID for `(topic, options)`, if any.
    pub fn lookup(&self, topic: &str, options: &SubscribeOptions) -> Option<SubscriptionId> {
        let key = self.matcher.subscription_key(topic, options).ok()?;
        self.by_key
            .get(&key)
            .map(|entry| entry.value().subscription_id())
    }

    /// Sessions currently attached to `subscription_id`.
    pub fn subscribers(&self, subscription_id: SubscriptionId) -> Option<Vec<SessionId>> {
        let registration = self
            .by_id
            .get(&subscription_id)
            .map(|entry| entry.value().clone())?;
        Some(registration.sessions())
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn matching(&self, topic: &str) -> Vec<Registration<M>> {
        let mut targets = Vec::new();

        let exact = SubscriptionKey::exact(topic);
        if let Some(entry) = self.by_key.get(&exact) {
            if self.matcher.matches(entry.key(), topic) {
                targets.push(entry.value().clone());
            }
        }

        if self.pattern_registrations.load(Ordering::Acquire) > 0 {
            targets.extend(
                self.by_key
                    .iter()
                    .filter(|entry| entry.key().is_pattern() && self.matcher.matches(entry.key(), topic))
                    .map(|entry| entry.value().clone()),
            );
        }

        targets
    }

    fn create_registration(&self, _guard: &MutexGuard<'_, ()>, key: SubscriptionKey) -> Registration<M> {
        let registration = loop {
            let subscription_id = self.ids.next_id();
            match self.by_id.entry(subscription_id) {
                Entry::Vacant(slot) => {
                    let registration = Arc::new(TopicRegistration::new(
                        subscription_id,
                        key.clone(),
                        self.serializer.clone(),
                    ));
                    slot.insert(registration.clone());
                    break registration;
                }
                Entry::Occupied(_) => {
                    error!("Subscription id {subscription_id} is still in use, allocating another")
                }
            }
        };

        match self.by_key.entry(key) {
            Entry::Vacant(slot) => {
                if slot.key().is_pattern() {
                    self.pattern_registrations.fetch_add(1, Ordering::AcqRel);
                }
                slot.insert(registration.clone());
                debug!(
                    "Created registration {} for {}",
                    registration.subscription_id(),
                    registration.key()
                );
                registration
            }
            Entry::Occupied(occupied) => {
                // Unreachable while the structural mutex is held by the caller.
                error!(
                    "Registration for {} already exists, discarding {}",
                    occupied.key(),
                    registration.subscription_id()
                );
                self.by_id.remove(&registration.subscription_id());
                occupied.get().clone()
            }
        }
    }

    fn destroy(&self, _guard: &MutexGuard<'_, ()>, registration: &Registration<M>) {
        if registration.has_subscribers() {
            return;
        }

        let subscription_id = registration.subscription_id();
        let by_id = self
            .by_id
            .remove_if(&subscription_id, |_, current| Arc::ptr_eq(current, registration));
        let by_key = self
            .by_key
            .remove_if(registration.key(), |_, current| Arc::ptr_eq(current, registration));

        if by_key.is_some() && registration.key().is_pattern() {
            self.pattern_registrations.fetch_sub(1, Ordering::AcqRel);
        }
        if by_id.is_some() != by_key.is_some() {
            error!("Registration {subscription_id} was missing from one index");
        }
        debug!("Destroyed registration {subscription_id} for {}", registration.key());
    }

    #[cfg(test)]
    pub(crate) fn index_sizes(&self) -> (usize, usize) {
        (self.by_key.len(), self.by_id.len())
    }
}

impl<M> fmt::Debug for TopicContainer<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicContainer")
            .field("registrations", &self.by_id.len())
            .field(
                "pattern_registrations",
                &self.pattern_registrations.load(Ordering::Relaxed),
            )
            .finish()
    }
}
