//! PubSub server
//!
//! Front door of the broker for decoded SUBSCRIBE / UNSUBSCRIBE / PUBLISH
//! requests. Successful subscribe and unsubscribe calls are acknowledged by
//! the container itself; failures are reported back to the requesting
//! session here.

use std::sync::Arc;

use tracing::warn;

use crate::broker::{
    Arguments, ArgumentsKeywords, PublicationId, PublishOptions, RequestId, RequestKind,
    SharedSession, SubscribeOptions, SubscribeRequest, SubscriptionId, TopicContainer,
    UnsubscribeRequest, WampMessage,
};
use crate::utils::{Result, WampError};

pub struct PubSubServer<M> {
    container: Arc<TopicContainer<M>>,
}

impl<M: WampMessage> PubSubServer<M> {
    pub fn new(container: Arc<TopicContainer<M>>) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Arc<TopicContainer<M>> {
        &self.container
    }

    pub fn subscribe(
        &self,
        session: SharedSession<M>,
        request_id: RequestId,
        options: SubscribeOptions,
        topic: &str,
    ) -> Result<SubscriptionId> {
        let request = SubscribeRequest::new(request_id, session.clone());
        self.container
            .subscribe(request, options, topic)
            .inspect_err(|e| reply_error(&session, RequestKind::Subscribe, request_id, e))
    }

    pub fn unsubscribe(
        &self,
        session: SharedSession<M>,
        request_id: RequestId,
        subscription_id: SubscriptionId,
    ) -> Result<()> {
        let request = UnsubscribeRequest::new(request_id, session.clone());
        self.container
            .unsubscribe(request, subscription_id)
            .inspect_err(|e| reply_error(&session, RequestKind::Unsubscribe, request_id, e))
    }

    /// Publish on behalf of `session`. The publisher recorded in `options`
    /// is always the calling session.
    pub fn publish(
        &self,
        session: SharedSession<M>,
        request_id: RequestId,
        mut options: PublishOptions,
        topic: &str,
        arguments: Option<Arguments<M>>,
        arguments_keywords: Option<ArgumentsKeywords<M>>,
    ) -> PublicationId {
        options.publisher = Some(session.session_id());
        let publication_id = self
            .container
            .publish(&options, topic, arguments, arguments_keywords);

        if options.acknowledge {
            if let Err(e) = session.published(request_id, publication_id) {
                warn!(
                    "Failed to acknowledge publication {publication_id} to session {}: {e}",
                    session.session_id()
                );
            }
        }
        publication_id
    }
}

pub(crate) fn reply_error<M: WampMessage>(
    session: &SharedSession<M>,
    kind: RequestKind,
    request_id: RequestId,
    error: &WampError,
) {
    if let Err(e) = session.error(kind, request_id, error) {
        warn!(
            "Failed to report {kind} error to session {}: {e}",
            session.session_id()
        );
    }
}
