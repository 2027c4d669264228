//! Test doubles shared by the unit tests of several modules.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::broker::{
    CallResult, EventPayload, PublicationId, RequestId, RequestKind, SessionHandle, SessionId,
    SharedSession, SubscribeRequest, SubscriptionId, UnsubscribeRequest,
};
use crate::utils::{Result, WampError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Recorded<M> {
    Event {
        subscription_id: SubscriptionId,
        publication_id: PublicationId,
        payload: EventPayload<M>,
    },
    Subscribed {
        request_id: RequestId,
        subscription_id: SubscriptionId,
    },
    Unsubscribed {
        request_id: RequestId,
        subscription_id: SubscriptionId,
    },
    Published {
        request_id: RequestId,
        publication_id: PublicationId,
    },
    Result {
        request_id: RequestId,
        result: CallResult<M>,
    },
    Error {
        kind: RequestKind,
        request_id: RequestId,
        error: WampError,
    },
}

/// A session that records everything the broker sends it. Once closed,
/// every call fails like a disconnected transport would.
pub(crate) struct RecordingSession<M> {
    id: SessionId,
    log: Mutex<Vec<Recorded<M>>>,
    closed: AtomicBool,
}

impl<M: Clone + Send + Sync + 'static> RecordingSession<M> {
    pub(crate) fn new(id: SessionId) -> Arc<Self> {
        Arc::new(Self {
            id,
            log: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take(&self) -> Vec<Recorded<M>> {
        std::mem::take(&mut *self.log.lock())
    }

    /// Drains the log, keeping only events.
    pub(crate) fn take_events(&self) -> Vec<(SubscriptionId, PublicationId, EventPayload<M>)> {
        self.take()
            .into_iter()
            .filter_map(|recorded| match recorded {
                Recorded::Event {
                    subscription_id,
                    publication_id,
                    payload,
                } => Some((subscription_id, publication_id, payload)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn shared(self: &Arc<Self>) -> SharedSession<M> {
        self.clone()
    }

    pub(crate) fn subscribe_request(self: &Arc<Self>, request_id: RequestId) -> SubscribeRequest<M> {
        SubscribeRequest::new(request_id, self.shared())
    }

    pub(crate) fn unsubscribe_request(
        self: &Arc<Self>,
        request_id: RequestId,
    ) -> UnsubscribeRequest<M> {
        UnsubscribeRequest::new(request_id, self.shared())
    }

    fn record(&self, recorded: Recorded<M>) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(WampError::SessionClosed(self.id));
        }
        self.log.lock().push(recorded);
        Ok(())
    }
}

impl<M: Clone + Send + Sync + 'static> SessionHandle<M> for RecordingSession<M> {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn event(
        &self,
        subscription_id: SubscriptionId,
        publication_id: PublicationId,
        payload: EventPayload<M>,
    ) -> Result<()> {
        self.record(Recorded::Event {
            subscription_id,
            publication_id,
            payload,
        })
    }

    fn subscribed(&self, request_id: RequestId, subscription_id: SubscriptionId) -> Result<()> {
        self.record(Recorded::Subscribed {
            request_id,
            subscription_id,
        })
    }

    fn unsubscribed(&self, request_id: RequestId, subscription_id: SubscriptionId) -> Result<()> {
        self.record(Recorded::Unsubscribed {
            request_id,
            subscription_id,
        })
    }

    fn published(&self, request_id: RequestId, publication_id: PublicationId) -> Result<()> {
        self.record(Recorded::Published {
            request_id,
            publication_id,
        })
    }

    fn result(&self, request_id: RequestId, result: CallResult<M>) -> Result<()> {
        self.record(Recorded::Result { request_id, result })
    }

    fn error(&self, kind: RequestKind, request_id: RequestId, error: &WampError) -> Result<()> {
        self.record(Recorded::Error {
            kind,
            request_id,
            error: error.clone(),
        })
    }
}
