//! Client publisher role. Only acknowledged publishes wait for the router.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

use crate::broker::{
    Arguments, ArgumentsKeywords, IdAllocator, PublicationId, PublishOptions, RequestId,
    SequentialIdAllocator, WampMessage,
};
use crate::client::proxy::ServerProxy;
use crate::utils::{Result, WampError};

pub struct WampPublisher<M> {
    proxy: Arc<dyn ServerProxy<M>>,
    request_ids: Arc<SequentialIdAllocator>,
    pending: DashMap<RequestId, oneshot::Sender<Result<PublicationId>>>,
}

impl<M: WampMessage> WampPublisher<M> {
    pub fn new(proxy: Arc<dyn ServerProxy<M>>, request_ids: Arc<SequentialIdAllocator>) -> Self {
        Self {
            proxy,
            request_ids,
            pending: DashMap::new(),
        }
    }

    /// Returns the publication ID when `options.acknowledge` is set, `None`
    /// as soon as the request is sent otherwise.
    pub async fn publish(
        &self,
        topic: &str,
        options: PublishOptions,
        arguments: Option<Arguments<M>>,
        arguments_keywords: Option<ArgumentsKeywords<M>>,
    ) -> Result<Option<PublicationId>> {
        let request_id = self.request_ids.next_id();

        if !options.acknowledge {
            self.proxy
                .publish(request_id, options, topic, arguments, arguments_keywords)?;
            return Ok(None);
        }

        let (reply, response) = oneshot::channel();
        self.pending.insert(request_id, reply);
        if let Err(e) = self
            .proxy
            .publish(request_id, options, topic, arguments, arguments_keywords)
        {
            self.pending.remove(&request_id);
            return Err(e);
        }
        response.await.map_err(|_| WampError::Disconnected)?.map(Some)
    }

    pub fn published(&self, request_id: RequestId, publication_id: PublicationId) {
        match self.pending.remove(&request_id) {
            Some((_, reply)) => {
                let _ = reply.send(Ok(publication_id));
            }
            None => debug!("Published reply for unknown request {request_id}"),
        }
    }

    pub fn error(&self, request_id: RequestId, error: WampError) -> bool {
        match self.pending.remove(&request_id) {
            Some((_, reply)) => {
                let _ = reply.send(Err(error));
                true
            }
            None => false,
        }
    }

    pub fn connection_lost(&self) {
        let pending: Vec<RequestId> = self.pending.iter().map(|e| *e.key()).collect();
        for request_id in pending {
            self.error(request_id, WampError::Disconnected);
        }
    }
}
