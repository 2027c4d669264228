use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;

use parking_lot::Mutex;

use super::*;
use crate::broker::{
    Arguments, ArgumentsKeywords, CallResult, EventPayload, PublicationId, PublishOptions,
    RequestId, RequestKind, SessionHandle, SessionId, SharedSession, SubscribeOptions,
    SubscriptionId,
};
use crate::config::Settings;
use crate::server::WampServer;
use crate::utils::{Result, WampError};

/// Client-side session object the server writes to; forwards every reply
/// into the client's topic container.
struct LoopbackSession {
    id: SessionId,
    client: OnceLock<Weak<TopicContainerProxy<i64>>>,
}

impl LoopbackSession {
    fn client(&self) -> Result<Arc<TopicContainerProxy<i64>>> {
        self.client
            .get()
            .and_then(Weak::upgrade)
            .ok_or(WampError::SessionClosed(self.id))
    }
}

impl SessionHandle<i64> for LoopbackSession {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn event(
        &self,
        subscription_id: SubscriptionId,
        publication_id: PublicationId,
        payload: EventPayload<i64>,
    ) -> Result<()> {
        self.client()?.event(subscription_id, publication_id, payload);
        Ok(())
    }

    fn subscribed(&self, request_id: RequestId, subscription_id: SubscriptionId) -> Result<()> {
        self.client()?.subscribed(request_id, subscription_id);
        Ok(())
    }

    fn unsubscribed(&self, request_id: RequestId, subscription_id: SubscriptionId) -> Result<()> {
        self.client()?.unsubscribed(request_id, subscription_id);
        Ok(())
    }

    fn published(&self, request_id: RequestId, publication_id: PublicationId) -> Result<()> {
        self.client()?.published(request_id, publication_id);
        Ok(())
    }

    fn result(&self, _request_id: RequestId, _result: CallResult<i64>) -> Result<()> {
        Ok(())
    }

    fn error(&self, _kind: RequestKind, request_id: RequestId, error: &WampError) -> Result<()> {
        self.client()?.error(request_id, error.clone());
        Ok(())
    }
}

struct LoopbackProxy {
    server: Arc<WampServer<i64>>,
    session: Arc<LoopbackSession>,
}

impl LoopbackProxy {
    fn shared(&self) -> SharedSession<i64> {
        self.session.clone()
    }
}

impl ServerProxy<i64> for LoopbackProxy {
    fn subscribe(&self, request_id: RequestId, options: SubscribeOptions, topic: &str) -> Result<()> {
        // failures are replied to the session
        let _ = self
            .server
            .pubsub()
            .subscribe(self.shared(), request_id, options, topic);
        Ok(())
    }

    fn unsubscribe(&self, request_id: RequestId, subscription_id: SubscriptionId) -> Result<()> {
        let _ = self
            .server
            .pubsub()
            .unsubscribe(self.shared(), request_id, subscription_id);
        Ok(())
    }

    fn publish(
        &self,
        request_id: RequestId,
        options: PublishOptions,
        topic: &str,
        arguments: Option<Arguments<i64>>,
        arguments_keywords: Option<ArgumentsKeywords<i64>>,
    ) -> Result<()> {
        self.server.pubsub().publish(
            self.shared(),
            request_id,
            options,
            topic,
            arguments,
            arguments_keywords,
        );
        Ok(())
    }
}

/// Sends nothing anywhere; counts the requests it was given.
#[derive(Default)]
struct SilentProxy {
    calls: AtomicUsize,
}

impl ServerProxy<i64> for SilentProxy {
    fn subscribe(&self, _: RequestId, _: SubscribeOptions, _: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unsubscribe(&self, _: RequestId, _: SubscriptionId) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn publish(
        &self,
        _: RequestId,
        _: PublishOptions,
        _: &str,
        _: Option<Arguments<i64>>,
        _: Option<ArgumentsKeywords<i64>>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

enum QueuedRequest {
    Subscribe {
        request_id: RequestId,
        options: SubscribeOptions,
        topic: String,
    },
    Unsubscribe {
        request_id: RequestId,
        subscription_id: SubscriptionId,
    },
}

/// Holds subscribe and unsubscribe requests until the test hands them to
/// the server, so their arrival order can be chosen.
#[derive(Default)]
struct QueuedProxy {
    requests: Mutex<VecDeque<QueuedRequest>>,
}

impl QueuedProxy {
    async fn next_request(&self) -> QueuedRequest {
        loop {
            let next = self.requests.lock().pop_front();
            if let Some(request) = next {
                return request;
            }
            tokio::task::yield_now().await;
        }
    }
}

impl ServerProxy<i64> for QueuedProxy {
    fn subscribe(&self, request_id: RequestId, options: SubscribeOptions, topic: &str) -> Result<()> {
        self.requests.lock().push_back(QueuedRequest::Subscribe {
            request_id,
            options,
            topic: topic.to_string(),
        });
        Ok(())
    }

    fn unsubscribe(&self, request_id: RequestId, subscription_id: SubscriptionId) -> Result<()> {
        self.requests.lock().push_back(QueuedRequest::Unsubscribe {
            request_id,
            subscription_id,
        });
        Ok(())
    }

    fn publish(
        &self,
        _: RequestId,
        _: PublishOptions,
        _: &str,
        _: Option<Arguments<i64>>,
        _: Option<ArgumentsKeywords<i64>>,
    ) -> Result<()> {
        Ok(())
    }
}

fn deliver(server: &WampServer<i64>, session: &Arc<LoopbackSession>, request: QueuedRequest) {
    let shared: SharedSession<i64> = session.clone();
    match request {
        QueuedRequest::Subscribe {
            request_id,
            options,
            topic,
        } => {
            let _ = server.pubsub().subscribe(shared, request_id, options, &topic);
        }
        QueuedRequest::Unsubscribe {
            request_id,
            subscription_id,
        } => {
            let _ = server.pubsub().unsubscribe(shared, request_id, subscription_id);
        }
    }
}

#[derive(Default)]
struct Collector {
    events: Mutex<Vec<(PublicationId, EventPayload<i64>)>>,
}

impl EventHandler<i64> for Collector {
    fn on_event(&self, publication_id: PublicationId, payload: &EventPayload<i64>) {
        self.events.lock().push((publication_id, payload.clone()));
    }
}

fn server() -> Arc<WampServer<i64>> {
    let mut settings = Settings::default();
    settings.broker.first_id = 100;
    Arc::new(WampServer::from_settings(&settings))
}

fn connect(server: &Arc<WampServer<i64>>, id: SessionId) -> Arc<TopicContainerProxy<i64>> {
    let session = Arc::new(LoopbackSession {
        id,
        client: OnceLock::new(),
    });
    let proxy = LoopbackProxy {
        server: server.clone(),
        session: session.clone(),
    };
    let outbound: Arc<dyn ServerProxy<i64>> = Arc::new(proxy);
    let client = Arc::new(TopicContainerProxy::new(outbound));
    let _ = session.client.set(Arc::downgrade(&client));
    client
}

fn queued_client(
    id: SessionId,
) -> (Arc<QueuedProxy>, Arc<LoopbackSession>, Arc<TopicContainerProxy<i64>>) {
    let session = Arc::new(LoopbackSession {
        id,
        client: OnceLock::new(),
    });
    let proxy = Arc::new(QueuedProxy::default());
    let outbound: Arc<dyn ServerProxy<i64>> = proxy.clone();
    let client = Arc::new(TopicContainerProxy::new(outbound));
    let _ = session.client.set(Arc::downgrade(&client));
    (proxy, session, client)
}

fn silent_client() -> (Arc<SilentProxy>, Arc<TopicContainerProxy<i64>>) {
    let proxy = Arc::new(SilentProxy::default());
    let outbound: Arc<dyn ServerProxy<i64>> = proxy.clone();
    let client = Arc::new(TopicContainerProxy::new(outbound));
    (proxy, client)
}

#[test]
fn test_get_topic_returns_cached_instance() {
    let (_, client) = silent_client();

    let first = client.get_topic("com.example.topic");
    let second = client.get_topic("com.example.topic");
    let other = client.get_topic("com.example.other");

    assert!(Arc::ptr_eq(first.proxy(), second.proxy()));
    assert!(!Arc::ptr_eq(first.proxy(), other.proxy()));
    assert_eq!(first.topic(), "com.example.topic");
    assert_eq!(client.cached_topics(), 2);
}

#[test]
fn test_topic_evicted_after_last_release() {
    let (_, client) = silent_client();

    let first = client.get_topic("com.example.topic");
    let second = client.get_topic("com.example.topic");
    let original = first.proxy().clone();

    first.release();
    assert!(client.is_cached("com.example.topic"));

    drop(second);
    assert!(!client.is_cached("com.example.topic"));

    let rebuilt = client.get_topic("com.example.topic");
    assert!(!Arc::ptr_eq(&original, rebuilt.proxy()));
}

#[test]
fn test_concurrent_get_topic_shares_one_proxy() {
    let (_, client) = silent_client();
    let anchor = client.get_topic("com.example.topic");

    let proxies: Vec<Arc<TopicProxy<i64>>> = thread::scope(|scope| {
        let workers: Vec<_> = (0..16)
            .map(|_| scope.spawn(|| client.get_topic("com.example.topic").proxy().clone()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert!(proxies.iter().all(|p| Arc::ptr_eq(p, anchor.proxy())));
    assert_eq!(client.cached_topics(), 1);

    drop(anchor);
    assert_eq!(client.cached_topics(), 0);
}

#[tokio::test]
async fn test_subscribe_and_publish_over_loopback() {
    let server = server();
    let subscriber = connect(&server, 1);
    let publisher = connect(&server, 2);
    let collector = Arc::new(Collector::default());

    let topic = subscriber.get_topic("com.example.topic");
    let subscription = topic
        .subscribe(SubscribeOptions::exact(), collector.clone())
        .await
        .unwrap();
    assert_eq!(subscription.subscription_id, 100);
    assert_eq!(server.container().subscribers(100), Some(vec![1]));

    let publication = publisher
        .get_topic("com.example.topic")
        .publish(PublishOptions::acknowledged(), Some(vec![7]), None)
        .await
        .unwrap();
    let publication_id = publication.expect("acknowledged publish returns an id");

    let events = collector.events.lock().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, publication_id);
    assert_eq!(events[0].1.arguments(), Some(&[7][..]));

    topic.unsubscribe(subscription).await.unwrap();
    assert!(server.container().is_empty());
}

#[tokio::test]
async fn test_local_handlers_share_remote_subscription() {
    let server = server();
    let client = connect(&server, 1);
    let publisher = connect(&server, 2);
    let first_handler = Arc::new(Collector::default());
    let second_handler = Arc::new(Collector::default());
    let topic = client.get_topic("com.example.topic");

    let first = topic
        .subscribe(SubscribeOptions::exact(), first_handler.clone())
        .await
        .unwrap();
    let second = topic
        .subscribe(SubscribeOptions::exact(), second_handler.clone())
        .await
        .unwrap();

    assert_eq!(first.subscription_id, second.subscription_id);
    assert_ne!(first.local_id, second.local_id);
    assert_eq!(client.subscriber().handler_count(first.subscription_id), 2);
    assert_eq!(server.container().subscribers(first.subscription_id), Some(vec![1]));

    publisher
        .get_topic("com.example.topic")
        .publish(PublishOptions::default(), None, None)
        .await
        .unwrap();
    assert_eq!(first_handler.events.lock().len(), 1);
    assert_eq!(second_handler.events.lock().len(), 1);

    topic.unsubscribe(first).await.unwrap();
    assert_eq!(server.container().len(), 1);

    topic.unsubscribe(second).await.unwrap();
    assert!(server.container().is_empty());

    assert_eq!(
        topic.unsubscribe(first).await,
        Err(WampError::NoSuchSubscription(first.subscription_id))
    );
}

#[tokio::test]
async fn test_subscribe_error_is_returned_to_caller() {
    let server = server();
    let client = connect(&server, 1);

    let result = client
        .get_topic("com..example")
        .subscribe(SubscribeOptions::exact(), Arc::new(Collector::default()))
        .await;

    assert!(matches!(result, Err(WampError::InvalidUri(_))));
    assert!(server.container().is_empty());
}

#[tokio::test]
async fn test_unacknowledged_publish_returns_immediately() {
    let (proxy, client) = silent_client();

    let publication = client
        .get_topic("com.example.topic")
        .publish(PublishOptions::default(), None, None)
        .await;

    assert_eq!(publication, Ok(None));
    assert_eq!(proxy.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_lost_fails_pending_requests() {
    let (proxy, client) = silent_client();

    let pending = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .subscriber()
                .subscribe(
                    "com.example.topic",
                    SubscribeOptions::exact(),
                    Arc::new(Collector::default()),
                )
                .await
        })
    };
    while proxy.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    client.connection_lost();

    assert_eq!(pending.await.unwrap(), Err(WampError::Disconnected));
}

#[tokio::test]
async fn test_subscribe_acked_during_last_unsubscribe_is_sent_again() {
    let server = server();
    let (proxy, session, client) = queued_client(1);
    let first_handler = Arc::new(Collector::default());
    let second_handler = Arc::new(Collector::default());

    let first = {
        let subscriber = client.subscriber().clone();
        let handler = first_handler.clone();
        tokio::spawn(async move {
            subscriber
                .subscribe("a.b", SubscribeOptions::exact(), handler)
                .await
        })
    };
    deliver(&server, &session, proxy.next_request().await);
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.subscription_id, 100);

    let second = {
        let subscriber = client.subscriber().clone();
        let handler = second_handler.clone();
        tokio::spawn(async move {
            subscriber
                .subscribe("a.b", SubscribeOptions::exact(), handler)
                .await
        })
    };
    let second_subscribe = proxy.next_request().await;

    let release = {
        let subscriber = client.subscriber().clone();
        tokio::spawn(async move { subscriber.unsubscribe(first).await })
    };
    let unsubscribe = proxy.next_request().await;

    // the router sees the second SUBSCRIBE before the UNSUBSCRIBE
    deliver(&server, &session, second_subscribe);
    deliver(&server, &session, unsubscribe);
    assert_eq!(release.await.unwrap(), Ok(()));
    assert!(server.container().is_empty());

    deliver(&server, &session, proxy.next_request().await);
    let second = second.await.unwrap().unwrap();

    assert_ne!(second.subscription_id, 100);
    assert_eq!(
        server.container().subscribers(second.subscription_id),
        Some(vec![1])
    );
    assert_eq!(client.subscriber().handler_count(second.subscription_id), 1);
    assert_eq!(client.subscriber().handler_count(100), 0);

    connect(&server, 2)
        .get_topic("a.b")
        .publish(PublishOptions::default(), None, None)
        .await
        .unwrap();
    assert_eq!(second_handler.events.lock().len(), 1);
    assert!(first_handler.events.lock().is_empty());
}

#[tokio::test]
async fn test_abandoned_subscribe_is_released_at_router() {
    let server = server();
    let (proxy, session, client) = queued_client(1);

    let abandoned = {
        let subscriber = client.subscriber().clone();
        tokio::spawn(async move {
            subscriber
                .subscribe("a.b", SubscribeOptions::exact(), Arc::new(Collector::default()))
                .await
        })
    };
    let subscribe = proxy.next_request().await;
    abandoned.abort();
    assert!(abandoned.await.unwrap_err().is_cancelled());

    deliver(&server, &session, subscribe);
    assert_eq!(server.container().subscribers(100), Some(vec![1]));
    assert_eq!(client.subscriber().handler_count(100), 0);

    deliver(&server, &session, proxy.next_request().await);
    assert!(server.container().is_empty());
}
