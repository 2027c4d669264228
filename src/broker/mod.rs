//! The broker core: subscription registrations, their dedup by subscription
//! key, and fan-out of publications.
//!
//! `TopicContainer` is the entry point. It is generic over the opaque
//! message type `M` and talks to sessions only through `SessionHandle`.

pub mod engine;
pub mod id;
pub mod matcher;
pub mod message;
pub mod options;
pub mod serializer;
pub mod session;
pub mod topic;

pub use engine::TopicContainer;
pub use id::{IdAllocator, PublicationId, RequestId, SequentialIdAllocator, SessionId, SubscriptionId};
pub use matcher::{SubscriptionKey, TopicMatcher, WampTopicMatcher, validate_uri};
pub use message::{Arguments, ArgumentsKeywords, CallResult, EventDetails, EventPayload, WampMessage};
pub use options::{MatchPolicy, PublishOptions, SubscribeOptions};
pub use serializer::{EventSerializer, WampEventSerializer};
pub use session::{RequestKind, SessionHandle, SharedSession, SubscribeRequest, UnsubscribeRequest};
pub use topic::{Removal, TopicRegistration};
