//! Subscription keys and topic matching
//!
//! A [`SubscriptionKey`] is the dedup key of the broker: two subscribe
//! requests whose topic and normalized options produce equal keys share one
//! registration. The [`TopicMatcher`] decides both how options normalize into
//! a key and which keys a published topic reaches.

use std::fmt;
use std::sync::Arc;

use crate::broker::options::{MatchPolicy, SubscribeOptions};
use crate::utils::{Result, WampError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    topic: Arc<str>,
    policy: MatchPolicy,
}

impl SubscriptionKey {
    pub fn new(topic: &str, policy: MatchPolicy) -> Self {
        Self {
            topic: Arc::from(topic),
            policy,
        }
    }

    pub fn exact(topic: &str) -> Self {
        Self::new(topic, MatchPolicy::Exact)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn is_pattern(&self) -> bool {
        self.policy != MatchPolicy::Exact
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{:?}]", self.topic, self.policy)
    }
}

pub trait TopicMatcher: Send + Sync {
    /// Normalizes `options` and derives the dedup key, rejecting topics the
    /// policy cannot use.
    fn subscription_key(&self, topic: &str, options: &SubscribeOptions) -> Result<SubscriptionKey>;

    /// Whether a publication to `topic` reaches subscriptions under `key`.
    fn matches(&self, key: &SubscriptionKey, topic: &str) -> bool;
}

/// WAMP matching: exact string equality, string prefix, and wildcard
/// patterns where an empty URI component matches any single component.
#[derive(Debug, Default, Clone, Copy)]
pub struct WampTopicMatcher;

/// Checks `uri` against the WAMP loose URI rules for `policy`: dot-separated
/// components without whitespace or `#`. Exact URIs need every component,
/// a prefix may end in an empty one, and wildcards may leave any empty.
pub fn validate_uri(uri: &str, policy: MatchPolicy) -> Result<()> {
    let invalid = || WampError::InvalidUri(uri.to_string());

    if uri.is_empty() || uri.chars().any(|c| c.is_whitespace() || c == '#') {
        return Err(invalid());
    }

    let components: Vec<&str> = uri.split('.').collect();
    let last = components.len() - 1;
    let ok = match policy {
        MatchPolicy::Exact => components.iter().all(|c| !c.is_empty()),
        // "com.example." is a usable prefix
        MatchPolicy::Prefix => components
            .iter()
            .enumerate()
            .all(|(i, c)| !c.is_empty() || (i == last && i > 0)),
        MatchPolicy::Wildcard => components.len() > 1 || !components[0].is_empty(),
    };

    if ok { Ok(()) } else { Err(invalid()) }
}

impl TopicMatcher for WampTopicMatcher {
    fn subscription_key(&self, topic: &str, options: &SubscribeOptions) -> Result<SubscriptionKey> {
        validate_uri(topic, options.match_policy)?;
        Ok(SubscriptionKey::new(topic, options.match_policy))
    }

    fn matches(&self, key: &SubscriptionKey, topic: &str) -> bool {
        match key.policy {
            MatchPolicy::Exact => key.topic() == topic,
            MatchPolicy::Prefix => topic.starts_with(key.topic()),
            MatchPolicy::Wildcard => {
                let mut pattern = key.topic().split('.');
                let mut candidate = topic.split('.');
                loop {
                    match (pattern.next(), candidate.next()) {
                        (None, None) => return true,
                        (Some(p), Some(c)) if p.is_empty() || p == c => continue,
                        _ => return false,
                    }
                }
            }
        }
    }
}
