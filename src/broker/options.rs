//! Subscribe and publish options
//!
//! Both option bundles deserialize from the WAMP `Options|dict` shape, so a
//! transport can hand the decoded dictionary straight to the broker. Unknown
//! keys are ignored.

use serde::{Deserialize, Serialize};

use crate::broker::id::SessionId;

/// How a subscription's topic is compared against published topics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    #[default]
    Exact,
    Prefix,
    Wildcard,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribeOptions {
    #[serde(rename = "match")]
    pub match_policy: MatchPolicy,
}

impl SubscribeOptions {
    pub fn exact() -> Self {
        Self::with_policy(MatchPolicy::Exact)
    }

    pub fn prefix() -> Self {
        Self::with_policy(MatchPolicy::Prefix)
    }

    pub fn wildcard() -> Self {
        Self::with_policy(MatchPolicy::Wildcard)
    }

    pub fn with_policy(match_policy: MatchPolicy) -> Self {
        Self { match_policy }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishOptions {
    /// Ask the broker for a `published` acknowledgement.
    pub acknowledge: bool,
    /// Skip the publisher's own session even if it is subscribed.
    pub exclude_me: bool,
    /// Disclose the publisher's session ID in the event details.
    pub disclose_me: bool,
    /// Sessions that must not receive the event.
    pub exclude: Vec<SessionId>,
    /// When set, only these sessions may receive the event.
    pub eligible: Option<Vec<SessionId>>,
    /// Filled in by the server from the publishing session; never read from
    /// the wire.
    #[serde(skip)]
    pub publisher: Option<SessionId>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            acknowledge: false,
            exclude_me: true,
            disclose_me: false,
            exclude: Vec::new(),
            eligible: None,
            publisher: None,
        }
    }
}

impl PublishOptions {
    pub fn acknowledged() -> Self {
        Self {
            acknowledge: true,
            ..Self::default()
        }
    }

    /// Whether `session` may receive an event published with these options.
    pub fn admits(&self, session: SessionId) -> bool {
        if self.exclude_me && self.publisher == Some(session) {
            return false;
        }
        if self.exclude.contains(&session) {
            return false;
        }
        match &self.eligible {
            Some(eligible) => eligible.contains(&session),
            None => true,
        }
    }
}
