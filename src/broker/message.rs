//! Message shapes
//!
//! The broker never looks inside application payloads. Positional and
//! keyword arguments are collections of an opaque message type `M`, chosen
//! by the transport (for the WebSocket transport it is `serde_json::Value`).
//!
//! An [`EventPayload`] is what a single subscriber receives for one
//! publication; its variant mirrors the three WAMP `EVENT` arities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::broker::id::SessionId;

/// Anything the broker can route. Blanket-implemented.
pub trait WampMessage: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> WampMessage for T {}

pub type Arguments<M> = Vec<M>;
pub type ArgumentsKeywords<M> = BTreeMap<String, M>;

/// Per-subscriber `EVENT.Details|dict`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    /// The concrete topic, disclosed to prefix and wildcard subscribers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// The publishing session, disclosed when the publisher asked for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<SessionId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload<M> {
    Details {
        details: EventDetails,
    },
    Arguments {
        details: EventDetails,
        arguments: Arguments<M>,
    },
    ArgumentsKeywords {
        details: EventDetails,
        arguments: Arguments<M>,
        arguments_keywords: ArgumentsKeywords<M>,
    },
}

impl<M> EventPayload<M> {
    pub fn details(&self) -> &EventDetails {
        match self {
            EventPayload::Details { details }
            | EventPayload::Arguments { details, .. }
            | EventPayload::ArgumentsKeywords { details, .. } => details,
        }
    }

    pub fn arguments(&self) -> Option<&[M]> {
        match self {
            EventPayload::Details { .. } => None,
            EventPayload::Arguments { arguments, .. }
            | EventPayload::ArgumentsKeywords { arguments, .. } => Some(arguments),
        }
    }

    pub fn arguments_keywords(&self) -> Option<&ArgumentsKeywords<M>> {
        match self {
            EventPayload::ArgumentsKeywords {
                arguments_keywords, ..
            } => Some(arguments_keywords),
            _ => None,
        }
    }

    /// Rebuilds a payload from its wire parts.
    pub fn from_parts(
        details: EventDetails,
        arguments: Option<Arguments<M>>,
        arguments_keywords: Option<ArgumentsKeywords<M>>,
    ) -> Self {
        match (arguments, arguments_keywords) {
            (arguments, Some(arguments_keywords)) => EventPayload::ArgumentsKeywords {
                details,
                arguments: arguments.unwrap_or_default(),
                arguments_keywords,
            },
            (Some(arguments), None) => EventPayload::Arguments { details, arguments },
            (None, None) => EventPayload::Details { details },
        }
    }

    /// Splits the payload into its wire parts.
    pub fn into_parts(
        self,
    ) -> (
        EventDetails,
        Option<Arguments<M>>,
        Option<ArgumentsKeywords<M>>,
    ) {
        match self {
            EventPayload::Details { details } => (details, None, None),
            EventPayload::Arguments { details, arguments } => (details, Some(arguments), None),
            EventPayload::ArgumentsKeywords {
                details,
                arguments,
                arguments_keywords,
            } => (details, Some(arguments), Some(arguments_keywords)),
        }
    }
}

/// The reply to an RPC call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult<M> {
    pub arguments: Option<Arguments<M>>,
    pub arguments_keywords: Option<ArgumentsKeywords<M>>,
}

impl<M> CallResult<M> {
    pub fn empty() -> Self {
        Self {
            arguments: None,
            arguments_keywords: None,
        }
    }

    pub fn arguments(arguments: Arguments<M>) -> Self {
        Self {
            arguments: Some(arguments),
            arguments_keywords: None,
        }
    }
}
