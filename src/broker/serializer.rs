//! Event shaping
//!
//! The serializer turns one publication into the payload a particular
//! subscriber receives. It is a pure function of its inputs and is injected
//! into the container, so a transport can swap in its own arity rules.

use crate::broker::message::{Arguments, ArgumentsKeywords, EventDetails, EventPayload};

pub trait EventSerializer<M>: Send + Sync {
    fn shape(
        &self,
        details: EventDetails,
        arguments: Option<&Arguments<M>>,
        arguments_keywords: Option<&ArgumentsKeywords<M>>,
    ) -> EventPayload<M>;
}

/// Standard WAMP arity: keyword arguments force a (possibly empty)
/// positional list, positional arguments alone give the short form, and no
/// arguments give a details-only event.
#[derive(Debug, Default, Clone, Copy)]
pub struct WampEventSerializer;

impl<M: Clone> EventSerializer<M> for WampEventSerializer {
    fn shape(
        &self,
        details: EventDetails,
        arguments: Option<&Arguments<M>>,
        arguments_keywords: Option<&ArgumentsKeywords<M>>,
    ) -> EventPayload<M> {
        match (arguments, arguments_keywords) {
            (arguments, Some(keywords)) if !keywords.is_empty() => EventPayload::ArgumentsKeywords {
                details,
                arguments: arguments.cloned().unwrap_or_default(),
                arguments_keywords: keywords.clone(),
            },
            (Some(arguments), _) => EventPayload::Arguments {
                details,
                arguments: arguments.clone(),
            },
            (None, _) => EventPayload::Details { details },
        }
    }
}
