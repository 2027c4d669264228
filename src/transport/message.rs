//! JSON wire messages, tagged by `"type"`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::{
    Arguments, ArgumentsKeywords, CallResult, EventDetails, EventPayload, PublicationId,
    PublishOptions, RequestId, RequestKind, SessionId, SubscribeOptions, SubscriptionId,
};
use crate::utils::{Result, WampError};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello {},
    Goodbye {},
    Heartbeat {},
    Subscribe {
        request_id: RequestId,
        topic: String,
        #[serde(default)]
        options: SubscribeOptions,
    },
    Unsubscribe {
        request_id: RequestId,
        subscription_id: SubscriptionId,
    },
    Publish {
        request_id: RequestId,
        topic: String,
        #[serde(default)]
        options: PublishOptions,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<Arguments<Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments_keywords: Option<ArgumentsKeywords<Value>>,
    },
    Call {
        request_id: RequestId,
        procedure: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<Arguments<Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments_keywords: Option<ArgumentsKeywords<Value>>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        session_id: SessionId,
    },
    Goodbye {
        reason: String,
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
    Event {
        subscription_id: SubscriptionId,
        publication_id: PublicationId,
        #[serde(default)]
        details: EventDetails,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<Arguments<Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments_keywords: Option<ArgumentsKeywords<Value>>,
    },
    Result {
        request_id: RequestId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<Arguments<Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments_keywords: Option<ArgumentsKeywords<Value>>,
    },
    Error {
        request: RequestKind,
        request_id: RequestId,
        error: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn goodbye(reason: impl Into<String>) -> Self {
        ServerMessage::Goodbye {
            reason: reason.into(),
        }
    }

    pub fn event(
        subscription_id: SubscriptionId,
        publication_id: PublicationId,
        payload: EventPayload<Value>,
    ) -> Self {
        let (details, arguments, arguments_keywords) = payload.into_parts();
        ServerMessage::Event {
            subscription_id,
            publication_id,
            details,
            arguments,
            arguments_keywords,
        }
    }

    pub fn result(request_id: RequestId, result: CallResult<Value>) -> Self {
        ServerMessage::Result {
            request_id,
            arguments: result.arguments,
            arguments_keywords: result.arguments_keywords,
        }
    }

    pub fn error(request: RequestKind, request_id: RequestId, error: &WampError) -> Self {
        ServerMessage::Error {
            request,
            request_id,
            error: error.uri().to_string(),
            message: error.to_string(),
        }
    }
}

/// Serializes a wire message into a text frame.
pub fn encode<T: Serialize>(message: &T) -> Result<WsMessage> {
    serde_json::to_string(message)
        .map(|json| WsMessage::Text(json.into()))
        .map_err(|e| WampError::Transport(e.to_string()))
}
