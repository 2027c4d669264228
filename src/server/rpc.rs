//! RPC server
//!
//! A plain procedure registry: URI to handler, no dedup, no lifecycle beyond
//! register/unregister. Calls are answered synchronously through the
//! caller's session.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use crate::broker::{
    Arguments, ArgumentsKeywords, CallResult, MatchPolicy, RequestId, RequestKind, SessionId,
    SharedSession, WampMessage, validate_uri,
};
use crate::server::pubsub::reply_error;
use crate::utils::{Result, WampError};

pub trait Procedure<M>: Send + Sync {
    fn invoke(
        &self,
        caller: SessionId,
        arguments: Arguments<M>,
        arguments_keywords: ArgumentsKeywords<M>,
    ) -> Result<CallResult<M>>;
}

impl<M, F> Procedure<M> for F
where
    F: Fn(SessionId, Arguments<M>, ArgumentsKeywords<M>) -> Result<CallResult<M>> + Send + Sync,
{
    fn invoke(
        &self,
        caller: SessionId,
        arguments: Arguments<M>,
        arguments_keywords: ArgumentsKeywords<M>,
    ) -> Result<CallResult<M>> {
        self(caller, arguments, arguments_keywords)
    }
}

pub struct RpcServer<M> {
    procedures: DashMap<String, Arc<dyn Procedure<M>>>,
}

impl<M: WampMessage> Default for RpcServer<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: WampMessage> RpcServer<M> {
    pub fn new() -> Self {
        Self {
            procedures: DashMap::new(),
        }
    }

    pub fn register(&self, uri: &str, procedure: impl Procedure<M> + 'static) -> Result<()> {
        validate_uri(uri, MatchPolicy::Exact)?;
        match self.procedures.entry(uri.to_string()) {
            Entry::Occupied(_) => Err(WampError::ProcedureAlreadyExists(uri.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(procedure));
                debug!("Registered procedure {uri}");
                Ok(())
            }
        }
    }

    pub fn unregister(&self, uri: &str) -> Result<()> {
        self.procedures
            .remove(uri)
            .map(|_| debug!("Unregistered procedure {uri}"))
            .ok_or_else(|| WampError::NoSuchProcedure(uri.to_string()))
    }

    /// Registered procedure URIs, sorted.
    pub fn procedures(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.procedures.iter().map(|e| e.key().clone()).collect();
        uris.sort();
        uris
    }

    /// Invoke `procedure` and answer `session` with its result or error.
    pub fn call(
        &self,
        session: SharedSession<M>,
        request_id: RequestId,
        procedure: &str,
        arguments: Option<Arguments<M>>,
        arguments_keywords: Option<ArgumentsKeywords<M>>,
    ) {
        // cloned out so a handler may (un)register procedures itself
        let handler = self.procedures.get(procedure).map(|e| e.value().clone());

        let outcome = match handler {
            Some(handler) => handler.invoke(
                session.session_id(),
                arguments.unwrap_or_default(),
                arguments_keywords.unwrap_or_default(),
            ),
            None => Err(WampError::NoSuchProcedure(procedure.to_string())),
        };

        match outcome {
            Ok(result) => {
                if let Err(e) = session.result(request_id, result) {
                    warn!(
                        "Failed to deliver result of {procedure} to session {}: {e}",
                        session.session_id()
                    );
                }
            }
            Err(error) => reply_error(&session, RequestKind::Call, request_id, &error),
        }
    }
}
