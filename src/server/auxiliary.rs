//! Auxiliary server: session lifecycle.
//!
//! Tracks open sessions (hello / heartbeat / goodbye) and, when a session
//! leaves, drops all of its subscriptions from the broker.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::broker::{IdAllocator, SequentialIdAllocator, SessionId, TopicContainer, WampMessage};
use crate::utils::{Result, WampError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub opened_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

pub struct AuxiliaryServer<M> {
    container: Arc<TopicContainer<M>>,
    sessions: DashMap<SessionId, SessionInfo>,
    session_ids: SequentialIdAllocator,
    max_sessions: usize,
    admission: Mutex<()>,
}

impl<M: WampMessage> AuxiliaryServer<M> {
    pub fn new(container: Arc<TopicContainer<M>>, max_sessions: usize) -> Self {
        Self {
            container,
            sessions: DashMap::new(),
            session_ids: SequentialIdAllocator::new(),
            max_sessions,
            admission: Mutex::new(()),
        }
    }

    pub fn next_session_id(&self) -> SessionId {
        self.session_ids.next_id()
    }

    /// Open a session. Fails once `max_sessions` sessions are open.
    pub fn hello(&self, session_id: SessionId) -> Result<SessionInfo> {
        let _admission = self.admission.lock();
        if self.sessions.len() >= self.max_sessions {
            return Err(WampError::SessionLimitReached(self.max_sessions));
        }

        let now = Utc::now();
        let info = SessionInfo {
            session_id,
            opened_at: now,
            last_heartbeat: now,
        };
        self.sessions.insert(session_id, info.clone());
        info!("Session {session_id} opened");
        Ok(info)
    }

    pub fn heartbeat(&self, session_id: SessionId) -> Result<DateTime<Utc>> {
        let mut session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(WampError::NoSuchSession(session_id))?;
        session.last_heartbeat = Utc::now();
        debug!("Heartbeat from session {session_id}");
        Ok(session.last_heartbeat)
    }

    /// Close a session and drop its subscriptions. Returns how many
    /// subscriptions it held.
    pub fn goodbye(&self, session_id: SessionId) -> Result<usize> {
        self.sessions
            .remove(&session_id)
            .ok_or(WampError::NoSuchSession(session_id))?;
        let removed = self.container.remove_session(session_id);
        info!("Session {session_id} closed, {removed} subscription(s) dropped");
        Ok(removed)
    }

    /// Drop whatever a vanished connection left behind. Unlike `goodbye`
    /// this also covers sessions that never completed `hello`.
    pub fn disconnect(&self, session_id: SessionId) -> usize {
        if self.sessions.remove(&session_id).is_some() {
            info!("Session {session_id} disconnected");
        }
        self.container.remove_session(session_id)
    }

    pub fn is_open(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id)
    }

    pub fn session(&self, session_id: SessionId) -> Option<SessionInfo> {
        self.sessions.get(&session_id).map(|e| e.value().clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
