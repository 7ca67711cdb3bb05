//! Miner sessions.
//!
//! A [`Session`] is owned by its connection task and moves through
//! `Unauthenticated -> Authenticated`; dropping the connection ends it. The
//! [`SessionRegistry`] is the shared, read-mostly view of all live sessions
//! used by the status API.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::api_client::types::SessionSummary;
use crate::block::Block;
use crate::protocol::HeightInfo;
use crate::types::Difficulty;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocate the next id from the global counter.
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job fields derived from one template version for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionJob {
    pub template_version: u64,
    /// Template block with this session's stamp in the reserved region.
    pub block: Block,
    pub height: u64,
    pub block_difficulty: Difficulty,
    pub share_difficulty: Difficulty,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub id: SessionId,
    pub login: String,
    pub agent: String,
    pub last_assigned: HeightInfo,
    pub job: Option<SessionJob>,
}

#[derive(Debug, Clone, Default)]
enum SessionState {
    #[default]
    Unauthenticated,
    Authenticated(AuthenticatedSession),
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    peer: Option<SocketAddr>,
    /// Assigned on first successful login and kept across re-logins.
    id: Option<SessionId>,
    state: SessionState,
}

impl Session {
    pub fn new(peer: Option<SocketAddr>) -> Self {
        Self {
            peer,
            id: None,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    pub fn authenticated(&self) -> Option<&AuthenticatedSession> {
        match &self.state {
            SessionState::Authenticated(auth) => Some(auth),
            SessionState::Unauthenticated => None,
        }
    }

    pub fn authenticated_mut(&mut self) -> Option<&mut AuthenticatedSession> {
        match &mut self.state {
            SessionState::Authenticated(auth) => Some(auth),
            SessionState::Unauthenticated => None,
        }
    }

    /// Cached job, if one has been assigned.
    pub fn job(&self) -> Option<&SessionJob> {
        self.authenticated().and_then(|auth| auth.job.as_ref())
    }

    /// Move to `Authenticated`, discarding any previous sync state.
    pub fn authenticate(&mut self, login: &str, agent: &str) -> SessionId {
        let id = *self.id.get_or_insert_with(SessionId::next);
        self.state = SessionState::Authenticated(AuthenticatedSession {
            id,
            login: login.to_string(),
            agent: agent.to_string(),
            last_assigned: HeightInfo::default(),
            job: None,
        });
        id
    }

    /// Drop back to `Unauthenticated` after a failed login.
    pub fn reset(&mut self) {
        self.state = SessionState::Unauthenticated;
    }
}

/// Shared index of authenticated sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionSummary>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a (re-)login. Counters survive a re-login of the same session.
    pub fn register(&self, session: &Session) {
        let (Some(auth), Some(id)) = (session.authenticated(), session.id()) else {
            return;
        };
        let mut sessions = self.sessions.lock();
        let entry = sessions.entry(id).or_insert_with(|| SessionSummary {
            id: id.get(),
            peer: session.peer().map(|p| p.to_string()),
            ..Default::default()
        });
        entry.login = auth.login.clone();
        entry.agent = auth.agent.clone();
        entry.last_height = auth.last_assigned.height;
    }

    pub fn remove(&self, id: SessionId) {
        self.sessions.lock().remove(&id);
    }

    pub fn record_height(&self, id: SessionId, height: u64) {
        if let Some(entry) = self.sessions.lock().get_mut(&id) {
            entry.last_height = height;
        }
    }

    pub fn record_share(&self, id: SessionId, accepted: bool) {
        if let Some(entry) = self.sessions.lock().get_mut(&id) {
            if accepted {
                entry.accepted_shares += 1;
            } else {
                entry.rejected_shares += 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All sessions ordered by id.
    pub fn sessions(&self) -> Vec<SessionSummary> {
        let mut list: Vec<_> = self.sessions.lock().values().cloned().collect();
        list.sort_by_key(|s| s.id);
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..500).map(|_| SessionId::next()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(id.get() >= 1);
                assert!(seen.insert(id), "duplicate session id {id}");
            }
        }
    }

    #[test]
    fn test_state_machine() {
        let mut session = Session::new(None);
        assert!(!session.is_authenticated());
        assert!(session.id().is_none());

        let id = session.authenticate("alice", "probe/1.0");
        assert!(session.is_authenticated());
        assert_eq!(session.authenticated().unwrap().login, "alice");

        session.reset();
        assert!(!session.is_authenticated());
        assert!(session.job().is_none());

        // Re-login keeps the id
        assert_eq!(session.authenticate("bob", ""), id);
    }

    #[test]
    fn test_registry_tracks_counters() {
        let registry = Arc::new(SessionRegistry::new());
        let mut session = Session::new(Some("10.0.0.7:50000".parse().unwrap()));
        let id = session.authenticate("alice", "probe");
        registry.register(&session);

        registry.record_share(id, true);
        registry.record_share(id, true);
        registry.record_share(id, false);
        registry.record_height(id, 42);

        let list = registry.sessions();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].login, "alice");
        assert_eq!(list[0].peer.as_deref(), Some("10.0.0.7:50000"));
        assert_eq!(list[0].accepted_shares, 2);
        assert_eq!(list[0].rejected_shares, 1);
        assert_eq!(list[0].last_height, 42);

        registry.remove(id);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unauthenticated_sessions_are_not_registered() {
        let registry = SessionRegistry::new();
        registry.register(&Session::new(None));
        assert!(registry.is_empty());
    }
}
