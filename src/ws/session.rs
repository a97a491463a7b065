//! Terminal session store.
//!
//! Per-connection pseudo-shell state with a capped command history. A
//! session is created alongside its connection record and marked inactive
//! when the connection closes; inactive sessions are retained for a bounded
//! window and then removed by the retention sweep, so connect/disconnect
//! churn cannot grow the map without bound.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::cache::lock::{rw_read, rw_write};

const SOURCE: &str = "ws::session";

/// Maximum retained (command, output) pairs per session; oldest evicted
/// first.
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalEntry {
    pub command: String,
    pub output: String,
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct TerminalSession {
    pub id: Uuid,
    pub cloudpc_id: Uuid,
    pub user_id: Uuid,
    pub active: bool,
    pub started_at: OffsetDateTime,
    pub last_activity: OffsetDateTime,
    history: VecDeque<TerminalEntry>,
}

impl TerminalSession {
    fn new(user_id: Uuid, cloudpc_id: Uuid) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            cloudpc_id,
            user_id,
            active: true,
            started_at: now,
            last_activity: now,
            history: VecDeque::new(),
        }
    }

    fn record(&mut self, command: String, output: String) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        let now = OffsetDateTime::now_utc();
        self.history.push_back(TerminalEntry {
            command,
            output,
            timestamp: now,
        });
        self.last_activity = now;
    }

    pub fn history(&self) -> impl Iterator<Item = &TerminalEntry> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Outcome of recording a command against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded { session_id: Uuid },
    UnknownSession,
    InactiveSession,
}

/// Owns every terminal session in the process.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, TerminalSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an active session and return its id.
    pub fn create(&self, user_id: Uuid, cloudpc_id: Uuid) -> Uuid {
        let session = TerminalSession::new(user_id, cloudpc_id);
        let id = session.id;
        rw_write(&self.sessions, SOURCE, "create").insert(id, session);
        id
    }

    /// Append a (command, output) pair to the session history.
    pub fn record_command(&self, session_id: Uuid, command: &str, output: &str) -> RecordOutcome {
        let mut sessions = rw_write(&self.sessions, SOURCE, "record_command");
        match sessions.get_mut(&session_id) {
            Some(session) if session.active => {
                session.record(command.to_string(), output.to_string());
                RecordOutcome::Recorded { session_id }
            }
            Some(_) => RecordOutcome::InactiveSession,
            None => RecordOutcome::UnknownSession,
        }
    }

    /// Mark a session inactive. The record is retained until the retention
    /// sweep prunes it.
    pub fn deactivate(&self, session_id: Uuid) {
        if let Some(session) =
            rw_write(&self.sessions, SOURCE, "deactivate").get_mut(&session_id)
        {
            session.active = false;
            session.last_activity = OffsetDateTime::now_utc();
        }
    }

    /// Remove inactive sessions whose last activity is older than the
    /// retention window. Active sessions are never touched. Returns the
    /// number of sessions pruned.
    pub fn prune_inactive(&self, retention: Duration) -> usize {
        let cutoff = OffsetDateTime::now_utc() - retention;
        let mut sessions = rw_write(&self.sessions, SOURCE, "prune_inactive");
        let before = sessions.len();
        sessions.retain(|_, session| session.active || session.last_activity > cutoff);
        before - sessions.len()
    }

    pub fn get(&self, session_id: Uuid) -> Option<TerminalSession> {
        rw_read(&self.sessions, SOURCE, "get")
            .get(&session_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.sessions, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn age_session(&self, session_id: Uuid, last_activity: OffsetDateTime) {
        if let Some(session) =
            rw_write(&self.sessions, SOURCE, "age_session").get_mut(&session_id)
        {
            session.last_activity = last_activity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_record() {
        let store = SessionStore::new();
        let session_id = store.create(Uuid::new_v4(), Uuid::new_v4());

        let outcome = store.record_command(session_id, "pwd", "/home/user");
        assert_eq!(outcome, RecordOutcome::Recorded { session_id });

        let session = store.get(session_id).unwrap();
        assert_eq!(session.history_len(), 1);
        assert_eq!(session.history().next().unwrap().command, "pwd");
    }

    #[test]
    fn history_caps_at_limit_fifo() {
        let store = SessionStore::new();
        let session_id = store.create(Uuid::new_v4(), Uuid::new_v4());

        for i in 0..105 {
            store.record_command(session_id, &format!("cmd-{i}"), "out");
        }

        let session = store.get(session_id).unwrap();
        assert_eq!(session.history_len(), HISTORY_LIMIT);
        // The oldest five entries were evicted in order.
        assert_eq!(session.history().next().unwrap().command, "cmd-5");
        assert_eq!(session.history().last().unwrap().command, "cmd-104");
    }

    #[test]
    fn unknown_and_inactive_sessions_do_not_record() {
        let store = SessionStore::new();
        assert_eq!(
            store.record_command(Uuid::new_v4(), "ls", ""),
            RecordOutcome::UnknownSession
        );

        let session_id = store.create(Uuid::new_v4(), Uuid::new_v4());
        store.deactivate(session_id);
        assert_eq!(
            store.record_command(session_id, "ls", ""),
            RecordOutcome::InactiveSession
        );
        assert_eq!(store.get(session_id).unwrap().history_len(), 0);
    }

    #[test]
    fn retention_sweep_prunes_only_stale_inactive_sessions() {
        let store = SessionStore::new();
        let stale = store.create(Uuid::new_v4(), Uuid::new_v4());
        let fresh = store.create(Uuid::new_v4(), Uuid::new_v4());
        let active = store.create(Uuid::new_v4(), Uuid::new_v4());

        store.deactivate(stale);
        store.deactivate(fresh);
        store.age_session(stale, OffsetDateTime::now_utc() - Duration::from_secs(7200));
        // `active` is aged even further but stays because it is still active.
        store.age_session(active, OffsetDateTime::now_utc() - Duration::from_secs(86_400));

        let pruned = store.prune_inactive(Duration::from_secs(1800));
        assert_eq!(pruned, 1);
        assert!(store.get(stale).is_none());
        assert!(store.get(fresh).is_some());
        assert!(store.get(active).is_some());
    }
}
