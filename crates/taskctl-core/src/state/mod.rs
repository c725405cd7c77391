use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use taskctl_model::{Outcome, RunStatus, SessionId, SessionInfo};

/// In-memory record of every job invocation started in this process.
#[derive(Clone, Default)]
pub struct SessionTable {
    inner: Arc<RwLock<HashMap<SessionId, SessionInfo>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly started invocation.
    pub fn start(&self, session_id: SessionId, job: &str) {
        let info = SessionInfo::started(session_id.clone(), job);
        self.write().insert(session_id, info);
    }

    /// Record the terminal outcome. Unknown sessions are ignored.
    pub fn finish(&self, session_id: &str, outcome: Outcome) {
        if let Some(info) = self.write().get_mut(session_id) {
            info.finish(outcome);
        }
    }

    pub fn get(&self, session_id: &str) -> Option<SessionInfo> {
        self.read().get(session_id).cloned()
    }

    /// All sessions, oldest first.
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut all: Vec<_> = self.read().values().cloned().collect();
        all.sort_by(|a, b| a.started_at.total_cmp(&b.started_at));
        all
    }

    pub fn list_by_status(&self, status: RunStatus) -> Vec<SessionInfo> {
        self.list()
            .into_iter()
            .filter(|info| info.status == status)
            .collect()
    }

    /// Number of sessions without a terminal outcome.
    pub fn active_count(&self) -> usize {
        self.read()
            .values()
            .filter(|info| info.outcome.is_none())
            .count()
    }

    /// Drop finished sessions, returning how many were removed.
    pub fn prune_finished(&self) -> usize {
        let mut inner = self.write();
        let before = inner.len();
        inner.retain(|_, info| info.outcome.is_none());
        before - inner.len()
    }

    /// Drop the oldest finished sessions until at most `keep` remain.
    ///
    /// Active sessions are never dropped. Returns how many were removed.
    pub fn retain_finished(&self, keep: usize) -> usize {
        let mut inner = self.write();
        let mut finished: Vec<(f64, SessionId)> = inner
            .values()
            .filter(|info| info.outcome.is_some())
            .map(|info| (info.finished_at.unwrap_or(info.started_at), info.session_id.clone()))
            .collect();
        if finished.len() <= keep {
            return 0;
        }
        finished.sort_by(|a, b| a.0.total_cmp(&b.0));
        let excess = finished.len() - keep;
        for (_, id) in finished.into_iter().take(excess) {
            inner.remove(&id);
        }
        excess
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, SessionInfo>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, SessionInfo>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTable")
            .field("sessions", &self.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_get() {
        let table = SessionTable::new();
        table.start("aaaa0001".into(), "collect");

        let info = table.get("aaaa0001").expect("session should exist");
        assert_eq!(info.job, "collect");
        assert_eq!(info.status, RunStatus::Running);
        assert!(info.outcome.is_none());
        assert_eq!(table.active_count(), 1);
    }

    #[test]
    fn finish_updates_status() {
        let table = SessionTable::new();
        table.start("s1".into(), "collect");
        table.start("s2".into(), "collect");
        table.start("s3".into(), "archive");

        table.finish("s1", Outcome::Cancelled);
        table.finish("s2", Outcome::failed("boom"));

        assert_eq!(table.get("s1").unwrap().status, RunStatus::Stopped);
        assert_eq!(
            table.get("s2").unwrap().outcome,
            Some(Outcome::failed("boom"))
        );
        assert_eq!(table.active_count(), 1);

        let running = table.list_by_status(RunStatus::Running);
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].session_id, "s3");
    }

    #[test]
    fn finish_unknown_is_ignored() {
        let table = SessionTable::new();
        table.finish("missing", Outcome::Completed);
        assert!(table.list().is_empty());
    }

    #[test]
    fn prune_keeps_active() {
        let table = SessionTable::new();
        table.start("s1".into(), "a");
        table.start("s2".into(), "b");
        table.finish("s1", Outcome::Completed);

        assert_eq!(table.prune_finished(), 1);
        assert_eq!(table.list().len(), 1);
        assert!(table.get("s2").is_some());
    }

    #[test]
    fn retain_finished_drops_oldest_first() {
        let table = SessionTable::new();
        for (id, at) in [("s1", 30.0), ("s2", 10.0), ("s3", 20.0)] {
            table.start(id.into(), "collect");
            table.finish(id, Outcome::Completed);
            table.write().get_mut(id).unwrap().finished_at = Some(at);
        }
        table.start("s4".into(), "collect");

        assert_eq!(table.retain_finished(1), 2);
        assert!(table.get("s1").is_some());
        assert!(table.get("s2").is_none());
        assert!(table.get("s3").is_none());
        assert!(table.get("s4").is_some());

        assert_eq!(table.retain_finished(0), 1);
        assert_eq!(table.list().len(), 1);
        assert_eq!(table.active_count(), 1);
    }

    #[test]
    fn retain_finished_under_limit_is_noop() {
        let table = SessionTable::new();
        table.start("s1".into(), "a");
        table.finish("s1", Outcome::Completed);
        assert_eq!(table.retain_finished(5), 0);
        assert!(table.get("s1").is_some());
    }

    #[test]
    fn clones_share_state() {
        let table = SessionTable::new();
        let other = table.clone();
        table.start("s1".into(), "a");
        assert!(other.get("s1").is_some());
    }
}
