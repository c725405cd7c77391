use std::{
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use taskctl_model::{Action, SessionId};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::{
    channel::ControlChannel,
    error::JobError,
    proc::{self, ProcessHandle, Termination},
    progress::ProgressReporter,
};

#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// How often the channel is consulted while waiting.
    pub poll_interval: Duration,
    /// Time a child gets to exit after the polite request.
    pub kill_grace: Duration,
    /// Time to wait for a child to disappear after the forced kill.
    pub kill_wait: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            kill_grace: Duration::from_secs(3),
            kill_wait: Duration::from_secs(2),
        }
    }
}

impl GuardConfig {
    pub fn with_poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    pub fn with_kill_grace(mut self, d: Duration) -> Self {
        self.kill_grace = d;
        self
    }

    pub fn with_kill_wait(mut self, d: Duration) -> Self {
        self.kill_wait = d;
        self
    }
}

/// Per-invocation pause/stop state of a controlled job.
///
/// Every wait inside a job body should go through [`TaskGuard::sleep`] (or
/// [`TaskGuard::checkpoint`]) so that directives written to the channel take effect
/// within one poll interval. Stop is sticky; pause follows the channel's latest directive.
pub struct TaskGuard {
    session_id: SessionId,
    channel: Option<ControlChannel>,
    cfg: GuardConfig,
    paused: AtomicBool,
    stopped: AtomicBool,
    children: Mutex<Vec<ProcessHandle>>,
    progress: ProgressReporter,
}

impl TaskGuard {
    pub fn new(channel: Option<ControlChannel>) -> Self {
        Self::with_config(channel, GuardConfig::default())
    }

    pub fn with_config(channel: Option<ControlChannel>, cfg: GuardConfig) -> Self {
        let session_id: SessionId = Uuid::new_v4().simple().to_string()[..8].to_string();
        let progress = ProgressReporter::new(channel.clone());
        debug!(
            target: "taskctl.core.guard",
            session = %session_id,
            channel = ?channel.as_ref().map(|c| c.path().display().to_string()),
            "guard created"
        );
        Self {
            session_id,
            channel,
            cfg,
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            children: Mutex::new(Vec::new()),
            progress,
        }
    }

    /// Guard bound to the slot named by `PROCESS_CONTROL_FILE`, uncontrolled if unset.
    pub fn from_env() -> Self {
        Self::new(ControlChannel::from_env())
    }

    /// Guard without a channel: only [`TaskGuard::stop`] can interrupt it.
    pub fn uncontrolled() -> Self {
        Self::new(None)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn channel(&self) -> Option<&ControlChannel> {
        self.channel.as_ref()
    }

    pub fn config(&self) -> &GuardConfig {
        &self.cfg
    }

    /// Status writer sharing this guard's channel.
    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn is_stopped(&self) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return true;
        }
        self.reconcile();
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.reconcile();
        self.paused.load(Ordering::SeqCst)
    }

    fn reconcile(&self) {
        let Some(state) = self.channel.as_ref().and_then(ControlChannel::read) else {
            return;
        };
        match state.action {
            Action::Stop => {
                self.paused.store(false, Ordering::SeqCst);
                if !self.stopped.swap(true, Ordering::SeqCst) {
                    info!(target: "taskctl.core.guard", session = %self.session_id, "stop observed");
                }
            }
            Action::Pause => {
                if !self.stopped.load(Ordering::SeqCst) && !self.paused.swap(true, Ordering::SeqCst) {
                    info!(target: "taskctl.core.guard", session = %self.session_id, "paused");
                }
            }
            Action::Run | Action::Resume => {
                if self.paused.swap(false, Ordering::SeqCst) {
                    info!(target: "taskctl.core.guard", session = %self.session_id, "resumed");
                }
            }
            Action::Completed | Action::Unknown => {}
        }
    }

    /// Interruptible wait.
    ///
    /// Time spent paused does not count toward `duration`. Returns `true` once the full
    /// duration elapsed while running, `false` as soon as a stop is observed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                trace!(target: "taskctl.core.guard", session = %self.session_id, "wait interrupted");
                return false;
            }
            if self.is_paused() {
                let paused_at = Instant::now();
                loop {
                    tokio::time::sleep(self.cfg.poll_interval).await;
                    if !self.is_paused() {
                        break;
                    }
                }
                deadline += paused_at.elapsed();
                continue;
            }

            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            tokio::time::sleep((deadline - now).min(self.cfg.poll_interval)).await;
        }
    }

    /// [`TaskGuard::sleep`] mapped to `Err(JobError::Interrupted)` on stop.
    pub async fn sleep_or_interrupt(&self, duration: Duration) -> Result<(), JobError> {
        if self.sleep(duration).await {
            Ok(())
        } else {
            Err(JobError::Interrupted)
        }
    }

    /// Block while paused; fail with `Interrupted` once stopped.
    pub async fn checkpoint(&self) -> Result<(), JobError> {
        self.sleep_or_interrupt(Duration::ZERO).await
    }

    /// Add a process to the supervised set. Returns `false` if it was already there.
    pub fn register_child(&self, handle: ProcessHandle) -> bool {
        let mut children = self.lock_children();
        if children.contains(&handle) {
            return false;
        }
        children.push(handle);
        debug!(target: "taskctl.core.guard", session = %self.session_id, %handle, "child registered");
        true
    }

    pub fn children(&self) -> Vec<ProcessHandle> {
        self.lock_children().clone()
    }

    /// Mark stopped, release any paused waiter and terminate all registered children.
    pub async fn stop(&self) {
        self.paused.store(false, Ordering::SeqCst);
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!(target: "taskctl.core.guard", session = %self.session_id, "stop requested");
        }
        self.terminate_children().await;
    }

    /// Terminate and forget every registered child, one after another.
    ///
    /// Each termination is independent: failures are logged and the rest proceed.
    pub async fn terminate_children(&self) -> Vec<(ProcessHandle, Termination)> {
        let children = std::mem::take(&mut *self.lock_children());
        let mut report = Vec::with_capacity(children.len());

        for handle in children {
            let res = proc::terminate(
                handle,
                self.cfg.kill_grace,
                self.cfg.kill_wait,
                self.cfg.poll_interval,
            )
            .await;
            match &res {
                Termination::AlreadyGone => {
                    debug!(target: "taskctl.core.guard", session = %self.session_id, %handle, "child already gone")
                }
                Termination::Graceful => {
                    info!(target: "taskctl.core.guard", session = %self.session_id, %handle, "child terminated")
                }
                Termination::Killed => {
                    warn!(target: "taskctl.core.guard", session = %self.session_id, %handle, "child force-killed")
                }
                Termination::Failed(reason) => {
                    warn!(target: "taskctl.core.guard", session = %self.session_id, %handle, %reason, "child termination failed")
                }
            }
            report.push((handle, res));
        }
        report
    }

    fn lock_children(&self) -> MutexGuard<'_, Vec<ProcessHandle>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TaskGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGuard")
            .field("session_id", &self.session_id)
            .field("channel", &self.channel)
            .field("paused", &self.paused.load(Ordering::SeqCst))
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use taskctl_model::ControlState;

    fn setup() -> (tempfile::TempDir, ControlChannel, Arc<TaskGuard>) {
        let dir = tempfile::tempdir().unwrap();
        let ch = ControlChannel::create(dir.path(), "guard", &ControlState::running()).unwrap();
        let guard = Arc::new(TaskGuard::new(Some(ch.clone())));
        (dir, ch, guard)
    }

    fn set(ch: &ControlChannel, action: Action) {
        ch.update(|s| s.set_action(action)).unwrap();
    }

    #[test]
    fn session_id_is_short() {
        let g = TaskGuard::uncontrolled();
        assert_eq!(g.session_id().len(), 8);
        assert!(!g.is_paused());
        assert!(!g.is_stopped());
    }

    #[test]
    fn stop_is_sticky() {
        let (_dir, ch, guard) = setup();

        set(&ch, Action::Stop);
        assert!(guard.is_stopped());

        for action in [Action::Run, Action::Resume, Action::Pause] {
            set(&ch, action);
            assert!(guard.is_stopped());
            assert!(!guard.is_paused());
        }
    }

    #[test]
    fn pause_follows_channel() {
        let (_dir, ch, guard) = setup();

        set(&ch, Action::Pause);
        assert!(guard.is_paused());
        set(&ch, Action::Resume);
        assert!(!guard.is_paused());
        set(&ch, Action::Pause);
        assert!(guard.is_paused());
        set(&ch, Action::Run);
        assert!(!guard.is_paused());
    }

    #[test]
    fn missing_slot_keeps_last_known_state() {
        let (_dir, ch, guard) = setup();

        set(&ch, Action::Pause);
        assert!(guard.is_paused());

        ch.delete().unwrap();
        assert!(guard.is_paused());
        assert!(!guard.is_stopped());

        std::fs::write(ch.path(), "not json").unwrap();
        assert!(guard.is_paused());
    }

    #[test]
    fn completed_directive_is_ignored() {
        let (_dir, ch, guard) = setup();
        set(&ch, Action::Pause);
        assert!(guard.is_paused());

        set(&ch, Action::Completed);
        assert!(guard.is_paused());
        assert!(!guard.is_stopped());
    }

    #[test]
    fn register_child_is_idempotent() {
        let guard = TaskGuard::uncontrolled();
        let h = ProcessHandle::from_pid(4242);

        assert!(guard.register_child(h));
        assert!(!guard.register_child(h));
        assert_eq!(guard.children(), vec![h]);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_when_running() {
        let guard = TaskGuard::uncontrolled();
        let start = Instant::now();

        assert!(guard.sleep(Duration::from_secs(10)).await);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_millis(10_100));
    }

    #[tokio::test(start_paused = true)]
    async fn paused_time_does_not_count() {
        let (_dir, ch, guard) = setup();
        let start = Instant::now();

        let g = guard.clone();
        let waiter = tokio::spawn(async move { g.sleep(Duration::from_secs(10)).await });

        tokio::time::sleep(Duration::from_secs(2)).await;
        set(&ch, Action::Pause);
        tokio::time::sleep(Duration::from_secs(5)).await;
        set(&ch, Action::Resume);

        assert!(waiter.await.unwrap());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(14_800), "returned early: {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(15_300), "returned late: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_paused_unblocks() {
        let (_dir, ch, guard) = setup();
        let start = Instant::now();

        let g = guard.clone();
        let waiter = tokio::spawn(async move { g.sleep(Duration::from_secs(10)).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        set(&ch, Action::Pause);
        tokio::time::sleep(Duration::from_secs(1)).await;
        set(&ch, Action::Stop);

        assert!(!waiter.await.unwrap());
        assert!(start.elapsed() < Duration::from_millis(2_500));
        assert!(guard.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn local_stop_releases_paused_waiter() {
        let (_dir, ch, guard) = setup();
        set(&ch, Action::Pause);

        let g = guard.clone();
        let waiter = tokio::spawn(async move { g.checkpoint().await });

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!waiter.is_finished());

        guard.stop().await;
        assert!(matches!(waiter.await.unwrap(), Err(JobError::Interrupted)));
    }

    #[tokio::test(start_paused = true)]
    async fn checkpoint_passes_when_running() {
        let guard = TaskGuard::uncontrolled();
        assert!(guard.checkpoint().await.is_ok());
        assert!(guard.sleep_or_interrupt(Duration::from_millis(250)).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminate_children_is_best_effort() {
        use std::{
            io::{BufRead, BufReader},
            process::{Command, Stdio},
        };

        let cfg = GuardConfig::default()
            .with_poll_interval(Duration::from_millis(20))
            .with_kill_grace(Duration::from_millis(300))
            .with_kill_wait(Duration::from_secs(2));
        let guard = TaskGuard::with_config(None, cfg);

        let mut gone = Command::new("true").spawn().unwrap();
        gone.wait().unwrap();
        let polite = Command::new("sleep").arg("30").spawn().unwrap();
        let mut stubborn = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; echo ready; exec sleep 30")
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let mut line = String::new();
        BufReader::new(stubborn.stdout.take().unwrap())
            .read_line(&mut line)
            .unwrap();

        guard.register_child((&gone).into());
        guard.register_child((&polite).into());
        guard.register_child((&stubborn).into());

        let report = guard.terminate_children().await;
        let outcomes: Vec<_> = report.into_iter().map(|(_, t)| t).collect();

        assert_eq!(
            outcomes,
            vec![Termination::AlreadyGone, Termination::Graceful, Termination::Killed]
        );
        assert!(guard.children().is_empty());
    }
}
