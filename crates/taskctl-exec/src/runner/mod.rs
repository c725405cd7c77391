use std::{
    any::Any,
    collections::BTreeSet,
    future::Future,
    sync::Arc,
    time::Duration,
};

use serde::Serialize;
use taskctl_core::{JobError, ProcessHandle, SessionTable, TaskGuard};
use taskctl_model::{Outcome, SessionId};
use tokio::{
    runtime::Handle,
    task::{JoinError, JoinHandle},
    time::{MissedTickBehavior, interval, sleep, timeout},
};
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    error::RunnerError,
    outcome::classify,
    discover::{ChildDiscovery, NoDiscovery},
};

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Delay before the monitor looks for processes the job spawned.
    pub discovery_delay: Duration,
    /// How often the monitor checks the guard for a stop.
    pub monitor_interval: Duration,
    /// Time the worker gets to exit on its own after a stop is observed.
    pub stop_grace: Duration,
    /// Time the worker gets after its children were terminated, before it is aborted.
    pub abort_grace: Duration,
    /// Finished sessions kept in the session table; older ones are pruned on conclusion.
    pub finished_retention: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            discovery_delay: Duration::from_secs(1),
            monitor_interval: Duration::from_millis(100),
            stop_grace: Duration::from_secs(5),
            abort_grace: Duration::from_secs(3),
            finished_retention: 256,
        }
    }
}

impl RunnerConfig {
    pub fn with_discovery_delay(mut self, d: Duration) -> Self {
        self.discovery_delay = d;
        self
    }

    pub fn with_monitor_interval(mut self, d: Duration) -> Self {
        self.monitor_interval = d;
        self
    }

    pub fn with_stop_grace(mut self, d: Duration) -> Self {
        self.stop_grace = d;
        self
    }

    pub fn with_abort_grace(mut self, d: Duration) -> Self {
        self.abort_grace = d;
        self
    }

    pub fn with_finished_retention(mut self, n: usize) -> Self {
        self.finished_retention = n;
        self
    }
}

/// Acknowledgement returned by [`TaskRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Started {
    /// Always `"started"`.
    pub status: &'static str,
    pub session_id: SessionId,
}

/// Fire-and-forget executor for controlled jobs.
///
/// Each [`TaskRunner::run`] spawns a worker unit that only runs the job body, and a
/// monitor unit that enforces stop requests and concludes the session. Only the
/// worker is ever aborted; the monitor is tracked so that [`TaskRunner::shutdown`]
/// waits until every session has reached its terminal state.
pub struct TaskRunner {
    cfg: RunnerConfig,
    discovery: Arc<dyn ChildDiscovery>,
    sessions: SessionTable,
    tracker: TaskTracker,
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl TaskRunner {
    pub fn new(cfg: RunnerConfig) -> Self {
        Self {
            cfg,
            discovery: Arc::new(NoDiscovery),
            sessions: SessionTable::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn with_discovery(mut self, discovery: Arc<dyn ChildDiscovery>) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.cfg
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Number of invocations not yet concluded.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Start `job` in the background and return immediately.
    ///
    /// Refuses to start when the guard's channel already requests stop; in that
    /// case `job` is never invoked. Any error the job returns is classified and
    /// reported through the control slot, never to the caller.
    pub fn run<F, Fut>(
        &self,
        job_name: &str,
        guard: Arc<TaskGuard>,
        job: F,
    ) -> Result<Started, RunnerError>
    where
        F: FnOnce(Arc<TaskGuard>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let session_id = guard.session_id().to_string();
        if guard.is_stopped() {
            warn!(target: "taskctl.exec.runner", session = %session_id, job = job_name, "refusing to start: stop already requested");
            return Err(RunnerError::AlreadyStopped { session_id });
        }
        let rt = Handle::try_current().map_err(|_| RunnerError::NoRuntime)?;

        let baseline = self.discovery.snapshot();
        self.sessions.start(session_id.clone(), job_name);

        let span = info_span!(target: "taskctl.exec.runner", "job", session = %session_id, job = job_name);
        let worker = rt.spawn(worker_unit(guard.clone(), job).instrument(span.clone()));
        let monitor = Monitor {
            cfg: self.cfg.clone(),
            discovery: self.discovery.clone(),
            baseline,
            session: Session {
                guard,
                sessions: self.sessions.clone(),
                retention: self.cfg.finished_retention,
            },
        };
        self.tracker.spawn_on(monitor.run(worker).instrument(span), &rt);

        info!(target: "taskctl.exec.runner", session = %session_id, job = job_name, "job started");
        Ok(Started {
            status: "started",
            session_id,
        })
    }

    /// Stop accepting work and wait up to `limit` for running sessions to conclude.
    ///
    /// Returns `false` if some session was still running when the limit expired.
    pub async fn shutdown(&self, limit: Duration) -> bool {
        self.tracker.close();
        let done = timeout(limit, self.tracker.wait()).await.is_ok();
        if !done {
            warn!(target: "taskctl.exec.runner", remaining = self.tracker.len(), "shutdown timed out");
        }
        done
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("cfg", &self.cfg)
            .field("active", &self.tracker.len())
            .finish()
    }
}

/// Bookkeeping of one invocation, owned by its monitor.
struct Session {
    guard: Arc<TaskGuard>,
    sessions: SessionTable,
    retention: usize,
}

impl Session {
    /// Clean up children and record the terminal outcome.
    async fn conclude(&self, outcome: Outcome) {
        let leftovers = self.guard.terminate_children().await;
        if !leftovers.is_empty() {
            debug!(target: "taskctl.exec.runner", count = leftovers.len(), "cleaned up children");
        }
        self.sessions.finish(self.guard.session_id(), outcome.clone());
        self.guard.progress().finish(&outcome);
        let pruned = self.sessions.retain_finished(self.retention);
        if pruned > 0 {
            debug!(target: "taskctl.exec.runner", pruned, "old sessions pruned");
        }

        match &outcome {
            Outcome::Completed => info!(target: "taskctl.exec.runner", "job completed"),
            Outcome::Cancelled => info!(target: "taskctl.exec.runner", "job cancelled"),
            Outcome::Failed { message } => error!(target: "taskctl.exec.runner", %message, "job failed"),
        }
    }
}

/// Runs the job body and classifies its result. Conclusion is left to the monitor,
/// so aborting this unit never cuts cleanup short.
async fn worker_unit<F, Fut>(guard: Arc<TaskGuard>, job: F) -> Outcome
where
    F: FnOnce(Arc<TaskGuard>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    let result = job(guard.clone()).await;
    if let Err(e) = &result {
        debug!(target: "taskctl.exec.runner", error = %format!("{e:#}"), "job returned error");
    }
    classify(&result, guard.is_stopped())
}

struct Monitor {
    cfg: RunnerConfig,
    discovery: Arc<dyn ChildDiscovery>,
    baseline: BTreeSet<u32>,
    session: Session,
}

impl Monitor {
    async fn run(self, mut worker: JoinHandle<Outcome>) {
        let outcome = self.supervise(&mut worker).await;
        self.session.conclude(outcome).await;
    }

    async fn supervise(&self, worker: &mut JoinHandle<Outcome>) -> Outcome {
        tokio::select! {
            res = &mut *worker => return joined(res),
            _ = sleep(self.cfg.discovery_delay) => self.adopt_new_processes(),
        }

        let mut tick = interval(self.cfg.monitor_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                res = &mut *worker => return joined(res),
                _ = tick.tick() => {
                    if self.session.guard.is_stopped() {
                        break;
                    }
                }
            }
        }

        info!(target: "taskctl.exec.runner", grace = ?self.cfg.stop_grace, "stop observed; waiting for worker");
        if let Ok(res) = timeout(self.cfg.stop_grace, &mut *worker).await {
            return joined(res);
        }

        warn!(target: "taskctl.exec.runner", "worker still running; terminating children");
        self.session.guard.terminate_children().await;
        if let Ok(res) = timeout(self.cfg.abort_grace, &mut *worker).await {
            return joined(res);
        }

        warn!(target: "taskctl.exec.runner", "worker unresponsive; aborting");
        worker.abort();
        joined(worker.await)
    }

    fn adopt_new_processes(&self) {
        let current = self.discovery.snapshot();
        for pid in current.difference(&self.baseline) {
            self.session
                .guard
                .register_child(ProcessHandle::from_pid(*pid));
        }
    }
}

/// Outcome of a finished worker unit; panics become failures, aborts cancellations.
fn joined(res: Result<Outcome, JoinError>) -> Outcome {
    match res {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            Outcome::failed(format!("panic: {}", panic_message(e.into_panic())))
        }
        Err(_) => Outcome::Cancelled,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
