use std::sync::Arc;

use serde_json::Value;
use taskctl_core::{ControlChannel, GuardConfig, JobRegistry, TaskGuard};
use tracing::{debug, instrument};

use crate::{
    error::RunnerError,
    runner::{Started, TaskRunner},
};

/// Entry point for external callers (a scheduler, a subprocess transport):
/// look a job up by name, bind it to a channel and start it.
pub struct Dispatcher {
    registry: JobRegistry,
    runner: TaskRunner,
    guard_cfg: GuardConfig,
}

impl Dispatcher {
    pub fn new(registry: JobRegistry, runner: TaskRunner) -> Self {
        Self {
            registry,
            runner,
            guard_cfg: GuardConfig::default(),
        }
    }

    pub fn with_guard_config(mut self, cfg: GuardConfig) -> Self {
        self.guard_cfg = cfg;
        self
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// Start job `name` with `params`, controlled through `channel` when given.
    #[instrument(level = "debug", skip(self, params, channel), fields(job = %name))]
    pub fn execute(
        &self,
        name: &str,
        params: Value,
        channel: Option<ControlChannel>,
    ) -> Result<Started, RunnerError> {
        let job = self.registry.get(name)?;
        let guard = Arc::new(TaskGuard::with_config(channel, self.guard_cfg.clone()));
        debug!(target: "taskctl.exec.dispatch", session = %guard.session_id(), "dispatching");

        let job_name = job.name().to_string();
        self.runner
            .run(&job_name, guard, move |g| async move { job.run(g, params).await })
    }

    /// [`Dispatcher::execute`] using the slot named by `PROCESS_CONTROL_FILE`.
    pub fn execute_from_env(&self, name: &str, params: Value) -> Result<Started, RunnerError> {
        self.execute(name, params, ControlChannel::from_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use taskctl_core::{FnJob, JobError, RegistryError};
    use taskctl_model::{Action, ControlState, Outcome, RunStatus};

    fn dispatcher() -> Dispatcher {
        let registry = JobRegistry::new()
            .with(FnJob::arc("count", |g: Arc<TaskGuard>, params: Value| async move {
                let n = params["n"].as_u64().unwrap_or(1);
                g.progress().init_task("count");
                for i in 0..n {
                    g.sleep_or_interrupt(Duration::from_millis(200)).await?;
                    g.progress().update_status(format!("{}/{n}", i + 1));
                }
                g.progress().complete_task(format!("counted to {n}"));
                Ok::<(), JobError>(())
            }))
            .unwrap();
        Dispatcher::new(registry, TaskRunner::default())
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_job_is_rejected() {
        let d = dispatcher();
        let err = d.execute("CollectController.run", json!({}), None).unwrap_err();
        assert_eq!(
            err,
            RunnerError::Registry(RegistryError::UnknownHandler(
                "CollectController.run".into()
            ))
        );
        assert!(d.runner().sessions().list().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn executes_registered_job_against_channel() {
        let dir = tempfile::tempdir().unwrap();
        let ch = ControlChannel::create(dir.path(), "count", &ControlState::running()).unwrap();
        let d = dispatcher();

        let started = d.execute("count", json!({"n": 3}), Some(ch.clone())).unwrap();
        assert!(d.runner().shutdown(Duration::from_secs(5)).await);

        let info = d.runner().sessions().get(&started.session_id).unwrap();
        assert_eq!(info.job, "count");
        assert_eq!(info.outcome, Some(Outcome::Completed));

        let state = ch.read().unwrap();
        assert_eq!(state.action, Action::Completed);
        assert_eq!(state.status, RunStatus::Completed);
        assert!(state.auto_close);
        assert_eq!(state.task_info.status.as_deref(), Some("counted to 3"));
    }
}
