use std::path::Path;

use serde::Serialize;
use taskctl_model::{Action, ControlState, RunStatus, TaskInfo};
use tracing::{debug, info, warn};

use crate::{
    channel::ControlChannel,
    error::ChannelError,
    guard::GuardConfig,
    proc::{self, ProcessHandle},
};

/// Snapshot of a slot as seen by the supervising side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    /// `false` when the slot is missing or unreadable; the other fields are defaults then.
    pub available: bool,
    pub action: Action,
    pub status: RunStatus,
    pub task_info: TaskInfo,
    pub auto_close: bool,
    pub timestamp: f64,
}

impl StatusView {
    fn from_state(state: Option<ControlState>) -> Self {
        let available = state.is_some();
        let state = state.unwrap_or_else(ControlState::running);
        Self {
            available,
            action: state.action,
            status: state.status,
            task_info: state.task_info,
            auto_close: state.auto_close,
            timestamp: state.timestamp,
        }
    }
}

/// Supervising end of a control slot: issues directives and reads progress back.
///
/// A controller that created its slot owns it and removes it when disposed or dropped.
#[derive(Debug)]
pub struct TaskController {
    channel: ControlChannel,
    owned: bool,
    disposed: bool,
    process: Option<ProcessHandle>,
    cfg: GuardConfig,
}

impl TaskController {
    /// Create a fresh slot under `data_dir` seeded with `{run, running}`.
    pub fn create(data_dir: impl AsRef<Path>, prefix: &str) -> Result<Self, ChannelError> {
        let channel = ControlChannel::create(data_dir, prefix, &ControlState::running())?;
        info!(target: "taskctl.core.controller", path = %channel.path().display(), "controller created");
        Ok(Self {
            channel,
            owned: true,
            disposed: false,
            process: None,
            cfg: GuardConfig::default(),
        })
    }

    /// Drive an existing slot without taking ownership of it.
    pub fn attach(channel: ControlChannel) -> Self {
        Self {
            channel,
            owned: false,
            disposed: false,
            process: None,
            cfg: GuardConfig::default(),
        }
    }

    /// Grace periods used by [`TaskController::close`] when terminating the worker process.
    pub fn with_config(mut self, cfg: GuardConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn channel(&self) -> &ControlChannel {
        &self.channel
    }

    /// Worker process to terminate on [`TaskController::close`].
    pub fn set_process(&mut self, handle: ProcessHandle) {
        self.process = Some(handle);
    }

    pub fn pause(&self) -> Result<(), ChannelError> {
        self.direct(Action::Pause)
    }

    pub fn resume(&self) -> Result<(), ChannelError> {
        self.direct(Action::Resume)
    }

    pub fn stop(&self) -> Result<(), ChannelError> {
        self.direct(Action::Stop)
    }

    /// Pause a running job or resume a paused one. Returns the new status.
    pub fn toggle_pause(&self) -> Result<RunStatus, ChannelError> {
        let action = match self.channel.read().map(|s| s.status) {
            Some(RunStatus::Paused) => Action::Resume,
            _ => Action::Pause,
        };
        self.direct(action)?;
        Ok(action.status())
    }

    fn direct(&self, action: Action) -> Result<(), ChannelError> {
        self.channel.update(|s| {
            s.set_action(action);
            s.auto_close = false;
        })?;
        debug!(target: "taskctl.core.controller", %action, path = %self.channel.path().display(), "directive written");
        Ok(())
    }

    pub fn status(&self) -> StatusView {
        StatusView::from_state(self.channel.read())
    }

    /// `true` once the worker reported completion and asked for the UI to close.
    pub fn should_auto_close(&self) -> bool {
        let view = self.status();
        view.auto_close && view.status == RunStatus::Completed
    }

    /// Write `stop`, terminate the worker process if one was attached, then dispose.
    pub async fn close(&mut self) {
        if let Err(e) = self.stop() {
            warn!(target: "taskctl.core.controller", error = %e, "stop directive failed");
        }
        if let Some(handle) = self.process.take() {
            let res = proc::terminate(
                handle,
                self.cfg.kill_grace,
                self.cfg.kill_wait,
                self.cfg.poll_interval,
            )
            .await;
            info!(target: "taskctl.core.controller", %handle, result = ?res, "worker process terminated");
        }
        self.dispose();
    }

    /// Remove the slot. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Err(e) = self.channel.delete() {
            warn!(target: "taskctl.core.controller", error = %e, "slot cleanup failed");
        }
    }
}

impl Drop for TaskController {
    fn drop(&mut self) {
        if self.owned {
            self.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_preserve_task_info() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = TaskController::create(dir.path(), "plugin").unwrap();
        ctl.channel()
            .update(|s| s.task_info = TaskInfo::new("collect").with_status("page 4"))
            .unwrap();

        ctl.pause().unwrap();
        let view = ctl.status();
        assert!(view.available);
        assert_eq!(view.action, Action::Pause);
        assert_eq!(view.status, RunStatus::Paused);
        assert_eq!(view.task_info.status.as_deref(), Some("page 4"));

        ctl.resume().unwrap();
        assert_eq!(ctl.status().status, RunStatus::Running);

        ctl.stop().unwrap();
        let view = ctl.status();
        assert_eq!(view.action, Action::Stop);
        assert_eq!(view.status, RunStatus::Stopped);
        assert_eq!(view.task_info.task_type.as_deref(), Some("collect"));
    }

    #[test]
    fn toggle_alternates() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = TaskController::create(dir.path(), "plugin").unwrap();

        assert_eq!(ctl.toggle_pause().unwrap(), RunStatus::Paused);
        assert_eq!(ctl.toggle_pause().unwrap(), RunStatus::Running);
        assert_eq!(ctl.status().action, Action::Resume);
    }

    #[test]
    fn missing_slot_reports_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = TaskController::create(dir.path(), "plugin").unwrap();
        ctl.dispose();

        let view = ctl.status();
        assert!(!view.available);
        assert_eq!(view.action, Action::Run);
        assert_eq!(view.status, RunStatus::Running);
        assert!(!ctl.should_auto_close());
    }

    #[test]
    fn auto_close_requires_completion() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = TaskController::create(dir.path(), "plugin").unwrap();

        ctl.channel().update(|s| s.auto_close = true).unwrap();
        assert!(!ctl.should_auto_close());

        ctl.channel()
            .update(|s| s.set_action(Action::Completed))
            .unwrap();
        assert!(ctl.should_auto_close());
    }

    #[test]
    fn owned_slot_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = TaskController::create(dir.path(), "plugin").unwrap();
        let path = ctl.channel().path().to_path_buf();
        assert!(path.exists());

        drop(ctl);
        assert!(!path.exists());
    }

    #[test]
    fn attached_slot_survives_drop() {
        let dir = tempfile::tempdir().unwrap();
        let ch = ControlChannel::create(dir.path(), "plugin", &ControlState::running()).unwrap();

        let ctl = TaskController::attach(ch.clone());
        ctl.pause().unwrap();
        drop(ctl);

        assert_eq!(ch.read().unwrap().action, Action::Pause);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn close_stops_worker_and_removes_slot() {
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let cfg = GuardConfig::default()
            .with_poll_interval(Duration::from_millis(20))
            .with_kill_grace(Duration::from_secs(1));
        let mut ctl = TaskController::create(dir.path(), "plugin")
            .unwrap()
            .with_config(cfg);
        let path = ctl.channel().path().to_path_buf();

        let worker = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let handle = ProcessHandle::from(&worker);
        ctl.set_process(handle);

        ctl.close().await;
        assert!(!handle.is_alive());
        assert!(!path.exists());
    }
}
