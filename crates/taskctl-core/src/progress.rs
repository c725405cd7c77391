use std::sync::{Mutex, MutexGuard, PoisonError};

use taskctl_model::{Action, ControlState, Outcome, RunStatus, TaskInfo, epoch_seconds};
use tracing::{debug, warn};

use crate::channel::ControlChannel;

const FAILURE_EXCERPT: usize = 50;

/// Worker-side writer of human-readable progress into the control slot.
///
/// Non-terminal updates keep whatever directive the supervisor last wrote, so a
/// status line never masks a pending pause or stop. All writes are best-effort.
#[derive(Debug)]
pub struct ProgressReporter {
    channel: Option<ControlChannel>,
    info: Mutex<TaskInfo>,
}

impl ProgressReporter {
    pub fn new(channel: Option<ControlChannel>) -> Self {
        Self {
            channel,
            info: Mutex::new(TaskInfo::default()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(ControlChannel::from_env())
    }

    /// Local copy of the task metadata last published.
    pub fn task_info(&self) -> TaskInfo {
        self.lock().clone()
    }

    pub fn init_task(&self, task_type: &str) {
        *self.lock() = TaskInfo {
            task_type: Some(task_type.to_string()),
            status: Some(format!("Preparing {task_type}...")),
            start_time: Some(epoch_seconds()),
            ..Default::default()
        };
        self.publish(|_| {});
    }

    pub fn update_status(&self, text: impl Into<String>) {
        self.lock().status = Some(text.into());
        self.publish(|_| {});
    }

    /// Mark the job completed and ask the supervising UI to close itself.
    pub fn complete_task(&self, message: impl Into<String>) {
        {
            let mut info = self.lock();
            info.status = Some(message.into());
            info.end_time = Some(epoch_seconds());
        }
        self.publish(|s| {
            s.set_action(Action::Completed);
            s.auto_close = true;
        });
    }

    /// Reflect a terminal outcome into the slot.
    ///
    /// A completion already written by the job itself is left untouched.
    pub fn finish(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Completed => {
                if self.lock().end_time.is_none() {
                    self.complete_task("Task completed");
                }
            }
            Outcome::Cancelled => {
                self.set_final_status("Task stopped".to_string());
                self.publish(|s| s.set_action(Action::Stop));
            }
            Outcome::Failed { message } => {
                let excerpt: String = message.chars().take(FAILURE_EXCERPT).collect();
                self.set_final_status(format!("Task failed: {excerpt}..."));
                self.publish(|s| {
                    s.action = Action::Completed;
                    s.status = RunStatus::Completed;
                });
            }
        }
    }

    fn set_final_status(&self, text: String) {
        let mut info = self.lock();
        info.status = Some(text);
        info.end_time = Some(epoch_seconds());
    }

    fn publish<F>(&self, f: F)
    where
        F: FnOnce(&mut ControlState),
    {
        let Some(channel) = &self.channel else {
            return;
        };
        let info = self.task_info();
        match channel.update(|s| {
            s.task_info = info;
            f(s);
        }) {
            Ok(state) => debug!(
                target: "taskctl.core.progress",
                action = %state.action,
                status = ?state.task_info.status,
                "progress published"
            ),
            Err(e) => warn!(target: "taskctl.core.progress", error = %e, "progress write failed"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TaskInfo> {
        self.info.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, ControlChannel, ProgressReporter) {
        let dir = tempfile::tempdir().unwrap();
        let ch = ControlChannel::create(dir.path(), "progress", &ControlState::running()).unwrap();
        let reporter = ProgressReporter::new(Some(ch.clone()));
        (dir, ch, reporter)
    }

    #[test]
    fn init_and_update_write_task_info() {
        let (_dir, ch, reporter) = setup();

        reporter.init_task("collect");
        let state = ch.read().unwrap();
        assert_eq!(state.task_info.task_type.as_deref(), Some("collect"));
        assert_eq!(state.task_info.status.as_deref(), Some("Preparing collect..."));
        assert!(state.task_info.start_time.is_some());

        reporter.update_status("page 1: 12 items");
        let state = ch.read().unwrap();
        assert_eq!(state.task_info.status.as_deref(), Some("page 1: 12 items"));
        assert_eq!(state.action, Action::Run);
    }

    #[test]
    fn update_keeps_pending_directive() {
        let (_dir, ch, reporter) = setup();
        reporter.init_task("collect");

        ch.update(|s| s.set_action(Action::Pause)).unwrap();
        reporter.update_status("still going");

        let state = ch.read().unwrap();
        assert_eq!(state.action, Action::Pause);
        assert_eq!(state.status, RunStatus::Paused);
        assert_eq!(state.task_info.status.as_deref(), Some("still going"));
    }

    #[test]
    fn complete_sets_auto_close() {
        let (_dir, ch, reporter) = setup();
        reporter.init_task("collect");
        reporter.complete_task("Collected 40 items");

        let state = ch.read().unwrap();
        assert_eq!(state.action, Action::Completed);
        assert_eq!(state.status, RunStatus::Completed);
        assert!(state.auto_close);
        assert!(state.task_info.end_time.is_some());
    }

    #[test]
    fn finish_completed_keeps_job_message() {
        let (_dir, ch, reporter) = setup();
        reporter.complete_task("Collected 40 items");
        reporter.finish(&Outcome::Completed);

        let state = ch.read().unwrap();
        assert_eq!(state.task_info.status.as_deref(), Some("Collected 40 items"));
    }

    #[test]
    fn finish_cancelled_reports_stop() {
        let (_dir, ch, reporter) = setup();
        reporter.init_task("collect");
        reporter.finish(&Outcome::Cancelled);

        let state = ch.read().unwrap();
        assert_eq!(state.action, Action::Stop);
        assert_eq!(state.status, RunStatus::Stopped);
        assert_eq!(state.task_info.status.as_deref(), Some("Task stopped"));
        assert!(!state.auto_close);
    }

    #[test]
    fn finish_failed_truncates_message() {
        let (_dir, ch, reporter) = setup();
        let long = "x".repeat(80);
        reporter.finish(&Outcome::failed(long));

        let state = ch.read().unwrap();
        let text = state.task_info.status.unwrap();
        assert_eq!(text, format!("Task failed: {}...", "x".repeat(50)));
        assert_eq!(state.status, RunStatus::Completed);
    }

    #[test]
    fn without_channel_is_noop() {
        let reporter = ProgressReporter::new(None);
        reporter.init_task("collect");
        reporter.complete_task("done");
        assert_eq!(reporter.task_info().status.as_deref(), Some("done"));
    }
}
