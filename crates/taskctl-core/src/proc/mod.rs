//! External child processes supervised by a [`TaskGuard`](crate::TaskGuard).

use std::{fmt, time::Duration};

use tokio::time::{Instant, sleep};

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix as sys;
    } else {
        mod other;
        use other as sys;
    }
}

/// Handle to an OS process identified by pid.
///
/// Only the pid is kept; ownership of the process object stays with whoever spawned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessHandle {
    pid: u32,
}

impl ProcessHandle {
    pub fn from_pid(pid: u32) -> Self {
        Self { pid }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Best-effort liveness check.
    ///
    /// An exited child of ours counts as gone but is not reaped; collecting its status
    /// stays with the owner of its `Child` handle.
    pub fn is_alive(&self) -> bool {
        sys::is_alive(self.pid)
    }
}

impl From<&std::process::Child> for ProcessHandle {
    fn from(child: &std::process::Child) -> Self {
        Self::from_pid(child.id())
    }
}

impl TryFrom<&tokio::process::Child> for ProcessHandle {
    type Error = std::io::Error;

    /// Fails once the child has been polled to completion (tokio drops the pid).
    fn try_from(child: &tokio::process::Child) -> Result<Self, Self::Error> {
        child.id().map(Self::from_pid).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "child already exited")
        })
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.pid)
    }
}

/// How a termination attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The process was gone before any signal was sent.
    AlreadyGone,
    /// The process exited within the grace period after a polite request.
    Graceful,
    /// The process had to be force-killed.
    Killed,
    /// Signalling failed (permission denied, invalid pid) or the process survived.
    Failed(String),
}

/// Ask `handle` to exit, wait up to `grace`, then force-kill and wait up to `kill_wait`.
///
/// Never panics and never returns an error; the outcome is described by [`Termination`].
pub async fn terminate(
    handle: ProcessHandle,
    grace: Duration,
    kill_wait: Duration,
    poll: Duration,
) -> Termination {
    if let Err(reason) = sys::check_target(handle.pid) {
        return Termination::Failed(reason);
    }
    if !handle.is_alive() {
        return Termination::AlreadyGone;
    }

    match sys::request_exit(handle.pid).await {
        Ok(true) => {}
        Ok(false) => return Termination::AlreadyGone,
        Err(e) => return Termination::Failed(format!("terminate: {e}")),
    }
    if wait_exit(handle, grace, poll).await {
        return Termination::Graceful;
    }

    match sys::force_kill(handle.pid).await {
        Ok(true) => {}
        Ok(false) => return Termination::Graceful,
        Err(e) => return Termination::Failed(format!("kill: {e}")),
    }
    if wait_exit(handle, kill_wait, poll).await {
        Termination::Killed
    } else {
        Termination::Failed("still alive after kill".to_string())
    }
}

async fn wait_exit(handle: ProcessHandle, within: Duration, poll: Duration) -> bool {
    let deadline = Instant::now() + within;
    loop {
        if !handle.is_alive() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        sleep((deadline - now).min(poll)).await;
    }
}
