use std::io;

/// Reject pids that would signal a process group, everyone, or ourselves.
pub(super) fn check_target(pid: u32) -> Result<(), String> {
    if pid == 0 || libc::pid_t::try_from(pid).is_err() {
        return Err(format!("invalid pid {pid}"));
    }
    if pid == std::process::id() {
        return Err("refusing to signal own process".to_string());
    }
    Ok(())
}

pub(super) fn is_alive(pid: u32) -> bool {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    if let Some(exited) = child_exited(raw) {
        return !exited;
    }

    // Not our child: fall back to the null signal.
    // SAFETY: signal 0 performs permission and existence checks only.
    if unsafe { libc::kill(raw, 0) } == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

/// Whether our child `pid` has exited, or `None` if it is not our child.
///
/// Uses `WNOWAIT`: the exit status stays collectable by whoever holds the child
/// handle, and the pid cannot be recycled under it.
fn child_exited(pid: libc::pid_t) -> Option<bool> {
    // SAFETY: siginfo_t is plain data; all-zero is a valid value.
    let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
    // SAFETY: WNOHANG never blocks; WNOWAIT leaves the child in a waitable state.
    let rc = unsafe {
        libc::waitid(
            libc::P_PID,
            pid as libc::id_t,
            &mut info,
            libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
        )
    };
    if rc != 0 {
        return None;
    }
    Some(siginfo_pid(&info) == pid)
}

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        fn siginfo_pid(info: &libc::siginfo_t) -> libc::pid_t {
            // SAFETY: waitid filled the child-status member of the union.
            unsafe { info.si_pid() }
        }
    } else {
        fn siginfo_pid(info: &libc::siginfo_t) -> libc::pid_t {
            info.si_pid
        }
    }
}

/// SIGTERM. `Ok(false)` if the process no longer exists.
pub(super) async fn request_exit(pid: u32) -> io::Result<bool> {
    signal(pid, libc::SIGTERM)
}

/// SIGKILL. `Ok(false)` if the process no longer exists.
pub(super) async fn force_kill(pid: u32) -> io::Result<bool> {
    signal(pid, libc::SIGKILL)
}

fn signal(pid: u32, sig: libc::c_int) -> io::Result<bool> {
    let raw = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: raw is a positive pid checked by `check_target`.
    if unsafe { libc::kill(raw, sig) } == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(false)
    } else {
        Err(err)
    }
}
