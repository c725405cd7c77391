use std::{io, process::Stdio};

use tokio::process::Command;

pub(super) fn check_target(pid: u32) -> Result<(), String> {
    if pid == 0 {
        return Err("invalid pid 0".to_string());
    }
    if pid == std::process::id() {
        return Err("refusing to signal own process".to_string());
    }
    Ok(())
}

pub(super) fn is_alive(pid: u32) -> bool {
    let filter = format!("PID eq {pid}");
    std::process::Command::new("tasklist")
        .args(["/FI", filter.as_str(), "/NH"])
        .stderr(Stdio::null())
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

pub(super) async fn request_exit(pid: u32) -> io::Result<bool> {
    taskkill(pid, false).await
}

pub(super) async fn force_kill(pid: u32) -> io::Result<bool> {
    taskkill(pid, true).await
}

async fn taskkill(pid: u32, force: bool) -> io::Result<bool> {
    if !is_alive(pid) {
        return Ok(false);
    }
    let mut cmd = Command::new("taskkill");
    cmd.arg("/PID").arg(pid.to_string()).arg("/T");
    if force {
        cmd.arg("/F");
    }
    let status = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if status.success() || !is_alive(pid) {
        Ok(true)
    } else {
        Err(io::Error::other(format!("taskkill exited with {status}")))
    }
}
