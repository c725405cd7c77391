//! Supervisor and worker for a controlled feed collection.
//!
//! `feed-demo run` creates a control slot, starts itself again as a `worker` child
//! bound to that slot and prints progress until the worker exits. From another
//! terminal, `feed-demo ctl pause|resume|stop|status <slot>` drives the same job.

mod feed;
mod job;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};
use taskctl_core::{CONTROL_FILE_ENV, ControlChannel, JobRegistry, ProcessHandle, TaskController};
use taskctl_exec::{Dispatcher, ProcScan, RunnerConfig, TaskRunner};
use taskctl_observe::{LoggerConfig, logger_init};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::job::{JOB_NAME, collect_links_job};

const POLL_EVERY: Duration = Duration::from_millis(500);
const WORKER_LIMIT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Parser, Debug)]
#[command(version, about = "Controlled feed collection demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a collection worker and supervise it until it exits.
    Run {
        /// Directory holding the control slots.
        #[arg(long, env = "TASKCTL_DATA_DIR", default_value = ".taskctl")]
        data_dir: PathBuf,
        #[arg(long)]
        keyword: String,
        #[arg(long, default_value_t = 5)]
        pages: u32,
        #[arg(long)]
        fast: bool,
    },
    /// Execute a registered job in this process, bound to the slot named by PROCESS_CONTROL_FILE.
    Worker {
        #[arg(long, default_value = JOB_NAME)]
        job: String,
        /// Job parameters as a JSON object.
        #[arg(long, default_value = "{}")]
        params: String,
    },
    /// Send a directive to a job or print its status.
    Ctl {
        #[arg(value_enum)]
        op: CtlOp,
        /// Control slot file.
        slot: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CtlOp {
    Pause,
    Resume,
    Stop,
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger_init(&LoggerConfig::from_env()?)?;

    match cli.command {
        Command::Run {
            data_dir,
            keyword,
            pages,
            fast,
        } => supervise(data_dir, json!({ "keyword": keyword, "pages": pages, "fast": fast })).await,
        Command::Worker { job, params } => work(&job, &params).await,
        Command::Ctl { op, slot } => control(op, slot),
    }
}

async fn supervise(data_dir: PathBuf, params: Value) -> anyhow::Result<()> {
    let mut ctl = TaskController::create(&data_dir, "feed_demo")?;
    let slot = ctl.channel().path().to_path_buf();

    let exe = std::env::current_exe().context("cannot locate own executable")?;
    let mut child = tokio::process::Command::new(exe)
        .arg("worker")
        .arg("--params")
        .arg(params.to_string())
        .env(CONTROL_FILE_ENV, &slot)
        .kill_on_drop(true)
        .spawn()
        .context("failed to start worker")?;
    ctl.set_process(ProcessHandle::try_from(&child)?);

    println!("control slot: {}", slot.display());
    info!(target: "feed_demo.run", slot = %slot.display(), "worker started");

    let mut tick = interval(POLL_EVERY);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = None;
    let mut stopping = false;

    loop {
        tokio::select! {
            exit = child.wait() => {
                match exit {
                    Ok(status) => info!(target: "feed_demo.run", %status, "worker exited"),
                    Err(e) => warn!(target: "feed_demo.run", error = %e, "cannot wait for worker"),
                }
                break;
            }
            _ = tick.tick() => {
                let view = ctl.status();
                if view.task_info.status != last {
                    if let Some(text) = &view.task_info.status {
                        println!("[{:?}] {text}", view.status);
                    }
                    last = view.task_info.status;
                }
                if ctl.should_auto_close() {
                    info!(target: "feed_demo.run", "job completed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if stopping {
                    warn!(target: "feed_demo.run", "second interrupt; terminating worker");
                    ctl.close().await;
                    // close() only signals; the exit status is still ours to collect.
                    if let Ok(status) = child.wait().await {
                        info!(target: "feed_demo.run", %status, "worker exited");
                    }
                    break;
                }
                stopping = true;
                ctl.stop()?;
                println!("stop requested; press Ctrl-C again to force");
            }
        }
    }

    let view = ctl.status();
    println!("{}", serde_json::to_string_pretty(&view)?);
    ctl.dispose();
    Ok(())
}

async fn work(job: &str, params: &str) -> anyhow::Result<()> {
    let params: Value = serde_json::from_str(params).context("--params must be a JSON object")?;
    let registry = JobRegistry::new().with(collect_links_job())?;
    let runner = TaskRunner::new(RunnerConfig::default())
        .with_discovery(Arc::new(ProcScan::default().own_descendants()));
    let dispatcher = Dispatcher::new(registry, runner);

    let started = dispatcher.execute_from_env(job, params)?;
    info!(target: "feed_demo.worker", session = %started.session_id, status = started.status, "job started");

    if !dispatcher.runner().shutdown(WORKER_LIMIT).await {
        warn!(target: "feed_demo.worker", "job did not finish in time");
    }
    Ok(())
}

fn control(op: CtlOp, slot: PathBuf) -> anyhow::Result<()> {
    let ctl = TaskController::attach(ControlChannel::open(slot));
    match op {
        CtlOp::Pause => ctl.pause()?,
        CtlOp::Resume => ctl.resume()?,
        CtlOp::Stop => ctl.stop()?,
        CtlOp::Status => {}
    }
    println!("{}", serde_json::to_string_pretty(&ctl.status())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ctl() {
        let cli = Cli::try_parse_from(["feed-demo", "ctl", "pause", "/tmp/slot.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Ctl {
                op: CtlOp::Pause,
                ..
            }
        ));
    }

    #[test]
    fn ctl_writes_directive() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = TaskController::create(dir.path(), "t").unwrap();

        control(CtlOp::Stop, ctl.channel().path().to_path_buf()).unwrap();
        assert_eq!(ctl.status().action, taskctl_model::Action::Stop);
    }
}
