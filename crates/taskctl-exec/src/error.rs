use taskctl_core::RegistryError;
use thiserror::Error;

/// Synchronous failures of starting a job. Everything after the start is reported
/// through the control slot, the session table and the logs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RunnerError {
    #[error("control channel already requests stop (session {session_id})")]
    AlreadyStopped { session_id: String },
    #[error("no tokio runtime available to run the job")]
    NoRuntime,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
