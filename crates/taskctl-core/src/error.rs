use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures writing or managing a control slot.
///
/// Reads never fail: an absent or unparseable slot is reported as "no directive".
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("control slot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode control state: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ChannelError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ChannelError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown handler: {0}")]
    UnknownHandler(String),
    #[error("handler already registered: {0}")]
    Duplicate(String),
}

/// Error returned by a job body.
///
/// `Interrupted` and `UpstreamClosed` are consequences of a stop request and are
/// reported as a cancellation, not a failure.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("interrupted by stop request")]
    Interrupted,
    #[error("upstream closed: {0}")]
    UpstreamClosed(String),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl JobError {
    pub fn failed(msg: impl std::fmt::Display) -> Self {
        JobError::Failed(anyhow::anyhow!("{msg}"))
    }
}
