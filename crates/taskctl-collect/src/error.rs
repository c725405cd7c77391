use thiserror::Error;

/// Failures interacting with a feed surface. Any of them ends collection early.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("surface crashed: {0}")]
    Crashed(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("script evaluation failed: {0}")]
    Script(String),
}

/// A sink refused or failed to store a batch. Logged, never fatal to collection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("sink failed: {0}")]
pub struct SinkError(pub String);
