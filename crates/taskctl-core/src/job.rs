use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::JobError, guard::TaskGuard};

/// A long-running unit of work driven under a [`TaskGuard`].
///
/// Implementations must route every wait through the guard and register any
/// external process they spawn.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable identifier used for registry lookup.
    fn name(&self) -> &str;

    async fn run(&self, guard: Arc<TaskGuard>, params: Value) -> Result<(), JobError>;
}

/// [`Job`] backed by an async closure.
pub struct FnJob<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnJob<F>
where
    F: Fn(Arc<TaskGuard>, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    pub fn arc(name: impl Into<String>, f: F) -> Arc<dyn Job> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: Fn(Arc<TaskGuard>, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, guard: Arc<TaskGuard>, params: Value) -> Result<(), JobError> {
        (self.f)(guard, params).await
    }
}
