use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, instrument};

use crate::{error::RegistryError, job::Job};

/// Explicit name → job mapping, populated at startup.
#[derive(Default, Clone)]
pub struct JobRegistry {
    jobs: BTreeMap<String, Arc<dyn Job>>,
}

impl JobRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: Arc<dyn Job>) -> Result<(), RegistryError> {
        let name = job.name().to_string();
        if self.jobs.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!(target: "taskctl.core.registry", job = %name, "job registered");
        self.jobs.insert(name, job);
        Ok(())
    }

    /// Builder-style [`JobRegistry::register`].
    pub fn with(mut self, job: Arc<dyn Job>) -> Result<Self, RegistryError> {
        self.register(job)?;
        Ok(self)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn get(&self, name: &str) -> Result<Arc<dyn Job>, RegistryError> {
        self.jobs
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownHandler(name.to_string()))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.jobs.keys().map(String::as_str).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.names())
            .finish()
    }
}
