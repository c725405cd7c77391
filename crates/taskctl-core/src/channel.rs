use std::{
    fs, io,
    path::{Path, PathBuf},
};

use taskctl_model::{ControlState, epoch_seconds};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::ChannelError;

/// Environment variable through which a worker process learns its slot path.
pub const CONTROL_FILE_ENV: &str = "PROCESS_CONTROL_FILE";
/// Sub-directory of the data dir holding control slots.
pub const CONTROL_DIR: &str = "process_control";

/// File-backed mailbox carrying the latest [`ControlState`] between processes.
///
/// Writes go to a sibling temp file which is then renamed over the slot, so a
/// reader sees either the old or the new content. Reads treat a missing, empty or
/// corrupt slot as "no directive" and return `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlChannel {
    path: PathBuf,
}

impl ControlChannel {
    /// Allocate `<data_dir>/process_control/<prefix>_<uuid>.json` and seed it with `initial`.
    pub fn create(
        data_dir: impl AsRef<Path>,
        prefix: &str,
        initial: &ControlState,
    ) -> Result<Self, ChannelError> {
        let dir = data_dir.as_ref().join(CONTROL_DIR);
        fs::create_dir_all(&dir).map_err(|e| ChannelError::io(&dir, e))?;

        let name = format!("{prefix}_{}.json", Uuid::new_v4().simple());
        let channel = Self {
            path: dir.join(name),
        };
        channel.write(initial)?;

        debug!(target: "taskctl.core.channel", path = %channel.path.display(), "slot created");
        Ok(channel)
    }

    /// Attach to an existing slot. Nothing is touched on disk.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Slot named by [`CONTROL_FILE_ENV`], if set and non-empty.
    pub fn from_env() -> Option<Self> {
        std::env::var_os(CONTROL_FILE_ENV)
            .filter(|v| !v.is_empty())
            .map(Self::open)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the slot with `state`, stamping `timestamp` with the current time.
    pub fn write(&self, state: &ControlState) -> Result<(), ChannelError> {
        let mut stamped = state.clone();
        stamped.timestamp = epoch_seconds();
        let body = serde_json::to_vec(&stamped)?;

        let tmp = self.tmp_path();
        fs::write(&tmp, &body).map_err(|e| ChannelError::io(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(ChannelError::io(&self.path, e));
        }

        trace!(
            target: "taskctl.core.channel",
            path = %self.path.display(),
            action = %stamped.action,
            "slot written"
        );
        Ok(())
    }

    pub fn read(&self) -> Option<ControlState> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) => {
                trace!(target: "taskctl.core.channel", path = %self.path.display(), error = %e, "slot unreadable");
                return None;
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            trace!(target: "taskctl.core.channel", path = %self.path.display(), "slot empty");
            return None;
        }
        match serde_json::from_slice(&bytes) {
            Ok(state) => Some(state),
            Err(e) => {
                trace!(target: "taskctl.core.channel", path = %self.path.display(), error = %e, "slot corrupt");
                None
            }
        }
    }

    /// Read-modify-write. An unreadable slot starts from [`ControlState::default`].
    ///
    /// Not atomic against a concurrent writer on the other side; last write wins.
    pub fn update<F>(&self, f: F) -> Result<ControlState, ChannelError>
    where
        F: FnOnce(&mut ControlState),
    {
        let mut state = self.read().unwrap_or_default();
        f(&mut state);
        self.write(&state)?;
        Ok(state)
    }

    /// Remove the slot. An already absent slot is not an error.
    pub fn delete(&self) -> Result<(), ChannelError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(target: "taskctl.core.channel", path = %self.path.display(), "slot deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(target: "taskctl.core.channel", path = %self.path.display(), error = %e, "slot delete failed");
                Err(ChannelError::io(&self.path, e))
            }
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
    }
}
