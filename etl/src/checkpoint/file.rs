use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::error::EtlResult;
use crate::types::Checkpoint;

/// Suffix of the sibling file used to stage a save before renaming it into place.
const STAGING_SUFFIX: &str = ".tmp";

/// On-disk record. Both keys are optional so that partial files load as empty.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointRecord {
    #[serde(default)]
    log_file: Option<String>,
    #[serde(default, alias = "log_pos")]
    log_position: Option<u64>,
}

/// [`CheckpointStore`] persisting the checkpoint as a two-key YAML document.
///
/// ```yaml
/// log_file: mysql-bin.000005
/// log_position: 1024
/// ```
///
/// Saves are written to a sibling staging file, synced, and renamed over the target, so a
/// crash never leaves a half-written checkpoint behind.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| OsString::from("checkpoint"));
        file_name.push(STAGING_SUFFIX);

        self.path.with_file_name(file_name)
    }

    fn parse(&self, contents: &str) -> Option<Checkpoint> {
        if contents.trim().is_empty() {
            warn!(path = %self.path.display(), "checkpoint file is empty, starting without a checkpoint");
            return None;
        }

        let record: CheckpointRecord = match serde_yaml::from_str(contents) {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "checkpoint file is corrupt, starting without a checkpoint"
                );
                return None;
            }
        };

        match (record.log_file, record.log_position) {
            (Some(log_file), Some(log_position)) if !log_file.is_empty() => {
                Some(Checkpoint::new(log_file, log_position))
            }
            _ => {
                warn!(
                    path = %self.path.display(),
                    "checkpoint file lacks `log_file` or `log_position`, starting without a checkpoint"
                );
                None
            }
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> EtlResult<Option<Checkpoint>> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                info!(path = %self.path.display(), "no checkpoint file found");
                return Ok(None);
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "checkpoint file is unreadable, starting without a checkpoint"
                );
                return Ok(None);
            }
        };

        let Ok(contents) = String::from_utf8(contents) else {
            warn!(path = %self.path.display(), "checkpoint file is not valid UTF-8, starting without a checkpoint");
            return Ok(None);
        };

        let checkpoint = self.parse(&contents);
        if let Some(checkpoint) = &checkpoint {
            info!(%checkpoint, "loaded checkpoint");
        }

        Ok(checkpoint)
    }

    async fn save(&self, checkpoint: &Checkpoint) -> EtlResult<()> {
        let record = CheckpointRecord {
            log_file: Some(checkpoint.log_file.clone()),
            log_position: Some(checkpoint.log_position),
        };
        let serialized = serde_yaml::to_string(&record)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let staging_path = self.staging_path();
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&staging_path)
            .await?;
        file.write_all(serialized.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&staging_path, &self.path).await?;

        debug!(%checkpoint, path = %self.path.display(), "saved checkpoint");

        Ok(())
    }
}
