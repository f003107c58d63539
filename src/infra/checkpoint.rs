// ============================================================
// Layer 6 - Checkpoint Manager (versioned runs)
// ============================================================
// Every training run gets its own directory:
//
//   runs/
//     version_0/
//       hparams.json           <- TrainConfig, enough to rebuild the model
//       model_epoch_1.mpk.gz   <- weights after epoch 1 (CompactRecorder)
//       model_epoch_2.mpk.gz
//       latest_epoch.json      <- number of the newest epoch on disk
//       metrics.csv            <- written by MetricsLogger
//     version_1/
//       ...
//
// create_run() allocates the next free version number.
// open_run() reopens an existing version (the newest by default).
// Missing files surface as LmError::MissingArtifact carrying
// the path that was tried.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::LmError;
use crate::ml::model::GptModel;

const VERSION_PREFIX: &str = "version_";
const HPARAMS_FILE:   &str = "hparams.json";
const LATEST_FILE:    &str = "latest_epoch.json";

pub struct CheckpointManager {
    dir:     PathBuf,
    version: usize,
}

impl CheckpointManager {
    /// Allocate `root/version_N` with N one past the newest existing version.
    pub fn create_run(root: impl AsRef<Path>) -> Result<Self> {
        let root    = root.as_ref();
        let version = latest_version(root)?.map_or(0, |v| v + 1);
        let dir     = root.join(format!("{VERSION_PREFIX}{version}"));

        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;

        tracing::info!("Created run '{}'", dir.display());
        Ok(Self { dir, version })
    }

    /// Reopen `root/version_N`, or the newest version when `version` is None.
    pub fn open_run(root: impl AsRef<Path>, version: Option<usize>) -> Result<Self> {
        let root    = root.as_ref();
        let version = match version {
            Some(v) => v,
            None => latest_version(root)?.ok_or_else(|| LmError::MissingArtifact {
                what: "training run",
                path: root.join(format!("{VERSION_PREFIX}*")),
            })?,
        };

        let dir = root.join(format!("{VERSION_PREFIX}{version}"));
        if !dir.is_dir() {
            return Err(LmError::MissingArtifact { what: "training run", path: dir }.into());
        }

        tracing::debug!("Opened run '{}'", dir.display());
        Ok(Self { dir, version })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn version(&self) -> usize {
        self.version
    }

    pub fn save_hparams(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(HPARAMS_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write hyperparameters to '{}'", path.display()))?;

        tracing::debug!("Saved hyperparameters to '{}'", path.display());
        Ok(())
    }

    pub fn load_hparams(&self) -> Result<TrainConfig> {
        let path = self.dir.join(HPARAMS_FILE);
        if !path.exists() {
            return Err(LmError::MissingArtifact { what: "hyperparameter record", path }.into());
        }

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed hyperparameters in '{}'", path.display()))
    }

    /// Save weights for `epoch` and move the latest-epoch pointer to it.
    pub fn save_model<B: Backend>(&self, model: &GptModel<B>, epoch: usize) -> Result<()> {
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join(LATEST_FILE);
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::info!("Saved checkpoint: version {} epoch {}", self.version, epoch);
        Ok(())
    }

    /// Load the newest epoch's weights into `model`.
    ///
    /// `model` must have the architecture the checkpoint was saved with.
    pub fn load_model<B: Backend>(&self, model: GptModel<B>, device: &B::Device) -> Result<GptModel<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));
        let file  = self.dir.join(format!("model_epoch_{epoch}.mpk.gz"));
        if !file.exists() {
            return Err(LmError::MissingArtifact { what: "checkpoint", path: file }.into());
        }

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", file.display()))?;

        tracing::info!("Loaded checkpoint: version {} epoch {}", self.version, epoch);
        Ok(model.load_record(record))
    }

    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_FILE);
        if !path.exists() {
            return Err(LmError::MissingArtifact { what: "checkpoint", path }.into());
        }

        let s = fs::read_to_string(&path)?;
        serde_json::from_str::<usize>(&s)
            .with_context(|| format!("Malformed epoch pointer in '{}'", path.display()))
    }
}

/// Highest N among `root/version_N` directories, if any.
pub fn latest_version(root: impl AsRef<Path>) -> Result<Option<usize>> {
    let root = root.as_ref();
    if !root.exists() {
        return Ok(None);
    }

    let mut latest = None;
    for entry in fs::read_dir(root).with_context(|| format!("Cannot read '{}'", root.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name    = entry.file_name();
        let version = name
            .to_str()
            .and_then(|n| n.strip_prefix(VERSION_PREFIX))
            .and_then(|n| n.parse::<usize>().ok());
        latest = latest.max(version);
    }
    Ok(latest)
}
