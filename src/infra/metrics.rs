// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Appends one CSV row per training epoch to
// runs/version_N/metrics.csv:
//
//   epoch,steps,train_loss,val_loss,learning_rate
//   1,120,6.412300,6.198100,0.000874
//   2,240,5.873900,5.902200,0.000501
//
// `steps` is the cumulative optimizer step count and
// `learning_rate` the rate used for the last step of the epoch.
// val_loss is left empty when the run has no validation set.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

pub const METRICS_HEADER: &str = "epoch,steps,train_loss,val_loss,learning_rate";

#[derive(Debug, Clone)]
pub struct EpochMetrics {
    pub epoch:         usize,
    pub steps:         usize,
    pub train_loss:    f64,
    pub val_loss:      Option<f64>,
    pub learning_rate: f64,
}

impl EpochMetrics {
    /// True if this epoch's validation loss beats `best_val_loss`.
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss.is_some_and(|v| v < best_val_loss)
    }

    fn to_csv_row(&self) -> String {
        let val = self.val_loss.map(|v| format!("{v:.6}")).unwrap_or_default();
        format!(
            "{},{},{:.6},{},{:.6}",
            self.epoch, self.steps, self.train_loss, val, self.learning_rate
        )
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file does not exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{METRICS_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(f, "{}", m.to_csv_row())?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:?}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
