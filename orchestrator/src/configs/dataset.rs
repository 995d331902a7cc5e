use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use comms::{Dataset, Sample};
use log::debug;
use serde::Deserialize;

use crate::{PipelineErr, Result};

/// Where the evaluation samples come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatasetConfig {
    /// A JSON lines file, one sample per non blank line.
    Local { path: PathBuf },
    Inline { samples: Vec<Sample> },
}

impl DatasetConfig {
    /// Materializes the dataset.
    ///
    /// # Errors
    /// `Io` if the file can't be read, `Config` if a line isn't valid JSON,
    /// `EmptyDataset` if there are no samples.
    pub fn load(&self) -> Result<Dataset> {
        let samples = match self {
            Self::Inline { samples } => samples.clone(),
            Self::Local { path } => {
                let reader = BufReader::new(File::open(path)?);
                let mut samples = Vec::new();

                for (i, line) in reader.lines().enumerate() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }

                    let sample = serde_json::from_str(&line).map_err(|e| {
                        PipelineErr::Config(format!("{}:{}: {e}", path.display(), i + 1))
                    })?;
                    samples.push(sample);
                }

                debug!("read {} samples from {}", samples.len(), path.display());
                samples
            }
        };

        if samples.is_empty() {
            return Err(PipelineErr::EmptyDataset);
        }

        Ok(samples.into())
    }
}
