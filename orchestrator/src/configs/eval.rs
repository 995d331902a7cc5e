use std::{collections::HashSet, fs, num::NonZeroUsize, path::Path};

use comms::PaddingConfig;
use serde::Deserialize;

use super::DatasetConfig;
use crate::{PipelineErr, Result, StageKind};

fn one() -> NonZeroUsize {
    NonZeroUsize::MIN
}

fn yes() -> bool {
    true
}

/// A single stage of the evaluation pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    pub name: String,
    #[serde(default = "one")]
    pub replicas: NonZeroUsize,
    /// Execution units per replica.
    #[serde(default = "one")]
    pub units: NonZeroUsize,
    pub eval_func: Option<String>,
    #[serde(default)]
    pub kind: StageKind,
    /// Decode steps each request needs, incremental stages only.
    pub decode_steps: Option<NonZeroUsize>,
    #[serde(default)]
    pub padding: PaddingConfig,
}

/// The whole evaluation run.
#[derive(Debug, Clone, Deserialize)]
pub struct EvalConfig {
    pub batch_size: NonZeroUsize,
    #[serde(default = "yes")]
    pub return_last: bool,
    /// Order the dataset longest prompt first before sampling.
    #[serde(default)]
    pub ranking: bool,
    /// Groups of stage names sharing the same devices.
    #[serde(default)]
    pub colocation: Vec<Vec<String>>,
    pub stages: Vec<StageConfig>,
    pub dataset: DatasetConfig,
}

impl EvalConfig {
    /// Parses and validates a config.
    ///
    /// # Errors
    /// `Config` if the JSON is malformed or the config is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Like `from_json`, reading the file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Checks the stages can form a pipeline.
    ///
    /// # Errors
    /// `NoStages` without stages, `Config` on duplicate names or a misplaced or
    /// misconfigured incremental stage.
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(PipelineErr::NoStages);
        }

        let mut seen = HashSet::new();
        for (i, stage) in self.stages.iter().enumerate() {
            if !seen.insert(stage.name.as_str()) {
                return Err(PipelineErr::Config(format!(
                    "duplicate stage name {}",
                    stage.name
                )));
            }

            match stage.kind {
                StageKind::Incremental if i > 0 => {
                    return Err(PipelineErr::Config(format!(
                        "only the leading stage may decode incrementally, {} is stage {i}",
                        stage.name
                    )));
                }
                StageKind::Incremental if stage.decode_steps.is_none() => {
                    return Err(PipelineErr::Config(format!(
                        "incremental stage {} needs decode_steps",
                        stage.name
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}
