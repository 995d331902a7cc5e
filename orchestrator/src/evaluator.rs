use std::num::NonZeroUsize;

use comms::Dataset;
use log::{info, warn};

use crate::{
    PipelineErr, Result,
    merger::ResultRecord,
    ranking::rank_by_prompt_length,
    scheduler::PipelineScheduler,
    stage::Stage,
};

/// Training progress handed to the post process hook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalInfo {
    pub episode_iteration: Option<usize>,
    pub train_iteration: Option<usize>,
}

/// Hook run over the results of every pass.
pub type PostProcessFn = Box<dyn FnMut(&mut Vec<ResultRecord>, &EvalInfo) + Send>;

/// Runs evaluation passes of a dataset over a pipeline of stages.
pub struct Evaluator {
    stages: Vec<Stage>,
    batch_size: NonZeroUsize,
    dataset: Option<Dataset>,
    ranking: bool,
    post_process: Option<PostProcessFn>,
    scheduler: Option<PipelineScheduler>,
}

impl Evaluator {
    /// Creates a new `Evaluator`.
    ///
    /// # Arguments
    /// * `stages` - The pipeline, in order.
    /// * `batch_size` - Samples per evaluation batch.
    pub fn new(stages: Vec<Stage>, batch_size: NonZeroUsize) -> Self {
        Self {
            stages,
            batch_size,
            dataset: None,
            ranking: false,
            post_process: None,
            scheduler: None,
        }
    }

    /// Sets the evaluation dataset, takes effect on the next `setup`.
    pub fn set_dataset(&mut self, dataset: impl Into<Dataset>) -> &mut Self {
        self.dataset = Some(dataset.into());
        self
    }

    /// Whether `setup` orders the dataset longest prompt first.
    pub fn set_ranking(&mut self, ranking: bool) -> &mut Self {
        self.ranking = ranking;
        self
    }

    /// Sets the hook run over the results of every pass.
    pub fn set_post_process_func<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&mut Vec<ResultRecord>, &EvalInfo) + Send + 'static,
    {
        self.post_process = Some(Box::new(f));
        self
    }

    /// Replaces stages by name, keeping the pipeline order.
    ///
    /// The evaluator must be set up again afterwards.
    ///
    /// # Errors
    /// `Config` if a stage doesn't match any existing one.
    pub fn update_stages(&mut self, stages: Vec<Stage>) -> Result<()> {
        for stage in stages {
            let Some(slot) = self.stages.iter_mut().find(|s| s.name() == stage.name()) else {
                return Err(PipelineErr::Config(format!("unknown stage {}", stage.name())));
            };

            *slot = stage;
        }

        self.scheduler = None;
        Ok(())
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Samples in a full pass, the dataset's length.
    pub fn sample_per_episode(&self) -> usize {
        self.dataset.as_ref().map_or(0, |dataset| dataset.len())
    }

    /// Batches in a full pass, the last one may be partial.
    pub fn batch_per_episode(&self) -> usize {
        self.sample_per_episode().div_ceil(self.batch_size.get())
    }

    /// Whether passes run lock-stepped, `None` before `setup`.
    pub fn is_colocated(&self) -> Option<bool> {
        self.scheduler.as_ref().map(PipelineScheduler::is_colocated)
    }

    /// Validates the pipeline and prepares every replica for evaluation.
    ///
    /// # Arguments
    /// * `colocation` - Groups of stage names sharing the same devices.
    ///
    /// # Errors
    /// A `PipelineErr` if the pipeline is invalid, no dataset was set, or a
    /// preparation call fails.
    pub async fn setup(&mut self, colocation: &[Vec<String>]) -> Result<()> {
        let mut dataset = self.dataset.clone().ok_or(PipelineErr::EmptyDataset)?;
        if self.ranking {
            info!("ranking {} samples by prompt length", dataset.len());
            dataset = rank_by_prompt_length(&dataset);
        }

        self.scheduler = None;
        let scheduler =
            PipelineScheduler::setup(&self.stages, dataset, self.batch_size, colocation).await?;
        self.scheduler = Some(scheduler);

        info!(
            batches = self.batch_per_episode(),
            samples = self.sample_per_episode();
            "evaluator set up"
        );
        Ok(())
    }

    /// Runs a full pass over the dataset.
    ///
    /// # Arguments
    /// * `episode_iteration` - Handed to the post process hook.
    /// * `train_iteration` - Handed to the post process hook.
    /// * `return_last` - Keep only the last stage's outputs.
    ///
    /// # Returns
    /// The pass results after the post process hook ran over them.
    ///
    /// # Errors
    /// `NotSetUp` before `setup`, otherwise the first failure of the pass.
    pub async fn eval(
        &mut self,
        episode_iteration: Option<usize>,
        train_iteration: Option<usize>,
        return_last: bool,
    ) -> Result<Vec<ResultRecord>> {
        let scheduler = self.scheduler.as_ref().ok_or(PipelineErr::NotSetUp)?;
        let num_batch = self.batch_per_episode();

        let mut results = scheduler.run_pass(num_batch, return_last).await?;
        if results.is_empty() {
            warn!("evaluation pass produced no results");
        }

        if let Some(hook) = self.post_process.as_mut() {
            let info = EvalInfo {
                episode_iteration,
                train_iteration,
            };
            hook(&mut results, &info);
        }

        info!(batches = num_batch, records = results.len(); "evaluation pass done");
        Ok(results)
    }
}
