use std::num::NonZeroUsize;

use comms::{Batch, PaddingConfig, StepInfo};
use sampler::DataParallelGroup;
use serde_json::Value;

use crate::{LocalReplica, Result, registry::FuncRegistry, replica::TrainSampling};

/// Builds `LocalReplica`s.
#[derive(Debug)]
pub struct ReplicaBuilder {
    name: String,
    group: DataParallelGroup,
    train: TrainSampling,
    units: usize,
    padding: PaddingConfig,
    funcs: FuncRegistry,
    decode_budget: Option<NonZeroUsize>,
}

impl ReplicaBuilder {
    /// Creates a new `ReplicaBuilder`.
    ///
    /// # Arguments
    /// * `name` - Identifier used for observability and errors.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: DataParallelGroup::single(),
            train: TrainSampling::default(),
            units: 1,
            padding: PaddingConfig::new(),
            funcs: FuncRegistry::new(),
            decode_budget: None,
        }
    }

    /// The data parallel group member this replica samples for.
    pub fn group(mut self, group: DataParallelGroup) -> Self {
        self.group = group;
        self
    }

    /// Makes the training loader episodic.
    pub fn episodes(mut self, sample_per_episode: usize) -> Self {
        self.train.sample_per_episode = Some(sample_per_episode);
        self
    }

    /// Resumes the training loader from a saved `consumed_samples` offset.
    pub fn consumed_samples(mut self, consumed_samples: usize) -> Self {
        self.train.consumed_samples = consumed_samples;
        self
    }

    /// The amount of execution units backing the replica.
    pub fn units(mut self, units: NonZeroUsize) -> Self {
        self.units = units.get();
        self
    }

    /// Adds every pad value of `padding`, replacing existing ones.
    pub fn padding(mut self, padding: PaddingConfig) -> Self {
        self.padding.merge(padding);
        self
    }

    pub fn pad(mut self, field: impl Into<String>, pad_value: Value) -> Self {
        self.padding.insert(field, pad_value);
        self
    }

    /// Makes the replica an incremental decoding backend, requests decode for
    /// `budget` steps unless a sample overrides it.
    pub fn incremental(mut self, budget: NonZeroUsize) -> Self {
        self.decode_budget = Some(budget);
        self
    }

    pub fn register<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Batch, StepInfo) -> Result<Batch> + Send + Sync + 'static,
    {
        self.funcs.register(name, f);
        self
    }

    pub fn build(self) -> LocalReplica {
        LocalReplica::new(
            self.name,
            self.group,
            self.train,
            self.units,
            self.padding,
            self.funcs,
            self.decode_budget,
        )
    }
}
