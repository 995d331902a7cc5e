use std::num::NonZeroUsize;

use async_trait::async_trait;
use comms::{Batch, Dataset, PaddingConfig, RemoteResult, Replica, Sample, StepInfo};
use log::{debug, info};
use parking_lot::Mutex;
use sampler::{DataLoader, DataParallelGroup, SamplerKind, SamplerSpec};

use crate::{Result, WorkerErr, decode::DecodeScheduler, registry::FuncRegistry};

/// How the training loader samples.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TrainSampling {
    pub sample_per_episode: Option<usize>,
    /// Saved offset the training loader resumes from.
    pub consumed_samples: usize,
}

#[derive(Debug, Default)]
struct ReplicaState {
    eval_loader: Option<DataLoader<Sample>>,
    train_loader: Option<DataLoader<Sample>>,
    built_units: Vec<bool>,
    decoder: Option<DecodeScheduler>,
    calls: usize,
}

impl ReplicaState {
    fn loader(&mut self, is_eval: bool) -> Result<&mut DataLoader<Sample>> {
        let slot = if is_eval {
            &mut self.eval_loader
        } else {
            &mut self.train_loader
        };

        slot.as_mut().ok_or(WorkerErr::LoaderNotBuilt { is_eval })
    }

    fn decoder(&mut self) -> Result<&mut DecodeScheduler> {
        let units = self.built_units.len();
        let built = self.built_units.iter().filter(|b| **b).count();

        match self.decoder.as_mut() {
            Some(decoder) if built == units => Ok(decoder),
            Some(_) => Err(WorkerErr::SchedulerNotBuilt { built, units }),
            None => Err(WorkerErr::Unsupported { op: "decoding" }),
        }
    }
}

/// In process replica serving registered stage functions over its own data loader.
#[derive(Debug)]
pub struct LocalReplica {
    name: String,
    group: DataParallelGroup,
    train: TrainSampling,
    units: usize,
    padding: PaddingConfig,
    funcs: FuncRegistry,
    state: Mutex<ReplicaState>,
}

impl LocalReplica {
    pub(crate) fn new(
        name: String,
        group: DataParallelGroup,
        train: TrainSampling,
        units: usize,
        padding: PaddingConfig,
        funcs: FuncRegistry,
        decode_budget: Option<NonZeroUsize>,
    ) -> Self {
        let state = ReplicaState {
            built_units: vec![false; units],
            decoder: decode_budget.map(DecodeScheduler::new),
            ..Default::default()
        };

        Self {
            name,
            group,
            train,
            units,
            padding,
            funcs,
            state: Mutex::new(state),
        }
    }

    #[inline]
    pub fn group(&self) -> DataParallelGroup {
        self.group
    }

    /// The amount of stage function calls served so far.
    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    /// Global consumption offset of one of the loaders, saved for resumption.
    pub fn consumed_samples(&self, is_eval: bool) -> Result<usize> {
        Ok(self.state.lock().loader(is_eval)?.consumed_samples())
    }

    fn build_loader(&self, dataset: Dataset, batch_size: usize, is_eval: bool) -> Result<()> {
        // Evaluation always replays the whole dataset.
        let (kind, consumed_samples) = match (is_eval, self.train.sample_per_episode) {
            (true, _) => (SamplerKind::Bounded, 0),
            (false, Some(sample_per_episode)) => (
                SamplerKind::Episodic { sample_per_episode },
                self.train.consumed_samples,
            ),
            (false, None) => (SamplerKind::Bounded, self.train.consumed_samples),
        };

        let spec = SamplerSpec {
            kind,
            consumed_samples,
            ..SamplerSpec::bounded(batch_size).with_group(self.group)
        };

        let loader = DataLoader::new(dataset, spec)?;
        let mut state = self.state.lock();

        if is_eval {
            state.eval_loader = Some(loader);
        } else {
            state.train_loader = Some(loader);
        }

        Ok(())
    }

    fn pull(&self, is_eval: bool) -> Result<Batch> {
        self.state
            .lock()
            .loader(is_eval)?
            .next_batch()
            .ok_or(WorkerErr::Exhausted { is_eval })
    }

    fn run(&self, func: &str, input: Batch, step: StepInfo) -> Result<Batch> {
        let f = self.funcs.get(func)?.clone();
        self.state.lock().calls += 1;

        if step.is_final {
            debug!(replica = self.name.as_str(), step = step.step; "final call of the pass");
        }

        f(input, step)
    }

    fn mark_unit(&self, unit: usize) -> Result<()> {
        let mut state = self.state.lock();
        if state.decoder.is_none() {
            return Err(WorkerErr::Unsupported {
                op: "build_scheduler",
            });
        }

        let units = state.built_units.len();
        let slot = state
            .built_units
            .get_mut(unit)
            .ok_or(WorkerErr::UnitOutOfRange { unit, units })?;
        *slot = true;
        Ok(())
    }

    fn add_request_sync(&self, is_eval: bool) -> Result<()> {
        let mut state = self.state.lock();

        // Nothing is pulled unless the decoder can take it.
        state.decoder()?;
        let batch = state
            .loader(is_eval)?
            .next_batch()
            .ok_or(WorkerErr::Exhausted { is_eval })?;

        state.decoder()?.add(batch);
        Ok(())
    }
}

#[async_trait]
impl Replica for LocalReplica {
    fn name(&self) -> &str {
        &self.name
    }

    fn execution_units(&self) -> usize {
        self.units
    }

    async fn build_dataloader(
        &self,
        dataset: Dataset,
        batch_size: usize,
        is_eval: bool,
    ) -> RemoteResult<()> {
        info!(
            replica = self.name.as_str(), samples = dataset.len(), batch_size = batch_size;
            "building dataloader"
        );

        self.build_loader(dataset, batch_size, is_eval)
            .map_err(|e| e.into_remote(&self.name))
    }

    async fn next_batch(&self, is_eval: bool) -> RemoteResult<Batch> {
        self.pull(is_eval).map_err(|e| e.into_remote(&self.name))
    }

    async fn padding_config(&self) -> RemoteResult<PaddingConfig> {
        Ok(self.padding.clone())
    }

    async fn reset_eval_data_iter(&self) -> RemoteResult<()> {
        let mut state = self.state.lock();
        let loader = state.loader(true).map_err(|e| e.into_remote(&self.name))?;
        loader
            .reset()
            .map_err(|e| WorkerErr::from(e).into_remote(&self.name))
    }

    async fn call(&self, func: &str, input: Batch, step: StepInfo) -> RemoteResult<Batch> {
        self.run(func, input, step)
            .map_err(|e| e.into_remote(&self.name))
    }

    async fn build_scheduler(&self, unit: usize) -> RemoteResult<()> {
        debug!(replica = self.name.as_str(), unit = unit; "building decode scheduler");
        self.mark_unit(unit).map_err(|e| e.into_remote(&self.name))
    }

    async fn add_request(&self, is_eval: bool) -> RemoteResult<()> {
        self.add_request_sync(is_eval)
            .map_err(|e| e.into_remote(&self.name))
    }

    async fn schedule(&self) -> RemoteResult<Batch> {
        let mut state = self.state.lock();
        let decoder = state.decoder().map_err(|e| e.into_remote(&self.name))?;
        Ok(decoder.schedule())
    }

    async fn has_unfinished_requests(&self) -> RemoteResult<bool> {
        let mut state = self.state.lock();
        match state.decoder() {
            Ok(decoder) => Ok(decoder.has_unfinished()),
            Err(e) => Err(e.into_remote(&self.name)),
        }
    }

    async fn post_process_outputs(&self) -> RemoteResult<Batch> {
        let mut state = self.state.lock();
        let decoder = state.decoder().map_err(|e| e.into_remote(&self.name))?;
        Ok(decoder.take_outputs())
    }
}
