use std::{collections::HashSet, num::NonZeroUsize, sync::Arc};

use comms::{Dataset, Envelope, PaddingConfig, Queue, StepInfo};
use log::{debug, info};
use parking_lot::Mutex;

use crate::{
    PipelineErr, Result, StageKind,
    broker::{self, Pending, call_remote},
    merger::{self, PendingRecord, ResultRecord, StageEnvelope},
    stage::{Stage, is_final_step},
};

/// Whether the stages run lock-stepped.
///
/// They don't when some colocation group strictly contains all of them. A group
/// holding exactly the participating stages keeps them lock-stepped.
pub fn is_colocated<S: AsRef<str>>(stage_names: &[&str], colocation: &[Vec<S>]) -> bool {
    let names: HashSet<&str> = stage_names.iter().copied().collect();

    !colocation.iter().any(|group| {
        let group: HashSet<&str> = group.iter().map(AsRef::as_ref).collect();
        group.len() > 1 && group.len() > names.len() && group.is_superset(&names)
    })
}

/// How a stage step decides the `is_final` flag.
#[derive(Debug, Clone, Copy)]
enum StepMode {
    Batch { num_batch: usize },
    Incremental,
}

impl StepMode {
    fn is_final(self, step: usize, replicas: usize) -> bool {
        match self {
            Self::Batch { num_batch } => is_final_step(step, num_batch, replicas),
            Self::Incremental => false,
        }
    }
}

/// The queues of a single pass.
struct PassContext {
    data_queue: Queue<StageEnvelope>,
    /// Per stage output queues, the first one feeds the next stage and the last
    /// one collects results.
    out_queues: Vec<Vec<Queue<StageEnvelope>>>,
    /// The latest data query sent to each leading replica.
    last_query: Mutex<Vec<Option<Pending>>>,
}

impl PassContext {
    fn new(num_stages: usize, num_providers: usize) -> Self {
        let out_queues = (0..num_stages)
            .map(|k| {
                let n = if k + 1 < num_stages { 2 } else { 1 };
                (0..n).map(|_| Queue::new()).collect()
            })
            .collect();

        Self {
            data_queue: Queue::new(),
            out_queues,
            last_query: Mutex::new(vec![None; num_providers]),
        }
    }

    fn in_queue(&self, stage: usize) -> &Queue<StageEnvelope> {
        match stage {
            0 => &self.data_queue,
            k => &self.out_queues[k - 1][0],
        }
    }

    fn result_queues(&self, return_last: bool) -> Vec<Queue<StageEnvelope>> {
        let per_stage = self.out_queues.iter().filter_map(|queues| queues.last().cloned());

        if return_last {
            per_stage.last().into_iter().collect()
        } else {
            per_stage.collect()
        }
    }
}

/// Drives batches through the stages of a pipeline.
pub struct PipelineScheduler {
    stages: Vec<Stage>,
    padding: Arc<PaddingConfig>,
    colocated: bool,
}

impl PipelineScheduler {
    /// Validates the stages and prepares their replicas for evaluation.
    ///
    /// Nothing is dispatched unless every stage is valid.
    ///
    /// # Arguments
    /// * `stages` - The pipeline, in order.
    /// * `dataset` - Shared by every leading stage replica.
    /// * `batch_size` - Samples per evaluation batch.
    /// * `colocation` - Groups of stage names sharing the same devices.
    ///
    /// # Errors
    /// A `PipelineErr` if the stages are invalid or any preparation call fails.
    pub async fn setup(
        stages: &[Stage],
        dataset: Dataset,
        batch_size: NonZeroUsize,
        colocation: &[Vec<String>],
    ) -> Result<Self> {
        let Some(leading) = stages.first() else {
            return Err(PipelineErr::NoStages);
        };

        for stage in stages {
            stage.validate()?;
        }

        if dataset.is_empty() {
            return Err(PipelineErr::EmptyDataset);
        }

        let refs = leading
            .replicas()
            .iter()
            .map(|replica| {
                let dataset = Arc::clone(&dataset);
                call_remote(replica, move |r| async move {
                    r.build_dataloader(dataset, batch_size.get(), true).await
                })
            })
            .collect();
        broker::wait(refs, "build_dataloader").await?;

        if leading.kind() == StageKind::Incremental {
            let refs = leading
                .replicas()
                .iter()
                .flat_map(|replica| {
                    (0..replica.execution_units()).map(move |unit| {
                        call_remote(replica, move |r| async move { r.build_scheduler(unit).await })
                    })
                })
                .collect();
            broker::wait(refs, "build_scheduler").await?;
        }

        let refs = stages
            .iter()
            .map(|stage| {
                call_remote(&stage.replicas()[0], |r| async move { r.padding_config().await })
            })
            .collect();

        let mut padding = PaddingConfig::new();
        for config in broker::get(refs).await? {
            padding.merge(config);
        }

        let names: Vec<_> = stages.iter().map(Stage::name).collect();
        let colocated = is_colocated(&names, colocation);

        info!(
            stages = stages.len(),
            colocated = colocated,
            padded_fields = padding.len();
            "pipeline ready"
        );

        Ok(Self {
            stages: stages.to_vec(),
            padding: Arc::new(padding),
            colocated,
        })
    }

    #[inline]
    pub fn is_colocated(&self) -> bool {
        self.colocated
    }

    #[inline]
    pub fn padding(&self) -> &PaddingConfig {
        &self.padding
    }

    /// Runs `num_batch` batches through the pipeline.
    ///
    /// # Arguments
    /// * `num_batch` - Batches in the pass.
    /// * `return_last` - Whether to keep only the last stage's outputs.
    ///
    /// # Returns
    /// One record per batch in batch order, or per leading replica and batch
    /// when the leading stage decodes incrementally.
    pub async fn run_pass(&self, num_batch: usize, return_last: bool) -> Result<Vec<ResultRecord>> {
        let leading = &self.stages[0];

        let refs = leading
            .replicas()
            .iter()
            .map(|replica| call_remote(replica, |r| async move { r.reset_eval_data_iter().await }))
            .collect();
        broker::get(refs).await?;

        let ctx = PassContext::new(self.stages.len(), leading.num_replicas());

        match (leading.kind(), self.colocated) {
            (StageKind::Incremental, _) => self.incremental_pass(&ctx, num_batch, return_last).await,
            (StageKind::Batch, true) => self.colocated_pass(&ctx, num_batch, return_last).await,
            (StageKind::Batch, false) => self.pipelined_pass(&ctx, num_batch, return_last).await,
        }
    }

    /// Every batch through a stage before the next stage starts.
    async fn colocated_pass(
        &self,
        ctx: &PassContext,
        num_batch: usize,
        return_last: bool,
    ) -> Result<Vec<ResultRecord>> {
        for mb in 0..num_batch {
            self.enqueue_query(ctx, mb);
        }

        let mode = StepMode::Batch { num_batch };
        for k in 0..self.stages.len() {
            let mut outputs = Vec::with_capacity(num_batch);
            for step in 0..num_batch {
                outputs.push(self.stage_step(ctx, k, step, mode, None).await?);
            }

            broker::wait(outputs, self.stages[k].name()).await?;
        }

        let records = merger::merge_all(&ctx.result_queues(return_last))?;
        merger::resolve(records).await
    }

    /// Each batch through every stage before the next batch is fetched.
    async fn pipelined_pass(
        &self,
        ctx: &PassContext,
        num_batch: usize,
        return_last: bool,
    ) -> Result<Vec<ResultRecord>> {
        let mode = StepMode::Batch { num_batch };
        let mut records = Vec::with_capacity(num_batch);

        for mb in 0..num_batch {
            self.enqueue_query(ctx, mb);
            records.push(self.eval_step(ctx, mb, mode, None, return_last).await?);
        }

        merger::resolve(records).await
    }

    async fn incremental_pass(
        &self,
        ctx: &PassContext,
        num_batch: usize,
        return_last: bool,
    ) -> Result<Vec<ResultRecord>> {
        let leading = &self.stages[0];
        let mut results = Vec::new();

        for mb in 0..num_batch {
            let provider = leading.replica_for(mb);
            call_remote(provider, |r| async move { r.add_request(true).await }).await?;

            let mut steps = 0;
            while self.has_unfinished_requests().await? {
                let mut records = Vec::with_capacity(leading.num_replicas());

                for (slot, replica) in leading.replicas().iter().enumerate() {
                    let query = call_remote(replica, |r| async move { r.schedule().await });
                    ctx.data_queue.put(Envelope::encode(mb, query));

                    records.push(
                        self.eval_step(ctx, mb, StepMode::Incremental, Some(slot), return_last)
                            .await?,
                    );
                }

                merger::resolve(records).await?;
                steps += 1;
            }

            debug!(batch_id = mb, steps = steps; "requests finished");

            let refs = leading
                .replicas()
                .iter()
                .map(|replica| {
                    call_remote(replica, |r| async move { r.post_process_outputs().await })
                })
                .collect();

            for outputs in broker::wait(refs, "post_process_outputs").await? {
                if !outputs.is_empty() {
                    results.push(ResultRecord {
                        batch_id: mb,
                        outputs: vec![outputs],
                    });
                }
            }
        }

        Ok(results)
    }

    async fn has_unfinished_requests(&self) -> Result<bool> {
        let refs = self.stages[0]
            .replicas()
            .iter()
            .map(|replica| {
                call_remote(replica, |r| async move { r.has_unfinished_requests().await })
            })
            .collect();

        Ok(broker::get(refs).await?.into_iter().any(|unfinished| unfinished))
    }

    /// Asks the cyclic data provider for batch `mb` to produce it.
    ///
    /// Queries to the same provider are served in submission order.
    fn enqueue_query(&self, ctx: &PassContext, mb: usize) {
        let leading = &self.stages[0];
        let slot = mb % leading.num_replicas();

        let mut last_query = ctx.last_query.lock();
        let previous = last_query[slot].take();

        let query = call_remote(leading.replica_for(mb), |r| async move {
            if let Some(previous) = previous {
                // a failed query is reported by its own batch
                let _ = previous.await;
            }
            r.next_batch(true).await
        });

        last_query[slot] = Some(query.clone());
        ctx.data_queue.put(Envelope::encode(mb, query));
    }

    /// Steps batch `mb` through every stage and merges its results.
    async fn eval_step(
        &self,
        ctx: &PassContext,
        mb: usize,
        mode: StepMode,
        pinned: Option<usize>,
        return_last: bool,
    ) -> Result<PendingRecord> {
        for k in 0..self.stages.len() {
            let pin = if k == 0 { pinned } else { None };
            self.stage_step(ctx, k, mb, mode, pin).await?;
        }

        merger::merge_one(&ctx.result_queues(return_last))?
            .ok_or(PipelineErr::ResultsMissing { batch_id: mb })
    }

    /// Pops one input of stage `k` and dispatches its eval function on it.
    ///
    /// The replica is picked round robin by `step` unless `pinned`.
    async fn stage_step(
        &self,
        ctx: &PassContext,
        k: usize,
        step: usize,
        mode: StepMode,
        pinned: Option<usize>,
    ) -> Result<Pending> {
        let stage = &self.stages[k];
        let func = stage.eval_func()?.to_string();
        let replica = stage.replica_for(pinned.unwrap_or(step));

        let (batch_id, input) = ctx.in_queue(k).get().await.decode();

        let info = StepInfo {
            step,
            is_final: mode.is_final(step, stage.num_replicas()),
            is_eval: true,
        };

        debug!(
            stage = stage.name(),
            replica = replica.name(),
            batch_id = batch_id,
            is_final = info.is_final;
            "dispatching {func}"
        );

        let padding = Arc::clone(&self.padding);
        let output = call_remote(replica, move |r| async move {
            let mut batch = input.await?;
            padding.pad(&mut batch);
            r.call(&func, batch, info).await
        });

        for queue in &ctx.out_queues[k] {
            queue.put(Envelope::encode(batch_id, output.clone()));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_superset_group_disables_lock_step() {
        let names = ["policy", "reward"];

        assert!(is_colocated::<String>(&names, &[]));
        assert!(!is_colocated(&names, &[vec!["policy", "reward", "trainer"]]));
        assert!(is_colocated(&names, &[vec!["policy", "reward"]]));
        assert!(is_colocated(&names, &[vec!["policy", "trainer"]]));
        // single stage groups never count
        assert!(is_colocated(&["policy"], &[vec!["policy"]]));
    }

    #[test]
    fn only_the_last_stage_is_merged_when_asked() {
        let ctx = PassContext::new(3, 1);
        assert_eq!(ctx.out_queues.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        assert_eq!(ctx.result_queues(true).len(), 1);
        assert_eq!(ctx.result_queues(false).len(), 3);
    }
}
