use async_trait::async_trait;

use crate::{
    PaddingConfig, RemoteErr,
    msg::{Batch, Dataset, StepInfo},
};

/// The result type of every remote replica call.
pub type RemoteResult<T> = std::result::Result<T, RemoteErr>;

/// A remote replica of a model stage, as seen from the scheduler.
///
/// The incremental decoding methods are only called on stages built as
/// `StageKind::Incremental`, the defaults reject them.
#[async_trait]
pub trait Replica: Send + Sync {
    /// Identifies the replica in logs and errors.
    fn name(&self) -> &str;

    /// The amount of execution units (processes) backing this replica.
    fn execution_units(&self) -> usize {
        1
    }

    /// Builds the replica's data loader, must complete before scheduling begins.
    async fn build_dataloader(
        &self,
        dataset: Dataset,
        batch_size: usize,
        is_eval: bool,
    ) -> RemoteResult<()>;

    /// Pulls the next batch produced by the replica's sampler.
    async fn next_batch(&self, is_eval: bool) -> RemoteResult<Batch>;

    /// The pad values this replica expects on its inputs.
    async fn padding_config(&self) -> RemoteResult<PaddingConfig>;

    /// Rewinds the evaluation sampler to the start of a pass.
    async fn reset_eval_data_iter(&self) -> RemoteResult<()>;

    /// Runs the registered function `func` over `input`.
    async fn call(&self, func: &str, input: Batch, step: StepInfo) -> RemoteResult<Batch>;

    /// Builds the decoding scheduler of one execution unit.
    async fn build_scheduler(&self, _unit: usize) -> RemoteResult<()> {
        Err(RemoteErr::unsupported(self.name(), "build_scheduler"))
    }

    /// Pulls the next batch and registers it as pending decode requests.
    async fn add_request(&self, _is_eval: bool) -> RemoteResult<()> {
        Err(RemoteErr::unsupported(self.name(), "add_request"))
    }

    /// Returns the next micro step of work for the in flight requests.
    async fn schedule(&self) -> RemoteResult<Batch> {
        Err(RemoteErr::unsupported(self.name(), "schedule"))
    }

    async fn has_unfinished_requests(&self) -> RemoteResult<bool> {
        Ok(false)
    }

    /// Collects the outputs of the finished requests.
    async fn post_process_outputs(&self) -> RemoteResult<Batch> {
        Err(RemoteErr::unsupported(self.name(), "post_process_outputs"))
    }
}
