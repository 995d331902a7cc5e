use std::{fmt, sync::Arc};

use comms::Replica;

use crate::{PipelineErr, Result};

/// How a stage produces its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// One atomic call per batch.
    #[default]
    Batch,
    /// Repeated partial steps driven by the replica's decode scheduler.
    Incremental,
}

/// A named model stage and its replicas.
#[derive(Clone)]
pub struct Stage {
    name: String,
    kind: StageKind,
    replicas: Vec<Arc<dyn Replica>>,
    eval_func: Option<String>,
}

impl Stage {
    /// Creates a new `Stage`.
    ///
    /// # Arguments
    /// * `name` - Unique name of the stage.
    /// * `kind` - Whether the stage decodes incrementally.
    /// * `replicas` - The stage's replicas, round robin assignment follows this order.
    ///
    /// # Returns
    /// A new stage without a registered eval function.
    pub fn new(name: impl Into<String>, kind: StageKind, replicas: Vec<Arc<dyn Replica>>) -> Self {
        Self {
            name: name.into(),
            kind,
            replicas,
            eval_func: None,
        }
    }

    /// Registers the function every evaluation step invokes on this stage.
    pub fn register_eval_func(mut self, func: impl Into<String>) -> Self {
        self.eval_func = Some(func.into());
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    #[inline]
    pub fn replicas(&self) -> &[Arc<dyn Replica>] {
        &self.replicas
    }

    #[inline]
    pub fn num_replicas(&self) -> usize {
        self.replicas.len()
    }

    /// The registered eval function.
    ///
    /// # Errors
    /// `MissingEvalFunc` if none was registered.
    pub fn eval_func(&self) -> Result<&str> {
        self.eval_func
            .as_deref()
            .ok_or_else(|| PipelineErr::MissingEvalFunc {
                stage: self.name.clone(),
            })
    }

    /// The replica serving `step` when assigning round robin.
    pub fn replica_for(&self, step: usize) -> &Arc<dyn Replica> {
        &self.replicas[step % self.replicas.len()]
    }

    /// Checks the stage can be scheduled.
    pub fn validate(&self) -> Result<()> {
        if self.replicas.is_empty() {
            return Err(PipelineErr::NoReplicas {
                stage: self.name.clone(),
            });
        }

        self.eval_func().map(|_| ())
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let replicas: Vec<_> = self.replicas.iter().map(|r| r.name()).collect();
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("replicas", &replicas)
            .field("eval_func", &self.eval_func)
            .finish()
    }
}

/// Whether the `step`-th of `num_batch` steps is one of the stage's final calls,
/// i.e. one of the last `replicas` steps.
#[inline]
pub fn is_final_step(step: usize, num_batch: usize, replicas: usize) -> bool {
    step >= num_batch.saturating_sub(replicas)
}
