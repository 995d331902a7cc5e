use std::fmt;

use comms::RemoteErr;

/// The orchestrator module's result type.
pub type Result<T> = std::result::Result<T, PipelineErr>;

/// All errors that can occur while scheduling a pipeline pass.
#[derive(Debug)]
pub enum PipelineErr {
    /// The pipeline has no stages.
    NoStages,
    /// A stage was built without replicas.
    NoReplicas { stage: String },
    /// A stage has no registered eval function.
    MissingEvalFunc { stage: String },
    /// The dataset is empty or was never set.
    EmptyDataset,
    /// Result queues went out of step, the pass is in an inconsistent state.
    BatchIdMismatch { expected: usize, got: usize },
    /// A stage produced no result for a batch it was stepped with.
    ResultsMissing { batch_id: usize },
    /// `eval` was called before `setup`.
    NotSetUp,
    /// A remote call failed, the underlying error is kept unchanged.
    Remote(RemoteErr),
    /// Invalid configuration, caught before any work starts.
    Config(String),
    /// An underlying I/O error.
    Io(std::io::Error),
}

impl fmt::Display for PipelineErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStages => write!(f, "the pipeline has no stages"),
            Self::NoReplicas { stage } => write!(f, "stage {stage} has no replicas"),
            Self::MissingEvalFunc { stage } => write!(
                f,
                "call register_eval_func for {stage} before initializing the evaluator"
            ),
            Self::EmptyDataset => write!(f, "dataset is not set or empty"),
            Self::BatchIdMismatch { expected, got } => {
                write!(f, "result queues out of step: expected batch {expected}, got {got}")
            }
            Self::ResultsMissing { batch_id } => write!(f, "no results for batch {batch_id}"),
            Self::NotSetUp => write!(f, "the evaluator must be set up before eval"),
            Self::Remote(e) => write!(f, "remote error: {e}"),
            Self::Config(msg) => write!(f, "invalid config: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for PipelineErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Remote(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RemoteErr> for PipelineErr {
    fn from(e: RemoteErr) -> Self {
        Self::Remote(e)
    }
}

impl From<std::io::Error> for PipelineErr {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for PipelineErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}
