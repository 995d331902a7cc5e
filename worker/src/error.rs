use std::{error::Error, fmt};

use comms::RemoteErr;
use sampler::SamplerErr;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Replica runtime failures.
#[derive(Debug)]
pub enum WorkerErr {
    Sampler(SamplerErr),
    LoaderNotBuilt { is_eval: bool },
    Exhausted { is_eval: bool },
    UnknownFunc { func: String },
    SchedulerNotBuilt { built: usize, units: usize },
    UnitOutOfRange { unit: usize, units: usize },
    Unsupported { op: &'static str },
    Func(String),
}

impl WorkerErr {
    /// A failure reported by a registered stage function.
    pub fn func(msg: impl Into<String>) -> Self {
        Self::Func(msg.into())
    }
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = |is_eval: &bool| if *is_eval { "eval" } else { "train" };

        match self {
            WorkerErr::Sampler(e) => write!(f, "sampler error: {e}"),
            WorkerErr::LoaderNotBuilt { is_eval } => {
                write!(f, "the {} dataloader was not built", kind(is_eval))
            }
            WorkerErr::Exhausted { is_eval } => {
                write!(f, "the {} dataloader is exhausted", kind(is_eval))
            }
            WorkerErr::UnknownFunc { func } => write!(f, "no function registered as {func}"),
            WorkerErr::SchedulerNotBuilt { built, units } => write!(
                f,
                "the decode scheduler was built on {built} of {units} execution units"
            ),
            WorkerErr::UnitOutOfRange { unit, units } => {
                write!(f, "execution unit {unit} out of range, there are {units}")
            }
            WorkerErr::Unsupported { op } => {
                write!(f, "{op} requires an incremental decoding replica")
            }
            WorkerErr::Func(msg) => f.write_str(msg),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Sampler(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SamplerErr> for WorkerErr {
    fn from(value: SamplerErr) -> Self {
        Self::Sampler(value)
    }
}

impl WorkerErr {
    /// Boundary conversion for the remote replica contract.
    pub fn into_remote(self, origin: &str) -> RemoteErr {
        RemoteErr::new(origin, self.to_string())
    }
}
