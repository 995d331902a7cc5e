mod error;
pub mod msg;
mod padding;
mod queue;
mod replica;

pub use error::RemoteErr;
pub use msg::{Batch, Dataset, Envelope, Sample, StepInfo};
pub use padding::PaddingConfig;
pub use queue::Queue;
pub use replica::{RemoteResult, Replica};
