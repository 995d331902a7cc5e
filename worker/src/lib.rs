pub mod builder;
mod decode;
pub mod error;
mod registry;
mod replica;

pub use builder::ReplicaBuilder;
pub use decode::DecodeScheduler;
pub use error::{Result, WorkerErr};
pub use registry::{FuncRegistry, StageFn};
pub use replica::LocalReplica;
