//! Deterministic, resumable partitioning of a dataset across data parallel ranks.

mod bounded;
mod dataloader;
mod episode;
mod error;
pub mod partition;

pub use bounded::{BoundedIter, BoundedSampler};
pub use dataloader::{DataLoader, SamplerKind, SamplerSpec};
pub use episode::{EpisodeClock, EpisodeIter, EpisodeSampler, flush_due};
pub use error::{Result, SamplerErr};
pub use partition::{DataParallelGroup, split_index};
