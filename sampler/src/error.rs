use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire sampler module.
pub type Result<T> = std::result::Result<T, SamplerErr>;

/// Precondition and consistency failures raised while building a sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerErr {
    NoSamples,
    NoSamplesLeft { consumed: usize, total: usize },
    ZeroMicroBatch,
    ZeroGroupSize,
    RankOutOfRange { rank: usize, size: usize },
    ZeroSamplePerEpisode,
    EpisodeOverflow { offset: usize, sample_per_episode: usize },
}

impl Display for SamplerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplerErr::NoSamples => write!(f, "no sample to consume: total_samples is 0"),
            SamplerErr::NoSamplesLeft { consumed, total } => {
                write!(f, "no samples left to consume: consumed {consumed} of {total}")
            }
            SamplerErr::ZeroMicroBatch => write!(f, "micro_batch_size must be > 0"),
            SamplerErr::ZeroGroupSize => write!(f, "data parallel size must be > 0"),
            SamplerErr::RankOutOfRange { rank, size } => write!(
                f,
                "data parallel rank should be smaller than data parallel size: {rank}, {size}"
            ),
            SamplerErr::ZeroSamplePerEpisode => write!(f, "sample_per_episode must be > 0"),
            SamplerErr::EpisodeOverflow {
                offset,
                sample_per_episode,
            } => write!(
                f,
                "episode offset {offset} exceeds sample_per_episode {sample_per_episode}"
            ),
        }
    }
}

impl Error for SamplerErr {}
