use std::sync::Arc;

use crate::{
    BoundedSampler, DataParallelGroup, EpisodeSampler, Result,
    bounded::BoundedIter,
    episode::EpisodeIter,
};

/// Which sampler drives a `DataLoader`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerKind {
    Bounded,
    Episodic { sample_per_episode: usize },
}

/// Everything needed to (re)build a loader's sampler.
#[derive(Debug, Clone, Copy)]
pub struct SamplerSpec {
    pub kind: SamplerKind,
    pub consumed_samples: usize,
    pub micro_batch_size: usize,
    pub group: DataParallelGroup,
    pub drop_last: bool,
}

impl SamplerSpec {
    /// A bounded, single rank spec starting at the beginning of the dataset.
    pub fn bounded(micro_batch_size: usize) -> Self {
        Self {
            kind: SamplerKind::Bounded,
            consumed_samples: 0,
            micro_batch_size,
            group: DataParallelGroup::single(),
            drop_last: false,
        }
    }

    pub fn with_group(mut self, group: DataParallelGroup) -> Self {
        self.group = group;
        self
    }
}

#[derive(Debug, Clone)]
enum Indices {
    Bounded(BoundedIter),
    Episodic(EpisodeIter),
}

impl Indices {
    fn build(total: usize, spec: &SamplerSpec) -> Result<Self> {
        let indices = match spec.kind {
            SamplerKind::Bounded => Indices::Bounded(
                BoundedSampler::new(
                    total,
                    spec.consumed_samples,
                    spec.micro_batch_size,
                    spec.group,
                    spec.drop_last,
                )?
                .into_iter(),
            ),
            SamplerKind::Episodic { sample_per_episode } => Indices::Episodic(
                EpisodeSampler::new(
                    total,
                    spec.consumed_samples,
                    spec.micro_batch_size,
                    spec.group,
                    sample_per_episode,
                    spec.drop_last,
                )?
                .into_iter(),
            ),
        };

        Ok(indices)
    }

    fn next(&mut self) -> Option<Vec<usize>> {
        match self {
            Indices::Bounded(iter) => iter.next(),
            Indices::Episodic(iter) => iter.next(),
        }
    }

    fn consumed_samples(&self) -> usize {
        match self {
            Indices::Bounded(iter) => iter.consumed_samples(),
            Indices::Episodic(iter) => iter.consumed_samples(),
        }
    }
}

/// Rank-aware loader producing owned batches of samples from a shared dataset.
#[derive(Debug, Clone)]
pub struct DataLoader<T> {
    dataset: Arc<[T]>,
    spec: SamplerSpec,
    indices: Indices,
}

impl<T: Clone> DataLoader<T> {
    /// Creates a new `DataLoader`.
    ///
    /// # Arguments
    /// * `dataset` - The shared, read only dataset.
    /// * `spec` - How to sample it.
    ///
    /// # Returns
    /// The loader or the sampler's violated precondition.
    pub fn new(dataset: Arc<[T]>, spec: SamplerSpec) -> Result<Self> {
        let indices = Indices::build(dataset.len(), &spec)?;
        Ok(Self {
            dataset,
            spec,
            indices,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    #[inline]
    pub fn spec(&self) -> &SamplerSpec {
        &self.spec
    }

    /// Global consumption offset, what to save for exact resumption.
    #[inline]
    pub fn consumed_samples(&self) -> usize {
        self.indices.consumed_samples()
    }

    /// Rewinds to the offset the loader was built with.
    pub fn reset(&mut self) -> Result<()> {
        self.indices = Indices::build(self.dataset.len(), &self.spec)?;
        Ok(())
    }

    /// Returns the next batch for this rank, or None if exhausted.
    ///
    /// Episode padding may produce indices past the dataset end, these wrap around.
    pub fn next_batch(&mut self) -> Option<Vec<T>> {
        let total = self.dataset.len();
        let indices = self.indices.next()?;

        Some(
            indices
                .into_iter()
                .map(|idx| self.dataset[idx % total].clone())
                .collect(),
        )
    }
}
