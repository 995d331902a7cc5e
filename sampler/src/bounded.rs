use log::warn;

use crate::{DataParallelGroup, Result, SamplerErr, partition::rank_range};

/// Single pass sampler over `[consumed_samples..total_samples)`.
///
/// Every yielded list is this rank's slice of a block of
/// `micro_batch_size * group.size()` consecutive indices.
#[derive(Debug, Clone)]
pub struct BoundedSampler {
    total_samples: usize,
    consumed_samples: usize,
    micro_batch_size: usize,
    group: DataParallelGroup,
    drop_last: bool,
}

impl BoundedSampler {
    /// Creates a new `BoundedSampler`.
    ///
    /// # Arguments
    /// * `total_samples` - The size of the dataset.
    /// * `consumed_samples` - Offset of the first index to yield.
    /// * `micro_batch_size` - The amount of indices each rank receives per step.
    /// * `group` - The data parallel group member this sampler belongs to.
    /// * `drop_last` - Whether to silently discard the trailing partial block.
    ///
    /// # Returns
    /// A new `BoundedSampler` or the violated precondition.
    pub fn new(
        total_samples: usize,
        consumed_samples: usize,
        micro_batch_size: usize,
        group: DataParallelGroup,
        drop_last: bool,
    ) -> Result<Self> {
        if total_samples == 0 {
            return Err(SamplerErr::NoSamples);
        }

        if consumed_samples >= total_samples {
            return Err(SamplerErr::NoSamplesLeft {
                consumed: consumed_samples,
                total: total_samples,
            });
        }

        if micro_batch_size == 0 {
            return Err(SamplerErr::ZeroMicroBatch);
        }

        Ok(Self {
            total_samples,
            consumed_samples,
            micro_batch_size,
            group,
            drop_last,
        })
    }

    /// The size of the underlying dataset.
    #[inline]
    pub fn len(&self) -> usize {
        self.total_samples
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total_samples == 0
    }

    #[inline]
    pub fn consumed_samples(&self) -> usize {
        self.consumed_samples
    }
}

impl IntoIterator for BoundedSampler {
    type Item = Vec<usize>;
    type IntoIter = BoundedIter;

    fn into_iter(self) -> Self::IntoIter {
        BoundedIter {
            cursor: self.consumed_samples,
            sampler: self,
            done: false,
        }
    }
}

/// Consuming iterator of a `BoundedSampler`.
#[derive(Debug, Clone)]
pub struct BoundedIter {
    sampler: BoundedSampler,
    cursor: usize,
    done: bool,
}

impl BoundedIter {
    /// Global consumption offset after the blocks yielded so far.
    #[inline]
    pub fn consumed_samples(&self) -> usize {
        self.cursor
    }
}

impl Iterator for BoundedIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let BoundedSampler {
            total_samples,
            micro_batch_size,
            group,
            drop_last,
            ..
        } = self.sampler;

        let block = micro_batch_size * group.size();
        let remaining = total_samples - self.cursor;

        if remaining >= block {
            let start = self.cursor + group.rank() * micro_batch_size;
            self.cursor += block;
            return Some((start..start + micro_batch_size).collect());
        }

        self.done = true;
        if remaining == 0 || drop_last {
            return None;
        }

        let share = rank_range(remaining, group);
        let base = self.cursor;
        self.cursor = total_samples;

        if share.is_empty() {
            warn!(rank = group.rank(), remaining = remaining; "empty share of the last partial block");
        }

        Some((base + share.start..base + share.end).collect())
    }
}
