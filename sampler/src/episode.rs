use std::{iter::Chain, ops::Range};

use crate::{DataParallelGroup, Result, SamplerErr, partition::rank_range};

/// Position inside the current episode of a cyclic index stream.
///
/// Invariant: `offset < sample_per_episode` between ticks, the offset
/// returns to 0 exactly on the tick that completes an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeClock {
    offset: usize,
    sample_per_episode: usize,
}

impl EpisodeClock {
    /// Creates a clock at the start of an episode.
    pub fn new(sample_per_episode: usize) -> Result<Self> {
        Self::with_offset(0, sample_per_episode)
    }

    /// Creates a clock `offset` samples into an episode.
    ///
    /// An offset equal to `sample_per_episode` is a completed episode and
    /// starts over at 0, anything above it is an inconsistent state.
    pub fn with_offset(offset: usize, sample_per_episode: usize) -> Result<Self> {
        if sample_per_episode == 0 {
            return Err(SamplerErr::ZeroSamplePerEpisode);
        }

        if offset > sample_per_episode {
            return Err(SamplerErr::EpisodeOverflow {
                offset,
                sample_per_episode,
            });
        }

        Ok(Self {
            offset: offset % sample_per_episode,
            sample_per_episode,
        })
    }

    /// Accounts for one more sample.
    ///
    /// # Returns
    /// `true` if this sample completes the episode, the clock is then back at 0.
    pub fn tick(&mut self) -> bool {
        self.offset += 1;
        debug_assert!(self.offset <= self.sample_per_episode);

        if self.offset == self.sample_per_episode {
            self.offset = 0;
            return true;
        }

        false
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn sample_per_episode(&self) -> usize {
        self.sample_per_episode
    }

    /// Samples left until the current episode completes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.sample_per_episode - self.offset
    }
}

/// Whether an accumulating block must be flushed.
///
/// Episode boundaries take precedence over micro-batch alignment, a block is
/// flushed as soon as either one is reached.
#[inline]
pub fn flush_due(block_len: usize, capacity: usize, episode_closed: bool) -> bool {
    block_len >= capacity || episode_closed
}

/// Cyclic sampler that segments its index stream into fixed length episodes.
#[derive(Debug, Clone)]
pub struct EpisodeSampler {
    total_samples: usize,
    consumed_samples: usize,
    micro_batch_size: usize,
    group: DataParallelGroup,
    sample_per_episode: usize,
    drop_last: bool,
}

impl EpisodeSampler {
    /// Creates a new `EpisodeSampler`.
    ///
    /// # Arguments
    /// * `total_samples` - The size of the dataset.
    /// * `consumed_samples` - Saved consumption offset, wrapped around `total_samples`.
    /// * `micro_batch_size` - The amount of indices each rank receives per full block.
    /// * `group` - The data parallel group member this sampler belongs to.
    /// * `sample_per_episode` - The length of an episode.
    /// * `drop_last` - Whether to discard the leftover block instead of padding its episode.
    ///
    /// # Returns
    /// A new `EpisodeSampler` or the violated precondition.
    pub fn new(
        total_samples: usize,
        consumed_samples: usize,
        micro_batch_size: usize,
        group: DataParallelGroup,
        sample_per_episode: usize,
        drop_last: bool,
    ) -> Result<Self> {
        if total_samples == 0 {
            return Err(SamplerErr::NoSamples);
        }

        if micro_batch_size == 0 {
            return Err(SamplerErr::ZeroMicroBatch);
        }

        if sample_per_episode == 0 {
            return Err(SamplerErr::ZeroSamplePerEpisode);
        }

        Ok(Self {
            total_samples,
            consumed_samples: consumed_samples % total_samples,
            micro_batch_size,
            group,
            sample_per_episode,
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

impl IntoIterator for EpisodeSampler {
    type Item = Vec<usize>;
    type IntoIter = EpisodeIter;

    fn into_iter(self) -> Self::IntoIter {
        let start = self.consumed_samples;
        let capacity = self.micro_batch_size * self.group.size();

        EpisodeIter {
            lap: (start..self.total_samples).chain(0..start),
            padding: None,
            block: Vec::with_capacity(capacity),
            capacity,
            clock: EpisodeClock {
                offset: 0,
                sample_per_episode: self.sample_per_episode,
            },
            lap_consumed: 0,
            sampler: self,
        }
    }
}

/// Iterator over one cyclic lap of an `EpisodeSampler`.
#[derive(Debug, Clone)]
pub struct EpisodeIter {
    sampler: EpisodeSampler,
    lap: Chain<Range<usize>, Range<usize>>,
    padding: Option<Range<usize>>,
    block: Vec<usize>,
    capacity: usize,
    clock: EpisodeClock,
    lap_consumed: usize,
}

impl EpisodeIter {
    /// Position inside the current episode.
    #[inline]
    pub fn episode_offset(&self) -> usize {
        self.clock.offset()
    }

    /// Global consumption offset, wrapped around the dataset size.
    pub fn consumed_samples(&self) -> usize {
        (self.sampler.consumed_samples + self.lap_consumed) % self.sampler.total_samples
    }

    fn next_index(&mut self) -> Option<usize> {
        if let Some(idx) = self.lap.next() {
            self.lap_consumed += 1;
            return Some(idx);
        }

        if self.padding.is_none() {
            if self.block.is_empty() || self.sampler.drop_last {
                return None;
            }

            // Synthetic indices complete the open episode.
            self.padding = Some(0..self.clock.remaining());
        }

        self.padding.as_mut()?.next()
    }

    fn flush(&mut self) -> Vec<usize> {
        let share = rank_range(self.block.len(), self.sampler.group);
        let batch = self.block[share].to_vec();
        self.block.clear();
        batch
    }
}

impl Iterator for EpisodeIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(idx) = self.next_index() {
            self.block.push(idx);
            let closed = self.clock.tick();

            if flush_due(self.block.len(), self.capacity, closed) {
                return Some(self.flush());
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(rank: usize, size: usize) -> DataParallelGroup {
        DataParallelGroup::new(rank, size).unwrap()
    }

    #[test]
    fn episode_boundaries_force_early_flush() {
        let sampler = EpisodeSampler::new(10, 0, 2, group(0, 1), 3, false).unwrap();
        let batches: Vec<_> = sampler.into_iter().collect();

        assert_eq!(
            batches,
            vec![
                vec![0, 1],
                vec![2],
                vec![3, 4],
                vec![5],
                vec![6, 7],
                vec![8],
                vec![9, 0],
                vec![1],
            ]
        );
    }

    #[test]
    fn drop_last_skips_episode_padding() {
        let sampler = EpisodeSampler::new(10, 0, 2, group(0, 1), 3, true).unwrap();
        let batches: Vec<_> = sampler.into_iter().collect();
        assert_eq!(batches.last(), Some(&vec![8]));
        assert_eq!(batches.len(), 6);
    }

    #[test]
    fn lap_wraps_around_consumed_offset() {
        // 23 % 10 == 3
        let sampler = EpisodeSampler::new(10, 23, 5, group(0, 1), 10, false).unwrap();
        assert_eq!(sampler.consumed_samples(), 3);

        let batches: Vec<_> = sampler.into_iter().collect();
        assert_eq!(
            batches,
            vec![vec![3, 4, 5, 6, 7], vec![8, 9, 0, 1, 2]]
        );
    }

    #[test]
    fn blocks_are_sliced_per_rank() {
        let r0: Vec<_> = EpisodeSampler::new(6, 0, 2, group(0, 2), 3, false)
            .unwrap()
            .into_iter()
            .collect();
        let r1: Vec<_> = EpisodeSampler::new(6, 0, 2, group(1, 2), 3, false)
            .unwrap()
            .into_iter()
            .collect();

        // blocks: [0,1,2] [3,4,5], both cut by the episode boundary
        assert_eq!(r0, vec![vec![0, 1], vec![3, 4]]);
        assert_eq!(r1, vec![vec![2], vec![5]]);
    }

    #[test]
    fn cumulative_length_never_exceeds_episode() {
        for per_episode in 1..9 {
            for micro_batch in 1..6 {
                let sampler =
                    EpisodeSampler::new(13, 4, micro_batch, group(0, 1), per_episode, false)
                        .unwrap();
                let mut iter = sampler.into_iter();
                let mut cumulative = 0;

                while let Some(batch) = iter.next() {
                    cumulative += batch.len();
                    assert!(cumulative <= per_episode);

                    if iter.episode_offset() == 0 {
                        assert_eq!(cumulative, per_episode);
                        cumulative = 0;
                    }
                }
            }
        }
    }

    #[test]
    fn clock_resets_exactly_at_episode_end() {
        let mut clock = EpisodeClock::new(3).unwrap();
        assert!(!clock.tick());
        assert!(!clock.tick());
        assert_eq!(clock.remaining(), 1);
        assert!(clock.tick());
        assert_eq!(clock.offset(), 0);
    }

    #[test]
    fn clock_rejects_inconsistent_offset() {
        assert_eq!(
            EpisodeClock::with_offset(4, 3),
            Err(SamplerErr::EpisodeOverflow {
                offset: 4,
                sample_per_episode: 3
            })
        );
        assert_eq!(EpisodeClock::with_offset(3, 3).unwrap().offset(), 0);
        assert_eq!(EpisodeClock::new(0), Err(SamplerErr::ZeroSamplePerEpisode));
    }

    #[test]
    fn flush_due_on_either_boundary() {
        assert!(flush_due(4, 4, false));
        assert!(flush_due(1, 4, true));
        assert!(!flush_due(3, 4, false));
    }
}
