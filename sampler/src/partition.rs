use std::ops::Range;

use crate::{Result, SamplerErr};

/// Splits `[0..len)` into `num_splits` contiguous ranges, one per rank.
///
/// Properties:
/// - Ranges are sorted by rank, disjoint and cover `[0..len)`.
/// - Sizes differ by at most 1, the first `len % num_splits` ranks take the remainder.
///
/// # Panics
/// If `num_splits` is 0.
pub fn split_index(len: usize, num_splits: usize) -> Vec<Range<usize>> {
    assert!(num_splits > 0, "num_splits must be > 0");

    let base = len / num_splits;
    let rem = len % num_splits;

    let mut start = 0;
    (0..num_splits)
        .map(|rank| {
            let end = start + base + usize::from(rank < rem);
            let range = start..end;
            start = end;
            range
        })
        .collect()
}

/// Returns the range of `[0..len)` owned by `group.rank()`.
pub fn rank_range(len: usize, group: DataParallelGroup) -> Range<usize> {
    let base = len / group.size;
    let rem = len % group.size;

    let start = group.rank * base + group.rank.min(rem);
    start..start + base + usize::from(group.rank < rem)
}

/// A member of a data parallel group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataParallelGroup {
    rank: usize,
    size: usize,
}

impl DataParallelGroup {
    /// Creates a new `DataParallelGroup`.
    ///
    /// # Arguments
    /// * `rank` - This member's rank, must be smaller than `size`.
    /// * `size` - The amount of members in the group.
    ///
    /// # Returns
    /// The group member or an error if `size` is 0 or `rank` is out of range.
    pub fn new(rank: usize, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(SamplerErr::ZeroGroupSize);
        }

        if rank >= size {
            return Err(SamplerErr::RankOutOfRange { rank, size });
        }

        Ok(Self { rank, size })
    }

    /// A group of a single member.
    pub fn single() -> Self {
        Self { rank: 0, size: 1 }
    }

    #[inline]
    pub fn rank(self) -> usize {
        self.rank
    }

    #[inline]
    pub fn size(self) -> usize {
        self.size
    }
}
