use sampler::{DataParallelGroup, EpisodeIter, EpisodeSampler};

fn rank_iters(total: usize, micro_batch: usize, size: usize, per_episode: usize) -> Vec<EpisodeIter> {
    (0..size)
        .map(|rank| {
            let group = DataParallelGroup::new(rank, size).unwrap();
            EpisodeSampler::new(total, 0, micro_batch, group, per_episode, false)
                .unwrap()
                .into_iter()
        })
        .collect()
}

#[test]
fn blocks_across_ranks_never_overrun_the_episode() {
    for size in 1..4 {
        for micro_batch in 1..4 {
            for per_episode in 1..8 {
                for total in 1..12 {
                    let mut iters = rank_iters(total, micro_batch, size, per_episode);
                    let case = format!("size {size} mb {micro_batch} k {per_episode} total {total}");
                    let mut cumulative = 0;

                    loop {
                        let slices: Vec<_> = iters.iter_mut().map(Iterator::next).collect();
                        if slices.iter().all(Option::is_none) {
                            break;
                        }

                        // every rank flushes at the same points
                        assert!(slices.iter().all(Option::is_some), "{case}");
                        let block: usize = slices.iter().flatten().map(Vec::len).sum();

                        assert!(block <= micro_batch * size, "{case}");
                        cumulative += block;
                        assert!(cumulative <= per_episode, "{case}");

                        if iters[0].episode_offset() == 0 {
                            assert_eq!(cumulative, per_episode, "{case}");
                            cumulative = 0;
                        }
                    }
                }
            }
        }
    }
}
