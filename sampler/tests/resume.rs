use sampler::{BoundedSampler, DataParallelGroup, EpisodeSampler};

fn flatten(batches: impl IntoIterator<Item = Vec<usize>>) -> Vec<usize> {
    batches.into_iter().flatten().collect()
}

#[test]
fn bounded_resumption_yields_suffix_of_single_pass() {
    const TOTAL: usize = 37;

    for size in 1..4 {
        for rank in 0..size {
            let group = DataParallelGroup::new(rank, size).unwrap();
            let micro_batch = 3;
            let block = micro_batch * size;

            let full: Vec<_> = BoundedSampler::new(TOTAL, 0, micro_batch, group, false)
                .unwrap()
                .into_iter()
                .collect();

            // resuming at any block boundary replays the tail of the full pass
            for (skipped, consumed) in (0..TOTAL).step_by(block).enumerate() {
                let resumed: Vec<_> =
                    BoundedSampler::new(TOTAL, consumed, micro_batch, group, false)
                        .unwrap()
                        .into_iter()
                        .collect();
                assert_eq!(resumed, full[skipped..], "rank {rank}/{size} at {consumed}");
            }
        }
    }
}

#[test]
fn bounded_sampling_is_a_pure_function_of_its_inputs() {
    let group = DataParallelGroup::new(0, 2).unwrap();
    let a = flatten(BoundedSampler::new(21, 5, 2, group, false).unwrap());
    let b = flatten(BoundedSampler::new(21, 5, 2, group, false).unwrap());
    assert_eq!(a, b);
}

#[test]
fn ranks_partition_every_block_without_overlap() {
    const TOTAL: usize = 23;
    let size = 3;

    let mut seen: Vec<usize> = (0..size)
        .flat_map(|rank| {
            let group = DataParallelGroup::new(rank, size).unwrap();
            flatten(BoundedSampler::new(TOTAL, 0, 2, group, false).unwrap())
        })
        .collect();

    seen.sort_unstable();
    assert_eq!(seen, (0..TOTAL).collect::<Vec<_>>());
}

#[test]
fn episodic_resumption_continues_the_cycle() {
    let group = DataParallelGroup::single();

    let mut first = EpisodeSampler::new(10, 0, 4, group, 4, true).unwrap().into_iter();
    assert_eq!(first.next(), Some(vec![0, 1, 2, 3]));
    let saved = first.consumed_samples();
    assert_eq!(saved, 4);

    // a restarted sampler picks up exactly where the saved offset points,
    // across as many full laps as were recorded
    for laps in 0..3 {
        let mut resumed = EpisodeSampler::new(10, saved + laps * 10, 4, group, 4, true)
            .unwrap()
            .into_iter();
        assert_eq!(resumed.next(), Some(vec![4, 5, 6, 7]));
        assert_eq!(resumed.next(), Some(vec![8, 9, 0, 1]));
    }
}
