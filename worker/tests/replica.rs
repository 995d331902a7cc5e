use std::{num::NonZeroUsize, sync::Arc};

use comms::{Dataset, Replica, StepInfo};
use sampler::DataParallelGroup;
use serde_json::{Value, json};
use worker::{ReplicaBuilder, WorkerErr};

fn dataset(n: usize) -> Dataset {
    (0..n).map(|i| json!({ "id": i })).collect::<Vec<_>>().into()
}

fn ids(batch: &[Value]) -> Vec<u64> {
    batch.iter().map(|s| s["id"].as_u64().unwrap()).collect()
}

const STEP: StepInfo = StepInfo {
    step: 0,
    is_final: false,
    is_eval: true,
};

#[tokio::test]
async fn serves_rank_batches_and_rewinds() -> Result<(), Box<dyn std::error::Error>> {
    let group = DataParallelGroup::new(1, 2)?;
    let replica = ReplicaBuilder::new("policy-1").group(group).build();

    replica.build_dataloader(dataset(10), 2, true).await?;
    assert_eq!(ids(&replica.next_batch(true).await?), vec![2, 3]);
    assert_eq!(ids(&replica.next_batch(true).await?), vec![6, 7]);
    assert_eq!(replica.consumed_samples(true)?, 8);

    replica.reset_eval_data_iter().await?;
    assert_eq!(ids(&replica.next_batch(true).await?), vec![2, 3]);

    // the training loader was never built
    let err = replica.next_batch(false).await.unwrap_err();
    assert_eq!(err.origin(), "policy-1");
    Ok(())
}

#[tokio::test]
async fn exhausted_loader_is_a_remote_error() -> Result<(), Box<dyn std::error::Error>> {
    let replica = ReplicaBuilder::new("policy").build();
    replica.build_dataloader(dataset(3), 2, true).await?;

    replica.next_batch(true).await?;
    replica.next_batch(true).await?;
    let err = replica.next_batch(true).await.unwrap_err();
    assert_eq!(err.msg(), WorkerErr::Exhausted { is_eval: true }.to_string());
    Ok(())
}

#[tokio::test]
async fn calls_registered_functions_only() -> Result<(), Box<dyn std::error::Error>> {
    let replica = ReplicaBuilder::new("reward")
        .register("score", |batch, _| {
            Ok(batch
                .into_iter()
                .map(|s| json!({ "id": s["id"], "score": 1.0 }))
                .collect())
        })
        .register("broken", |_, _| Err(WorkerErr::func("cuda out of memory")))
        .build();

    let out = replica.call("score", vec![json!({ "id": 7 })], STEP).await?;
    assert_eq!(out, vec![json!({ "id": 7, "score": 1.0 })]);
    assert_eq!(replica.calls(), 1);

    let err = replica.call("broken", vec![], STEP).await.unwrap_err();
    assert_eq!(err.msg(), "cuda out of memory");

    assert!(replica.call("missing", vec![], STEP).await.is_err());
    Ok(())
}

#[tokio::test]
async fn incremental_replica_decodes_until_done() -> Result<(), Box<dyn std::error::Error>> {
    let replica = Arc::new(
        ReplicaBuilder::new("generator")
            .units(NonZeroUsize::new(2).unwrap())
            .incremental(NonZeroUsize::new(3).unwrap())
            .build(),
    );
    replica.build_dataloader(dataset(4), 2, true).await?;

    // every execution unit needs its scheduler first
    replica.build_scheduler(0).await?;
    assert!(replica.add_request(true).await.is_err());
    assert!(replica.build_scheduler(2).await.is_err());
    replica.build_scheduler(1).await?;

    replica.add_request(true).await?;
    let mut steps = 0;
    while replica.has_unfinished_requests().await? {
        assert_eq!(replica.schedule().await?.len(), 2);
        steps += 1;
    }
    assert_eq!(steps, 3);

    let outputs = replica.post_process_outputs().await?;
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0]["prompt"], json!({ "id": 0 }));
    assert_eq!(outputs[1]["num_tokens"], json!(3));
    Ok(())
}

#[tokio::test]
async fn batch_replica_rejects_decoding_calls() {
    let replica = ReplicaBuilder::new("reward").build();
    assert!(replica.build_scheduler(0).await.is_err());
    assert!(replica.schedule().await.is_err());
}

#[tokio::test]
async fn episodic_train_loader_resumes_from_saved_offset() -> Result<(), Box<dyn std::error::Error>> {
    let first = ReplicaBuilder::new("policy").episodes(4).build();
    first.build_dataloader(dataset(10), 2, false).await?;
    first.build_dataloader(dataset(10), 2, true).await?;

    assert_eq!(ids(&first.next_batch(false).await?), vec![0, 1]);
    assert_eq!(ids(&first.next_batch(false).await?), vec![2, 3]);
    let saved = first.consumed_samples(false)?;
    assert_eq!(saved, 4);

    // evaluation is unaffected by training progress
    assert_eq!(ids(&first.next_batch(true).await?), vec![0, 1]);

    let resumed = ReplicaBuilder::new("policy")
        .episodes(4)
        .consumed_samples(saved)
        .build();
    resumed.build_dataloader(dataset(10), 2, false).await?;

    for _ in 0..3 {
        assert_eq!(
            ids(&resumed.next_batch(false).await?),
            ids(&first.next_batch(false).await?)
        );
    }
    assert_eq!(resumed.consumed_samples(false)?, first.consumed_samples(false)?);
    Ok(())
}
