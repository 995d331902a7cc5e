use std::time::Duration;

use comms::{Envelope, Queue};
use serde_json::json;

#[tokio::test]
async fn envelopes_keep_submission_order() {
    let queue = Queue::new();
    for batch_id in 0..4 {
        queue.put(Envelope::encode(batch_id, json!({ "query": batch_id })));
    }

    for expected in 0..4 {
        let (batch_id, payload) = queue.get().await.decode();
        assert_eq!(batch_id, expected);
        assert_eq!(payload, json!({ "query": expected }));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_item_reaches_exactly_one_consumer() {
    const ITEMS: usize = 200;
    const CONSUMERS: usize = 4;

    let queue = Queue::new();
    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = queue.clone();
            tokio::spawn(async move {
                let mut got = Vec::new();
                for _ in 0..ITEMS / CONSUMERS {
                    got.push(queue.get().await);
                }
                got
            })
        })
        .collect();

    for i in 0..ITEMS {
        queue.put(i);
    }

    let mut all = Vec::new();
    for consumer in consumers {
        let got = tokio::time::timeout(Duration::from_secs(5), consumer)
            .await
            .unwrap()
            .unwrap();

        // a single consumer always observes increasing items
        assert!(got.windows(2).all(|w| w[0] < w[1]));
        all.extend(got);
    }

    all.sort_unstable();
    assert_eq!(all, (0..ITEMS).collect::<Vec<_>>());
    assert_eq!(queue.qsize(), 0);
}
