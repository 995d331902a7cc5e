use std::fmt;

use comms::{Batch, Envelope, Queue};
use futures::future;

use crate::{PipelineErr, Result, broker::Pending};

/// Queue item flowing between stages.
pub type StageEnvelope = Envelope<Pending>;

/// The outputs of one batch, one entry per merged stage in stage order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub batch_id: usize,
    pub outputs: Vec<Batch>,
}

impl ResultRecord {
    /// The output of the last merged stage.
    pub fn last(&self) -> Option<&Batch> {
        self.outputs.last()
    }
}

/// A `ResultRecord` whose outputs are still being computed.
#[derive(Clone)]
pub struct PendingRecord {
    pub batch_id: usize,
    pub outputs: Vec<Pending>,
}

impl fmt::Debug for PendingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRecord")
            .field("batch_id", &self.batch_id)
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

/// Pops one envelope from every queue and merges them into one record.
///
/// # Returns
/// `None` when any of the queues is empty, nothing is popped then.
///
/// # Errors
/// `BatchIdMismatch` if the fronts of the queues belong to different batches.
pub fn merge_one(queues: &[Queue<StageEnvelope>]) -> Result<Option<PendingRecord>> {
    if queues.is_empty() || queues.iter().any(Queue::is_empty) {
        return Ok(None);
    }

    let mut batch_id = None;
    let mut outputs = Vec::with_capacity(queues.len());

    for queue in queues {
        let Some(envelope) = queue.try_get() else {
            return Ok(None);
        };

        let (id, payload) = envelope.decode();
        match batch_id {
            None => batch_id = Some(id),
            Some(expected) if expected != id => {
                return Err(PipelineErr::BatchIdMismatch { expected, got: id });
            }
            Some(_) => {}
        }

        outputs.push(payload);
    }

    Ok(batch_id.map(|batch_id| PendingRecord { batch_id, outputs }))
}

/// Merges records until one of the queues runs dry.
pub fn merge_all(queues: &[Queue<StageEnvelope>]) -> Result<Vec<PendingRecord>> {
    let mut records = Vec::new();
    while let Some(record) = merge_one(queues)? {
        records.push(record);
    }

    Ok(records)
}

/// Waits for every record, keeping submission order.
pub async fn resolve(records: Vec<PendingRecord>) -> Result<Vec<ResultRecord>> {
    let futs = records.into_iter().map(|record| async move {
        let outputs = future::try_join_all(record.outputs).await?;
        Ok::<_, PipelineErr>(ResultRecord {
            batch_id: record.batch_id,
            outputs,
        })
    });

    future::try_join_all(futs).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::broker::{dispatch, ready};

    fn envelope(batch_id: usize, value: i64) -> StageEnvelope {
        Envelope::encode(batch_id, ready(vec![json!(value)]))
    }

    #[tokio::test]
    async fn merges_entries_pairwise_in_queue_order() {
        let (a, b) = (Queue::new(), Queue::new());
        for id in 0..3 {
            a.put(envelope(id, id as i64));
            b.put(envelope(id, 10 + id as i64));
        }

        let records = resolve(merge_all(&[a.clone(), b]).unwrap()).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].batch_id, 2);
        assert_eq!(records[2].outputs, vec![vec![json!(2)], vec![json!(12)]]);
        assert!(a.is_empty());
    }

    #[tokio::test]
    async fn stops_when_any_queue_is_exhausted() {
        let (a, b) = (Queue::new(), Queue::new());
        a.put(envelope(0, 0));
        a.put(envelope(1, 1));
        b.put(envelope(0, 0));

        let records = merge_all(&[a.clone(), b]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(a.qsize(), 1);
    }

    #[test]
    fn out_of_step_queues_are_rejected() {
        let (a, b) = (Queue::new(), Queue::new());
        a.put(envelope(0, 0));
        b.put(envelope(1, 1));

        assert!(matches!(
            merge_one(&[a, b]),
            Err(PipelineErr::BatchIdMismatch { expected: 0, got: 1 })
        ));
    }

    #[tokio::test]
    async fn resolve_keeps_submission_order() {
        let records = (0..4)
            .map(|id| PendingRecord {
                batch_id: id,
                outputs: vec![dispatch("stage", async move {
                    // later batches complete first
                    tokio::time::sleep(Duration::from_millis(10 * (4 - id as u64))).await;
                    Ok(vec![json!(id)])
                })],
            })
            .collect();

        let ids: Vec<_> = resolve(records)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.batch_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }
}
