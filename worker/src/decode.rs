use std::num::NonZeroUsize;

use comms::{Batch, Sample};
use serde_json::json;

/// Per sample override of the amount of decode steps.
const MAX_NEW_TOKENS: &str = "max_new_tokens";

#[derive(Debug)]
struct Request {
    id: usize,
    prompt: Sample,
    budget: usize,
    generated: usize,
}

/// Token by token decoding bookkeeping of a replica.
///
/// Every `schedule` call advances each in flight request by one step, a request
/// is finished once it has generated its budget.
#[derive(Debug)]
pub struct DecodeScheduler {
    default_budget: NonZeroUsize,
    next_id: usize,
    in_flight: Vec<Request>,
    finished: Vec<Request>,
}

impl DecodeScheduler {
    pub fn new(default_budget: NonZeroUsize) -> Self {
        Self {
            default_budget,
            next_id: 0,
            in_flight: Vec::new(),
            finished: Vec::new(),
        }
    }

    /// Registers every sample of `batch` as a new request.
    pub fn add(&mut self, batch: Batch) {
        for prompt in batch {
            let budget = prompt
                .get(MAX_NEW_TOKENS)
                .and_then(|v| v.as_u64())
                .and_then(|v| usize::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(self.default_budget.get());

            self.in_flight.push(Request {
                id: self.next_id,
                prompt,
                budget,
                generated: 0,
            });
            self.next_id += 1;
        }
    }

    /// Advances every in flight request by one step.
    ///
    /// # Returns
    /// The work of this micro step, one item per advanced request.
    pub fn schedule(&mut self) -> Batch {
        let work = self
            .in_flight
            .iter_mut()
            .map(|req| {
                let item = json!({
                    "request_id": req.id,
                    "prompt": req.prompt,
                    "position": req.generated,
                });
                req.generated += 1;
                item
            })
            .collect();

        let (done, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|req| req.generated >= req.budget);

        self.in_flight = pending;
        self.finished.extend(done);
        work
    }

    #[inline]
    pub fn has_unfinished(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Drains the finished requests, ordered by request id.
    pub fn take_outputs(&mut self) -> Batch {
        let mut finished = std::mem::take(&mut self.finished);
        finished.sort_by_key(|req| req.id);

        finished
            .into_iter()
            .map(|req| {
                json!({
                    "request_id": req.id,
                    "prompt": req.prompt,
                    "num_tokens": req.generated,
                })
            })
            .collect()
    }
}
