use std::sync::Arc;

/// An opaque dataset sample.
pub type Sample = serde_json::Value;

/// An ordered list of samples, the unit every stage consumes and produces.
pub type Batch = Vec<Sample>;

/// The shared, read only dataset handed to every replica.
pub type Dataset = Arc<[Sample]>;

/// A queue item, `payload` tagged with the id of the batch it belongs to.
#[derive(Debug, Clone)]
pub struct Envelope<P> {
    pub batch_id: usize,
    pub payload: P,
}

impl<P> Envelope<P> {
    pub fn encode(batch_id: usize, payload: P) -> Self {
        Self { batch_id, payload }
    }

    pub fn decode(self) -> (usize, P) {
        (self.batch_id, self.payload)
    }
}

/// Per call metadata sent along a stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepInfo {
    /// The batch this call processes.
    pub step: usize,
    /// Whether this is one of the last calls a replica receives during the pass,
    /// lets the replica reset its internal iterators.
    pub is_final: bool,
    pub is_eval: bool,
}
