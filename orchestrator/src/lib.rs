pub mod broker;
pub mod configs;
mod error;
mod evaluator;
mod merger;
mod ranking;
mod scheduler;
mod stage;

pub use error::{PipelineErr, Result};
pub use evaluator::{EvalInfo, Evaluator, PostProcessFn};
pub use merger::{PendingRecord, ResultRecord, merge_all, merge_one, resolve};
pub use ranking::{prompt_len, rank_by_prompt_length};
pub use scheduler::{PipelineScheduler, is_colocated};
pub use stage::{Stage, StageKind, is_final_step};
