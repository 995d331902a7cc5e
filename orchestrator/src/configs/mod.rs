mod dataset;
mod eval;

pub use dataset::DatasetConfig;
pub use eval::{EvalConfig, StageConfig};
