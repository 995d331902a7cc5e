use std::{collections::HashMap, fmt, sync::Arc};

use comms::{Batch, StepInfo};

use crate::{Result, WorkerErr};

/// A stage function, the unit of work a pipeline step invokes.
pub type StageFn = Arc<dyn Fn(Batch, StepInfo) -> Result<Batch> + Send + Sync>;

/// Named stage functions a replica can serve.
#[derive(Clone, Default)]
pub struct FuncRegistry {
    funcs: HashMap<String, StageFn>,
}

impl FuncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` under `name`, replacing any previous function with that name.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Batch, StepInfo) -> Result<Batch> + Send + Sync + 'static,
    {
        self.funcs.insert(name.into(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Result<&StageFn> {
        self.funcs.get(name).ok_or_else(|| WorkerErr::UnknownFunc {
            func: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }
}

impl fmt::Debug for FuncRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.funcs.keys()).finish()
    }
}
