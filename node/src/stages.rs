use std::sync::Arc;

use anyhow::{Context, bail};
use comms::{Batch, Replica, StepInfo};
use orchestrator::{Stage, configs::StageConfig};
use sampler::DataParallelGroup;
use serde_json::{Value, json};
use worker::{ReplicaBuilder, Result};

/// Functions every local replica can serve.
const FUNCS: [&str; 3] = ["generate", "forward_step", "score"];

/// Answers every prompt with its reversed text.
fn generate(batch: Batch, _: StepInfo) -> Result<Batch> {
    Ok(batch
        .into_iter()
        .map(|mut sample| {
            let prompt = sample["prompt"].as_str().unwrap_or_default();
            sample["response"] = json!(prompt.chars().rev().collect::<String>());
            sample
        })
        .collect())
}

/// One decode step, emits a token per scheduled request.
fn forward_step(batch: Batch, _: StepInfo) -> Result<Batch> {
    Ok(batch
        .into_iter()
        .map(|mut item| {
            let position = item["position"].as_u64().unwrap_or_default();
            item["token"] = json!(position);
            item
        })
        .collect())
}

/// Scores responses by length.
fn score(batch: Batch, _: StepInfo) -> Result<Batch> {
    Ok(batch
        .into_iter()
        .map(|mut sample| {
            let len = match &sample["response"] {
                Value::String(s) => s.len(),
                Value::Null => 0,
                other => other.to_string().len(),
            };
            sample["score"] = json!(len as f64 / 10.0);
            sample
        })
        .collect())
}

/// Builds the local replicas of `config`, leading stages split the data by rank.
pub fn build(config: &StageConfig, leading: bool) -> anyhow::Result<Stage> {
    if let Some(func) = &config.eval_func
        && !FUNCS.contains(&func.as_str())
    {
        bail!("stage {}: no local function named {func}", config.name);
    }

    let n = config.replicas.get();
    let mut replicas: Vec<Arc<dyn Replica>> = Vec::with_capacity(n);

    for rank in 0..n {
        let group = if leading {
            DataParallelGroup::new(rank, n)
                .with_context(|| format!("stage {} rank {rank}", config.name))?
        } else {
            DataParallelGroup::single()
        };

        let mut builder = ReplicaBuilder::new(format!("{}-{rank}", config.name))
            .group(group)
            .units(config.units)
            .register("generate", generate)
            .register("forward_step", forward_step)
            .register("score", score);

        if let Some(steps) = config.decode_steps {
            builder = builder.incremental(steps);
        }

        replicas.push(Arc::new(builder.padding(config.padding.clone()).build()));
    }

    let stage = Stage::new(config.name.clone(), config.kind, replicas);
    Ok(match &config.eval_func {
        Some(func) => stage.register_eval_func(func.clone()),
        None => stage,
    })
}

/// Builds every stage in pipeline order.
pub fn build_all(configs: &[StageConfig]) -> anyhow::Result<Vec<Stage>> {
    configs
        .iter()
        .enumerate()
        .map(|(i, config)| build(config, i == 0))
        .collect()
}
