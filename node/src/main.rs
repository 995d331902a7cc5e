mod stages;

use std::env;

use anyhow::Context;
use log::{info, warn};
use orchestrator::{Evaluator, configs::EvalConfig};

const DEFAULT_CONFIG: &str = r#"{
    "batch_size": 2,
    "stages": [
        {"name": "policy", "replicas": 2, "eval_func": "generate"},
        {"name": "reward", "eval_func": "score"}
    ],
    "dataset": {
        "type": "inline",
        "samples": [
            {"prompt": "hello"},
            {"prompt": "pipeline"},
            {"prompt": "sampler"},
            {"prompt": "replica"},
            {"prompt": "rust"}
        ]
    }
}"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::var("EVAL_CONFIG") {
        Ok(path) => {
            info!("loading config from {path}");
            EvalConfig::from_path(&path).with_context(|| format!("reading {path}"))?
        }
        Err(_) => {
            warn!("EVAL_CONFIG not set, running the built-in demo");
            EvalConfig::from_json(DEFAULT_CONFIG)?
        }
    };

    let stages = stages::build_all(&config.stages)?;
    let dataset = config.dataset.load()?;

    let mut evaluator = Evaluator::new(stages, config.batch_size);
    evaluator
        .set_dataset(dataset)
        .set_ranking(config.ranking)
        .set_post_process_func(|results, info| {
            info!(
                records = results.len(),
                episode = info.episode_iteration.unwrap_or_default();
                "pass finished"
            );
        });

    evaluator.setup(&config.colocation).await?;
    let results = evaluator.eval(Some(0), None, config.return_last).await?;

    for record in &results {
        println!("{}: {}", record.batch_id, serde_json::to_string(&record.outputs)?);
    }

    Ok(())
}
