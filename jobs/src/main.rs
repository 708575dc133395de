use anyhow::Context;
use chrono::Utc;
use jobs::RecommendationJob;
use newsrank_core::config::AppConfig;
use std::sync::Arc;
use storage::{JsonDirLoader, JsonLinesSink};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    newsrank_core::init_tracing();

    let config = AppConfig::load().context("loading configuration")?;
    info!(
        "Reading tables from {} and writing to {}",
        config.storage.input_dir,
        config.storage.output_dir
    );

    // Earlier runs' output feeds the prior-recommendation exclusion.
    let loader = Arc::new(
        JsonDirLoader::new(&config.storage.input_dir).with_history(&config.storage.output_dir),
    );
    let sink = Arc::new(JsonLinesSink::new(&config.storage.output_dir));
    let job = RecommendationJob::new(loader, sink, config)?;

    let report = job.run(Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
