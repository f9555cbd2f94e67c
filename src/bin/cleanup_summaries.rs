use anyhow::{Context, Result};
use dotenv::dotenv;
use std::time::SystemTime;
use summarizer_api::{config::SweepSettings, logging, sweeper};

// One sweep per invocation; schedule it with cron.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    logging::init_logging();

    let settings = SweepSettings::from_env().context("invalid configuration")?;
    let dir = &settings.summary_dir;

    let report = sweeper::sweep(dir, settings.retention, SystemTime::now())
        .await
        .with_context(|| format!("cleanup of {} failed", dir.display()))?;

    tracing::info!(deleted = report.deleted, kept = report.kept, "cleanup complete");
    Ok(())
}
