use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use motorlot_cli::{init_tracing, summarize};
use motorlot_core::{Config, UrlNormalizer};
use motorlot_db::{setup_database, ImageRecordRepository};
use motorlot_services::RepairSweep;

#[derive(Parser, Debug)]
#[command(name = "repair_urls")]
#[command(about = "Rewrite stored listing image URLs that fail validation")]
struct Args {
    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,

    /// Records fetched per page (default: SWEEP_BATCH_SIZE)
    #[arg(long, value_name = "N")]
    batch_size: Option<i64>,

    /// Output format: json or text (default: text)
    #[arg(long, default_value = "text")]
    format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = setup_database(&config).await?;
    let normalizer =
        UrlNormalizer::from_config(&config).context("Failed to build URL normalizer")?;
    let batch_size = args.batch_size.unwrap_or_else(|| config.sweep_batch_size());

    let sweep = RepairSweep::new(
        Arc::new(ImageRecordRepository::new(pool)),
        Arc::new(normalizer),
        batch_size,
    )
    .dry_run(args.dry_run);

    let report = sweep.sweep().await?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => println!("{}", summarize(&report, args.dry_run)),
    }

    Ok(())
}
