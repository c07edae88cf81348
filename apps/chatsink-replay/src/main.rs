use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chatsink_ingest::{Disposition, IngestPipeline, PipelineBuilder};
use chatsink_model::Event;
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "chatsink-replay")]
#[command(about = "Replay captured chat events through the sink classifier")]
struct Cli {
    /// NDJSON file of stored events, e.g. a copy of chatverbose.log.
    input: PathBuf,
    /// Directory the replayed logs are written to.
    #[arg(long, default_value = ".chatsink-replay")]
    root: PathBuf,
    /// Classify against the existing logs under --root without writing.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ReplaySummary {
    events: usize,
    skipped_lines: usize,
    removed: usize,
    dispositions: BTreeMap<&'static str, usize>,
    reasons: BTreeMap<String, usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .compact()
        .init();

    let cli = Cli::parse();
    let raw = tokio::fs::read_to_string(&cli.input)
        .await
        .with_context(|| format!("failed reading {:?}", cli.input))?;

    let pipeline = PipelineBuilder::new(&cli.root).build()?;
    let summary = replay(&pipeline, &raw, cli.dry_run).await?;

    info!(
        events = summary.events,
        skipped_lines = summary.skipped_lines,
        removed = summary.removed,
        dry_run = cli.dry_run,
        "replay complete"
    );
    let rendered = json!({
        "events": summary.events,
        "skippedLines": summary.skipped_lines,
        "removed": summary.removed,
        "dispositions": summary.dispositions,
        "reasons": summary.reasons,
    });
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

async fn replay(pipeline: &IngestPipeline, raw: &str, dry_run: bool) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(error) => {
                warn!(line = index + 1, %error, "skipping malformed event");
                summary.skipped_lines += 1;
                continue;
            }
        };

        let disposition = if dry_run {
            pipeline.preview(&event).await?
        } else {
            let outcome = pipeline.ingest(event).await?;
            summary.removed += outcome.removed;
            outcome.disposition
        };

        summary.events += 1;
        *summary.dispositions.entry(disposition.label()).or_default() += 1;
        let reason = match &disposition {
            Disposition::VerboseOnly(suppression) => Some(suppression.to_string()),
            Disposition::KeepFilteredAndAmend(amendment) => Some(amendment.reason.to_string()),
            Disposition::KeepFiltered => None,
        };
        if let Some(reason) = reason {
            *summary.reasons.entry(reason).or_default() += 1;
        }
    }
    Ok(summary)
}
