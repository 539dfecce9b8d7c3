use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use comment_stance::input::{load_axis_profile, load_comments, load_video};
use comment_stance::render::render_report_markdown;
use comment_stance::{AnalysisConfig, AnalysisEngine, BatchScheduler, SchedulerConfig};

/// Comment Stance - classify video comments by stance toward the video's axis
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON array of comments
    #[arg(long)]
    comments: PathBuf,

    /// JSON video metadata
    #[arg(long)]
    video: PathBuf,

    /// Precomputed axis profile JSON (built from the video when absent)
    #[arg(long)]
    axis: Option<PathBuf>,

    /// Path to YAML config file (overrides STANCE_CONFIG environment variable)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for generated files
    #[arg(short, long, default_value = "out")]
    output_dir: PathBuf,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    rich_tier_threshold: Option<usize>,

    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long, env = "STANCE_MODEL")]
    model: Option<String>,
}

fn apply_overrides(config: &mut AnalysisConfig, args: &Args) {
    if let Some(n) = args.batch_size {
        config.batch_size = n;
    }
    if let Some(n) = args.rich_tier_threshold {
        config.rich_tier_threshold = n;
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
}

fn write_output(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, bytes).with_context(|| format!("Writing {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();

    info!("Starting comment-stance");
    let args = Args::parse();

    let mut config = AnalysisConfig::resolve(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config.validate()?;
    debug!(
        "Config resolved - provider={}, model={}, batch_size={}, rich_tier_threshold={}, concurrency={}",
        config.provider, config.model, config.batch_size, config.rich_tier_threshold, config.concurrency
    );

    let comments = load_comments(&args.comments)?;
    let video = load_video(&args.video)?;
    let axis = args.axis.as_deref().map(load_axis_profile).transpose()?;
    if comments.is_empty() {
        warn!("No comments to classify - video_id={}", video.video_id);
    }

    let engine = AnalysisEngine::from_config(&config)?;
    let scheduler = BatchScheduler::new(engine, SchedulerConfig::from(&config));
    let report = scheduler
        .analyze_video(&video, &comments, axis)
        .await
        .with_context(|| format!("Analyzing video {}", video.video_id))?;

    let persist_start = std::time::Instant::now();
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Creating {}", args.output_dir.display()))?;
    write_output(&args.output_dir, "results.json", &serde_json::to_vec_pretty(&report.results)?)?;
    write_output(&args.output_dir, "summary.json", &serde_json::to_vec_pretty(&report.summary)?)?;
    write_output(&args.output_dir, "report.md", render_report_markdown(&report).as_bytes())?;
    info!(
        "Output persisted - duration={:.2}s, directory={}",
        persist_start.elapsed().as_secs_f32(),
        args.output_dir.display()
    );

    if report.summary.is_partial {
        warn!(
            "Run was partial - failed_batches={}, unknown={}",
            report.summary.failed_batches, report.summary.unknown_count
        );
    }
    Ok(())
}
