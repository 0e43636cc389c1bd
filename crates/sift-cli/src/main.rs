mod replay;
mod sink;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

use sift_broker::{AmqpBroker, AmqpConfig};
use sift_core::broker::BrokerClient;
use sift_core::crawl_worker::{CrawlWorker, CrawlWorkerConfig};
use sift_core::score_worker::{ScoreWorker, ScoreWorkerConfig};
use sift_core::traits::{DedupIndex, NullSink, RequirementSource, ResultSink};
use sift_core::worker::TracingWorkerReporter;
use sift_core::{CrawlJob, NaturalKey, PipelineStats, ProfileRecord, Scorer};
use sift_store::{
    FileDedupIndex, FileProfileStore, FileRequirementSource, FileScoreStore, StoreConfig,
};

use crate::replay::ReplayExtractor;
use crate::sink::CsvResultSink;

#[derive(Parser)]
#[command(
    name = "sift",
    version,
    about = "Queue-driven profile extraction and scoring pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish crawl jobs to the crawl queue
    Produce {
        /// Profile URL to enqueue (repeatable)
        #[arg(short, long)]
        url: Vec<String>,

        /// File with one profile URL per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Requirement spec id attached to each job
        #[arg(short, long, env = "REQUIREMENTS_ID")]
        requirements_id: Option<String>,

        /// Enqueue even when a terminal profile record already exists
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Run the extraction worker pool
    Crawl {
        /// Number of workers, one broker connection each
        #[arg(short, long, env = "CRAWL_WORKERS", default_value_t = 3)]
        workers: usize,

        /// Directory of captured profile JSON served by the replay extractor
        #[arg(long, env = "CAPTURES_DIR", default_value = "data/captures")]
        captures_dir: PathBuf,

        /// Requirement spec id for crawl messages that carry none
        #[arg(short, long, env = "REQUIREMENTS_ID", default_value = "default")]
        requirements_id: String,
    },

    /// Run the scoring worker pool
    Score {
        /// Number of workers, one broker connection each
        #[arg(short, long, env = "SCORE_WORKERS", default_value_t = 2)]
        workers: usize,

        /// CSV file receiving (profile_url, score) sink updates
        #[arg(long, env = "SCORE_SINK_CSV")]
        sink_csv: Option<PathBuf>,
    },

    /// Batch-score persisted profiles and write a ranked CSV
    Rank {
        /// Requirement spec id to score against
        #[arg(short, long)]
        requirements_id: String,

        /// Directory of profile JSON files (defaults to PROFILES_DIR)
        #[arg(short, long)]
        profiles_dir: Option<PathBuf>,

        /// Output CSV path (defaults to SCORES_DIR/scores_{id}_{timestamp}.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score one profile file and print the result as JSON
    ScoreFile {
        /// Path to a profile record JSON file
        #[arg(short, long)]
        profile: PathBuf,

        /// Requirement spec id to score against
        #[arg(short, long)]
        requirements_id: String,
    },

    /// Show crawl and scoring queue depths
    Depth,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sift=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Produce {
            url,
            file,
            requirements_id,
            force,
        } => cmd_produce(url, file, requirements_id, force).await?,
        Commands::Crawl {
            workers,
            captures_dir,
            requirements_id,
        } => cmd_crawl(workers, captures_dir, requirements_id).await?,
        Commands::Score { workers, sink_csv } => cmd_score(workers, sink_csv).await?,
        Commands::Rank {
            requirements_id,
            profiles_dir,
            output,
        } => cmd_rank(&requirements_id, profiles_dir, output).await?,
        Commands::ScoreFile {
            profile,
            requirements_id,
        } => cmd_score_file(&profile, &requirements_id).await?,
        Commands::Depth => cmd_depth().await?,
    }

    Ok(())
}

async fn cmd_produce(
    urls: Vec<String>,
    file: Option<PathBuf>,
    requirements_id: Option<String>,
    force: bool,
) -> Result<()> {
    let mut urls = urls;
    if let Some(path) = file {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read URL file: {}", path.display()))?;
        urls.extend(
            raw.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(String::from),
        );
    }
    if urls.is_empty() {
        bail!("No URLs provided. Use --url or --file.");
    }

    let amqp = AmqpConfig::from_env()?;
    let store_cfg = StoreConfig::from_env();
    let broker = AmqpBroker::connect(&amqp).await?;
    broker.declare_queue(&amqp.crawl_queue).await?;

    let dedup = FileDedupIndex::profiles(&store_cfg.profiles_dir);
    let stats = PipelineStats::new();
    let mut invalid = 0usize;

    for raw_url in urls {
        if Url::parse(&raw_url).is_err() {
            tracing::warn!(url = %raw_url, "Skipping invalid URL");
            invalid += 1;
            continue;
        }

        if !force
            && dedup
                .has_terminal_record(&NaturalKey::crawl(&raw_url))
                .await?
                .is_some()
        {
            tracing::info!(url = %raw_url, "Skipping: already extracted");
            stats.record_skipped();
            continue;
        }

        let mut job = CrawlJob::new(&raw_url);
        if let Some(id) = &requirements_id {
            job = job.with_requirements_id(id);
        }
        broker
            .publish(&amqp.crawl_queue, &serde_json::to_vec(&job)?)
            .await?;
        stats.record_queued();
    }

    let snap = stats.snapshot();
    let depth = broker.queue_depth(&amqp.crawl_queue).await?;
    println!(
        "Published {} jobs to '{}' (skipped {} already extracted, {invalid} invalid). Queue depth: {depth}",
        snap.queued, amqp.crawl_queue, snap.skipped
    );
    Ok(())
}

async fn cmd_crawl(workers: usize, captures_dir: PathBuf, requirements_id: String) -> Result<()> {
    if workers == 0 {
        bail!("At least one worker is required");
    }
    let amqp = AmqpConfig::from_env()?;
    let store_cfg = StoreConfig::from_env();

    let extractor = ReplayExtractor::new(&captures_dir);
    let store = FileProfileStore::new(&store_cfg.profiles_dir);
    let dedup = FileDedupIndex::profiles(&store_cfg.profiles_dir);
    let stats = Arc::new(PipelineStats::new());
    let cancel = CancellationToken::new();

    let mut handles = Vec::with_capacity(workers);
    for i in 0..workers {
        // One connection per worker: a broken connection takes down
        // exactly one worker.
        let broker = AmqpBroker::connect(&amqp).await?;
        let config = CrawlWorkerConfig::default()
            .with_worker_id(format!("crawl-{}", i + 1))
            .with_queues(&amqp.crawl_queue, &amqp.scoring_queue)
            .with_default_requirements_id(&requirements_id);
        let worker = CrawlWorker::new(
            broker,
            extractor.clone(),
            store.clone(),
            dedup.clone(),
            Arc::clone(&stats),
            config,
        );
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run(cancel, &TracingWorkerReporter).await {
                tracing::error!(error = %e, "Crawl worker exited with error");
            }
        }));
    }

    tracing::info!(workers, queue = %amqp.crawl_queue, "Extraction pool running, Ctrl+C to stop");
    wait_for_pool(handles, cancel).await;

    println!("{}", stats.snapshot());
    Ok(())
}

async fn cmd_score(workers: usize, sink_csv: Option<PathBuf>) -> Result<()> {
    if workers == 0 {
        bail!("At least one worker is required");
    }
    let amqp = AmqpConfig::from_env()?;
    let store_cfg = StoreConfig::from_env();

    match sink_csv {
        Some(path) => run_score_pool(workers, &amqp, &store_cfg, CsvResultSink::new(path)).await,
        None => run_score_pool(workers, &amqp, &store_cfg, NullSink).await,
    }
}

async fn run_score_pool<K>(
    workers: usize,
    amqp: &AmqpConfig,
    store_cfg: &StoreConfig,
    sink: K,
) -> Result<()>
where
    K: ResultSink + Send + 'static,
{
    let requirements = FileRequirementSource::new(&store_cfg.requirements_dir);
    let store = FileScoreStore::new(&store_cfg.scores_dir);
    let dedup = FileDedupIndex::scores(&store_cfg.scores_dir);
    let stats = Arc::new(PipelineStats::new());
    let cancel = CancellationToken::new();

    let mut handles = Vec::with_capacity(workers);
    for i in 0..workers {
        let broker = AmqpBroker::connect(amqp).await?;
        let config = ScoreWorkerConfig::default()
            .with_worker_id(format!("score-{}", i + 1))
            .with_scoring_queue(&amqp.scoring_queue);
        let worker = ScoreWorker::new(
            broker,
            requirements.clone(),
            store.clone(),
            sink.clone(),
            dedup.clone(),
            Arc::clone(&stats),
            config,
        );
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run(cancel, &TracingWorkerReporter).await {
                tracing::error!(error = %e, "Score worker exited with error");
            }
        }));
    }

    tracing::info!(workers, queue = %amqp.scoring_queue, "Scoring pool running, Ctrl+C to stop");
    wait_for_pool(handles, cancel).await;

    println!("{}", stats.snapshot());
    Ok(())
}

/// Block until every worker task finishes, cancelling the pool on
/// Ctrl+C. In-flight jobs always complete and ack before exit.
async fn wait_for_pool(handles: Vec<tokio::task::JoinHandle<()>>, cancel: CancellationToken) {
    let mut pool_done = std::pin::pin!(futures::future::join_all(handles));
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received, letting in-flight jobs finish");
            cancel.cancel();
            pool_done.as_mut().await;
        }
        _ = pool_done.as_mut() => {}
    }
}

async fn cmd_rank(
    requirements_id: &str,
    profiles_dir: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let store_cfg = StoreConfig::from_env();
    let profiles_dir = profiles_dir.unwrap_or_else(|| store_cfg.profiles_dir.clone());

    let spec = FileRequirementSource::new(&store_cfg.requirements_dir)
        .load(requirements_id)
        .await?;
    let required_total = spec.required_skills.len();
    let scorer = Scorer::new(spec);

    let mut rows: Vec<(String, String, f64, String)> = Vec::new();
    let entries = std::fs::read_dir(&profiles_dir)
        .with_context(|| format!("Failed to read profiles dir: {}", profiles_dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if path.extension().and_then(|e| e.to_str()) != Some("json")
            || name.ends_with("_score.json")
        {
            continue;
        }

        let raw = std::fs::read(&path)?;
        let profile: ProfileRecord = match serde_json::from_slice(&raw) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Skipping unparseable profile");
                continue;
            }
        };

        let result = scorer.score(&profile);
        rows.push((
            profile.display_name(),
            profile.profile_url.clone(),
            result.percentage,
            format!(
                "{}/{}",
                result.breakdown.skills.required.matches.len(),
                required_total
            ),
        ));
    }

    if rows.is_empty() {
        bail!("No profiles found in {}", profiles_dir.display());
    }

    rows.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let output = output.unwrap_or_else(|| {
        store_cfg.scores_dir.join(format!(
            "scores_{}_{}.csv",
            requirements_id,
            Utc::now().format("%Y%m%d_%H%M%S")
        ))
    });
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    writer.write_record(["rank", "name", "profile_url", "score", "skills_matched"])?;
    for (rank, (name, url, score, matched)) in rows.iter().enumerate() {
        writer.write_record([
            &(rank + 1).to_string(),
            name,
            url,
            &format!("{score}"),
            matched,
        ])?;
    }
    writer.flush()?;

    println!(
        "Ranked {} profiles against '{}', written to {}",
        rows.len(),
        requirements_id,
        output.display()
    );
    println!("Top {}:", rows.len().min(10));
    for (i, (name, _, score, matched)) in rows.iter().take(10).enumerate() {
        println!("  {:>2}. {name}: {score}% (skills {matched})", i + 1);
    }
    Ok(())
}

async fn cmd_score_file(profile_path: &PathBuf, requirements_id: &str) -> Result<()> {
    let store_cfg = StoreConfig::from_env();

    let raw = std::fs::read(profile_path)
        .with_context(|| format!("Failed to read profile: {}", profile_path.display()))?;
    let profile: ProfileRecord =
        serde_json::from_slice(&raw).context("Invalid profile record JSON")?;

    let spec = FileRequirementSource::new(&store_cfg.requirements_dir)
        .load(requirements_id)
        .await?;
    let result = Scorer::new(spec).score(&profile);

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_depth() -> Result<()> {
    let amqp = AmqpConfig::from_env()?;
    let broker = AmqpBroker::connect(&amqp).await?;

    for queue in [&amqp.crawl_queue, &amqp.scoring_queue] {
        broker.declare_queue(queue).await?;
        let depth = broker.queue_depth(queue).await?;
        println!("{queue}: {depth}");
    }
    Ok(())
}
