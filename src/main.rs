use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use docbench::bench::{CoordinatorRunner, Sweep, WorkerRunner};
use docbench::config::persistence::ResultsStorage;
use docbench::config::SweepConfig;
use docbench::error::{is_configuration_error, user_friendly_message};
use docbench::models::SweepEntry;
use docbench::pool::{serve_worker, InProcessWorkerPool, ProcessWorkerPool, WorkerEntry, WorkerPool};
use docbench::report::{render_entry, render_summary, render_sweep, ReportFormat};
use docbench::store::StoreWorkloads;
use docbench::util::{format_duration, parse_duration, parse_size};
use docbench::{Result, WORKER_SUBCOMMAND};

/// Exit status for settings rejected before any worker started
const CONFIG_ERROR_EXIT_CODE: u8 = 2;

#[derive(Parser)]
#[command(name = "docbench")]
#[command(about = "Write/read throughput benchmark across worker processes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep worker process counts and report combined throughput
    Run(RunArgs),

    /// Serve benchmark commands on stdin/stdout (started by `run`)
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Worker process counts to sweep, comma separated
    #[arg(short = 'p', long, value_delimiter = ',')]
    processes: Option<Vec<usize>>,

    /// Streams kept in flight per worker
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,

    /// Warm-up phase length ("5s", "5 seconds")
    #[arg(long, value_parser = duration_arg)]
    warm_up: Option<Duration>,

    /// Measurement phase length
    #[arg(long, value_parser = duration_arg)]
    measurement: Option<Duration>,

    /// Document store directory
    #[arg(short = 's', long)]
    store: Option<PathBuf>,

    /// Base collection name; worker i uses `<name>-<i>`
    #[arg(long)]
    collection: Option<String>,

    /// Payload size of inserted documents ("1KiB", "512")
    #[arg(long, value_parser = size_arg)]
    document_size: Option<u64>,

    /// How long to wait for each worker reply
    #[arg(long, value_parser = duration_arg)]
    reply_timeout: Option<Duration>,

    /// Report format: text or json
    #[arg(short = 'f', long, default_value = "text")]
    format: ReportFormat,

    /// Run workers as tasks inside this process
    #[arg(long)]
    in_process: bool,

    /// Append the results to the history file
    #[arg(long)]
    save: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct WorkerArgs {
    #[arg(long)]
    index: usize,

    #[arg(long)]
    store: PathBuf,

    #[arg(long)]
    collection: String,

    #[arg(long)]
    document_size: u64,

    #[arg(long, value_parser = duration_arg)]
    warm_up: Duration,

    #[arg(long, value_parser = duration_arg)]
    measurement: Duration,
}

fn duration_arg(s: &str) -> std::result::Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

fn size_arg(s: &str) -> std::result::Result<u64, String> {
    parse_size(s).map_err(|e| e.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info"));
    // stdout of a worker carries protocol messages, so logs always go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Worker(args) => worker(args).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Benchmark failed");
            eprintln!("Error: {}", user_friendly_message(&e));
            if is_configuration_error(&e) {
                ExitCode::from(CONFIG_ERROR_EXIT_CODE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn load_config(args: &RunArgs) -> Result<SweepConfig> {
    let mut config = match &args.config {
        Some(path) => SweepConfig::load_from(path)?,
        None => SweepConfig::load()?,
    };

    if let Some(processes) = args.processes.clone() {
        config = config.with_process_counts(processes);
    }
    if let Some(level) = args.concurrency {
        config = config.with_concurrency_level(level);
    }
    if let Some(warm_up) = args.warm_up {
        config = config.with_warm_up_duration(warm_up);
    }
    if let Some(measurement) = args.measurement {
        config = config.with_measurement_duration(measurement);
    }
    if let Some(store) = args.store.clone() {
        config = config.with_store_path(store);
    }
    if let Some(collection) = args.collection.clone() {
        config = config.with_collection(collection);
    }
    if let Some(size) = args.document_size {
        config = config.with_document_size(size);
    }
    if let Some(timeout) = args.reply_timeout {
        config = config.with_reply_timeout(timeout);
    }

    config.validate()?;
    Ok(config)
}

/// Arguments a worker process needs, minus `--index` which the pool appends
fn worker_command_line(config: &SweepConfig) -> Vec<String> {
    vec![
        WORKER_SUBCOMMAND.to_string(),
        "--store".to_string(),
        config.store_path.display().to_string(),
        "--collection".to_string(),
        config.collection.clone(),
        "--document-size".to_string(),
        config.document_size.to_string(),
        "--warm-up".to_string(),
        format_duration(config.warm_up_duration),
        "--measurement".to_string(),
        format_duration(config.measurement_duration),
    ]
}

async fn sweep_with<P: WorkerPool>(
    pool: P,
    config: &SweepConfig,
    format: ReportFormat,
) -> Result<Vec<SweepEntry>> {
    let mut coordinator = CoordinatorRunner::new(pool, config.concurrency_level);

    Sweep::new(config.process_counts.clone())
        .run(&mut coordinator, |entry| {
            if format == ReportFormat::Text {
                println!("{}", render_entry(entry, format)?);
            }
            Ok(())
        })
        .await
}

async fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    info!(
        processes = ?config.process_counts,
        concurrency_level = config.concurrency_level,
        warm_up = %format_duration(config.warm_up_duration),
        measurement = %format_duration(config.measurement_duration),
        store = %config.store_path.display(),
        "Starting sweep"
    );

    let entries = if args.in_process {
        let factory = StoreWorkloads::new(
            config.store_path.clone(),
            config.collection.clone(),
            config.document_size as usize,
        );
        let pool = InProcessWorkerPool::new(
            Arc::new(factory),
            config.warm_up_duration,
            config.measurement_duration,
            config.reply_timeout,
        );
        sweep_with(pool, &config, args.format).await?
    } else {
        let entry = WorkerEntry::current_exe(worker_command_line(&config))?;
        let pool = ProcessWorkerPool::new(entry, config.reply_timeout);
        sweep_with(pool, &config, args.format).await?
    };

    match args.format {
        ReportFormat::Text => print!("{}", render_summary(&entries)),
        ReportFormat::Json => println!("{}", render_sweep(&entries, args.format)?),
    }

    if args.save {
        let storage = ResultsStorage::new()?;
        storage.append_results(&entries)?;
        info!(path = %storage.path().display(), "Saved results");
    }

    Ok(())
}

async fn worker(args: WorkerArgs) -> Result<()> {
    let factory = StoreWorkloads::new(args.store, args.collection, args.document_size as usize);
    let runner = WorkerRunner::new(args.index, Arc::new(factory)).with_durations(args.warm_up, args.measurement);

    info!(worker = args.index, "Worker ready");
    serve_worker(&runner, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}
