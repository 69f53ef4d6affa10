use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tokio::sync::broadcast::error::RecvError;

use bulkgen::config::validate_config;
use bulkgen::telemetry::{init_logging, LogFormat};
use bulkgen::{
    load_config, load_image_dir, open_job_store, BulkPipeline, BulkgenError, Config,
    HttpGenerator, JobEventKind, JobSettings, Language, Tone,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (.json, .yaml or .yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format: pretty, compact or json
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one article per spreadsheet row
    Run {
        /// Spreadsheet to read (.xlsx, .xls or .csv)
        spreadsheet: PathBuf,

        /// Directory of images to place into articles
        #[arg(short, long)]
        images: Option<PathBuf>,

        /// Skip image placement
        #[arg(long)]
        no_images: bool,

        /// Concurrent generation requests
        #[arg(short, long)]
        workers: Option<usize>,

        /// Default tone for rows that leave it blank
        #[arg(long)]
        tone: Option<Tone>,

        /// Default language for rows that leave it blank
        #[arg(long)]
        language: Option<Language>,

        /// Where to write the job results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List stored jobs, newest first
    Jobs,
    /// Print the results of a finished job as JSON
    Results { job_id: String },
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging("info", args.log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(execute(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_config(path: Option<&Path>) -> Result<Config, BulkgenError> {
    let config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    validate_config(&config)?;
    Ok(config)
}

async fn execute(args: Args) -> Result<(), BulkgenError> {
    let mut config = read_config(args.config.as_deref())?;

    match args.command {
        Command::Run {
            spreadsheet,
            images,
            no_images,
            workers,
            tone,
            language,
            output,
        } => {
            if let Some(workers) = workers {
                config.scheduler.worker_count = workers;
                validate_config(&config)?;
            }
            let mut settings = config.defaults;
            if let Some(tone) = tone {
                settings.tone = tone;
            }
            if let Some(language) = language {
                settings.language = language;
            }
            if no_images {
                settings.include_images = false;
            }
            run(&config, &spreadsheet, images.as_deref(), settings, output.as_deref()).await
        }
        Command::Jobs => {
            let store = open_job_store(&config)?;
            for job in store.list() {
                println!(
                    "{}  {:<10}  {}/{} ok, {} failed  {}",
                    job.id,
                    job.status.as_str(),
                    job.completed_articles,
                    job.total_articles,
                    job.failed_articles,
                    job.file_name
                );
            }
            Ok(())
        }
        Command::Results { job_id } => {
            let store = open_job_store(&config)?;
            let results = store.results(&job_id)?;
            println!("{}", to_json(&results)?);
            Ok(())
        }
    }
}

async fn run(
    config: &Config,
    spreadsheet: &Path,
    images: Option<&Path>,
    settings: JobSettings,
    output: Option<&Path>,
) -> Result<(), BulkgenError> {
    let generator = HttpGenerator::from_config(&config.provider)?;
    let pipeline = BulkPipeline::from_config(config, Arc::new(generator))?;

    let bytes = std::fs::read(spreadsheet).map_err(|e| bulkgen::ConfigError::ReadFile {
        path: spreadsheet.to_path_buf(),
        source: e,
    })?;
    let file_name = spreadsheet
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| spreadsheet.display().to_string());

    let pool = match images {
        Some(dir) if settings.include_images => {
            Some(load_image_dir(dir, config.limits.max_images)?)
        }
        _ => None,
    };

    let mut events = pipeline.subscribe();
    let handle = pipeline.submit(&file_name, &bytes, pool, settings)?;
    info!("Started job {}", handle.job_id());

    let token = handle.cancellation_token();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("Cancelling: in-flight articles will finish, the rest are skipped");
        token.cancel();
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let reporter = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Progress output skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match event.kind {
                JobEventKind::RowSucceeded | JobEventKind::RowFailed => {
                    if let Some(summary) = event.summary {
                        eprintln!(
                            "[{}/{}] {}",
                            summary.completed_articles + summary.failed_articles,
                            summary.total_articles,
                            event.message
                        );
                    }
                }
                JobEventKind::JobFinished | JobEventKind::JobFaulted => break,
                _ => {}
            }
        }
    });

    let job_id = handle.job_id().to_string();
    let outcome = handle.wait().await;
    reporter.abort();
    let summary = outcome?;

    println!(
        "Job {} {}: {} succeeded, {} failed of {}",
        summary.id,
        summary.status,
        summary.completed_articles,
        summary.failed_articles,
        summary.total_articles
    );

    if let Some(output) = output {
        let results = pipeline.results(&job_id)?;
        std::fs::write(output, to_json(&results)?).map_err(|e| bulkgen::ConfigError::WriteFile {
            path: output.to_path_buf(),
            source: e,
        })?;
        info!("Results written to {}", output.display());
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, BulkgenError> {
    serde_json::to_string_pretty(value).map_err(|e| bulkgen::ConfigError::from(e).into())
}
