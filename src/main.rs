//! reqcheck - requirement completeness checker
//!
//! Usage:
//!   reqcheck validate <FILE>    Validate one document and write its reports
//!   reqcheck batch \[DIR\]        Validate every document in a directory
//!   reqcheck cache purge        Delete all cached segment results
//!   reqcheck cache stats        Show cache size

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use reqcheck_lib::config::{ValidatorConfig, APP_NAME, APP_VERSION};
use reqcheck_lib::models::ValidationResult;
use reqcheck_lib::pipeline::cache::{FileSegmentCache, SegmentCache};
use reqcheck_lib::pipeline::report::{write_batch_reports, write_document_reports};
use reqcheck_lib::pipeline::structuring::ChatCompletionsClient;
use reqcheck_lib::pipeline::validation::{RequirementValidator, Rubric};

#[derive(Parser)]
#[command(name = "reqcheck", version, about = "Check requirement documents for completeness")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON rubric file (type label -> required elements)
    #[arg(long, global = true)]
    rubric: Option<PathBuf>,

    /// Directory for generated reports
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Bypass the segment cache
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a single document
    Validate { file: PathBuf },
    /// Validate every document in a directory (defaults to the configured input dir)
    Batch { dir: Option<PathBuf> },
    /// Manage the segment cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete every cached entry
    Purge,
    /// Show entry count and size
    Stats,
}

fn main() -> ExitCode {
    reqcheck_lib::init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<ValidatorConfig> {
    let mut config = ValidatorConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = &cli.rubric {
        config.rubric = Rubric::from_json_file(path)
            .with_context(|| format!("Failed to load rubric {}", path.display()))?;
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if cli.no_cache {
        config.cache_enabled = false;
    }
    if config.rubric.is_empty() {
        tracing::warn!("Rubric lists no elements; local re-check will not change any score");
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    tracing::debug!("{APP_NAME} v{APP_VERSION}");

    match cli.command {
        Command::Cache { action } => cache_command(&config, action),
        Command::Validate { file } => {
            let validator = build_validator(&config)?;
            let runtime = build_runtime()?;
            match runtime.block_on(validator.validate_document(&file)) {
                Ok(result) => {
                    print_result(&result);
                    let paths = write_document_reports(&result, &config.output_dir)?;
                    println!("  report: {}", paths.markdown.display());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    tracing::error!(document = %e.document(), error = %e, "Validation failed");
                    eprintln!("error: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Batch { dir } => {
            let dir = dir.unwrap_or_else(|| config.input_dir.clone());
            let validator = build_validator(&config)?;
            let runtime = build_runtime()?;
            let outcome = runtime.block_on(validator.validate_batch(&dir));

            for result in &outcome.results {
                print_result(result);
                if let Err(e) = write_document_reports(result, &config.output_dir) {
                    tracing::error!(document = %result.document_name, error = %e, "Failed to write reports");
                }
            }
            for failure in &outcome.failures {
                println!("{}: FAILED ({})", failure.document_name, failure.reason);
            }

            if !outcome.results.is_empty() || !outcome.failures.is_empty() {
                let paths = write_batch_reports(&outcome.summary(), &config.output_dir)?;
                println!("batch summary: {}", paths.markdown.display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_validator(config: &ValidatorConfig) -> Result<RequirementValidator> {
    let llm = Arc::new(
        ChatCompletionsClient::new(&config.service)
            .context("Set REQCHECK_API_KEY or DEEPSEEK_API_KEY")?,
    );
    let cache: Option<Arc<dyn SegmentCache>> = if config.cache_enabled {
        let cache: Arc<dyn SegmentCache> = Arc::new(
            FileSegmentCache::open(&config.cache_dir)
                .with_context(|| format!("Failed to open cache at {}", config.cache_dir.display()))?,
        );
        Some(cache)
    } else {
        None
    };
    Ok(RequirementValidator::new(config, llm, cache))
}

/// The extraction client blocks, so the runtime is built after it and
/// dropped before it.
fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn cache_command(config: &ValidatorConfig, action: CacheAction) -> Result<ExitCode> {
    let cache = FileSegmentCache::open(&config.cache_dir)?;
    match action {
        CacheAction::Purge => {
            let removed = cache.purge()?;
            println!("Removed {removed} cache entries from {}", cache.dir().display());
        }
        CacheAction::Stats => {
            let stats = cache.stats()?;
            println!(
                "{}: {} entries, {:.1} KiB",
                cache.dir().display(),
                stats.entries,
                stats.bytes as f64 / 1024.0
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_result(result: &ValidationResult) {
    println!(
        "{}: {} requirements, {} complete, score {:.2}% ({} of {} segments failed, {:.2}s)",
        result.document_name,
        result.total_requirements,
        result.complete_requirements,
        result.completeness_score,
        result.failed_segments,
        result.segment_count,
        result.validation_time_secs
    );
}
