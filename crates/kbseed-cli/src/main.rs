//! kbseed - seed a smart-contract knowledge base
//!
//! ## Commands
//!
//! - `analyze`: ingest origins, cache Solidity sources, run layered analysis
//! - `classify`: show the source kind of each origin (no network)
//! - `cache list`: show cached Solidity files
//! - `tools`: show which analysis tools are on PATH
//! - `version`: print the version

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

use kbseed_analysis::{ProcessToolRunner, RunPipeline, RunRequest, StrategyChain};
use kbseed_core::reporting::render_summary_table;
use kbseed_core::{classify, FsBlobStore, PipelineConfig, SolidityCache, StrategyKind};

#[derive(Parser)]
#[command(name = "kbseed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Seed a smart-contract knowledge base from docs and code links", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest origins and analyze any Solidity found
    Analyze(AnalyzeArgs),

    /// Print the source kind of each origin
    Classify {
        /// URLs or paths
        #[arg(required = true)]
        origins: Vec<String>,
    },

    /// Inspect the Solidity cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show which analysis tools are available
    Tools,

    /// Print version
    Version,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached Solidity files
    List {
        /// Cache directory (default: KBSEED_CACHE_DIR or .workspace_cache/solidity)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Default)]
struct AnalyzeArgs {
    /// Origins; space or comma separated, repeatable
    #[arg(long, num_args = 1..)]
    urls: Vec<String>,

    /// File with one origin per line (`#` comments allowed)
    #[arg(long)]
    urls_file: Option<PathBuf>,

    /// Run id (default: timestamp plus random suffix)
    #[arg(long)]
    run_id: Option<String>,

    /// Parent directory for run outputs
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Solidity cache directory, shared across runs
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Concurrent fetches
    #[arg(long)]
    concurrency: Option<usize>,

    /// Concurrent per-file analyses
    #[arg(long)]
    analysis_concurrency: Option<usize>,

    /// Cancel the run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    kbseed_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Analyze(args) => cmd_analyze(args).await,
        Commands::Classify { origins } => cmd_classify(&origins),
        Commands::Cache { action } => match action {
            CacheAction::List { cache_dir } => cmd_cache_list(cache_dir.as_deref()),
        },
        Commands::Tools => cmd_tools(),
        Commands::Version => {
            println!("kbseed {}", kbseed_core::VERSION);
            Ok(())
        }
    }
}

fn load_config() -> Result<PipelineConfig> {
    PipelineConfig::from_env().context("Invalid KBSEED_* environment configuration")
}

fn apply_overrides(mut config: PipelineConfig, args: &AnalyzeArgs) -> PipelineConfig {
    if let Some(dir) = &args.artifacts_dir {
        config.artifacts_root = dir.clone();
    }
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(n) = args.concurrency {
        config.ingest_concurrency = n;
    }
    if let Some(n) = args.analysis_concurrency {
        config.analysis_concurrency = n;
    }
    if let Some(secs) = args.timeout_secs {
        config.run_timeout_secs = Some(secs);
    }
    config
}

/// Split `--urls` values on whitespace and commas.
fn split_urls(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(|c: char| c == ',' || c.is_whitespace()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One origin per line; blank lines and `#` comments are skipped.
fn parse_urls_file(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn collect_origins(args: &AnalyzeArgs) -> Result<Vec<String>> {
    let mut origins = split_urls(&args.urls);
    if let Some(path) = &args.urls_file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read urls file {:?}", path))?;
        origins.extend(parse_urls_file(&contents));
    }
    if origins.is_empty() {
        bail!("No origins given; pass --urls or --urls-file");
    }
    Ok(origins)
}

async fn cmd_analyze(args: AnalyzeArgs) -> Result<()> {
    let origins = collect_origins(&args)?;
    let config = apply_overrides(load_config()?, &args);
    let pipeline = RunPipeline::from_config(config).context("Failed to set up run")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing with partial results");
            on_signal.cancel();
        }
    });

    let mut request = RunRequest::new(origins);
    if let Some(run_id) = args.run_id {
        request = request.with_run_id(run_id);
    }
    let outcome = pipeline.execute(request, &cancel).await.context("Run failed")?;
    info!(run_dir = %outcome.run_dir.display(), "run outputs written");

    print!("{}", render_summary_table(&outcome.summary, outcome.cancelled));
    println!();
    println!("Run directory: {}", outcome.run_dir.display());
    println!("Summary:       {}", outcome.summary_path.display());
    println!("Manifest:      {}", outcome.manifest_path.display());
    Ok(())
}

fn cmd_classify(origins: &[String]) -> Result<()> {
    for origin in origins {
        println!("{:<14} {}", classify(origin).as_str(), origin);
    }
    Ok(())
}

fn cmd_cache_list(cache_dir: Option<&Path>) -> Result<()> {
    let dir = match cache_dir {
        Some(dir) => dir.to_path_buf(),
        None => load_config()?.cache_dir,
    };
    let store = FsBlobStore::new(&dir).with_context(|| format!("Failed to open cache at {:?}", dir))?;
    let cache = SolidityCache::open(Arc::new(store)).context("Failed to load cache index")?;

    let entries = cache.list();
    if entries.is_empty() {
        println!("Cache at {:?} is empty.", dir);
        return Ok(());
    }
    for entry in &entries {
        let hash = entry.content_hash.to_hex();
        println!(
            "{}  {:>8}  {}  {}",
            &hash[..12],
            entry.size_bytes,
            entry.updated_at.format("%Y-%m-%d %H:%M"),
            entry.repo_identity
        );
    }
    println!("{} file(s)", entries.len());
    Ok(())
}

fn cmd_tools() -> Result<()> {
    let config = load_config()?;
    let runner = ProcessToolRunner::new(Duration::from_secs(config.tool_timeout_secs));
    let chain = StrategyChain::standard(Arc::new(runner), &config);

    for (strategy, available) in chain.availability() {
        let tool = match strategy {
            StrategyKind::CompilerAst => config.compiler_tool.as_str(),
            StrategyKind::SecurityScanner => config.scanner_tool.as_str(),
            StrategyKind::RegexFallback => "(built-in)",
        };
        let state = if available { "available" } else { "missing" };
        println!("{:<18} {:<12} {}", strategy.as_str(), tool, state);
    }
    Ok(())
}
