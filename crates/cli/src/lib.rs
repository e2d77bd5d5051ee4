use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use context_index_store::provider_from_config;
use context_indexer::{IndexOutcome, IndexProgress, WatcherConfig};
use context_search::{CodeIndexService, RetrievalConfig};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::json;
use std::io;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

mod settings;

pub use settings::{IndexingSettings, Settings, SETTINGS_FILE_NAME};

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    print_stdout(&text)
}

#[derive(Parser)]
#[command(name = "context-index")]
#[command(about = "Workspace symbol index and context retrieval", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for results)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Workspace root; repeat for multi-root workspaces
    #[arg(long = "root", global = true, default_value = ".")]
    roots: Vec<PathBuf>,

    /// Settings file (default: <first root>/context-index.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Files processed concurrently per batch (overrides [indexing] batch_size)
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the workspace and print statistics
    Index(IndexArgs),

    /// Innermost symbol enclosing a position
    #[command(name = "symbol-at")]
    SymbolAt(SymbolAtArgs),

    /// Symbols with an exact name, across all files
    Symbol(SymbolArgs),

    /// Files most similar to a piece of text
    Similar(SimilarArgs),

    /// Assemble retrieval context for a query
    Context(ContextArgs),

    /// Index, then keep the index current as files change (Ctrl-C to stop)
    Watch,
}

#[derive(Args)]
struct IndexArgs {
    /// Print statistics as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SymbolAtArgs {
    /// File path, absolute or workspace-relative
    path: PathBuf,

    /// 1-based line
    line: usize,

    /// 0-based column
    character: usize,
}

#[derive(Args)]
struct SymbolArgs {
    name: String,
}

#[derive(Args)]
struct SimilarArgs {
    text: String,

    #[arg(long, default_value_t = 10)]
    top: usize,

    #[arg(long, default_value_t = 0.0)]
    min_similarity: f32,
}

#[derive(Args)]
struct ContextArgs {
    query: String,

    #[arg(long)]
    max_chunks: Option<usize>,

    #[arg(long)]
    max_chunk_size: Option<usize>,

    #[arg(long)]
    min_similarity: Option<f32>,

    /// Print the context and its sources as JSON
    #[arg(long)]
    json: bool,
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    let json_output = match &cli.command {
        Commands::Index(args) => args.json,
        Commands::Context(args) => args.json,
        Commands::SymbolAt(_) | Commands::Symbol(_) | Commands::Similar(_) | Commands::Watch => {
            true
        }
    };
    if json_output && !cli.verbose {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let first_root = cli
        .roots
        .first()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let settings = Settings::load(cli.config.as_deref(), &first_root)?;
    let batch_size = cli.batch_size.unwrap_or(settings.indexing.batch_size);

    let retrieval = match &cli.command {
        Commands::Context(args) => RetrievalConfig {
            max_chunks: args.max_chunks.unwrap_or(settings.retrieval.max_chunks),
            max_chunk_size: args
                .max_chunk_size
                .unwrap_or(settings.retrieval.max_chunk_size),
            min_similarity: args
                .min_similarity
                .unwrap_or(settings.retrieval.min_similarity),
            ..settings.retrieval
        },
        _ => settings.retrieval,
    };

    let provider = provider_from_config(&settings.provider)?;
    let service = CodeIndexService::with_scan_options(
        cli.roots.clone(),
        provider,
        retrieval,
        settings.indexing.scan_options(),
    )
    .context("Failed to open workspace")?;

    let show_progress = !cli.quiet && !json_output;
    let outcome = run_index(&service, batch_size, show_progress).await?;

    match cli.command {
        Commands::Index(args) => {
            let stats = outcome.stats();
            if args.json {
                print_json(&stats, cli.pretty)?;
            } else if let Some(stats) = stats {
                print_stdout(&format!(
                    "Indexed {} files ({} symbols) in {} ms; {} parse failures, {} embedding failures, {} skipped",
                    stats.files,
                    stats.symbols,
                    stats.time_ms,
                    stats.parse_failures,
                    stats.embedding_failures,
                    stats.errors.len()
                ))?;
            }
        }
        Commands::SymbolAt(args) => {
            let symbol = service.find_symbol_at_position(&args.path, args.line, args.character);
            print_json(&symbol, cli.pretty)?;
        }
        Commands::Symbol(args) => {
            print_json(&service.find_symbol_by_name(&args.name), cli.pretty)?;
        }
        Commands::Similar(args) => {
            let hits = service
                .find_similar_to_text(&args.text, args.top, args.min_similarity)
                .await?;
            print_json(&hits, cli.pretty)?;
        }
        Commands::Context(args) => {
            let context = service.retrieve_context(&args.query).await;
            if args.json {
                print_json(&context, cli.pretty)?;
            } else if !context.text.is_empty() {
                print_stdout(&context.text)?;
            }
        }
        Commands::Watch => watch(&service, cli.pretty).await?,
    }

    Ok(())
}

async fn run_index(
    service: &CodeIndexService,
    batch_size: usize,
    show_progress: bool,
) -> Result<IndexOutcome> {
    let bar = if show_progress {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
                .progress_chars("█▓░"),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let on_progress = {
        let bar = bar.clone();
        move |progress: IndexProgress| {
            bar.set_length(progress.total as u64);
            bar.set_position(progress.processed as u64);
        }
    };
    let outcome = service
        .index_workspace(batch_size, Some(&on_progress))
        .await?;
    bar.finish_and_clear();
    Ok(outcome)
}

async fn watch(service: &CodeIndexService, pretty: bool) -> Result<()> {
    let watcher = service.watch(WatcherConfig::default())?;
    let mut updates = watcher.subscribe();
    log::info!("Watching for changes; press Ctrl-C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    let line = match &update.outcome {
                        Ok(outcome) => json!({ "path": update.path, "outcome": outcome }),
                        Err(err) => json!({ "path": update.path, "error": err }),
                    };
                    print_json(&line, pretty)?;
                }
                Err(RecvError::Lagged(skipped)) => log::warn!("Dropped {skipped} watch updates"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    watcher.shutdown();
    Ok(())
}
