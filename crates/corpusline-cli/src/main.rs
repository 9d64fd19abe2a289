//! corpusline - build ranked text corpora from unreliable sources
//!
//! Collects records from configured sources under retry, deduplicates and
//! expands them into tagged samples, ranks the merged set by entropy, and
//! writes a JSON-Lines corpus with per-source checkpoints.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use corpusline_core::CancelToken;

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "corpusline")]
#[command(about = "Build ranked text corpora from unreliable sources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./corpusline.toml or ~/.config/corpusline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Maximum fetch attempts per source
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Receive timeout in seconds for stalled sources
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch all sources and build the ranked corpus
    Build(cmd::build::BuildArgs),
    /// Summarize checkpoints left by a previous run
    Verify(cmd::verify::VerifyArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(corpusline_core::console::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  — progress bars show activity
    //   non-TTY: info unless --debug          — logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    corpusline_core::console::init_logging(quiet, cli.debug, multi);

    // Load configuration
    let mut config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };
    if let Some(max_retries) = cli.max_retries {
        config.retry.max_retries = max_retries;
    }
    if let Some(timeout) = cli.timeout {
        config.retry.timeout_secs = timeout;
    }

    let token = CancelToken::new();
    setup_signal_handler(&token);

    match cli.command {
        Command::Build(args) => cmd::build::run(args, &config, &progress, token),
        Command::Verify(args) => cmd::verify::run(args, &config),
        Command::Config => {
            use comfy_table::{
                modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table,
            };

            let corpus = config.to_corpus_config();
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec!["Data directory", &corpus.data_dir.display().to_string()]);
            table.add_row(vec!["Output path", &corpus.output_path.display().to_string()]);
            table.add_row(vec!["Workers", &corpus.workers.to_string()]);
            table.add_row(vec!["Chunk size", &corpus.chunk_size.to_string()]);
            table.add_row(vec!["Default limit", &corpus.default_limit.to_string()]);
            table.add_row(vec!["Max retries", &corpus.max_retries.to_string()]);
            table.add_row(vec!["Backoff base", &format!("{}s", corpus.backoff_base)]);
            table.add_row(vec!["Timeout", &format!("{}s", corpus.timeout.as_secs())]);
            table.add_row(vec![
                "Rank threshold",
                &format!("{:.2}", corpus.rank_threshold),
            ]);
            table.add_row(vec![
                "Content threshold",
                &format!("{:.2}", corpus.content_threshold),
            ]);
            table.add_row(vec!["Sources", &config.sources.len().to_string()]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}

fn setup_signal_handler(token: &CancelToken) {
    // First signal: request graceful wind-down at the next stage boundary
    // Second signal: force exit
    // SAFETY: the token is a plain atomic swap and process::exit is
    // async-signal-safe
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        let token = token.clone();
        unsafe {
            signal_hook::low_level::register(signal, move || {
                if !token.cancel() {
                    std::process::exit(130);
                }
            })
            .expect("Failed to register signal handler");
        }
    }
}
