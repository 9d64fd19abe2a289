//! `corpusline verify` - summarize checkpoints from a previous run

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use corpusline_core::builder::RANKED_CHECKPOINT;
use corpusline_core::console::fmt_num;
use corpusline_core::{CancelToken, CheckpointStore, CorpusBuilder, Sample};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Source as name=path (repeatable, overrides config sources)
    #[arg(short, long = "source", value_parser = super::parse_source)]
    pub sources: Vec<(String, PathBuf)>,

    /// Data directory holding the checkpoints
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
}

pub fn run(args: VerifyArgs, config: &Config) -> Result<()> {
    let mut corpus_config = config.to_corpus_config();
    if let Some(data_dir) = args.data_dir {
        corpus_config.data_dir = data_dir;
    }
    let sources = super::resolve_sources(&args.sources, config)?;

    let store = CheckpointStore::new(&corpus_config.data_dir);
    let mut builder = CorpusBuilder::new(corpus_config, CancelToken::new())?;
    for source in sources {
        builder.add_source(source);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Checkpoint").fg(Color::Cyan),
            Cell::new("Samples").fg(Color::Cyan),
            Cell::new("Skipped lines").fg(Color::Cyan),
            Cell::new("Status").fg(Color::Cyan),
        ]);

    let mut unreadable = 0usize;
    for entry in builder.verify() {
        if !entry.readable {
            unreadable += 1;
        }
        table.add_row(vec![
            entry.source.clone(),
            fmt_num(entry.samples),
            entry.skipped.to_string(),
            if entry.readable {
                "ok".to_string()
            } else {
                "unreadable".to_string()
            },
        ]);
    }

    match store.read_all::<Sample>(RANKED_CHECKPOINT) {
        Ok((samples, skipped)) => {
            table.add_row(vec![
                "ranked".to_string(),
                fmt_num(samples.len()),
                skipped.to_string(),
                "ok".to_string(),
            ]);
        }
        Err(_) => {
            unreadable += 1;
            table.add_row(vec![
                "ranked".to_string(),
                "-".to_string(),
                "-".to_string(),
                "unreadable".to_string(),
            ]);
        }
    }

    eprintln!("\n{table}");

    if unreadable > 0 {
        anyhow::bail!("{unreadable} checkpoints unreadable");
    }
    Ok(())
}
