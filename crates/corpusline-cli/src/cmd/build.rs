//! `corpusline build` - fetch, rank, and write the corpus

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use corpusline_core::console::{fmt_num, SharedProgress};
use corpusline_core::{BuildOutcome, BuildReport, CancelToken, CorpusBuilder};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Source as name=path to a JSON-Lines file (repeatable, overrides
    /// config sources)
    #[arg(short, long = "source", value_parser = super::parse_source)]
    pub sources: Vec<(String, PathBuf)>,

    /// Output path for the final corpus
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Entropy threshold for the ranked corpus
    #[arg(long)]
    pub rank_threshold: Option<f64>,
}

pub fn run(
    args: BuildArgs,
    config: &Config,
    progress: &SharedProgress,
    token: CancelToken,
) -> Result<()> {
    let mut corpus_config = config.to_corpus_config();
    if let Some(output) = args.output {
        corpus_config.output_path = output;
    }
    if let Some(workers) = args.workers {
        corpus_config.workers = workers;
    }
    if let Some(threshold) = args.rank_threshold {
        corpus_config.rank_threshold = threshold;
    }

    let sources = super::resolve_sources(&args.sources, config)?;

    let mut builder = CorpusBuilder::new(corpus_config, token)?;
    for source in sources {
        builder.add_source(source);
    }

    let pb = progress.stage_line("build");
    pb.set_message("collecting sources");
    let report = builder.build();
    pb.finish_and_clear();

    progress.println(&report.report);
    print_summary(&report, builder.config().output_path.display().to_string());

    if report.outcome == BuildOutcome::Aborted {
        anyhow::bail!(
            "aborted; partial corpus written to {}",
            builder.config().output_path.display()
        );
    }
    Ok(())
}

fn print_summary(report: &BuildReport, output_path: String) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Build").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let outcome = match report.outcome {
        BuildOutcome::Done => "done",
        BuildOutcome::Aborted => "aborted",
    };
    table.add_row(vec!["Outcome", outcome]);
    table.add_row(vec!["Merged samples", &fmt_num(report.merged_samples)]);
    table.add_row(vec!["Ranked samples", &fmt_num(report.ranked_samples)]);
    table.add_row(vec![
        "Checkpoint failures",
        &report.checkpoint_failures.to_string(),
    ]);
    table.add_row(vec!["Output", &output_path]);

    eprintln!("\n{table}");
}
