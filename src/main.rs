use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use expedition_analytics::{
    analyze_sharded, AnalysisReport, AnalyticsConfig, NdjsonSource, RecordSource,
    StreamingAnalysis,
};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (config_path, input_arg) = parse_args(&args)?;

    let config = AnalyticsConfig::load(config_path.as_deref())?;
    let input = match input_arg.or_else(|| config.input_path.clone()) {
        Some(path) => path,
        None => bail!("No input file. Usage: expedition-analytics [--config FILE] [INPUT.jsonl]"),
    };

    run_analysis(&config, &input)
}

/// `[--config FILE] [INPUT]`, in any order
fn parse_args(args: &[String]) -> Result<(Option<PathBuf>, Option<PathBuf>)> {
    let mut config_path = None;
    let mut input = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let value = iter.next().context("--config needs a file path")?;
                config_path = Some(PathBuf::from(value));
            }
            flag if flag.starts_with('-') => bail!("Unknown option: {}", flag),
            path => {
                if input.is_some() {
                    bail!("Only one input file may be given");
                }
                input = Some(PathBuf::from(path));
            }
        }
    }

    Ok((config_path, input))
}

fn run_analysis(config: &AnalyticsConfig, input: &Path) -> Result<()> {
    println!("🦁 Expedition Analytics v{}", expedition_analytics::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let params = config.to_params();
    let source = NdjsonSource::new(input);

    // 1. Ingest + analyze
    let (report, rejected_lines) = match config.shard_size {
        Some(shard_size) => {
            println!("\n📂 Loading {}...", source.describe());
            let ingest = source.read_batch()?;
            println!("✓ {}", ingest.summary());

            println!("\n⚡ Running sharded analysis ({} expeditions per shard)...", shard_size);
            (analyze_sharded(&ingest.batch, &params, shard_size), ingest.rejected_lines)
        }
        None => {
            println!("\n📂 Streaming {} in chunks of {}...", source.describe(), config.chunk_size);
            let mut analysis = StreamingAnalysis::new(params);
            let mut rejected_lines = 0;

            for chunk in source.chunks(config.chunk_size)? {
                let chunk = chunk?;
                analysis.observe_all(&chunk.expeditions);
                rejected_lines += chunk.rejected_lines;
            }
            println!(
                "✓ Observed {} expeditions ({} lines rejected)",
                analysis.records_seen(),
                rejected_lines
            );

            (analysis.finish(), rejected_lines)
        }
    };

    // 2. Print tables
    println!();
    print!("{}", report.render());

    // 3. CSV export
    if let Some(dir) = &config.csv_dir {
        println!("💾 Writing CSV files...");
        let files = report.write_csv_dir(dir)?;
        for file in &files {
            println!("✓ {}", file.display());
        }
    }

    print_footer(&report, rejected_lines)
}

fn print_footer(report: &AnalysisReport, rejected_lines: usize) -> Result<()> {
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Skipped rows: {}", report.skipped_rows());
    println!("✓ Rejected lines: {}", rejected_lines);
    println!("🔒 Fingerprint: {}", report.fingerprint()?);
    Ok(())
}
