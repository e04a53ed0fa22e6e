//! CLI entry point for the signal_rank tool.
//!
//! Ranks the most congested traffic signals per timestamp across a fixed
//! group of participants, or checks that a record source ingests cleanly.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use signal_rank::aggregate::{DEFAULT_TOP_N, WorkSplit};
use signal_rank::config::{DEFAULT_PARTICIPANTS, DEFAULT_SIGNAL_COUNT};
use signal_rank::output::{append_records, print_json, print_table};
use signal_rank::parser::read_source;
use signal_rank::{RunConfig, run};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "signal_rank")]
#[command(about = "Rank congested traffic signals per timestamp", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank the busiest signals for every timestamp in a record source
    Rank {
        /// Path to the CSV record source (optionally .gz)
        #[arg(value_name = "SOURCE", env = "SIGNAL_RANK_SOURCE")]
        source: PathBuf,

        /// Number of participants sharing the aggregation
        #[arg(short, long, env = "SIGNAL_RANK_PARTICIPANTS", default_value_t = DEFAULT_PARTICIPANTS)]
        participants: usize,

        /// Signals reported per timestamp
        #[arg(short = 'n', long, env = "SIGNAL_RANK_TOP_N", default_value_t = DEFAULT_TOP_N)]
        top_n: usize,

        /// Number of known signals (ids 1..=K)
        #[arg(short = 'k', long, env = "SIGNAL_RANK_SIGNAL_COUNT", default_value_t = DEFAULT_SIGNAL_COUNT)]
        signal_count: u32,

        /// How readings are split between participants: strided or replicated
        #[arg(long, env = "SIGNAL_RANK_SPLIT", default_value = "strided")]
        split: WorkSplit,

        /// Output format on stdout
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Optional CSV file to append ranked rows to
        #[arg(long, env = "SIGNAL_RANK_CSV")]
        csv: Option<PathBuf>,
    },
    /// Ingest a record source and report what it contains
    Validate {
        /// Path to the CSV record source (optionally .gz)
        #[arg(value_name = "SOURCE", env = "SIGNAL_RANK_SOURCE")]
        source: PathBuf,

        /// Number of known signals (ids 1..=K)
        #[arg(short = 'k', long, env = "SIGNAL_RANK_SIGNAL_COUNT", default_value_t = DEFAULT_SIGNAL_COUNT)]
        signal_count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/signal_rank.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("signal_rank.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Rank {
            source,
            participants,
            top_n,
            signal_count,
            split,
            format,
            csv,
        } => {
            let config = RunConfig::new(source)
                .with_participants(participants)
                .with_top_n(top_n)
                .with_signal_count(signal_count)
                .with_split(split);

            let rankings = run(&config).await?;

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            match format {
                Format::Table => print_table(&mut out, &rankings)?,
                Format::Json => print_json(&mut out, &rankings)?,
            }

            if let Some(path) = csv {
                append_records(&path, &rankings)
                    .with_context(|| format!("Failed to append rankings to {}", path.display()))?;
                info!(path = %path.display(), "Rankings appended to CSV");
            }
        }
        Commands::Validate {
            source,
            signal_count,
        } => {
            let groups = read_source(&source, signal_count)?;
            info!(
                source = %source.display(),
                timestamps = groups.len(),
                readings = groups.reading_count(),
                "Record source is valid"
            );
        }
    }

    Ok(())
}
