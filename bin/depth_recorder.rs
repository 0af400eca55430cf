//! CLI entry point.
//!
//! Grounded in the teacher's `bin/bid_ask_service.rs`: a clap-derived
//! `Opts`, a `tracing_appender::rolling` file sink combined with stdout,
//! and an async `main`. Diverges from the teacher in its return type:
//! spec.md §6 is explicit about process exit codes, so `main` returns
//! `ExitCode` directly instead of bailing through `eyre::Result`.

use std::process::ExitCode;

use clap::Parser;
use depth_recorder::{config::Config, supervisor::Supervisor};
use tracing_subscriber::{fmt::writer::MakeWriterExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Records Binance depth-diff and trade streams to CSV")]
struct Opts {
    /// Overrides DEPTH_RECORDER_CONFIG for this run.
    #[arg(long)]
    config: Option<String>,

    /// tracing level filter (e.g. "info", "debug", "depth_recorder=trace").
    #[arg(long, default_value = "info")]
    level: String,

    #[arg(long, default_value = "depth-recorder.log")]
    log_file: String,
}

fn initialize_tracing(opts: &Opts) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never(".", &opts.log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_new(&opts.level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.and(std::io::stdout))
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    let opts = Opts::parse();
    let _guard = initialize_tracing(&opts);

    if let Some(path) = &opts.config {
        std::env::set_var("DEPTH_RECORDER_CONFIG", path);
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "failed to load config");
            return ExitCode::FAILURE;
        }
    };

    let supervisor = match Supervisor::build(&config) {
        Ok(supervisor) => supervisor,
        Err(err) => {
            tracing::error!(%err, "failed to build pipelines");
            return ExitCode::FAILURE;
        }
    };

    supervisor.run().await
}
