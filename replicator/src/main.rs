//! Binlog replicator binary.
//!
//! Streams row changes of a set of MySQL tables from the binlog, folds them into change
//! events of a master document and writes them to the configured sink. The binlog position
//! is checkpointed to a file so that a restart resumes where the previous run stopped.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::load_replicator_config;
use crate::core::start_replicator_with_config;
use crate::error::ReplicatorResult;

mod config;
mod core;
mod error;

#[derive(Debug, Parser)]
#[command(name = "binlog-replicator", version, about = "Streams MySQL binlog changes to a sink")]
struct Args {
    /// Path of the YAML or JSON configuration file.
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprint!("{}", err.render_report());

            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> ReplicatorResult<()> {
    let replicator_config = load_replicator_config(&args.config)?;

    let log_file = replicator_config
        .logging
        .as_ref()
        .map(|logging| (logging.dir.as_path(), logging.file_prefix.as_str()));
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), log_file)
        .map_err(crate::error::ReplicatorError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_replicator_with_config(replicator_config))
}
