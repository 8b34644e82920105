mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod utils;

use clap::Parser;
use tracing::error;

use crate::cli::Cli;
use crate::error::Result;

fn main() {
    let args = Cli::parse();

    if let Err(e) = run(&args) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(args: &Cli) -> Result<()> {
    logging::setup_logging(args.verbose, args.quiet, Some(args.log_path()))?;

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| anyhow::anyhow!("failed to configure the thread pool: {}", e))?;
    }

    commands::assemble::run(args)
}
