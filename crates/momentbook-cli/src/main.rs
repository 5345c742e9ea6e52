//! Momentbook CLI: the `momentbook` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            paths,
            normalize,
            jobs,
            json,
        } => commands::validate::run(paths, normalize, jobs, json),

        Commands::Normalize {
            input,
            out,
            now,
            allow_invalid,
        } => commands::normalize::run(input, out, now, allow_invalid),
    }
}
