use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "momentbook",
    about = "Momentbook: normalize and validate journey archive exports",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate journey archives against the v3 schema
    Validate {
        /// Archive files, or directories whose *.json entries are checked
        #[arg(default_value = ".")]
        paths: Vec<String>,

        /// Normalize each document before validating (migration dry run)
        #[arg(long)]
        normalize: bool,

        /// Number of worker threads
        #[arg(long, default_value_t = 1)]
        jobs: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Normalize one export into a canonical v3 archive
    Normalize {
        /// Input export file
        input: String,

        /// Write the normalized document here instead of stdout
        #[arg(long)]
        out: Option<String>,

        /// RFC 3339 instant to use for a missing or malformed exportedAt
        #[arg(long)]
        now: Option<String>,

        /// Exit 0 even when the normalized document fails validation
        #[arg(long)]
        allow_invalid: bool,
    },
}
