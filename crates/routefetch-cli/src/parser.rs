//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options. Engine
//! settings can come from the environment (see `routefetch_core::settings`);
//! flags given here win over the environment.

use clap::Parser;

use routefetch_core::{DigestAlgorithm, Settings};

use crate::commands::Commands;

/// Command-line interface for the routefetch download engine.
#[derive(Parser)]
#[command(name = "routefetch")]
#[command(about = "Queue, resume, verify and unpack HTTP downloads")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Number of parallel downloads
    #[arg(short = 'j', long = "jobs", global = true)]
    pub jobs: Option<u32>,

    /// Maximum number of queued downloads
    #[arg(long = "max-queue", global = true)]
    pub max_queue: Option<u32>,

    /// Connect timeout in seconds
    #[arg(long = "connect-timeout", global = true)]
    pub connect_timeout: Option<u64>,

    /// Idle read timeout in seconds
    #[arg(long = "read-timeout", global = true)]
    pub read_timeout: Option<u64>,

    /// Digest used when a checksum's algorithm cannot be inferred
    #[arg(long = "digest", global = true)]
    pub digest: Option<DigestAlgorithm>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Settings given on the command line.
    pub const fn settings_overrides(&self) -> Settings {
        Settings {
            max_concurrent: self.jobs,
            max_queue_size: self.max_queue,
            connect_timeout_secs: self.connect_timeout,
            read_timeout_secs: self.read_timeout,
            default_digest: self.digest,
            progress_interval_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "routefetch",
            "--verbose",
            "-j",
            "8",
            "--digest",
            "sha256",
            "config",
        ]);
        assert!(cli.verbose);

        let overrides = cli.settings_overrides();
        assert_eq!(overrides.max_concurrent, Some(8));
        assert_eq!(overrides.default_digest, Some(DigestAlgorithm::Sha256));
        assert_eq!(overrides.max_queue_size, None);
    }
}
