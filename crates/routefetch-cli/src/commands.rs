//! Main commands enum.
//!
//! This module defines the available commands for the CLI tool.

use std::path::PathBuf;

use clap::Subcommand;

use routefetch_core::DigestAlgorithm;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Download one URL, resuming and verifying when size or checksum is given
    Fetch {
        /// Source URL (http or https)
        url: String,
        /// Destination file, or directory with --extract (defaults to the URL's file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Label shown in the progress table
        #[arg(short, long)]
        description: Option<String>,
        /// Expected size in bytes
        #[arg(long)]
        size: Option<u64>,
        /// Expected hex digest
        #[arg(long)]
        checksum: Option<String>,
        /// Algorithm of --checksum (inferred from its length when omitted)
        #[arg(long = "checksum-algorithm")]
        checksum_algorithm: Option<DigestAlgorithm>,
        /// Unpack the downloaded zip archive into --output
        #[arg(short = 'x', long)]
        extract: bool,
    },

    /// Download every entry of a JSON manifest concurrently
    Batch {
        /// Path to a JSON array of download requests
        manifest: PathBuf,
    },

    /// Check a local file against an expected size and/or checksum
    Verify {
        /// File to check
        file: PathBuf,
        /// Expected size in bytes
        #[arg(long)]
        size: Option<u64>,
        /// Expected hex digest
        #[arg(long)]
        checksum: Option<String>,
        /// Algorithm of --checksum (inferred from its length when omitted)
        #[arg(long = "checksum-algorithm")]
        checksum_algorithm: Option<DigestAlgorithm>,
    },

    /// Show the effective engine settings
    Config,
}
