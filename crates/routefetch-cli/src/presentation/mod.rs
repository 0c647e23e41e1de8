//! Shared CLI presentation utilities.
//!
//! Format-only: rows are built from `DownloadSummary` and `DownloadEvent`
//! values, never from engine internals.

pub mod progress;
pub mod tables;

pub use progress::ProgressTable;
pub use tables::{format_optional, print_separator, print_summary, truncate_string};
