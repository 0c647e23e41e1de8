//! Command handlers.
//!
//! Handlers follow one pattern:
//! 1. Parse/validate CLI-specific input
//! 2. Hand requests to the manager in `CliContext`
//! 3. Format output for the terminal
//!
//! Handlers never touch the network or the filesystem for downloads
//! themselves; the engine does.

pub mod batch;
pub mod config;
pub mod fetch;
pub mod verify;

use std::sync::Arc;

use routefetch_core::{DownloadRequest, DownloadState, WAIT_TIMEOUT};
use routefetch_download::Download;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{ProgressTable, print_summary};

/// Queue `requests`, render them live, and wait for all of them.
///
/// Ctrl-C disposes the manager, which fails everything still running with
/// `Cancelled` and keeps partial files for the next attempt.
pub async fn run_downloads(
    ctx: &CliContext,
    requests: Vec<DownloadRequest>,
) -> Result<(), CliError> {
    let table = ctx.events.attach(Arc::new(ProgressTable::new()));

    let mut downloads = Vec::with_capacity(requests.len());
    for request in requests {
        downloads.push(ctx.manager.queue_for_download(request).await);
    }

    tokio::select! {
        () = wait_all(&downloads) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::warn!(error = %e, "Could not listen for Ctrl-C");
            }
            eprintln!("Interrupted, cancelling downloads...");
        }
    }

    ctx.manager.dispose().await;
    table.abort();

    let snapshot = ctx.manager.snapshot().await;
    println!();
    print_summary(&snapshot.items);

    let failed = snapshot
        .items
        .iter()
        .filter(|item| item.state == DownloadState::Failed)
        .count();
    if failed > 0 {
        return Err(CliError::DownloadsFailed {
            failed,
            total: snapshot.items.len(),
        });
    }
    Ok(())
}

async fn wait_all(downloads: &[Arc<Download>]) {
    for download in downloads {
        while download.wait_until_terminal(WAIT_TIMEOUT).await.is_none() {
            tracing::debug!(
                id = %download.id(),
                state = %download.state(),
                "Still waiting for download"
            );
        }
    }
}
