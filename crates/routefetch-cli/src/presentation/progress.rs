//! Live download table.
//!
//! One row per download, driven purely by the engine's event stream. On a
//! terminal each row is an `indicatif` bar; otherwise state changes are
//! printed as plain lines.

use std::collections::HashMap;
use std::io::{self, IsTerminal};
use std::sync::{Mutex, PoisonError};

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use routefetch_core::{DownloadEvent, DownloadId, DownloadObserver, DownloadState};

use super::tables::truncate_string;

const LABEL_WIDTH: usize = 28;

/// Observer that renders every download as a table row.
pub struct ProgressTable {
    multi: MultiProgress,
    rows: Mutex<HashMap<DownloadId, Row>>,
    fancy: bool,
}

struct Row {
    label: String,
    bar: ProgressBar,
}

impl ProgressTable {
    /// Create a table, auto-detecting terminal capability.
    pub fn new() -> Self {
        let fancy = io::stdout().is_terminal();
        let target = if fancy {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            rows: Mutex::new(HashMap::new()),
            fancy,
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{prefix:28} {msg:12} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
    }

    fn add_row(&self, id: DownloadId, description: &str) {
        let label = truncate_string(description, LABEL_WIDTH);
        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(Self::bar_style());
        bar.set_prefix(label.clone());
        bar.set_message(DownloadState::Queued.to_string());
        self.lock().insert(id, Row { label, bar });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DownloadId, Row>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProgressTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadObserver for ProgressTable {
    fn on_event(&self, event: &DownloadEvent) {
        match event {
            DownloadEvent::DownloadAdded { summary } => {
                self.add_row(summary.id, &summary.description);
            }
            DownloadEvent::StateChanged { id, to, error, .. } => {
                let rows = self.lock();
                let Some(row) = rows.get(id) else { return };
                let message = match error {
                    Some(error) => format!("{to}: {error}"),
                    None => to.to_string(),
                };
                if self.fancy {
                    if to.is_terminal() {
                        row.bar.finish_with_message(message);
                    } else {
                        row.bar.set_message(message);
                    }
                } else {
                    println!("{:<LABEL_WIDTH$} {message}", row.label);
                }
            }
            DownloadEvent::Progress {
                id,
                downloaded,
                total,
            } => {
                let rows = self.lock();
                let Some(row) = rows.get(id) else { return };
                if *total > 0 && row.bar.length() != Some(*total) {
                    row.bar.set_length(*total);
                }
                row.bar.set_position(*downloaded);
                if !self.fancy && *total > 0 && downloaded == total {
                    println!(
                        "{:<LABEL_WIDTH$} {} received",
                        row.label,
                        HumanBytes(*downloaded)
                    );
                }
            }
            DownloadEvent::Removed { id } => {
                if let Some(row) = self.lock().remove(id) {
                    self.multi.remove(&row.bar);
                }
            }
        }
    }

    fn on_lagged(&self, missed: u64) {
        tracing::debug!(missed, "Progress table skipped events");
    }
}
