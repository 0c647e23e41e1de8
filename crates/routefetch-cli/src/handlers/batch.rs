//! `batch`: download every entry of a JSON manifest.
//!
//! ```json
//! [
//!   { "url": "https://example.com/a.bin", "target": "a.bin", "expected_size": 1024 },
//!   { "url": "https://example.com/b.zip", "target": "b", "action": "extract",
//!     "expected_checksum": "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12" }
//! ]
//! ```
//!
//! Relative targets are resolved against the manifest's directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use routefetch_core::{Action, DigestAlgorithm, DownloadRequest};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// One manifest entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    pub url: String,
    pub target: PathBuf,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expected_size: Option<u64>,
    #[serde(default)]
    pub expected_checksum: Option<String>,
    #[serde(default)]
    pub checksum_algorithm: Option<DigestAlgorithm>,
    #[serde(default)]
    pub action: Action,
}

impl ManifestEntry {
    fn into_request(self, base: &Path) -> DownloadRequest {
        let target = if self.target.is_relative() {
            base.join(&self.target)
        } else {
            self.target
        };
        let description = self.description.unwrap_or_else(|| self.url.clone());
        let mut request = DownloadRequest::new(description, self.url, target)
            .with_expected_size(self.expected_size)
            .with_expected_checksum(self.expected_checksum)
            .with_action(self.action);
        if let Some(algorithm) = self.checksum_algorithm {
            request = request.with_checksum_algorithm(algorithm);
        }
        request
    }
}

/// Parse a manifest into requests.
pub fn parse_manifest(contents: &str, base: &Path) -> Result<Vec<DownloadRequest>, CliError> {
    let entries: Vec<ManifestEntry> = serde_json::from_str(contents)
        .map_err(|e| CliError::Arguments(format!("invalid manifest: {e}")))?;
    if entries.is_empty() {
        return Err(CliError::Arguments("manifest has no entries".to_string()));
    }
    Ok(entries
        .into_iter()
        .map(|entry| entry.into_request(base))
        .collect())
}

/// Execute the `batch` command.
pub async fn execute(ctx: &CliContext, manifest: &Path) -> Result<(), CliError> {
    let contents = tokio::fs::read_to_string(manifest).await.map_err(|e| {
        CliError::Io(format!("cannot read manifest {}: {e}", manifest.display()))
    })?;
    let base = manifest.parent().unwrap_or_else(|| Path::new("."));
    let requests = parse_manifest(&contents, base)?;

    tracing::info!(count = requests.len(), manifest = %manifest.display(), "Queueing manifest");
    super::run_downloads(ctx, requests).await
}
