//! `fetch`: download a single URL.

use std::path::{Path, PathBuf};

use routefetch_core::{Action, DigestAlgorithm, DownloadRequest};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Arguments of the `fetch` command.
#[derive(Debug, Clone, Default)]
pub struct FetchArgs {
    pub url: String,
    pub output: Option<PathBuf>,
    pub description: Option<String>,
    pub size: Option<u64>,
    pub checksum: Option<String>,
    pub checksum_algorithm: Option<DigestAlgorithm>,
    pub extract: bool,
}

impl FetchArgs {
    /// Turn the arguments into an engine request.
    ///
    /// Without `--output` the last URL path segment names the target in the
    /// current directory (with the archive extension dropped for `--extract`).
    pub fn into_request(self) -> Result<DownloadRequest, CliError> {
        let target = match self.output {
            Some(output) => output,
            None => default_target(&self.url, self.extract)?,
        };
        let description = self.description.unwrap_or_else(|| {
            target
                .file_name()
                .map_or_else(|| self.url.clone(), |n| n.to_string_lossy().into_owned())
        });
        let action = if self.extract {
            Action::Extract
        } else {
            Action::Copy
        };

        let mut request = DownloadRequest::new(description, self.url, target)
            .with_expected_size(self.size)
            .with_expected_checksum(self.checksum)
            .with_action(action);
        if let Some(algorithm) = self.checksum_algorithm {
            request = request.with_checksum_algorithm(algorithm);
        }
        Ok(request)
    }
}

fn default_target(url: &str, extract: bool) -> Result<PathBuf, CliError> {
    let name = url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            CliError::Arguments(format!("cannot derive a file name from '{url}'; pass --output"))
        })?;

    let path = Path::new(name);
    if extract {
        Ok(path.file_stem().map_or_else(|| path.to_path_buf(), PathBuf::from))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Execute the `fetch` command.
pub async fn execute(ctx: &CliContext, args: FetchArgs) -> Result<(), CliError> {
    let request = args.into_request()?;
    super::run_downloads(ctx, vec![request]).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_url() {
        let request = FetchArgs {
            url: "https://example.com/files/data.bin?token=1".into(),
            ..FetchArgs::default()
        }
        .into_request()
        .unwrap();

        assert_eq!(request.target, PathBuf::from("data.bin"));
        assert_eq!(request.description, "data.bin");
        assert_eq!(request.action, Action::Copy);
    }

    #[test]
    fn test_extract_drops_archive_extension() {
        let request = FetchArgs {
            url: "https://example.com/bundle.zip".into(),
            extract: true,
            checksum: Some("abc".into()),
            checksum_algorithm: Some(DigestAlgorithm::Sha256),
            ..FetchArgs::default()
        }
        .into_request()
        .unwrap();

        assert_eq!(request.target, PathBuf::from("bundle"));
        assert_eq!(request.action, Action::Extract);
        assert_eq!(request.checksum_algorithm, Some(DigestAlgorithm::Sha256));
    }

    #[test]
    fn test_url_without_name_needs_output() {
        let err = FetchArgs {
            url: "https://example.com/".into(),
            ..FetchArgs::default()
        }
        .into_request()
        .unwrap_err();
        assert!(matches!(err, CliError::Arguments(_)));
    }
}
