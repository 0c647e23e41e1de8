//! Settings domain types and validation.
//!
//! Settings are the user-facing, partially specified form of
//! [`DownloadManagerConfig`]. Every field is optional so that environment
//! variables, a `.env` file, and command line flags can each contribute a
//! subset before the result is validated and turned into a config.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::download::DigestAlgorithm;
use crate::ports::DownloadManagerConfig;

/// Environment variable for the worker pool size.
pub const ENV_MAX_CONCURRENT: &str = "ROUTEFETCH_MAX_CONCURRENT";
/// Environment variable for the maximum number of queued downloads.
pub const ENV_MAX_QUEUE_SIZE: &str = "ROUTEFETCH_MAX_QUEUE_SIZE";
/// Environment variable for the connect timeout in seconds.
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "ROUTEFETCH_CONNECT_TIMEOUT_SECS";
/// Environment variable for the read timeout in seconds.
pub const ENV_READ_TIMEOUT_SECS: &str = "ROUTEFETCH_READ_TIMEOUT_SECS";
/// Environment variable for the default digest algorithm.
pub const ENV_DIGEST: &str = "ROUTEFETCH_DIGEST";

/// Download engine settings.
///
/// All fields are optional to support partial updates and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Number of simultaneous transfers (1-64).
    pub max_concurrent: Option<u32>,

    /// Maximum number of downloads waiting in the queue (1-10,000).
    pub max_queue_size: Option<u32>,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,

    /// Idle timeout between body chunks in seconds.
    pub read_timeout_secs: Option<u64>,

    /// Digest used when a request names none.
    pub default_digest: Option<DigestAlgorithm>,

    /// Minimum interval between progress events, in milliseconds.
    pub progress_interval_ms: Option<u64>,
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            max_concurrent: Some(4),
            max_queue_size: Some(256),
            connect_timeout_secs: Some(30),
            read_timeout_secs: Some(60),
            default_digest: Some(DigestAlgorithm::Sha1),
            progress_interval_ms: Some(250),
        }
    }

    /// Read settings from the process environment.
    ///
    /// Unset variables stay `None`; malformed values are reported.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_digest = lookup(ENV_DIGEST)
            .map(|raw| {
                raw.parse::<DigestAlgorithm>()
                    .map_err(|_| SettingsError::InvalidValue {
                        key: ENV_DIGEST,
                        value: raw,
                    })
            })
            .transpose()?;

        Ok(Self {
            max_concurrent: parse_var(&lookup, ENV_MAX_CONCURRENT)?,
            max_queue_size: parse_var(&lookup, ENV_MAX_QUEUE_SIZE)?,
            connect_timeout_secs: parse_var(&lookup, ENV_CONNECT_TIMEOUT_SECS)?,
            read_timeout_secs: parse_var(&lookup, ENV_READ_TIMEOUT_SECS)?,
            default_digest,
            progress_interval_ms: None,
        })
    }

    /// Merge another settings update into this one, only updating fields that are Some.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(ref max) = other.max_concurrent {
            self.max_concurrent = *max;
        }
        if let Some(ref max) = other.max_queue_size {
            self.max_queue_size = *max;
        }
        if let Some(ref secs) = other.connect_timeout_secs {
            self.connect_timeout_secs = *secs;
        }
        if let Some(ref secs) = other.read_timeout_secs {
            self.read_timeout_secs = *secs;
        }
        if let Some(ref digest) = other.default_digest {
            self.default_digest = *digest;
        }
        if let Some(ref ms) = other.progress_interval_ms {
            self.progress_interval_ms = *ms;
        }
    }

    /// Overlay every field that is set in `other`.
    pub fn overlay(&mut self, other: &Self) {
        self.merge(&SettingsUpdate::from_present(other));
    }

    /// Build a manager config, falling back to defaults for unset fields.
    #[must_use]
    pub fn into_config(self) -> DownloadManagerConfig {
        let mut config = DownloadManagerConfig::default();
        if let Some(max) = self.max_concurrent {
            config.max_concurrent = max;
        }
        if let Some(max) = self.max_queue_size {
            config.max_queue_size = max;
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.read_timeout_secs {
            config.read_timeout = Duration::from_secs(secs);
        }
        if let Some(digest) = self.default_digest {
            config.default_digest = digest;
        }
        if let Some(ms) = self.progress_interval_ms {
            config.progress_interval = Duration::from_millis(ms);
        }
        config
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| SettingsError::InvalidValue { key, value: raw })
        })
        .transpose()
}

/// Partial settings update.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = set field to None/null
/// - `Some(Some(value))` = set field to value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub max_concurrent: Option<Option<u32>>,
    pub max_queue_size: Option<Option<u32>>,
    pub connect_timeout_secs: Option<Option<u64>>,
    pub read_timeout_secs: Option<Option<u64>>,
    pub default_digest: Option<Option<DigestAlgorithm>>,
    pub progress_interval_ms: Option<Option<u64>>,
}

impl SettingsUpdate {
    /// Update that sets exactly the fields present in `settings`.
    #[must_use]
    pub fn from_present(settings: &Settings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent.map(Some),
            max_queue_size: settings.max_queue_size.map(Some),
            connect_timeout_secs: settings.connect_timeout_secs.map(Some),
            read_timeout_secs: settings.read_timeout_secs.map(Some),
            default_digest: settings.default_digest.map(Some),
            progress_interval_ms: settings.progress_interval_ms.map(Some),
        }
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Max concurrent downloads must be between 1 and 64, got {0}")]
    InvalidConcurrency(u32),

    #[error("Max download queue size must be between 1 and 10,000, got {0}")]
    InvalidQueueSize(u32),

    #[error("Timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if let Some(max) = settings.max_concurrent {
        if !(1..=64).contains(&max) {
            return Err(SettingsError::InvalidConcurrency(max));
        }
    }

    if let Some(queue_size) = settings.max_queue_size {
        if !(1..=10_000).contains(&queue_size) {
            return Err(SettingsError::InvalidQueueSize(queue_size));
        }
    }

    if settings.connect_timeout_secs == Some(0) {
        return Err(SettingsError::ZeroTimeout("connect_timeout_secs"));
    }
    if settings.read_timeout_secs == Some(0) {
        return Err(SettingsError::ZeroTimeout("read_timeout_secs"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::with_defaults();
        assert_eq!(settings.max_concurrent, Some(4));
        assert_eq!(settings.default_digest, Some(DigestAlgorithm::Sha1));
        assert!(validate_settings(&settings).is_ok());
        assert_eq!(settings.into_config(), DownloadManagerConfig::default());
    }

    #[test]
    fn test_validate_concurrency_bounds() {
        let mut settings = Settings::with_defaults();
        settings.max_concurrent = Some(0);
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::InvalidConcurrency(0))
        );
        settings.max_concurrent = Some(65);
        assert!(validate_settings(&settings).is_err());
        settings.max_concurrent = Some(64);
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_validate_queue_size_and_timeouts() {
        let mut settings = Settings::with_defaults();
        settings.max_queue_size = Some(10_001);
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidQueueSize(10_001))
        ));

        let mut settings = Settings::with_defaults();
        settings.read_timeout_secs = Some(0);
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::ZeroTimeout("read_timeout_secs"))
        );
    }

    #[test]
    fn test_merge_update() {
        let mut settings = Settings::with_defaults();
        let update = SettingsUpdate {
            max_concurrent: Some(Some(2)),
            default_digest: Some(None),
            ..Default::default()
        };
        settings.merge(&update);
        assert_eq!(settings.max_concurrent, Some(2));
        assert_eq!(settings.default_digest, None);
        assert_eq!(settings.max_queue_size, Some(256));
    }

    #[test]
    fn test_from_lookup_parses_known_keys() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_MAX_CONCURRENT, "8"),
            (ENV_READ_TIMEOUT_SECS, " 5 "),
            (ENV_DIGEST, "SHA-256"),
        ]))
        .unwrap();

        assert_eq!(settings.max_concurrent, Some(8));
        assert_eq!(settings.read_timeout_secs, Some(5));
        assert_eq!(settings.default_digest, Some(DigestAlgorithm::Sha256));
        assert_eq!(settings.max_queue_size, None);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = Settings::from_lookup(lookup(&[(ENV_MAX_QUEUE_SIZE, "lots")])).unwrap_err();
        assert_eq!(
            err,
            SettingsError::InvalidValue {
                key: ENV_MAX_QUEUE_SIZE,
                value: "lots".to_string()
            }
        );
        assert!(Settings::from_lookup(lookup(&[(ENV_DIGEST, "md5")])).is_err());
    }

    #[test]
    fn test_overlay_keeps_unset_fields() {
        let mut base = Settings::with_defaults();
        let flags = Settings {
            max_concurrent: Some(1),
            ..Default::default()
        };
        base.overlay(&flags);

        let config = base.into_config();
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }
}
