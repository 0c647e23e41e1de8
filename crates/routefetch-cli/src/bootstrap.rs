//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where the engine is wired together for the
//! CLI adapter: settings are resolved, the reqwest transport and broadcast
//! emitter are built, and the manager's worker pool is started.

use std::sync::Arc;

use routefetch_core::ports::BroadcastEmitter;
use routefetch_core::{DownloadManagerConfig, Settings, validate_settings};
use routefetch_download::{DownloadManagerDeps, DownloadManagerImpl, ReqwestTransport};

use crate::error::CliError;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Effective settings: defaults, then environment, then flags.
    pub settings: Settings,
}

impl CliConfig {
    /// Resolve settings from the environment and command-line overrides.
    pub fn resolve(overrides: &Settings) -> Result<Self, CliError> {
        let from_env = Settings::from_env()?;
        Self::layered(&from_env, overrides)
    }

    /// Layer environment and flag settings over the defaults, then validate.
    pub fn layered(from_env: &Settings, overrides: &Settings) -> Result<Self, CliError> {
        let mut settings = Settings::with_defaults();
        settings.overlay(from_env);
        settings.overlay(overrides);
        validate_settings(&settings)?;
        Ok(Self { settings })
    }

    /// The manager configuration these settings produce.
    pub fn manager_config(&self) -> DownloadManagerConfig {
        self.settings.clone().into_config()
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    /// The running download manager.
    pub manager: Arc<DownloadManagerImpl>,
    /// Event stream the manager publishes to.
    pub events: BroadcastEmitter,
}

/// Build the CLI context. Must run inside the tokio runtime.
pub fn bootstrap(config: &CliConfig) -> Result<CliContext, CliError> {
    let manager_config = config.manager_config();
    let transport = ReqwestTransport::new(&manager_config)?;
    let events = BroadcastEmitter::new();

    tracing::debug!(
        max_concurrent = manager_config.max_concurrent,
        max_queue_size = manager_config.max_queue_size,
        default_digest = %manager_config.default_digest,
        "Bootstrapping download manager"
    );

    let manager = DownloadManagerImpl::start(DownloadManagerDeps {
        transport: Arc::new(transport),
        event_emitter: Arc::new(events.clone()),
        config: manager_config,
    });

    Ok(CliContext { manager, events })
}

#[cfg(test)]
mod tests {
    use super::*;
    use routefetch_core::DigestAlgorithm;

    #[test]
    fn test_flags_override_environment() {
        let from_env = Settings {
            max_concurrent: Some(2),
            read_timeout_secs: Some(5),
            ..Settings::default()
        };
        let overrides = Settings {
            max_concurrent: Some(6),
            default_digest: Some(DigestAlgorithm::Sha512),
            ..Settings::default()
        };

        let config = CliConfig::layered(&from_env, &overrides).unwrap();

        assert_eq!(config.settings.max_concurrent, Some(6));
        assert_eq!(config.settings.read_timeout_secs, Some(5));
        assert_eq!(config.settings.max_queue_size, Some(256));
        assert_eq!(
            config.manager_config().default_digest,
            DigestAlgorithm::Sha512
        );
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let overrides = Settings {
            max_concurrent: Some(0),
            ..Settings::default()
        };
        let err = tokio_test::assert_err!(CliConfig::layered(&Settings::default(), &overrides));
        assert_eq!(err.exit_code(), 78);
    }

    #[tokio::test]
    async fn test_bootstrap_starts_manager() {
        let overrides = Settings {
            max_concurrent: Some(3),
            ..Settings::default()
        };
        let config = CliConfig::layered(&Settings::default(), &overrides).unwrap();

        let ctx = bootstrap(&config).unwrap();
        assert_eq!(ctx.manager.worker_count().await, 3);
        ctx.manager.dispose().await;
    }
}
