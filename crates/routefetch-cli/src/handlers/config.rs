//! `config`: show the effective settings.

use crate::bootstrap::CliConfig;
use crate::error::CliError;

/// Execute the `config` command.
pub fn execute(config: &CliConfig) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(&config.settings)
        .map_err(|e| CliError::Config(format!("cannot render settings: {e}")))?;
    println!("{json}");

    let manager = config.manager_config();
    println!();
    println!("user agent: {}", manager.user_agent);
    println!("workers:    {}", manager.worker_count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use routefetch_core::Settings;

    #[test]
    fn test_prints_defaults() {
        let config = tokio_test::assert_ok!(CliConfig::layered(
            &Settings::default(),
            &Settings::default()
        ));
        tokio_test::assert_ok!(execute(&config));
    }
}
