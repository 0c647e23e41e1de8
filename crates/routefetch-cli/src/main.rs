//! CLI entry point - the composition root.
//!
//! Resolves settings, wires the engine through `bootstrap`, and dispatches
//! to handlers. Handler errors become the process exit code.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use routefetch_cli::handlers::fetch::FetchArgs;
use routefetch_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "routefetch=debug,routefetch_cli=debug,routefetch_download=debug,warn"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = CliConfig::resolve(&cli.settings_overrides())?;

    let Some(command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Fetch {
            url,
            output,
            description,
            size,
            checksum,
            checksum_algorithm,
            extract,
        } => {
            let ctx = bootstrap(&config)?;
            let args = FetchArgs {
                url,
                output,
                description,
                size,
                checksum,
                checksum_algorithm,
                extract,
            };
            handlers::fetch::execute(&ctx, args).await
        }
        Commands::Batch { manifest } => {
            let ctx = bootstrap(&config)?;
            handlers::batch::execute(&ctx, &manifest).await
        }
        Commands::Verify {
            file,
            size,
            checksum,
            checksum_algorithm,
        } => {
            let default_digest = config.manager_config().default_digest;
            handlers::verify::execute(
                &file,
                size,
                checksum.as_deref(),
                checksum_algorithm,
                default_digest,
            )
            .await
        }
        Commands::Config => handlers::config::execute(&config),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        std::process::exit(err.exit_code());
    }
    Ok(())
}
