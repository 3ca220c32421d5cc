//! MathTutor - Socratic math tutoring CLI
//!
#![doc = "MathTutor - Socratic math tutoring CLI"]
#![doc = "Main entry point for the MathTutor application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mathtutor::cli::{Cli, Commands};
use mathtutor::commands;
use mathtutor::commands::solve::SolveOptions;
use mathtutor::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat { image, model } => {
            if let Some(m) = &model {
                tracing::debug!("Using model override: {}", m);
            }
            if let Some(path) = &image {
                tracing::debug!("Starting with image: {}", path.display());
            }
            commands::chat::run_chat(config, image).await?;
            Ok(())
        }
        Commands::Solve {
            image,
            ask,
            why,
            json,
            model,
        } => {
            if let Some(m) = &model {
                tracing::debug!("Using model override: {}", m);
            }
            let options = SolveOptions {
                image,
                ask,
                why,
                json,
            };
            commands::solve::run_solve(config, options).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug output.
/// Logs go to stderr so transcripts on stdout stay clean.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "mathtutor=debug"
    } else {
        "mathtutor=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
