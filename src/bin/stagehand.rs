/// Stagehand CLI
///
/// Runs block-script projects from the command line and inspects configuration.
use clap::Parser;
use stagehand_core::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli::load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = cli::run(cli, config).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
