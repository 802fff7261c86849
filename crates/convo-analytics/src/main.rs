use anyhow::Result;
use clap::Parser;
use convo_analytics::cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    tracing::info!("convo-analytics starting...");

    let cli = Cli::parse();
    cli.run().await
}
