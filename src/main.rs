//! tradefloor CLI binary

use clap::Parser;
use std::time::Duration;
use tradefloor::cli::{Cli, Commands, SimConfig, TradefloorApp};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            buyers,
            sellers,
            duration,
            bidding_window,
            heartbeat,
            funds,
        } => {
            tracing::info!(
                "Starting tradefloor: {} sellers, {} buyers, {}s",
                sellers,
                buyers,
                duration
            );

            let config = SimConfig {
                buyers,
                sellers,
                duration: Duration::from_secs(duration),
                bidding_window: Duration::from_secs_f64(bidding_window),
                heartbeat: Duration::from_secs_f64(heartbeat),
                buyer_funds: funds,
            };
            let app = TradefloorApp::new(config);
            let summary = app.run().await?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
