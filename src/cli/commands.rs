//! CLI command definitions

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tradefloor")]
#[command(about = "tradefloor - agent-based auction market simulation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a market simulation
    Run {
        /// Number of buyer agents
        #[arg(short, long, default_value = "4")]
        buyers: usize,

        /// Number of seller agents
        #[arg(short, long, default_value = "2")]
        sellers: usize,

        /// Simulation duration in seconds
        #[arg(short, long, default_value = "20")]
        duration: u64,

        /// Bidding window per auction in seconds
        #[arg(short = 'w', long, default_value = "3.0")]
        bidding_window: f64,

        /// Seconds between seller heartbeats
        #[arg(long, default_value = "2.0")]
        heartbeat: f64,

        /// Starting funds per buyer
        #[arg(short, long, default_value = "100.0")]
        funds: f64,
    },
}
