//! Seller agent: heartbeat deal generation and auto-auctioning
//!
//! On every heartbeat a seller mints a fresh deal when its inventory is
//! empty (subject to a mint cooldown) and puts every un-auctioned deal up
//! for auction wrapped in a newly written option.

use crate::market::AuctionHouse;
use crate::types::SellerId;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Per-seller behavior parameters
#[derive(Clone, Debug)]
pub struct SellerConfig {
    /// Time between heartbeats
    pub heartbeat: Duration,
    /// Minimum time between minting two deals
    pub mint_cooldown: Duration,
    /// Exchangeability window written into each option
    pub option_duration: Duration,
    /// Bidding window for each auction
    pub bidding_window: Duration,
    /// Strike prices are drawn uniformly from this range
    pub strike_range: (f64, f64),
    /// Seller price expectations are drawn uniformly from this range
    pub expectation_range: (f64, f64),
}

impl Default for SellerConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(2),
            mint_cooldown: Duration::from_secs(1),
            option_duration: Duration::from_secs(10),
            bidding_window: Duration::from_secs(3),
            strike_range: (0.5, 1.0),
            expectation_range: (1.0, 2.0),
        }
    }
}

/// A single seller's heartbeat task
pub struct SellerAgent {
    id: SellerId,
    house: Arc<AuctionHouse>,
    config: SellerConfig,
    last_mint: Option<Instant>,
}

impl SellerAgent {
    pub fn new(id: SellerId, house: Arc<AuctionHouse>, config: SellerConfig) -> Self {
        Self {
            id,
            house,
            config,
            last_mint: None,
        }
    }

    /// Run until shutdown is signalled
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut heartbeat = tokio::time::interval(self.config.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = heartbeat.tick() => self.on_heartbeat().await,
            }
        }
        tracing::debug!("{} shutting down", self.id);
    }

    async fn on_heartbeat(&mut self) {
        let Some(account) = self.house.seller(self.id).await else {
            return;
        };

        // Empty inventory: conjure a deal out of thin air
        if account.deals().is_empty() && self.mint_cooldown_elapsed() {
            let expected = rand::thread_rng().gen_range(
                self.config.expectation_range.0..self.config.expectation_range.1,
            );
            match self.house.mint_deal(self.id, expected).await {
                Ok(_) => self.last_mint = Some(Instant::now()),
                Err(error) => tracing::warn!("{} could not mint a deal: {}", self.id, error),
            }
        }

        // Auction every deal that is not already under auction
        let Some(account) = self.house.seller(self.id).await else {
            return;
        };
        for &deal in account.deals() {
            if self.house.find_auction_by_deal(deal).await.is_some() {
                continue;
            }

            let strike = rand::thread_rng()
                .gen_range(self.config.strike_range.0..self.config.strike_range.1);
            let option = match self
                .house
                .write_option(self.id, deal, strike, self.config.option_duration)
                .await
            {
                Ok(option) => option,
                Err(error) => {
                    tracing::warn!("{} could not write option on {}: {}", self.id, deal, error);
                    continue;
                }
            };

            if let Err(error) = self
                .house
                .create_auction(self.id, option, self.config.bidding_window)
                .await
            {
                tracing::warn!("{} could not auction {}: {}", self.id, option, error);
            }
        }
    }

    fn mint_cooldown_elapsed(&self) -> bool {
        match self.last_mint {
            Some(at) => at.elapsed() >= self.config.mint_cooldown,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_heartbeat_mints_and_auctions() {
        let house = AuctionHouse::new();
        let id = house.register_seller(0.0).await;

        let config = SellerConfig {
            heartbeat: Duration::from_millis(50),
            mint_cooldown: Duration::from_millis(10),
            bidding_window: Duration::from_secs(5),
            ..SellerConfig::default()
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let agent = SellerAgent::new(id, house.clone(), config);
        let handle = tokio::spawn(agent.run(shutdown_rx));

        sleep(Duration::from_millis(250)).await;

        // The seller minted a deal and put it up for auction
        let account = house.seller(id).await.unwrap();
        assert_eq!(account.deals().len(), 1);
        let auctions = house.active_auctions().await;
        assert_eq!(auctions.len(), 1);
        assert_eq!(auctions[0].seller, id);
        assert!(auctions[0].strike >= 0.5 && auctions[0].strike < 1.0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_heartbeat_does_not_duplicate_auctions() {
        let house = AuctionHouse::new();
        let id = house.register_seller(0.0).await;

        let config = SellerConfig {
            heartbeat: Duration::from_millis(30),
            mint_cooldown: Duration::from_millis(10),
            bidding_window: Duration::from_secs(5),
            ..SellerConfig::default()
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let agent = SellerAgent::new(id, house.clone(), config);
        let handle = tokio::spawn(agent.run(shutdown_rx));

        // Several heartbeats pass; the single deal stays in one auction
        sleep(Duration::from_millis(300)).await;
        assert_eq!(house.active_auctions().await.len(), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
