//! Read-only market event feed for observers
//!
//! Visualization and logging collaborators subscribe to this feed; nothing
//! in the engine depends on anyone listening.

use crate::types::{AuctionId, BuyerId, DealId, OptionId, Party, SellerId};
use serde::Serialize;
use std::time::Duration;

/// Events published by the auction house
#[derive(Clone, Debug, Serialize)]
pub enum MarketEvent {
    AuctionOpened {
        auction: AuctionId,
        option: OptionId,
        deal: DealId,
        seller: SellerId,
        window: Duration,
    },
    BidPlaced {
        auction: AuctionId,
        bidder: BuyerId,
        amount: f64,
    },
    OfferExtended {
        auction: AuctionId,
        recipient: BuyerId,
        premium: f64,
    },
    AuctionSold {
        auction: AuctionId,
        winner: BuyerId,
        premium: f64,
    },
    AuctionNoSale {
        auction: AuctionId,
    },
    AuctionCancelled {
        auction: AuctionId,
        by: Party,
    },
    OptionExercised {
        option: OptionId,
        deal: DealId,
        buyer: BuyerId,
        strike: f64,
    },
    DealClosed {
        deal: DealId,
        buyer: BuyerId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = MarketEvent::AuctionSold {
            auction: AuctionId(1),
            winner: BuyerId(2),
            premium: 8.0,
        };

        let serialized = serde_json::to_string(&event).unwrap();
        assert!(serialized.contains("AuctionSold"));
        assert!(serialized.contains("8.0"));
    }
}
