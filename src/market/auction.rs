//! Auction bid book and resolution-side value types

use crate::error::{Result, TradefloorError};
use crate::types::{AuctionId, BuyerId, OptionId, Party, SellerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Auction lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionState {
    Unassigned,
    Bidding,
    Resolving,
    Cancelled,
}

impl AuctionState {
    /// Whether the auction currently accepts bids
    pub fn accepts_bids(&self) -> bool {
        matches!(self, AuctionState::Bidding)
    }
}

/// One bidder's current bid
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub bidder: BuyerId,
    pub amount: f64,
}

/// Details delivered to a bidder who has just been surpassed
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct OutbidDetails {
    pub auction: AuctionId,
    /// The surpassing bid amount
    pub bid: f64,
    /// Gap between the surpassing bid and the recipient's own bid
    pub gap: f64,
    /// Time left until the bidding window closes
    pub remaining: Duration,
}

/// Single-recipient, time-limited presentation of an option during
/// resolution
///
/// Ephemeral: built per waterfall step, never stored.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Offer {
    pub auction: AuctionId,
    pub option: OptionId,
    pub recipient: BuyerId,
    pub premium: f64,
    pub decision_window: Duration,
}

/// The bidding state machine for one option
///
/// Holds at most one bid per buyer (a new bid replaces the previous one) and
/// a derived ordering, descending by amount with submission order breaking
/// ties. Replacement happens in place so a re-bidding buyer keeps their
/// first submission position, and the stable sort preserves it.
#[derive(Clone, Debug)]
pub struct Auction {
    pub id: AuctionId,
    pub seller: SellerId,
    pub option: OptionId,
    pub state: AuctionState,
    bids: HashMap<BuyerId, f64>,
    bids_ordered: Vec<Bid>,
    pub opened_at: Instant,
    pub closes_at: Instant,
    pub cancelled_by: Option<Party>,
}

impl Auction {
    /// Create a new auction over `option` with the given bidding window
    pub fn new(seller: SellerId, option: OptionId, window: Duration) -> Self {
        let now = Instant::now();
        Self {
            id: AuctionId::next(),
            seller,
            option,
            state: AuctionState::Unassigned,
            bids: HashMap::new(),
            bids_ordered: Vec::new(),
            opened_at: now,
            closes_at: now + window,
            cancelled_by: None,
        }
    }

    /// Transition from `Unassigned` to `Bidding`
    pub fn open_bidding(&mut self) -> Result<()> {
        if self.state != AuctionState::Unassigned {
            return Err(TradefloorError::InvalidStateTransition(format!(
                "{} cannot open bidding from {:?}",
                self.id, self.state
            )));
        }
        self.state = AuctionState::Bidding;
        Ok(())
    }

    /// Record a bid
    ///
    /// Accepted only while `Bidding` and only if the amount strictly exceeds
    /// the bidder's own previous bid. A rejected bid mutates nothing.
    pub fn place_bid(&mut self, bidder: BuyerId, amount: f64) -> Result<()> {
        if !self.state.accepts_bids() {
            return Err(TradefloorError::AuctionNotBidding(self.id));
        }

        if let Some(&previous) = self.bids.get(&bidder) {
            if amount <= previous {
                return Err(TradefloorError::BidNotImproved {
                    bid: amount,
                    current: previous,
                });
            }
            // Replace in place to keep the bidder's submission position
            for entry in self.bids_ordered.iter_mut() {
                if entry.bidder == bidder {
                    entry.amount = amount;
                    break;
                }
            }
        } else {
            self.bids_ordered.push(Bid { bidder, amount });
        }

        self.bids.insert(bidder, amount);
        self.bids_ordered
            .sort_by(|a, b| b.amount.total_cmp(&a.amount));
        Ok(())
    }

    /// The bidder's current bid, if any
    pub fn bid_of(&self, bidder: BuyerId) -> Option<f64> {
        self.bids.get(&bidder).copied()
    }

    /// All bids, highest first, ties in submission order
    pub fn bids_ordered(&self) -> &[Bid] {
        &self.bids_ordered
    }

    /// Current leading bid, if any
    pub fn leading(&self) -> Option<Bid> {
        self.bids_ordered.first().copied()
    }

    pub fn bid_count(&self) -> usize {
        self.bids_ordered.len()
    }

    /// Time left until the bidding window closes
    pub fn remaining(&self) -> Duration {
        self.closes_at.saturating_duration_since(Instant::now())
    }

    /// Bidders ranked strictly below `amount`, excluding `exclude`, in
    /// descending order
    ///
    /// These are the bidders owed an outbid notification after a bid of
    /// `amount` lands.
    pub fn bidders_below(&self, amount: f64, exclude: BuyerId) -> Vec<Bid> {
        self.bids_ordered
            .iter()
            .filter(|bid| bid.amount < amount && bid.bidder != exclude)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bidding_auction() -> Auction {
        let mut auction = Auction::new(SellerId(1), OptionId(1), Duration::from_secs(3));
        auction.open_bidding().unwrap();
        auction
    }

    #[test]
    fn test_open_bidding_once() {
        let mut auction = Auction::new(SellerId(1), OptionId(1), Duration::from_secs(3));
        assert_eq!(auction.state, AuctionState::Unassigned);
        auction.open_bidding().unwrap();
        assert_eq!(auction.state, AuctionState::Bidding);
        assert!(auction.open_bidding().is_err());
    }

    #[test]
    fn test_bid_rejected_before_bidding() {
        let mut auction = Auction::new(SellerId(1), OptionId(1), Duration::from_secs(3));
        let result = auction.place_bid(BuyerId(1), 5.0);
        assert!(matches!(
            result,
            Err(TradefloorError::AuctionNotBidding(_))
        ));
    }

    #[test]
    fn test_bids_ordered_descending() {
        let mut auction = bidding_auction();
        auction.place_bid(BuyerId(1), 10.0).unwrap();
        auction.place_bid(BuyerId(2), 7.0).unwrap();
        auction.place_bid(BuyerId(3), 9.0).unwrap();

        let order: Vec<BuyerId> = auction.bids_ordered().iter().map(|b| b.bidder).collect();
        assert_eq!(order, vec![BuyerId(1), BuyerId(3), BuyerId(2)]);
        assert_eq!(auction.leading().unwrap().amount, 10.0);
    }

    #[test]
    fn test_own_bid_must_improve() {
        let mut auction = bidding_auction();
        auction.place_bid(BuyerId(1), 5.0).unwrap();

        // Equal and lower bids are rejected without mutation
        assert!(auction.place_bid(BuyerId(1), 5.0).is_err());
        assert!(auction.place_bid(BuyerId(1), 4.0).is_err());
        assert_eq!(auction.bid_of(BuyerId(1)), Some(5.0));

        auction.place_bid(BuyerId(1), 6.0).unwrap();
        assert_eq!(auction.bid_of(BuyerId(1)), Some(6.0));
    }

    #[test]
    fn test_one_entry_per_buyer() {
        let mut auction = bidding_auction();
        auction.place_bid(BuyerId(1), 5.0).unwrap();
        auction.place_bid(BuyerId(2), 6.0).unwrap();
        auction.place_bid(BuyerId(1), 7.0).unwrap();

        assert_eq!(auction.bid_count(), 2);
        assert_eq!(auction.leading().unwrap().bidder, BuyerId(1));
    }

    #[test]
    fn test_ties_keep_submission_order() {
        let mut auction = bidding_auction();
        auction.place_bid(BuyerId(1), 5.0).unwrap();
        auction.place_bid(BuyerId(2), 5.0).unwrap();
        auction.place_bid(BuyerId(3), 5.0).unwrap();

        let order: Vec<BuyerId> = auction.bids_ordered().iter().map(|b| b.bidder).collect();
        assert_eq!(order, vec![BuyerId(1), BuyerId(2), BuyerId(3)]);
    }

    #[test]
    fn test_bidders_below() {
        let mut auction = bidding_auction();
        auction.place_bid(BuyerId(1), 10.0).unwrap();
        auction.place_bid(BuyerId(2), 7.0).unwrap();
        auction.place_bid(BuyerId(3), 9.0).unwrap();

        // A new bid of 9.5 from buyer 4 surpasses buyers 3 and 2
        let below = auction.bidders_below(9.5, BuyerId(4));
        let ids: Vec<BuyerId> = below.iter().map(|b| b.bidder).collect();
        assert_eq!(ids, vec![BuyerId(3), BuyerId(2)]);
    }
}
