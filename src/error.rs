//! Error types for tradefloor

use crate::types::{AuctionId, BuyerId, DealId, OptionId, SellerId};
use thiserror::Error;

/// Main error type for tradefloor
///
/// Nothing here is fatal to the process: every variant describes a single
/// rejected operation and leaves market state untouched. Callers retry or
/// move on.
#[derive(Error, Debug)]
pub enum TradefloorError {
    // Registry lookup errors
    #[error("Auction not found: {0}")]
    AuctionNotFound(AuctionId),

    #[error("No active auction for {0}")]
    NoAuctionForOption(OptionId),

    #[error("No active auction for {0}")]
    NoAuctionForDeal(DealId),

    #[error("Deal not found: {0}")]
    DealNotFound(DealId),

    #[error("Option not found: {0}")]
    OptionNotFound(OptionId),

    #[error("Buyer not found: {0}")]
    BuyerNotFound(BuyerId),

    #[error("Seller not found: {0}")]
    SellerNotFound(SellerId),

    // Bidding errors
    #[error("Auction {0} is not accepting bids")]
    AuctionNotBidding(AuctionId),

    #[error("Bid {bid} does not improve on previous bid {current}")]
    BidNotImproved { bid: f64, current: f64 },

    #[error("{0} is already under auction")]
    OptionAlreadyInAuction(OptionId),

    #[error("{0} is already under auction")]
    DealAlreadyInAuction(DealId),

    #[error("Auction {0} can no longer be cancelled")]
    CancelNotAllowed(AuctionId),

    // Transfer and exchange errors
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Buyer {buyer} does not hold {option}")]
    OptionNotHeld { buyer: BuyerId, option: OptionId },

    #[error("Seller {seller} no longer holds {deal}")]
    SellerMissingDeal { seller: SellerId, deal: DealId },

    #[error("{0} has already been exchanged")]
    AlreadyExchanged(OptionId),

    #[error("{0} is not exchangeable")]
    NotExchangeable(OptionId),

    #[error("{buyer} does not own {deal}")]
    DealNotOwned { buyer: BuyerId, deal: DealId },

    // State machine errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // General errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for tradefloor operations
pub type Result<T> = std::result::Result<T, TradefloorError>;
