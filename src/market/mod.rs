//! Market core: deals, options, auctions, and the auction house

pub mod account;
pub mod auction;
pub mod deal;
pub mod events;
pub mod house;
pub mod option;

pub use account::{BuyerAccount, SellerAccount};
pub use auction::{Auction, AuctionState, Bid, Offer, OutbidDetails};
pub use deal::{Deal, DealState, BASE_DEAL_VALUE};
pub use events::MarketEvent;
pub use house::{AuctionHouse, AuctionInfo, BuyerEvent, CancelTarget, OFFER_DECISION_WINDOW};
pub use option::OptionContract;
