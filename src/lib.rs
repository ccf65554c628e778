//! tradefloor - decentralized market-matching engine
//!
//! Independent buyer and seller agents exchange time-limited rights to
//! deals through competitive, timed ascending auctions:
//! - Sellers mint deals and auction options on them
//! - Buyers bid concurrently, react to outbid notifications with damped
//!   rebids, and juggle simultaneous offers
//! - The auction house resolves each auction into a strictly ordered
//!   waterfall of take-it-or-leave-it offers and transfers ownership
//!   atomically, exactly once

pub mod agents;
pub mod cli;
pub mod error;
pub mod market;
pub mod types;

pub use error::{Result, TradefloorError};
