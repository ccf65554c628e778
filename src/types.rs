//! Core identifier types used throughout tradefloor
//!
//! Every market entity (deals, options, auctions, buyers, sellers) lives in
//! the registry's arena and is addressed by one of these copyable handles.
//! Components hold ids, never direct references to each other.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a deal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DealId(pub u64);

impl DealId {
    /// Allocate the next deal id (process-wide counter)
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deal_{}", self.0)
    }
}

/// Unique identifier for an option contract
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OptionId(pub u64);

impl OptionId {
    /// Allocate the next option id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "option_{}", self.0)
    }
}

/// Unique identifier for an auction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuctionId(pub u64);

impl AuctionId {
    /// Allocate the next auction id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for AuctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "auction_{}", self.0)
    }
}

/// Unique identifier for a buyer agent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuyerId(pub u64);

impl BuyerId {
    /// Allocate the next buyer id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BuyerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buyer_{}", self.0)
    }
}

/// Unique identifier for a seller agent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SellerId(pub u64);

impl SellerId {
    /// Allocate the next seller id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SellerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seller_{}", self.0)
    }
}

/// A market participant, used to record who cancelled an auction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    Buyer(BuyerId),
    Seller(SellerId),
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Buyer(id) => write!(f, "{}", id),
            Party::Seller(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = DealId::next();
        let b = DealId::next();
        assert_ne!(a, b);

        let a = AuctionId::next();
        let b = AuctionId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_format() {
        assert_eq!(DealId(7).to_string(), "deal_7");
        assert_eq!(OptionId(3).to_string(), "option_3");
        assert_eq!(AuctionId(1).to_string(), "auction_1");
        assert_eq!(Party::Buyer(BuyerId(2)).to_string(), "buyer_2");
    }

    #[test]
    fn test_serialization() {
        let id = BuyerId(42);
        let serialized = serde_json::to_string(&id).unwrap();
        let deserialized: BuyerId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(id, deserialized);

        let party = Party::Seller(SellerId(5));
        let serialized = serde_json::to_string(&party).unwrap();
        let deserialized: Party = serde_json::from_str(&serialized).unwrap();
        assert_eq!(party, deserialized);
    }
}
