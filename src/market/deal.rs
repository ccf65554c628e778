//! Deal entity and its lifecycle state machine

use crate::error::{Result, TradefloorError};
use crate::types::{BuyerId, DealId, SellerId};
use serde::{Deserialize, Serialize};

/// Baseline worth of any deal, before strike and duration adjustments
pub const BASE_DEAL_VALUE: f64 = 10.0;

/// Deal lifecycle state
///
/// Transitions only ever move forward: Unassigned -> Active -> Closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealState {
    Unassigned,
    Active,
    Closed,
}

/// Direct exchange agreement from seller to buyer
///
/// A deal starts out unassigned in the seller's inventory, becomes active
/// when the wrapping option is sold at auction, and closes once the buyer
/// completes it within interaction range of the seller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub seller: SellerId,
    pub buyer: Option<BuyerId>,
    pub state: DealState,
    pub seller_expected: f64,
    pub buyer_expected: f64,
}

impl Deal {
    /// Create a new unassigned deal owned by `seller`
    pub fn new(seller: SellerId, seller_expected: f64) -> Self {
        Self {
            id: DealId::next(),
            seller,
            buyer: None,
            state: DealState::Unassigned,
            seller_expected,
            buyer_expected: 0.0,
        }
    }

    /// Baseline value assessment of this deal
    pub fn base_value(&self) -> f64 {
        BASE_DEAL_VALUE
    }

    /// Activate the deal as a side effect of a successful option transfer
    ///
    /// Records the buyer who won the wrapping option. Only valid from
    /// `Unassigned`.
    pub fn activate(&mut self, buyer: BuyerId) -> Result<()> {
        match self.state {
            DealState::Unassigned => {
                self.state = DealState::Active;
                self.buyer = Some(buyer);
                Ok(())
            }
            _ => Err(TradefloorError::InvalidStateTransition(format!(
                "{} cannot activate from {:?}",
                self.id, self.state
            ))),
        }
    }

    /// Attempt to close the deal
    ///
    /// Succeeds only while `Active` and with the buyer within
    /// `interact_range` of the seller. A failed attempt mutates nothing and
    /// may be retried.
    pub fn try_close(&mut self, distance: f64, interact_range: f64) -> bool {
        if self.state != DealState::Active {
            return false;
        }
        if distance > interact_range {
            return false;
        }

        self.state = DealState::Closed;
        true
    }
}
