//! Buyer and seller accounts: funds and inventories
//!
//! Accounts live in the registry's arena and are mutated only inside
//! registry operations, which is what makes the auction transfer and option
//! exchange atomic. Each debit reports success as a boolean and mutates
//! nothing on failure.

use crate::types::{BuyerId, DealId, OptionId, SellerId};
use serde::{Deserialize, Serialize};

/// A buyer's private funds and inventory
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuyerAccount {
    pub id: BuyerId,
    funds: f64,
    options: Vec<OptionId>,
    deals: Vec<DealId>,
}

impl BuyerAccount {
    pub fn new(id: BuyerId, funds: f64) -> Self {
        Self {
            id,
            funds,
            options: Vec::new(),
            deals: Vec::new(),
        }
    }

    pub fn funds(&self) -> f64 {
        self.funds
    }

    /// Debit funds; false (and no mutation) if the balance is insufficient
    pub fn subtract_funds(&mut self, amount: f64) -> bool {
        if self.funds < amount {
            return false;
        }
        self.funds -= amount;
        true
    }

    pub fn holds_option(&self, option: OptionId) -> bool {
        self.options.contains(&option)
    }

    /// Remove an option from inventory; false if not held
    pub fn subtract_option(&mut self, option: OptionId) -> bool {
        match self.options.iter().position(|&o| o == option) {
            Some(idx) => {
                self.options.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn receive_option(&mut self, option: OptionId) {
        self.options.push(option);
    }

    pub fn receive_deal(&mut self, deal: DealId) {
        self.deals.push(deal);
    }

    pub fn options(&self) -> &[OptionId] {
        &self.options
    }

    pub fn deals(&self) -> &[DealId] {
        &self.deals
    }
}

/// A seller's funds and open deal inventory
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SellerAccount {
    pub id: SellerId,
    funds: f64,
    deals: Vec<DealId>,
}

impl SellerAccount {
    pub fn new(id: SellerId, funds: f64) -> Self {
        Self {
            id,
            funds,
            deals: Vec::new(),
        }
    }

    pub fn funds(&self) -> f64 {
        self.funds
    }

    pub fn receive_funds(&mut self, amount: f64) {
        self.funds += amount;
    }

    pub fn has_deal(&self, deal: DealId) -> bool {
        self.deals.contains(&deal)
    }

    pub fn add_deal(&mut self, deal: DealId) {
        self.deals.push(deal);
    }

    /// Remove a deal from the open inventory; false if not held
    pub fn subtract_deal(&mut self, deal: DealId) -> bool {
        match self.deals.iter().position(|&d| d == deal) {
            Some(idx) => {
                self.deals.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn deals(&self) -> &[DealId] {
        &self.deals
    }
}
