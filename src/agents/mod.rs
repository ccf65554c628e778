//! Autonomous buyer and seller agents

pub mod buyer;
pub mod seller;

pub use buyer::{plan_rebid, BuyerAgent, BuyerConfig, RebidPlan};
pub use seller::{SellerAgent, SellerConfig};
