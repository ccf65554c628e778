//! Option contracts: the time-boxed right to acquire a deal

use crate::error::{Result, TradefloorError};
use crate::types::{DealId, OptionId};
use std::time::{Duration, Instant};

/// The right - not obligation - to acquire a deal for a fixed strike price
/// within a set duration
///
/// The clock starts when the option is activated, which happens exactly once
/// at the moment it is sold at auction. Exchange (exercising the option) is
/// one-shot.
#[derive(Clone, Debug)]
pub struct OptionContract {
    pub id: OptionId,
    pub deal: DealId,
    pub strike: f64,
    pub duration: Duration,
    activated_at: Option<Instant>,
    exchanged: bool,
}

impl OptionContract {
    /// Write a new option over `deal`
    pub fn new(deal: DealId, strike: f64, duration: Duration) -> Self {
        Self {
            id: OptionId::next(),
            deal,
            strike,
            duration,
            activated_at: None,
            exchanged: false,
        }
    }

    /// Start the exchangeability clock
    ///
    /// Called when the option is transferred to the winning bidder. One-shot.
    pub fn activate(&mut self) -> Result<()> {
        if self.activated_at.is_some() {
            return Err(TradefloorError::InvalidStateTransition(format!(
                "{} already activated",
                self.id
            )));
        }
        self.activated_at = Some(Instant::now());
        Ok(())
    }

    pub fn is_activated(&self) -> bool {
        self.activated_at.is_some()
    }

    pub fn is_exchanged(&self) -> bool {
        self.exchanged
    }

    /// Whether the option can currently be exchanged
    ///
    /// True only once activated, within the duration window, and while not
    /// yet exchanged.
    pub fn is_exchangeable(&self) -> bool {
        if self.exchanged {
            return false;
        }
        match self.activated_at {
            Some(at) => at.elapsed() < self.duration,
            None => false,
        }
    }

    /// Consume the one-shot exchange right
    pub fn mark_exchanged(&mut self) -> Result<()> {
        if self.exchanged {
            return Err(TradefloorError::AlreadyExchanged(self.id));
        }
        self.exchanged = true;
        Ok(())
    }

    /// Value assessment of this option given a buyer's estimate of the
    /// underlying deal's worth
    pub fn appraise(&self, deal_value: f64) -> f64 {
        (deal_value - self.strike) * self.duration.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_option_not_exchangeable() {
        let option = OptionContract::new(DealId(1), 0.8, Duration::from_secs(10));
        assert!(!option.is_activated());
        assert!(!option.is_exchangeable());
    }

    #[test]
    fn test_activation_opens_window() {
        let mut option = OptionContract::new(DealId(1), 0.8, Duration::from_secs(10));
        option.activate().unwrap();

        assert!(option.is_activated());
        assert!(option.is_exchangeable());
    }

    #[test]
    fn test_activation_is_one_shot() {
        let mut option = OptionContract::new(DealId(1), 0.8, Duration::from_secs(10));
        option.activate().unwrap();
        assert!(option.activate().is_err());
    }

    #[test]
    fn test_window_expires() {
        let mut option = OptionContract::new(DealId(1), 0.8, Duration::from_millis(20));
        option.activate().unwrap();
        assert!(option.is_exchangeable());

        std::thread::sleep(Duration::from_millis(40));
        assert!(!option.is_exchangeable());
    }

    #[test]
    fn test_exchange_is_one_shot() {
        let mut option = OptionContract::new(DealId(1), 0.8, Duration::from_secs(10));
        option.activate().unwrap();

        option.mark_exchanged().unwrap();
        assert!(!option.is_exchangeable());

        let result = option.mark_exchanged();
        assert!(matches!(result, Err(TradefloorError::AlreadyExchanged(_))));
    }

    #[test]
    fn test_appraise() {
        let option = OptionContract::new(DealId(1), 2.0, Duration::from_secs(10));
        // (10.0 - 2.0) * 10s
        assert_eq!(option.appraise(10.0), 80.0);
        // Underwater options appraise negative
        assert!(option.appraise(1.0) < 0.0);
    }
}
