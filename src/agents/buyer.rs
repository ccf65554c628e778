//! Buyer agent: auction scanning, damped rebidding, and offer juggling
//!
//! Each buyer runs as one task multiplexing its registry mailbox, a scan
//! timer, and its own observation/decision deadlines. Outbid notifications
//! are batched over an observation window and answered with a single damped
//! rebid; incoming offers are queued and re-evaluated together shortly
//! before their deadlines so the agent always acts on its best option.

use crate::market::{
    AuctionHouse, AuctionInfo, BuyerEvent, Offer, OutbidDetails, BASE_DEAL_VALUE,
};
use crate::types::{AuctionId, BuyerId, DealId};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

/// Rebid increments never exceed this fraction of the current leading bid
pub const REBID_CAP_RATIO: f64 = 0.05;

/// Floor for the outbid observation window
pub const MIN_OBSERVATION: Duration = Duration::from_secs(1);

/// Slack subtracted from the remaining time when sizing the window
pub const OBSERVATION_EPSILON: Duration = Duration::from_millis(100);

/// Per-buyer behavior parameters
#[derive(Clone, Debug)]
pub struct BuyerConfig {
    /// This buyer's own estimate of any deal's underlying worth
    pub deal_value_estimate: f64,
    /// How often the buyer browses active auctions
    pub scan_interval: Duration,
    /// Range within which the buyer can close a deal
    pub interact_range: f64,
    /// Abstracted travel time between winning a deal and closing it
    pub travel_time: Duration,
    /// Pause after closing a deal before scanning resumes
    pub cooldown: Duration,
    /// How far ahead of an offer deadline the verdict is computed
    pub decision_margin: Duration,
}

impl Default for BuyerConfig {
    fn default() -> Self {
        Self {
            deal_value_estimate: BASE_DEAL_VALUE,
            scan_interval: Duration::from_millis(200),
            interact_range: 1.0,
            travel_time: Duration::from_millis(500),
            cooldown: Duration::from_secs(1),
            decision_margin: Duration::from_millis(40),
        }
    }
}

impl BuyerConfig {
    /// Config with a randomized deal-value estimate so buyers disagree on
    /// what deals are worth
    pub fn randomized() -> Self {
        let factor = rand::thread_rng().gen_range(0.8..1.3);
        Self {
            deal_value_estimate: BASE_DEAL_VALUE * factor,
            ..Self::default()
        }
    }
}

/// Outcome of one observation window
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RebidPlan {
    /// Outbid events per second over the window
    pub velocity: f64,
    /// Largest increase between consecutive observed leading bids
    pub volatility: f64,
    /// Damped increment, capped at 5% of the leading bid
    pub increment: f64,
    /// The rebid to submit
    pub proposed: f64,
}

/// Compute a damped rebid from the outbid events observed over `window`
///
/// The first delta is the first event's own gap; later deltas are the
/// differences between consecutive observed amounts.
pub fn plan_rebid(events: &[OutbidDetails], window: Duration) -> Option<RebidPlan> {
    let last = events.last()?;
    let secs = window.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }

    let velocity = events.len() as f64 / secs;
    let mut volatility = events[0].gap;
    for pair in events.windows(2) {
        volatility = volatility.max(pair[1].bid - pair[0].bid);
    }

    let leading = last.bid;
    let increment = (volatility * velocity).min(leading * REBID_CAP_RATIO);
    Some(RebidPlan {
        velocity,
        volatility,
        increment,
        proposed: leading + increment,
    })
}

/// Size the observation window: min(remaining/2, max(remaining - eps, 1s))
pub fn observation_window(remaining: Duration) -> Duration {
    let half = remaining / 2;
    let near_full = remaining
        .saturating_sub(OBSERVATION_EPSILON)
        .max(MIN_OBSERVATION);
    half.min(near_full)
}

struct Observation {
    events: Vec<OutbidDetails>,
    window: Duration,
    ends_at: Instant,
}

struct PendingOffer {
    offer: Offer,
    reply: oneshot::Sender<bool>,
    decide_at: Instant,
}

/// A single buyer's reactive task
pub struct BuyerAgent {
    id: BuyerId,
    house: Arc<AuctionHouse>,
    mailbox: mpsc::UnboundedReceiver<BuyerEvent>,
    config: BuyerConfig,
    observations: HashMap<AuctionId, Observation>,
    pending_offers: Vec<PendingOffer>,
    bids_placed: HashSet<AuctionId>,
    deals_to_close: Vec<(DealId, Instant)>,
    idle_until: Option<Instant>,
}

impl BuyerAgent {
    pub fn new(
        id: BuyerId,
        house: Arc<AuctionHouse>,
        mailbox: mpsc::UnboundedReceiver<BuyerEvent>,
        config: BuyerConfig,
    ) -> Self {
        Self {
            id,
            house,
            mailbox,
            config,
            observations: HashMap::new(),
            pending_offers: Vec::new(),
            bids_placed: HashSet::new(),
            deals_to_close: Vec::new(),
            idle_until: None,
        }
    }

    /// Value of an option under auction, by this buyer's own estimate
    fn appraise_auction(&self, info: &AuctionInfo) -> f64 {
        (self.config.deal_value_estimate - info.strike) * info.option_duration.as_secs_f64()
    }

    /// Run until shutdown is signalled or the registry drops the mailbox
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut scan = tokio::time::interval(self.config.scan_interval);
        scan.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                _ = shutdown.changed() => break,
                event = self.mailbox.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = scan.tick() => self.scan().await,
                _ = wait_until(deadline) => self.handle_deadlines().await,
            }
        }
        tracing::debug!("{} shutting down", self.id);
    }

    fn next_deadline(&self) -> Option<Instant> {
        let observation = self.observations.values().map(|o| o.ends_at).min();
        let offer = self.pending_offers.iter().map(|p| p.decide_at).min();
        match (observation, offer) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn handle_event(&mut self, event: BuyerEvent) {
        match event {
            BuyerEvent::Outbid(details) => {
                let auction = details.auction;
                match self.observations.get_mut(&auction) {
                    Some(observation) => observation.events.push(details),
                    None => {
                        let window = observation_window(details.remaining);
                        self.observations.insert(
                            auction,
                            Observation {
                                events: vec![details],
                                window,
                                ends_at: Instant::now() + window,
                            },
                        );
                    }
                }
            }
            BuyerEvent::Offer { offer, reply } => {
                let decide_at = Instant::now()
                    + offer
                        .decision_window
                        .saturating_sub(self.config.decision_margin);
                self.pending_offers.push(PendingOffer {
                    offer,
                    reply,
                    decide_at,
                });
            }
        }
    }

    async fn handle_deadlines(&mut self) {
        let now = Instant::now();
        self.finish_observations(now).await;
        self.decide_offers(now).await;
    }

    /// Close out every observation window that has elapsed with at most one
    /// damped rebid, then discard its buffered events
    async fn finish_observations(&mut self, now: Instant) {
        let due: Vec<AuctionId> = self
            .observations
            .iter()
            .filter(|(_, o)| o.ends_at <= now)
            .map(|(&id, _)| id)
            .collect();

        for auction in due {
            let Some(observation) = self.observations.remove(&auction) else {
                continue;
            };
            let Some(plan) = plan_rebid(&observation.events, observation.window) else {
                continue;
            };
            let Some(info) = self.house.auction_info(auction).await else {
                continue;
            };

            let valuation = self.appraise_auction(&info);
            if plan.proposed > valuation {
                tracing::debug!(
                    "{} lets {} go: rebid {} exceeds valuation {}",
                    self.id,
                    auction,
                    plan.proposed,
                    valuation
                );
                continue;
            }
            let _ = self.house.place_bid(self.id, plan.proposed, auction).await;
        }
    }

    /// Answer every pending offer whose decision point has arrived
    ///
    /// Only the best-valued pending offer may be accepted, and only with a
    /// positive valuation; everything else declines by dropping the reply.
    async fn decide_offers(&mut self, now: Instant) {
        if self.pending_offers.is_empty() {
            return;
        }

        let mut values = Vec::with_capacity(self.pending_offers.len());
        for pending in &self.pending_offers {
            values.push(self.offer_value(&pending.offer).await);
        }
        let best = values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx);

        let mut kept = Vec::new();
        for (i, pending) in self.pending_offers.drain(..).enumerate() {
            if pending.decide_at > now {
                kept.push(pending);
                continue;
            }
            if Some(i) == best && values[i] > 0.0 {
                tracing::debug!(
                    "{} accepts offer on {} at {}",
                    self.id,
                    pending.offer.auction,
                    pending.offer.premium
                );
                let _ = pending.reply.send(true);
            }
            // Declined offers drop their reply and time out on the registry
            // side; either way they leave the queue
        }
        self.pending_offers = kept;
    }

    async fn offer_value(&self, offer: &Offer) -> f64 {
        match self.house.option_contract(offer.option).await {
            Some(option) => {
                option.appraise(self.config.deal_value_estimate) - offer.premium
            }
            None => f64::NEG_INFINITY,
        }
    }

    /// Periodic pass: close matured deals, exercise held options, and place
    /// opening bids on fresh auctions
    async fn scan(&mut self) {
        let now = Instant::now();
        if let Some(until) = self.idle_until {
            if now < until {
                return;
            }
            self.idle_until = None;
        }

        self.close_matured_deals(now).await;
        self.exercise_options().await;
        self.browse_auctions().await;
    }

    async fn close_matured_deals(&mut self, now: Instant) {
        let due: Vec<DealId> = self
            .deals_to_close
            .iter()
            .filter(|(_, at)| *at <= now)
            .map(|(deal, _)| *deal)
            .collect();

        for deal in due {
            // Travel is abstracted away: the buyer has arrived
            match self
                .house
                .try_close_deal(self.id, deal, 0.0, self.config.interact_range)
                .await
            {
                Ok(true) => {
                    self.deals_to_close.retain(|(d, _)| *d != deal);
                    self.idle_until = Some(Instant::now() + self.config.cooldown);
                }
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!("{} failed to close {}: {}", self.id, deal, error);
                    self.deals_to_close.retain(|(d, _)| *d != deal);
                }
            }
        }
    }

    async fn exercise_options(&mut self) {
        let Some(account) = self.house.buyer(self.id).await else {
            return;
        };

        for &option_id in account.options() {
            let Some(option) = self.house.option_contract(option_id).await else {
                continue;
            };
            if !option.is_exchangeable() {
                continue;
            }
            // Exercise only when the deal is worth more than the strike
            if self.config.deal_value_estimate <= option.strike {
                continue;
            }
            match self.house.try_exchange(self.id, option_id).await {
                Ok(()) => {
                    self.deals_to_close
                        .push((option.deal, Instant::now() + self.config.travel_time));
                }
                Err(error) => {
                    tracing::debug!("{} could not exercise {}: {}", self.id, option_id, error);
                }
            }
        }
    }

    async fn browse_auctions(&mut self) {
        let auctions = self.house.active_auctions().await;
        self.bids_placed
            .retain(|id| auctions.iter().any(|info| info.auction == *id));

        for info in auctions {
            if !info.state.accepts_bids() || self.bids_placed.contains(&info.auction) {
                continue;
            }
            let valuation = self.appraise_auction(&info);
            if valuation <= 0.0 {
                continue;
            }

            let factor = rand::thread_rng().gen_range(1.1..1.6);
            let opening = (info.strike * factor).min(valuation);
            if opening <= 0.0 {
                continue;
            }
            if self
                .house
                .place_bid(self.id, opening, info.auction)
                .await
                .is_ok()
            {
                self.bids_placed.insert(info.auction);
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn outbid(bid: f64, gap: f64) -> OutbidDetails {
        OutbidDetails {
            auction: AuctionId(1),
            bid,
            gap,
            remaining: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_observation_window_formula() {
        // Half the remaining time when that is the binding cap
        assert_eq!(
            observation_window(Duration::from_secs(3)),
            Duration::from_millis(1500)
        );
        // Long remaining: still half
        assert_eq!(
            observation_window(Duration::from_secs(10)),
            Duration::from_secs(5)
        );
        // Very short remaining: half wins over the 1s floor
        assert_eq!(
            observation_window(Duration::from_millis(500)),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_plan_rebid_damping() {
        // Four events over two seconds, leading-bid deltas [1, 1, 1, 2]
        let events = vec![
            outbid(6.0, 1.0),
            outbid(7.0, 2.0),
            outbid(8.0, 3.0),
            outbid(10.0, 5.0),
        ];
        let plan = plan_rebid(&events, Duration::from_secs(2)).unwrap();

        assert_eq!(plan.velocity, 2.0);
        assert_eq!(plan.volatility, 2.0);
        // min(volatility * velocity, 5% of leading) = min(4.0, 0.5)
        assert_eq!(plan.increment, 0.5);
        assert_eq!(plan.proposed, 10.5);
    }

    #[test]
    fn test_plan_rebid_uncapped_when_calm() {
        // One small event over a long window: the raw product wins
        let events = vec![outbid(100.0, 0.5)];
        let plan = plan_rebid(&events, Duration::from_secs(5)).unwrap();

        assert_eq!(plan.velocity, 0.2);
        assert_eq!(plan.volatility, 0.5);
        // min(0.1, 5.0)
        assert_eq!(plan.increment, 0.1);
        assert_eq!(plan.proposed, 100.1);
    }

    #[test]
    fn test_plan_rebid_empty() {
        assert!(plan_rebid(&[], Duration::from_secs(1)).is_none());
    }

    #[tokio::test]
    async fn test_agent_places_opening_bid() {
        let house = AuctionHouse::new();
        let seller = house.register_seller(0.0).await;
        let deal = house.mint_deal(seller, 1.5).await.unwrap();
        let option = house
            .write_option(seller, deal, 5.0, Duration::from_secs(10))
            .await
            .unwrap();
        let auction = house
            .create_auction(seller, option, Duration::from_secs(5))
            .await
            .unwrap();

        let (id, mailbox) = house.register_buyer(100.0).await;
        let config = BuyerConfig {
            deal_value_estimate: 10.0,
            scan_interval: Duration::from_millis(50),
            ..BuyerConfig::default()
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let agent = BuyerAgent::new(id, house.clone(), mailbox, config);
        let handle = tokio::spawn(agent.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(300)).await;

        let info = house.auction_info(auction).await.unwrap();
        let leading = info.leading.expect("agent should have bid");
        assert_eq!(leading.bidder, id);
        // Opening bid stays between the strike and the agent's valuation
        assert!(leading.amount > 5.0);
        assert!(leading.amount <= (10.0 - 5.0) * 10.0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_agent_wins_auction_end_to_end() {
        let house = AuctionHouse::new();
        let seller = house.register_seller(0.0).await;
        let deal = house.mint_deal(seller, 1.5).await.unwrap();
        let option = house
            .write_option(seller, deal, 2.0, Duration::from_secs(10))
            .await
            .unwrap();
        let auction = house
            .create_auction(seller, option, Duration::from_millis(400))
            .await
            .unwrap();

        let (id, mailbox) = house.register_buyer(100.0).await;
        let config = BuyerConfig {
            deal_value_estimate: 10.0,
            scan_interval: Duration::from_millis(50),
            ..BuyerConfig::default()
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let agent = BuyerAgent::new(id, house.clone(), mailbox, config);
        let handle = tokio::spawn(agent.run(shutdown_rx));

        // Window, offer round, then the scan that exercises the option
        tokio::time::sleep(Duration::from_millis(1200)).await;

        let account = house.buyer(id).await.unwrap();
        assert!(
            account.holds_option(option) || account.deals().contains(&deal),
            "agent should have won the option (and possibly exercised it)"
        );
        assert_eq!(house.find_auction_by_deal(deal).await, None);
        assert!(house.seller(seller).await.unwrap().funds() > 0.0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
