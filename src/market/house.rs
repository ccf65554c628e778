//! The auction house: process-wide registry and transaction authority
//!
//! A single `AuctionHouse` instance owns the entity arena (deals, options,
//! accounts), the set of active auctions, and the option/deal auction
//! indexes. It is the only component permitted to create, mutate, or retire
//! an auction, and every ownership transfer happens inside one of its
//! operations under the state lock, which is what makes transfers atomic
//! and single-winner.

use crate::error::{Result, TradefloorError};
use crate::market::account::{BuyerAccount, SellerAccount};
use crate::market::auction::{Auction, AuctionState, Bid, Offer, OutbidDetails};
use crate::market::deal::{Deal, DealState};
use crate::market::events::MarketEvent;
use crate::market::option::OptionContract;
use crate::types::{AuctionId, BuyerId, DealId, OptionId, Party, SellerId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};

/// How long each waterfall candidate gets to decide on an offer
pub const OFFER_DECISION_WINDOW: Duration = Duration::from_millis(150);

/// Events delivered to a buyer agent's mailbox
#[derive(Debug)]
pub enum BuyerEvent {
    /// The buyer's bid was surpassed
    Outbid(OutbidDetails),
    /// The buyer is being offered the option during resolution; the verdict
    /// must arrive on `reply` within the offer's decision window
    Offer {
        offer: Offer,
        reply: oneshot::Sender<bool>,
    },
}

/// Handle identifying an auction to cancel
#[derive(Clone, Copy, Debug)]
pub enum CancelTarget {
    Auction(AuctionId),
    Option(OptionId),
    Deal(DealId),
}

/// Read-only snapshot of an active auction
#[derive(Clone, Debug, serde::Serialize)]
pub struct AuctionInfo {
    pub auction: AuctionId,
    pub option: OptionId,
    pub deal: DealId,
    pub seller: SellerId,
    pub state: AuctionState,
    pub strike: f64,
    pub option_duration: Duration,
    pub leading: Option<Bid>,
    pub bid_count: usize,
    pub remaining: Duration,
}

struct MarketState {
    deals: HashMap<DealId, Deal>,
    options: HashMap<OptionId, OptionContract>,
    buyers: HashMap<BuyerId, BuyerAccount>,
    sellers: HashMap<SellerId, SellerAccount>,
    auctions: HashMap<AuctionId, Auction>,
    auctions_by_option: HashMap<OptionId, AuctionId>,
    auctions_by_deal: HashMap<DealId, AuctionId>,
    mailboxes: HashMap<BuyerId, mpsc::UnboundedSender<BuyerEvent>>,
}

impl MarketState {
    fn new() -> Self {
        Self {
            deals: HashMap::new(),
            options: HashMap::new(),
            buyers: HashMap::new(),
            sellers: HashMap::new(),
            auctions: HashMap::new(),
            auctions_by_option: HashMap::new(),
            auctions_by_deal: HashMap::new(),
            mailboxes: HashMap::new(),
        }
    }

    /// Drop an auction from the active set and both indexes
    ///
    /// Always runs on every terminal outcome; a leaked index entry would
    /// permanently block re-auctioning the deal.
    fn deregister(&mut self, auction_id: AuctionId) {
        if let Some(auction) = self.auctions.remove(&auction_id) {
            self.auctions_by_option.remove(&auction.option);
            if let Some(option) = self.options.get(&auction.option) {
                self.auctions_by_deal.remove(&option.deal);
            }
        }
    }
}

/// Process-wide auction registry and transaction manager
///
/// Constructed once and handed to every agent as an `Arc`.
pub struct AuctionHouse {
    state: Mutex<MarketState>,
    events: broadcast::Sender<MarketEvent>,
}

impl AuctionHouse {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            state: Mutex::new(MarketState::new()),
            events,
        })
    }

    /// Subscribe to the read-only market event feed
    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: MarketEvent) {
        // Observers are optional; a send with no receivers is fine
        let _ = self.events.send(event);
    }

    // --- Registration -----------------------------------------------------

    /// Register a buyer, returning its id and the mailbox the registry will
    /// deliver outbid notifications and offers to
    pub async fn register_buyer(
        &self,
        funds: f64,
    ) -> (BuyerId, mpsc::UnboundedReceiver<BuyerEvent>) {
        let id = BuyerId::next();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock().await;
        state.buyers.insert(id, BuyerAccount::new(id, funds));
        state.mailboxes.insert(id, tx);
        (id, rx)
    }

    /// Register a seller
    pub async fn register_seller(&self, funds: f64) -> SellerId {
        let id = SellerId::next();
        let mut state = self.state.lock().await;
        state.sellers.insert(id, SellerAccount::new(id, funds));
        id
    }

    /// Create a new unassigned deal in the seller's open inventory
    pub async fn mint_deal(&self, seller: SellerId, seller_expected: f64) -> Result<DealId> {
        let mut state = self.state.lock().await;
        let account = state
            .sellers
            .get_mut(&seller)
            .ok_or(TradefloorError::SellerNotFound(seller))?;

        let deal = Deal::new(seller, seller_expected);
        let id = deal.id;
        account.add_deal(id);
        state.deals.insert(id, deal);

        tracing::debug!("{} minted {}", seller, id);
        Ok(id)
    }

    /// Write an option over a deal the seller currently holds
    pub async fn write_option(
        &self,
        seller: SellerId,
        deal: DealId,
        strike: f64,
        duration: Duration,
    ) -> Result<OptionId> {
        let mut state = self.state.lock().await;
        let account = state
            .sellers
            .get(&seller)
            .ok_or(TradefloorError::SellerNotFound(seller))?;
        if !account.has_deal(deal) {
            return Err(TradefloorError::SellerMissingDeal { seller, deal });
        }

        let option = OptionContract::new(deal, strike, duration);
        let id = option.id;
        state.options.insert(id, option);
        Ok(id)
    }

    // --- Auction lifecycle ------------------------------------------------

    /// Open an auction for an option with the given bidding window
    ///
    /// Rejected if the option or its deal is already under auction. The
    /// auction is registered and moved to `Bidding` before this returns; a
    /// spawned timer drives resolution when the window elapses.
    pub async fn create_auction(
        self: &Arc<Self>,
        seller: SellerId,
        option: OptionId,
        window: Duration,
    ) -> Result<AuctionId> {
        let auction_id = {
            let mut state = self.state.lock().await;

            if !state.sellers.contains_key(&seller) {
                return Err(TradefloorError::SellerNotFound(seller));
            }
            let deal = state
                .options
                .get(&option)
                .ok_or(TradefloorError::OptionNotFound(option))?
                .deal;
            if state.auctions_by_option.contains_key(&option) {
                return Err(TradefloorError::OptionAlreadyInAuction(option));
            }
            if state.auctions_by_deal.contains_key(&deal) {
                return Err(TradefloorError::DealAlreadyInAuction(deal));
            }
            if !state.deals.contains_key(&deal) {
                return Err(TradefloorError::DealNotFound(deal));
            }

            let mut auction = Auction::new(seller, option, window);
            auction.open_bidding()?;
            let auction_id = auction.id;

            state.auctions_by_option.insert(option, auction_id);
            state.auctions_by_deal.insert(deal, auction_id);
            state.auctions.insert(auction_id, auction);

            self.publish(MarketEvent::AuctionOpened {
                auction: auction_id,
                option,
                deal,
                seller,
                window,
            });
            tracing::info!("{} opened for {} by {}", auction_id, option, seller);
            auction_id
        };

        // Bidding window timer drives resolution
        let house = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            house.resolve(auction_id).await;
        });

        Ok(auction_id)
    }

    /// Place a bid on behalf of a buyer
    ///
    /// Accepted only while the auction is `Bidding` and only if the amount
    /// strictly exceeds the buyer's own previous bid. Acceptance, ordering
    /// update, and outbid fan-out all happen under one lock so observers
    /// never see a transiently inconsistent ordering.
    pub async fn place_bid(
        &self,
        bidder: BuyerId,
        amount: f64,
        auction_id: AuctionId,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        if !state.buyers.contains_key(&bidder) {
            return Err(TradefloorError::BuyerNotFound(bidder));
        }
        let auction = state
            .auctions
            .get_mut(&auction_id)
            .ok_or(TradefloorError::AuctionNotFound(auction_id))?;

        auction.place_bid(bidder, amount)?;

        let remaining = auction.remaining();
        let surpassed = auction.bidders_below(amount, bidder);

        for below in surpassed {
            let details = OutbidDetails {
                auction: auction_id,
                bid: amount,
                gap: amount - below.amount,
                remaining,
            };
            if let Some(mailbox) = state.mailboxes.get(&below.bidder) {
                let _ = mailbox.send(BuyerEvent::Outbid(details));
            }
        }

        self.publish(MarketEvent::BidPlaced {
            auction: auction_id,
            bidder,
            amount,
        });
        tracing::debug!("{} bid {} on {}", bidder, amount, auction_id);
        Ok(())
    }

    /// Cancel a bidding-phase auction, found by handle, option, or deal
    ///
    /// The auction is marked `Cancelled` and stops accepting bids;
    /// deregistration happens when its window timer fires. Auctions already
    /// resolving cannot be cancelled.
    pub async fn cancel_auction(&self, target: CancelTarget, by: Party) -> Result<()> {
        let mut state = self.state.lock().await;

        let auction_id = match target {
            CancelTarget::Auction(id) => id,
            CancelTarget::Option(option) => *state
                .auctions_by_option
                .get(&option)
                .ok_or(TradefloorError::NoAuctionForOption(option))?,
            CancelTarget::Deal(deal) => *state
                .auctions_by_deal
                .get(&deal)
                .ok_or(TradefloorError::NoAuctionForDeal(deal))?,
        };

        let auction = state
            .auctions
            .get_mut(&auction_id)
            .ok_or(TradefloorError::AuctionNotFound(auction_id))?;

        match auction.state {
            AuctionState::Bidding => {
                auction.state = AuctionState::Cancelled;
                auction.cancelled_by = Some(by);
                self.publish(MarketEvent::AuctionCancelled {
                    auction: auction_id,
                    by,
                });
                tracing::info!("{} cancelled by {}", auction_id, by);
                Ok(())
            }
            _ => Err(TradefloorError::CancelNotAllowed(auction_id)),
        }
    }

    /// Resolve an auction at the close of its bidding window
    ///
    /// Cancelled or empty auctions deregister with no further effects.
    /// Otherwise bids are offered highest-first, one candidate at a time,
    /// each with its own decision window; the first acceptance performs the
    /// transfer and halts the waterfall.
    async fn resolve(&self, auction_id: AuctionId) {
        // Snapshot the ordering and candidate mailboxes, then release the
        // lock: decision waits must not block bidding on other auctions.
        let (option, candidates) = {
            let mut state = self.state.lock().await;
            let Some(auction) = state.auctions.get_mut(&auction_id) else {
                tracing::warn!("Resolution timer fired for unknown {}", auction_id);
                return;
            };

            match auction.state {
                AuctionState::Cancelled => {
                    if auction.bid_count() > 0 {
                        tracing::warn!(
                            "{} was cancelled during bidding with {} live bids",
                            auction_id,
                            auction.bid_count()
                        );
                    }
                    state.deregister(auction_id);
                    return;
                }
                AuctionState::Bidding if auction.bid_count() == 0 => {
                    tracing::debug!("{} closed with no bidders", auction_id);
                    state.deregister(auction_id);
                    self.publish(MarketEvent::AuctionNoSale {
                        auction: auction_id,
                    });
                    return;
                }
                AuctionState::Bidding => {
                    auction.state = AuctionState::Resolving;
                    let option = auction.option;
                    let bids: Vec<Bid> = auction.bids_ordered().to_vec();
                    let candidates = bids
                        .into_iter()
                        .map(|bid| (bid, state.mailboxes.get(&bid.bidder).cloned()))
                        .collect::<Vec<_>>();
                    (option, candidates)
                }
                other => {
                    tracing::warn!("{} in unexpected state {:?} at window close", auction_id, other);
                    state.deregister(auction_id);
                    return;
                }
            }
        };

        let mut sold = false;
        for (bid, mailbox) in candidates {
            let Some(mailbox) = mailbox else {
                tracing::debug!("{} has no mailbox, skipping offer", bid.bidder);
                continue;
            };

            let offer = Offer {
                auction: auction_id,
                option,
                recipient: bid.bidder,
                premium: bid.amount,
                decision_window: OFFER_DECISION_WINDOW,
            };
            let (reply_tx, reply_rx) = oneshot::channel();
            if mailbox
                .send(BuyerEvent::Offer {
                    offer,
                    reply: reply_tx,
                })
                .is_err()
            {
                continue;
            }
            self.publish(MarketEvent::OfferExtended {
                auction: auction_id,
                recipient: bid.bidder,
                premium: bid.amount,
            });

            match tokio::time::timeout(offer.decision_window, reply_rx).await {
                Ok(Ok(true)) => {
                    if self.complete_transfer(auction_id, bid).await {
                        sold = true;
                        break;
                    }
                }
                // Declined, mailbox dropped, or timed out: next candidate
                _ => continue,
            }
        }

        let mut state = self.state.lock().await;
        state.deregister(auction_id);
        if !sold {
            self.publish(MarketEvent::AuctionNoSale {
                auction: auction_id,
            });
            tracing::info!("{} resolved with no sale", auction_id);
        }
    }

    /// Perform the atomic ownership transfer for an accepted offer
    ///
    /// Availability is re-validated at the moment of acceptance; nothing
    /// mutates unless every step can succeed. Returns false (and the
    /// waterfall proceeds) when the transfer cannot complete.
    async fn complete_transfer(&self, auction_id: AuctionId, bid: Bid) -> bool {
        let mut state = self.state.lock().await;

        let Some(auction) = state.auctions.get(&auction_id) else {
            return false;
        };
        let option_id = auction.option;
        let seller_id = auction.seller;

        let Some(option) = state.options.get(&option_id) else {
            tracing::error!("{} vanished before transfer", option_id);
            return false;
        };
        if option.is_activated() {
            tracing::error!("{} already activated at moment of transfer", option_id);
            return false;
        }
        let deal_id = option.deal;

        // Validate every step before mutating anything
        match state.buyers.get(&bid.bidder) {
            Some(buyer) if buyer.funds() >= bid.amount => {}
            Some(buyer) => {
                tracing::warn!(
                    "{} accepted offer of {} but only holds {}",
                    bid.bidder,
                    bid.amount,
                    buyer.funds()
                );
                return false;
            }
            None => return false,
        }
        match state.sellers.get(&seller_id) {
            Some(seller) if seller.has_deal(deal_id) => {}
            _ => {
                tracing::error!(
                    "{} does not hold {} at moment of transfer",
                    seller_id,
                    deal_id
                );
                return false;
            }
        }
        match state.deals.get(&deal_id) {
            Some(deal) if deal.state == DealState::Unassigned => {}
            _ => {
                tracing::error!("{} not unassigned at moment of transfer", deal_id);
                return false;
            }
        }

        // All checks passed: transfer ownership
        state
            .buyers
            .get_mut(&bid.bidder)
            .expect("buyer validated above")
            .subtract_funds(bid.amount);
        state
            .sellers
            .get_mut(&seller_id)
            .expect("seller validated above")
            .subtract_deal(deal_id);
        state
            .buyers
            .get_mut(&bid.bidder)
            .expect("buyer validated above")
            .receive_option(option_id);
        state
            .sellers
            .get_mut(&seller_id)
            .expect("seller validated above")
            .receive_funds(bid.amount);
        state
            .options
            .get_mut(&option_id)
            .expect("option validated above")
            .activate()
            .expect("activation validated above");
        state
            .deals
            .get_mut(&deal_id)
            .expect("deal validated above")
            .activate(bid.bidder)
            .expect("deal state validated above");

        self.publish(MarketEvent::AuctionSold {
            auction: auction_id,
            winner: bid.bidder,
            premium: bid.amount,
        });
        tracing::info!(
            "{} sold {} to {} for {}",
            auction_id,
            option_id,
            bid.bidder,
            bid.amount
        );
        true
    }

    // --- Option exchange and deal close -----------------------------------

    /// Exercise an option: pay the strike, receive the deal
    ///
    /// All preconditions are checked under one lock before any mutation, so
    /// a failed exchange leaves funds and inventory untouched.
    pub async fn try_exchange(&self, buyer: BuyerId, option_id: OptionId) -> Result<()> {
        let mut state = self.state.lock().await;

        let option = state
            .options
            .get(&option_id)
            .ok_or(TradefloorError::OptionNotFound(option_id))?;
        if option.is_exchanged() {
            return Err(TradefloorError::AlreadyExchanged(option_id));
        }
        if !option.is_exchangeable() {
            return Err(TradefloorError::NotExchangeable(option_id));
        }
        let strike = option.strike;
        let deal_id = option.deal;

        let account = state
            .buyers
            .get(&buyer)
            .ok_or(TradefloorError::BuyerNotFound(buyer))?;
        if !account.holds_option(option_id) {
            return Err(TradefloorError::OptionNotHeld {
                buyer,
                option: option_id,
            });
        }
        if account.funds() < strike {
            return Err(TradefloorError::InsufficientFunds {
                required: strike,
                available: account.funds(),
            });
        }
        match state.deals.get(&deal_id) {
            Some(deal) if deal.buyer == Some(buyer) => {}
            Some(_) => return Err(TradefloorError::DealNotOwned { buyer, deal: deal_id }),
            None => return Err(TradefloorError::DealNotFound(deal_id)),
        }

        // All preconditions hold: debit and transfer
        let account = state.buyers.get_mut(&buyer).expect("buyer validated above");
        account.subtract_funds(strike);
        account.subtract_option(option_id);
        account.receive_deal(deal_id);
        state
            .options
            .get_mut(&option_id)
            .expect("option validated above")
            .mark_exchanged()
            .expect("exchange state validated above");

        self.publish(MarketEvent::OptionExercised {
            option: option_id,
            deal: deal_id,
            buyer,
            strike,
        });
        tracing::info!("{} exercised {} for {}", buyer, option_id, strike);
        Ok(())
    }

    /// Attempt to close a deal the buyer owns
    ///
    /// Succeeds only within interaction range; a failed attempt mutates
    /// nothing and may be retried.
    pub async fn try_close_deal(
        &self,
        buyer: BuyerId,
        deal_id: DealId,
        distance: f64,
        interact_range: f64,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;

        let deal = state
            .deals
            .get_mut(&deal_id)
            .ok_or(TradefloorError::DealNotFound(deal_id))?;
        if deal.buyer != Some(buyer) {
            return Err(TradefloorError::DealNotOwned { buyer, deal: deal_id });
        }

        let closed = deal.try_close(distance, interact_range);
        if closed {
            self.publish(MarketEvent::DealClosed {
                deal: deal_id,
                buyer,
            });
            tracing::info!("{} closed {}", buyer, deal_id);
        }
        Ok(closed)
    }

    // --- Read-only surface -------------------------------------------------

    fn info_for(state: &MarketState, auction: &Auction) -> AuctionInfo {
        let (strike, option_duration, deal) = state
            .options
            .get(&auction.option)
            .map(|o| (o.strike, o.duration, o.deal))
            .unwrap_or((0.0, Duration::ZERO, DealId(0)));
        AuctionInfo {
            auction: auction.id,
            option: auction.option,
            deal,
            seller: auction.seller,
            state: auction.state,
            strike,
            option_duration,
            leading: auction.leading(),
            bid_count: auction.bid_count(),
            remaining: auction.remaining(),
        }
    }

    /// Snapshot all active auctions
    pub async fn active_auctions(&self) -> Vec<AuctionInfo> {
        let state = self.state.lock().await;
        state
            .auctions
            .values()
            .map(|auction| Self::info_for(&state, auction))
            .collect()
    }

    /// Snapshot a single active auction
    pub async fn auction_info(&self, id: AuctionId) -> Option<AuctionInfo> {
        let state = self.state.lock().await;
        state
            .auctions
            .get(&id)
            .map(|auction| Self::info_for(&state, auction))
    }

    /// O(1) lookup of the active auction for an option
    pub async fn find_auction_by_option(&self, option: OptionId) -> Option<AuctionId> {
        self.state.lock().await.auctions_by_option.get(&option).copied()
    }

    /// O(1) lookup of the active auction for a deal
    pub async fn find_auction_by_deal(&self, deal: DealId) -> Option<AuctionId> {
        self.state.lock().await.auctions_by_deal.get(&deal).copied()
    }

    pub async fn deal(&self, id: DealId) -> Option<Deal> {
        self.state.lock().await.deals.get(&id).cloned()
    }

    pub async fn option_contract(&self, id: OptionId) -> Option<OptionContract> {
        self.state.lock().await.options.get(&id).cloned()
    }

    pub async fn buyer(&self, id: BuyerId) -> Option<BuyerAccount> {
        self.state.lock().await.buyers.get(&id).cloned()
    }

    pub async fn seller(&self, id: SellerId) -> Option<SellerAccount> {
        self.state.lock().await.sellers.get(&id).cloned()
    }
}
