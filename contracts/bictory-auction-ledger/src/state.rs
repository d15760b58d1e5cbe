use commons::{
    AuctionId, CustomContractError, Token, MAX_DURATION_DAYS, MAX_VIEW_PAGE, MIN_DURATION_DAYS,
};
use concordium_std::*;

use crate::external::{AuctionPhase, AuctionView, LedgerView, SettlementOutcome, SettlementRole};

/// One listed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, SchemaType)]
pub struct Auction {
    /// Escrowed token.
    pub token: Token,
    /// Seller account address.
    pub seller: AccountAddress,
    /// Informational price set on listing.
    pub starting_price: Amount,
    /// Bids are accepted strictly before this time.
    pub end_at: Timestamp,
    /// Set once the auction is settled.
    pub ended: bool,
    /// Current leader, `None` until the first bid.
    pub highest_bidder: Option<AccountAddress>,
    /// Current leading bid.
    pub highest_bid: Amount,
    /// Sum of all withdrawable balances of this auction.
    pub pending_refunds: Amount,
}

impl Auction {
    /// Get auction phase at given slot_time
    pub fn phase(&self, slot_time: Timestamp) -> AuctionPhase {
        if self.ended {
            AuctionPhase::Ended
        } else if slot_time < self.end_at {
            AuctionPhase::Active
        } else {
            AuctionPhase::Expired
        }
    }

    /// CCD the ledger holds for this auction. The winning bid leaves escrow on settlement.
    pub fn escrow(&self) -> Amount {
        if self.ended {
            self.pending_refunds
        } else {
            self.highest_bid + self.pending_refunds
        }
    }

    fn view(&self, id: AuctionId, slot_time: Timestamp) -> AuctionView {
        AuctionView {
            id,
            token: self.token.clone(),
            seller: self.seller,
            starting_price: self.starting_price,
            end_at: self.end_at,
            ended: self.ended,
            phase: self.phase(slot_time),
            highest_bidder: self.highest_bidder,
            highest_bid: self.highest_bid,
            pending_refunds: self.pending_refunds,
            escrow: self.escrow(),
        }
    }

    fn leading_bid(&self) -> Option<LastBid> {
        self.highest_bidder.map(|account| LastBid {
            account,
            amount: self.highest_bid,
        })
    }
}

/// A bid that lost the lead, or the bid that won the auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastBid {
    pub account: AccountAddress,
    pub amount: Amount,
}

/// Transfers that complete a settlement. The auction is already marked as ended when this is
/// handed out, so every failure to carry it out must be followed by `abort_settlement`.
#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub struct Settlement {
    pub token: Token,
    pub seller: AccountAddress,
    /// `None` if nobody bid.
    pub winning_bid: Option<LastBid>,
}

impl Settlement {
    pub fn outcome(&self) -> SettlementOutcome {
        match self.winning_bid {
            Some(bid) => SettlementOutcome {
                winner: Some(bid.account),
                amount: bid.amount,
            },
            None => SettlementOutcome {
                winner: None,
                amount: Amount::zero(),
            },
        }
    }
}

/// The contract state.
#[derive(Serial, DeserialWithState)]
#[concordium(state_parameter = "S")]
pub struct State<S: HasStateApi> {
    /// Exact amount attached to every listing.
    pub listing_fee: Amount,
    /// Listing fees received so far.
    pub collected_fees: Amount,
    /// Id of the next listing.
    next_auction_id: AuctionId,
    /// Append-only auction history.
    auctions: StateMap<AuctionId, Auction, S>,
    /// Refunds owed to outbid accounts.
    withdrawable: StateMap<(AuctionId, AccountAddress), Amount, S>,
    /// Token that is being pulled into custody by an ongoing `list` call.
    custody_in_flight: Option<Token>,
}

impl<S: HasStateApi> State<S> {
    /// Create a new state with no auctions.
    pub fn new(state_builder: &mut StateBuilder<S>, listing_fee: Amount) -> Self {
        State {
            listing_fee,
            collected_fees: Amount::zero(),
            next_auction_id: 0,
            auctions: state_builder.new_map(),
            withdrawable: state_builder.new_map(),
            custody_in_flight: None,
        }
    }

    pub fn view(&self) -> LedgerView {
        LedgerView {
            listing_fee: self.listing_fee,
            collected_fees: self.collected_fees,
            next_auction_id: self.next_auction_id,
        }
    }

    /// Working copy of an auction. Changes are committed by inserting it back.
    pub fn auction(&self, auction_id: AuctionId) -> Result<Auction, CustomContractError> {
        self.auctions
            .get(&auction_id)
            .map(|auction| (*auction).clone())
            .ok_or(CustomContractError::InvalidAuctionId)
    }

    pub fn view_auction(
        &self,
        auction_id: AuctionId,
        slot_time: Timestamp,
    ) -> Result<AuctionView, CustomContractError> {
        self.auction(auction_id)
            .map(|auction| auction.view(auction_id, slot_time))
    }

    pub fn view_auctions(
        &self,
        from: AuctionId,
        limit: u32,
        slot_time: Timestamp,
    ) -> Vec<AuctionView> {
        let end = from
            .saturating_add(u64::from(limit.min(MAX_VIEW_PAGE)))
            .min(self.next_auction_id);
        (from..end)
            .filter_map(|auction_id| self.view_auction(auction_id, slot_time).ok())
            .collect()
    }

    pub fn withdrawable_of(&self, auction_id: AuctionId, account: &AccountAddress) -> Amount {
        self.withdrawable
            .get(&(auction_id, *account))
            .map(|amount| *amount)
            .unwrap_or_else(Amount::zero)
    }

    /// Check listing terms and compute the auction deadline.
    pub fn validate_listing(
        starting_price: Amount,
        duration_days: u64,
        slot_time: Timestamp,
    ) -> Result<Timestamp, CustomContractError> {
        ensure!(
            starting_price > Amount::zero(),
            CustomContractError::InvalidPrice
        );
        ensure!(
            (MIN_DURATION_DAYS..=MAX_DURATION_DAYS).contains(&duration_days),
            CustomContractError::InvalidDuration
        );
        slot_time
            .checked_add(Duration::from_days(duration_days))
            .ok_or(CustomContractError::InvalidDuration)
    }

    pub fn expect_custody(&mut self, token: Token) {
        self.custody_in_flight = Some(token);
    }

    pub fn clear_custody(&mut self) {
        self.custody_in_flight = None;
    }

    pub fn is_expected_custody(&self, token: &Token) -> bool {
        self.custody_in_flight.as_ref() == Some(token)
    }

    /// Record a new auction for a token that is already in custody.
    pub fn list(
        &mut self,
        token: Token,
        seller: AccountAddress,
        starting_price: Amount,
        end_at: Timestamp,
        fee: Amount,
    ) -> AuctionId {
        let auction_id = self.next_auction_id;
        self.next_auction_id += 1;
        self.collected_fees += fee;
        self.auctions.insert(
            auction_id,
            Auction {
                token,
                seller,
                starting_price,
                end_at,
                ended: false,
                highest_bidder: None,
                highest_bid: Amount::zero(),
                pending_refunds: Amount::zero(),
            },
        );
        auction_id
    }

    /// Record a bid whose amount is already in custody. Returns the bid that lost the lead; it is
    /// credited to its bidder's withdrawable balance.
    pub fn bid(
        &mut self,
        auction_id: AuctionId,
        bidder: AccountAddress,
        amount: Amount,
        slot_time: Timestamp,
    ) -> Result<Option<LastBid>, CustomContractError> {
        let mut auction = self.auction(auction_id)?;

        ensure!(!auction.ended, CustomContractError::AuctionEnded);
        ensure!(
            slot_time < auction.end_at,
            CustomContractError::AuctionExpired
        );
        ensure!(
            amount > auction.highest_bid,
            CustomContractError::BidTooLow
        );
        ensure_ne!(bidder, auction.seller, CustomContractError::SellerCannotBid);
        ensure_ne!(
            Some(bidder),
            auction.highest_bidder,
            CustomContractError::CannotOutbidSelf
        );

        let displaced = auction.leading_bid();
        if let Some(bid) = displaced {
            self.credit(auction_id, bid.account, bid.amount);
            auction.pending_refunds += bid.amount;
        }
        auction.highest_bidder = Some(bidder);
        auction.highest_bid = amount;
        self.auctions.insert(auction_id, auction);

        Ok(displaced)
    }

    /// Clear the caller's refund and return it. Must run before the payment goes out.
    pub fn withdraw(
        &mut self,
        auction_id: AuctionId,
        account: AccountAddress,
    ) -> Result<Amount, CustomContractError> {
        let mut auction = self.auction(auction_id)?;

        // Only an open auction locks the leader out. After settlement the winning bid is paid out
        // and never in `withdrawable`, so the winner may take back its earlier displaced bids.
        ensure!(
            auction.ended || auction.highest_bidder != Some(account),
            CustomContractError::NotWithdrawable
        );
        let amount = self.withdrawable_of(auction_id, &account);
        ensure!(amount > Amount::zero(), CustomContractError::NotWithdrawable);

        self.withdrawable.remove(&(auction_id, account));
        auction.pending_refunds -= amount;
        self.auctions.insert(auction_id, auction);

        Ok(amount)
    }

    /// Undo `withdraw` after a failed payment.
    pub fn restore_withdrawable(
        &mut self,
        auction_id: AuctionId,
        account: AccountAddress,
        amount: Amount,
    ) {
        if let Ok(mut auction) = self.auction(auction_id) {
            self.credit(auction_id, account, amount);
            auction.pending_refunds += amount;
            self.auctions.insert(auction_id, auction);
        }
    }

    /// Check settlement preconditions and mark the auction as ended.
    pub fn begin_settlement(
        &mut self,
        auction_id: AuctionId,
        caller: &AccountAddress,
        role: SettlementRole,
        slot_time: Timestamp,
    ) -> Result<Settlement, CustomContractError> {
        let mut auction = self.auction(auction_id)?;

        match role {
            SettlementRole::Seller => {
                ensure_eq!(caller, &auction.seller, CustomContractError::NotSeller)
            }
            SettlementRole::Winner => ensure_eq!(
                Some(*caller),
                auction.highest_bidder,
                CustomContractError::NotWinner
            ),
        }
        ensure!(
            slot_time >= auction.end_at,
            CustomContractError::AuctionNotExpired
        );
        ensure!(!auction.ended, CustomContractError::AuctionAlreadyEnded);

        auction.ended = true;
        let settlement = Settlement {
            token: auction.token.clone(),
            seller: auction.seller,
            winning_bid: auction.leading_bid(),
        };
        self.auctions.insert(auction_id, auction);

        Ok(settlement)
    }

    /// Reopen an auction whose settlement transfers failed.
    pub fn abort_settlement(&mut self, auction_id: AuctionId) {
        if let Ok(mut auction) = self.auction(auction_id) {
            auction.ended = false;
            self.auctions.insert(auction_id, auction);
        }
    }

    fn credit(&mut self, auction_id: AuctionId, account: AccountAddress, amount: Amount) {
        let balance = self.withdrawable_of(auction_id, &account);
        self.withdrawable
            .insert((auction_id, account), balance + amount);
    }
}

#[concordium_cfg_test]
mod tests {
    use super::*;
    use concordium_cis1::TokenIdVec;
    use concordium_std::test_infrastructure::*;

    const DAY_MILLIS: u64 = 24 * 60 * 60 * 1000;

    const NFT_CONTRACT: ContractAddress = ContractAddress {
        index: 1,
        subindex: 0,
    };

    const SELLER: AccountAddress = AccountAddress([1; 32]);
    const ALICE: AccountAddress = AccountAddress([2; 32]);
    const BOB: AccountAddress = AccountAddress([3; 32]);
    const CAROL: AccountAddress = AccountAddress([4; 32]);

    fn token() -> Token {
        Token {
            contract: NFT_CONTRACT,
            id: TokenIdVec(vec![0, 1]),
        }
    }

    fn at_day(day: u64) -> Timestamp {
        Timestamp::from_timestamp_millis(day * DAY_MILLIS)
    }

    fn new_state() -> State<TestStateApi> {
        let mut state_builder = TestStateBuilder::new();
        State::new(&mut state_builder, Amount::from_ccd(1))
    }

    /// State with one auction listed on day 0 that ends on day 7.
    fn listed_state() -> (State<TestStateApi>, AuctionId) {
        let mut state = new_state();
        let id = state.list(
            token(),
            SELLER,
            Amount::from_micro_ccd(1),
            at_day(7),
            Amount::from_ccd(1),
        );
        (state, id)
    }

    #[concordium_test]
    fn test_sequential_ids() {
        let mut state = new_state();
        for expected in 0..3u64 {
            let id = state.list(
                token(),
                SELLER,
                Amount::from_micro_ccd(1),
                at_day(1),
                Amount::from_ccd(1),
            );
            claim_eq!(id, expected);
        }
        claim_eq!(state.view().next_auction_id, 3);
        claim_eq!(state.view().collected_fees, Amount::from_ccd(3));
    }

    #[concordium_test]
    fn test_validate_listing() {
        let now = at_day(0);
        let price = Amount::from_micro_ccd(1);

        claim_eq!(
            State::<TestStateApi>::validate_listing(Amount::zero(), 7, now),
            Err(CustomContractError::InvalidPrice)
        );
        claim_eq!(
            State::<TestStateApi>::validate_listing(price, 0, now),
            Err(CustomContractError::InvalidDuration)
        );
        claim_eq!(
            State::<TestStateApi>::validate_listing(price, 61, now),
            Err(CustomContractError::InvalidDuration)
        );
        claim_eq!(
            State::<TestStateApi>::validate_listing(price, 1, now),
            Ok(at_day(1))
        );
        claim_eq!(
            State::<TestStateApi>::validate_listing(price, 60, now),
            Ok(at_day(60))
        );
    }

    #[concordium_test]
    fn test_unknown_auction() {
        let (mut state, _) = listed_state();
        claim_eq!(
            state.bid(5, ALICE, Amount::from_ccd(1), at_day(1)),
            Err(CustomContractError::InvalidAuctionId)
        );
        claim_eq!(
            state.withdraw(5, ALICE),
            Err(CustomContractError::InvalidAuctionId)
        );
        claim_eq!(
            state.begin_settlement(5, &SELLER, SettlementRole::Seller, at_day(8)),
            Err(CustomContractError::InvalidAuctionId)
        );
    }

    #[concordium_test]
    fn test_first_bid_ignores_starting_price() {
        let mut state = new_state();
        let id = state.list(
            token(),
            SELLER,
            Amount::from_ccd(100),
            at_day(7),
            Amount::from_ccd(1),
        );

        claim_eq!(
            state.bid(id, ALICE, Amount::zero(), at_day(1)),
            Err(CustomContractError::BidTooLow)
        );
        claim_eq!(
            state.bid(id, ALICE, Amount::from_micro_ccd(1), at_day(1)),
            Ok(None)
        );
    }

    #[concordium_test]
    fn test_bid_rejections() {
        let (mut state, id) = listed_state();
        let ten = Amount::from_ccd(10);

        claim_eq!(state.bid(id, ALICE, ten, at_day(1)), Ok(None));
        // Equal to the highest bid
        claim_eq!(
            state.bid(id, BOB, ten, at_day(1)),
            Err(CustomContractError::BidTooLow)
        );
        claim_eq!(
            state.bid(id, SELLER, Amount::from_ccd(20), at_day(1)),
            Err(CustomContractError::SellerCannotBid)
        );
        claim_eq!(
            state.bid(id, ALICE, Amount::from_ccd(20), at_day(1)),
            Err(CustomContractError::CannotOutbidSelf)
        );
        // Deadline is exclusive
        claim_eq!(
            state.bid(id, BOB, Amount::from_ccd(20), at_day(7)),
            Err(CustomContractError::AuctionExpired)
        );

        let auction = state.auction(id).expect_report("Auction exists");
        claim_eq!(auction.highest_bidder, Some(ALICE));
        claim_eq!(auction.highest_bid, ten);
        claim_eq!(auction.pending_refunds, Amount::zero());
    }

    #[concordium_test]
    fn test_displaced_bid_becomes_withdrawable() {
        let (mut state, id) = listed_state();

        claim_eq!(state.bid(id, ALICE, Amount::from_ccd(10), at_day(1)), Ok(None));
        claim_eq!(
            state.bid(id, BOB, Amount::from_ccd(20), at_day(2)),
            Ok(Some(LastBid {
                account: ALICE,
                amount: Amount::from_ccd(10),
            }))
        );

        claim_eq!(state.withdrawable_of(id, &ALICE), Amount::from_ccd(10));
        // The leader's own stake is not withdrawable
        claim_eq!(state.withdrawable_of(id, &BOB), Amount::zero());

        let auction = state.auction(id).expect_report("Auction exists");
        claim_eq!(auction.highest_bidder, Some(BOB));
        claim_eq!(auction.escrow(), Amount::from_ccd(30));
    }

    #[concordium_test]
    fn test_escrow_is_conserved_over_bid_sequence() {
        let (mut state, id) = listed_state();
        let bidders = [ALICE, BOB, CAROL];
        let mut deposited = Amount::zero();
        let mut withdrawn = Amount::zero();
        let mut last_bid = Amount::zero();

        for round in 0..12u64 {
            let bidder = bidders[(round % 3) as usize];
            let amount = Amount::from_micro_ccd(100 + round * 37);
            state
                .bid(id, bidder, amount, at_day(1))
                .expect_report("Bid should pass");
            deposited += amount;

            let auction = state.auction(id).expect_report("Auction exists");
            claim!(auction.highest_bid > last_bid);
            claim_eq!(auction.highest_bid, amount);
            last_bid = auction.highest_bid;

            // Every third round the account that was displaced first takes its refund
            if round % 3 == 2 {
                let loser = bidders[((round + 1) % 3) as usize];
                withdrawn += state.withdraw(id, loser).expect_report("Refund available");
            }

            let auction = state.auction(id).expect_report("Auction exists");
            let owed = bidders
                .iter()
                .fold(Amount::zero(), |acc, b| acc + state.withdrawable_of(id, b));
            claim_eq!(owed, auction.pending_refunds);
            claim_eq!(auction.highest_bid + owed + withdrawn, deposited);
        }
    }

    #[concordium_test]
    fn test_leader_cannot_withdraw() {
        let (mut state, id) = listed_state();

        state
            .bid(id, ALICE, Amount::from_ccd(10), at_day(1))
            .expect_report("Bid should pass");
        claim_eq!(
            state.withdraw(id, ALICE),
            Err(CustomContractError::NotWithdrawable)
        );

        // Outbid and outbid back: the old refund stays locked while ALICE leads
        state
            .bid(id, BOB, Amount::from_ccd(20), at_day(1))
            .expect_report("Bid should pass");
        state
            .bid(id, ALICE, Amount::from_ccd(30), at_day(1))
            .expect_report("Bid should pass");
        claim_eq!(state.withdrawable_of(id, &ALICE), Amount::from_ccd(10));
        claim_eq!(
            state.withdraw(id, ALICE),
            Err(CustomContractError::NotWithdrawable)
        );
        claim_eq!(state.withdraw(id, BOB), Ok(Amount::from_ccd(20)));
    }

    #[concordium_test]
    fn test_withdraw_zeroes_and_restores() {
        let (mut state, id) = listed_state();

        state
            .bid(id, ALICE, Amount::from_ccd(10), at_day(1))
            .expect_report("Bid should pass");
        state
            .bid(id, BOB, Amount::from_ccd(20), at_day(1))
            .expect_report("Bid should pass");

        claim_eq!(state.withdraw(id, ALICE), Ok(Amount::from_ccd(10)));
        claim_eq!(state.withdrawable_of(id, &ALICE), Amount::zero());
        claim_eq!(
            state.withdraw(id, ALICE),
            Err(CustomContractError::NotWithdrawable)
        );

        state.restore_withdrawable(id, ALICE, Amount::from_ccd(10));
        claim_eq!(state.withdrawable_of(id, &ALICE), Amount::from_ccd(10));
        let auction = state.auction(id).expect_report("Auction exists");
        claim_eq!(auction.pending_refunds, Amount::from_ccd(10));

        // Accounts that never bid have nothing to take
        claim_eq!(
            state.withdraw(id, CAROL),
            Err(CustomContractError::NotWithdrawable)
        );
    }

    #[concordium_test]
    fn test_settlement_gates() {
        let (mut state, id) = listed_state();
        state
            .bid(id, ALICE, Amount::from_ccd(10), at_day(1))
            .expect_report("Bid should pass");

        claim_eq!(
            state.begin_settlement(id, &ALICE, SettlementRole::Seller, at_day(8)),
            Err(CustomContractError::NotSeller)
        );
        claim_eq!(
            state.begin_settlement(id, &SELLER, SettlementRole::Winner, at_day(8)),
            Err(CustomContractError::NotWinner)
        );
        claim_eq!(
            state.begin_settlement(id, &SELLER, SettlementRole::Seller, at_day(6)),
            Err(CustomContractError::AuctionNotExpired)
        );

        let settlement = state
            .begin_settlement(id, &ALICE, SettlementRole::Winner, at_day(7))
            .expect_report("Settlement should start");
        claim_eq!(
            settlement.outcome(),
            SettlementOutcome {
                winner: Some(ALICE),
                amount: Amount::from_ccd(10),
            }
        );
        claim_eq!(state.auction(id).map(|a| a.ended), Ok(true));

        claim_eq!(
            state.begin_settlement(id, &SELLER, SettlementRole::Seller, at_day(8)),
            Err(CustomContractError::AuctionAlreadyEnded)
        );
        claim_eq!(
            state.begin_settlement(id, &ALICE, SettlementRole::Winner, at_day(8)),
            Err(CustomContractError::AuctionAlreadyEnded)
        );
        claim_eq!(
            state.bid(id, BOB, Amount::from_ccd(20), at_day(1)),
            Err(CustomContractError::AuctionEnded)
        );
    }

    #[concordium_test]
    fn test_abort_settlement_reopens() {
        let (mut state, id) = listed_state();

        let settlement = state
            .begin_settlement(id, &SELLER, SettlementRole::Seller, at_day(7))
            .expect_report("Settlement should start");
        claim_eq!(settlement.winning_bid, None);
        claim_eq!(settlement.outcome().amount, Amount::zero());

        state.abort_settlement(id);
        let auction = state.auction(id).expect_report("Auction exists");
        claim!(!auction.ended);
        claim_eq!(auction.phase(at_day(7)), AuctionPhase::Expired);

        let retry = state.begin_settlement(id, &SELLER, SettlementRole::Seller, at_day(7));
        claim!(retry.is_ok());
    }

    #[concordium_test]
    fn test_winner_keeps_earlier_refund_after_settlement() {
        let (mut state, id) = listed_state();

        state
            .bid(id, ALICE, Amount::from_ccd(10), at_day(1))
            .expect_report("Bid should pass");
        state
            .bid(id, BOB, Amount::from_ccd(20), at_day(1))
            .expect_report("Bid should pass");
        state
            .bid(id, ALICE, Amount::from_ccd(30), at_day(1))
            .expect_report("Bid should pass");

        let _ = state
            .begin_settlement(id, &ALICE, SettlementRole::Winner, at_day(7))
            .expect_report("Settlement should start");

        let auction = state.auction(id).expect_report("Auction exists");
        claim_eq!(auction.escrow(), Amount::from_ccd(30));
        claim_eq!(state.withdraw(id, ALICE), Ok(Amount::from_ccd(10)));
        claim_eq!(state.withdraw(id, BOB), Ok(Amount::from_ccd(20)));
        let auction = state.auction(id).expect_report("Auction exists");
        claim_eq!(auction.escrow(), Amount::zero());
    }

    #[concordium_test]
    fn test_phases_and_pages() {
        let (mut state, id) = listed_state();
        let _ = state.list(
            token(),
            SELLER,
            Amount::from_micro_ccd(5),
            at_day(3),
            Amount::from_ccd(1),
        );

        let auction = state.auction(id).expect_report("Auction exists");
        claim_eq!(auction.phase(at_day(6)), AuctionPhase::Active);
        claim_eq!(auction.phase(at_day(7)), AuctionPhase::Expired);

        let page = state.view_auctions(0, 10, at_day(5));
        claim_eq!(page.len(), 2);
        claim_eq!(page[0].phase, AuctionPhase::Active);
        claim_eq!(page[1].phase, AuctionPhase::Expired);

        claim_eq!(state.view_auctions(1, 10, at_day(5)).len(), 1);
        claim!(state.view_auctions(2, 10, at_day(5)).is_empty());
        claim!(state.view_auctions(0, 0, at_day(5)).is_empty());
    }
}
