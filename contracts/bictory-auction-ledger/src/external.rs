use commons::{AuctionId, Token};
use concordium_std::*;

#[derive(Debug, Clone, SchemaType, Serialize)]
pub struct InitParams {
    /// Exact amount that must be attached to every `list` call.
    pub listing_fee: Amount,
}

#[derive(Debug, Clone, SchemaType, Serialize)]
pub struct ListParams {
    /// Token to auction. The seller must have made the ledger an operator of it.
    pub token: Token,
    /// Informational price. Bids are not checked against it.
    pub starting_price: Amount,
    /// Length of the bidding window.
    pub duration_days: u64,
}

#[derive(Debug, Clone, SchemaType, Serialize)]
pub struct ViewAuctionsParams {
    /// First auction id of the page.
    pub from: AuctionId,
    /// Page size, capped at `MAX_VIEW_PAGE`.
    pub limit: u32,
}

/// Which party triggered the settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, SchemaType, Serialize)]
pub enum SettlementRole {
    Seller,
    Winner,
}

/// Returned by `endAsSeller` and `claimAsWinner`.
#[derive(Debug, Clone, PartialEq, Eq, SchemaType, Serialize)]
pub struct SettlementOutcome {
    /// `None` when nobody bid and the token went back to the seller.
    pub winner: Option<AccountAddress>,
    /// Amount paid to the seller.
    pub amount: Amount,
}

/// Phase of an auction at a given slot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, SchemaType, Serialize)]
pub enum AuctionPhase {
    /// Accepting bids.
    Active,
    /// Deadline passed, waiting for settlement.
    Expired,
    /// Settled.
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, SchemaType, Serialize)]
pub struct AuctionView {
    pub id: AuctionId,
    pub token: Token,
    pub seller: AccountAddress,
    pub starting_price: Amount,
    pub end_at: Timestamp,
    pub ended: bool,
    pub phase: AuctionPhase,
    pub highest_bidder: Option<AccountAddress>,
    pub highest_bid: Amount,
    /// Sum of refunds still owed to outbid accounts.
    pub pending_refunds: Amount,
    /// CCD held by the ledger for this auction.
    pub escrow: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, SchemaType, Serialize)]
pub struct LedgerView {
    pub listing_fee: Amount,
    pub collected_fees: Amount,
    pub next_auction_id: AuctionId,
}
