use crate::external::SettlementRole;
use commons::{AuctionId, Token, BIDING_TAG, FINALIZE_TAG, LISTING_TAG, WITHDRAW_TAG};
use concordium_std::*;

/// Listing event data.
#[derive(Debug, Serial)]
pub struct ListedEvent<'a> {
    pub auction_id: AuctionId,
    /// Escrowed token.
    pub token: &'a Token,
    /// Seller account address.
    pub seller: &'a AccountAddress,
    pub starting_price: Amount,
    /// End of the bidding window.
    pub end_at: Timestamp,
}

/// Bid event data.
#[derive(Debug, Serial)]
pub struct BidEvent<'a> {
    pub auction_id: AuctionId,
    /// Bidder account address.
    pub bidder: &'a AccountAddress,
    /// Bid amount.
    pub amount: Amount,
    /// Previous leader whose bid became withdrawable.
    pub displaced: Option<AccountAddress>,
}

/// Refund withdrawal event data.
#[derive(Debug, Serial)]
pub struct WithdrawEvent<'a> {
    pub auction_id: AuctionId,
    pub account: &'a AccountAddress,
    pub amount: Amount,
}

/// Settlement event data.
#[derive(Debug, Serial)]
pub struct SettleEvent<'a> {
    pub auction_id: AuctionId,
    /// Party that called the settlement.
    pub settled_by: SettlementRole,
    /// Address of the previous token owner.
    pub seller: &'a AccountAddress,
    /// New token owner, `None` if the token went back to the seller.
    pub winner: Option<AccountAddress>,
    /// Amount paid to the seller.
    pub amount: Amount,
}

/// Tagged custom event to be serialized for the event log.
#[derive(Debug)]
pub enum LedgerEvent<'a> {
    Listed(ListedEvent<'a>),
    Bid(BidEvent<'a>),
    Withdraw(WithdrawEvent<'a>),
    Settle(SettleEvent<'a>),
}

impl<'a> LedgerEvent<'a> {
    pub fn listed(
        auction_id: AuctionId,
        token: &'a Token,
        seller: &'a AccountAddress,
        starting_price: Amount,
        end_at: Timestamp,
    ) -> Self {
        Self::Listed(ListedEvent {
            auction_id,
            token,
            seller,
            starting_price,
            end_at,
        })
    }

    pub fn bid(
        auction_id: AuctionId,
        bidder: &'a AccountAddress,
        amount: Amount,
        displaced: Option<AccountAddress>,
    ) -> Self {
        Self::Bid(BidEvent {
            auction_id,
            bidder,
            amount,
            displaced,
        })
    }

    pub fn withdraw(auction_id: AuctionId, account: &'a AccountAddress, amount: Amount) -> Self {
        Self::Withdraw(WithdrawEvent {
            auction_id,
            account,
            amount,
        })
    }

    pub fn settle(
        auction_id: AuctionId,
        settled_by: SettlementRole,
        seller: &'a AccountAddress,
        winner: Option<AccountAddress>,
        amount: Amount,
    ) -> Self {
        Self::Settle(SettleEvent {
            auction_id,
            settled_by,
            seller,
            winner,
            amount,
        })
    }
}

impl<'a> Serial for LedgerEvent<'a> {
    fn serial<W: Write>(&self, out: &mut W) -> Result<(), W::Err> {
        match self {
            LedgerEvent::Listed(event) => {
                out.write_u8(LISTING_TAG)?;
                event.serial(out)
            }
            LedgerEvent::Bid(event) => {
                out.write_u8(BIDING_TAG)?;
                event.serial(out)
            }
            LedgerEvent::Withdraw(event) => {
                out.write_u8(WITHDRAW_TAG)?;
                event.serial(out)
            }
            LedgerEvent::Settle(event) => {
                out.write_u8(FINALIZE_TAG)?;
                event.serial(out)
            }
        }
    }
}

#[concordium_cfg_test]
mod tests {
    use super::*;

    const USER_1: AccountAddress = AccountAddress([1; 32]);

    #[concordium_test]
    fn test_event_tags() {
        let bid = to_bytes(&LedgerEvent::bid(3, &USER_1, Amount::from_ccd(2), None));
        claim_eq!(bid[0], BIDING_TAG);
        claim_eq!(&bid[1..9], &3u64.to_le_bytes()[..]);

        let withdraw = to_bytes(&LedgerEvent::withdraw(3, &USER_1, Amount::from_ccd(2)));
        claim_eq!(withdraw[0], WITHDRAW_TAG);

        let settle = to_bytes(&LedgerEvent::settle(
            3,
            SettlementRole::Winner,
            &USER_1,
            Some(USER_1),
            Amount::from_ccd(2),
        ));
        claim_eq!(settle[0], FINALIZE_TAG);
    }
}
