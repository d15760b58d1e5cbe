//! Escrowed English auctions for CIS-1 tokens.
//!
//! A seller lists a token with `list`. The ledger pulls the token into its own
//! custody and opens a bidding window of whole days. Bids are paid with the
//! call itself. An outbid bidder gets a withdrawable refund that it reclaims
//! with `withdraw`. Once the deadline passes, either the seller (`endAsSeller`)
//! or the winner (`claimAsWinner`) settles the auction: the token goes to the
//! winner and the winning bid to the seller, or the token returns to the seller
//! when nobody bid.
#![cfg_attr(not(feature = "std"), no_std)]

mod contract;
mod events;
mod external;
mod registry;
mod state;
