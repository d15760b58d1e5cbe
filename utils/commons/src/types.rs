use super::*;

pub type ContractResult<A> = Result<A, CustomContractError>;

/// Sequential auction identifier. The first auction gets `0`.
pub type AuctionId = u64;

/// Contract token ID type.
pub type ContractTokenId = TokenIdVec;
