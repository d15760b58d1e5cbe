use super::*;

/// The custom errors the ledger can produce.
#[derive(Serialize, Debug, PartialEq, Eq, Reject, SchemaType)]
pub enum CustomContractError {
    /// Failed parsing the parameter (Error code: -1).
    #[from(ParseError)]
    ParseParams,
    /// Failed logging: Log is full (Error code: -2).
    LogFull,
    /// Failed logging: Log is malformed (Error code: -3).
    LogMalformed,
    /// Only account addresses can call this function (Error code: -4).
    OnlyAccountAddress,
    /// This function must only be called by a contract (Error code: -5).
    ContractOnly,
    /// No auction with the given id (Error code: -6).
    InvalidAuctionId,
    /// Attached amount differs from the listing fee (Error code: -7).
    InvalidFee,
    /// Asset contract does not exist or is the ledger itself (Error code: -8).
    InvalidAsset,
    /// Caller does not own the asset (Error code: -9).
    NotAssetOwner,
    /// Starting price must be positive (Error code: -10).
    InvalidPrice,
    /// Duration is outside of the allowed range (Error code: -11).
    InvalidDuration,
    /// Asset or CCD transfer failed (Error code: -12).
    TransferFailed,
    /// Auction has already been settled (Error code: -13).
    AuctionEnded,
    /// Bidding window is closed (Error code: -14).
    AuctionExpired,
    /// Bid does not exceed the highest bid (Error code: -15).
    BidTooLow,
    /// Seller is not allowed to bid on own auction (Error code: -16).
    SellerCannotBid,
    /// Highest bidder can not outbid itself (Error code: -17).
    CannotOutbidSelf,
    /// Nothing to withdraw, or the stake is still leading (Error code: -18).
    NotWithdrawable,
    /// Only the seller can end the auction (Error code: -19).
    NotSeller,
    /// Only the highest bidder can claim the auction (Error code: -20).
    NotWinner,
    /// Auction deadline has not passed yet (Error code: -21).
    AuctionNotExpired,
    /// Auction was settled before (Error code: -22).
    AuctionAlreadyEnded,
    /// Registry answered with an unexpected response (Error code: -23).
    Incompatible,
    /// Token was not requested by the ledger (Error code: -24).
    UnexpectedToken,
}

/// Coarse classification of rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input. Retrying the same call never succeeds.
    Validation,
    /// Wrong caller role.
    Authorization,
    /// Wrong lifecycle phase. The call may succeed later.
    State,
    /// Amounts or balances do not allow the operation.
    Accounting,
    /// A registry or payment call failed. Funds or assets may need attention.
    CollaboratorFailure,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::State)
    }
}

impl CustomContractError {
    pub fn kind(&self) -> ErrorKind {
        use CustomContractError::*;

        match self {
            ParseParams | OnlyAccountAddress | ContractOnly | InvalidAuctionId | InvalidFee
            | InvalidAsset | InvalidPrice | InvalidDuration | UnexpectedToken => ErrorKind::Validation,
            NotAssetOwner | NotSeller | NotWinner | SellerCannotBid => ErrorKind::Authorization,
            AuctionEnded | AuctionExpired | AuctionNotExpired | AuctionAlreadyEnded => {
                ErrorKind::State
            }
            BidTooLow | CannotOutbidSelf | NotWithdrawable => ErrorKind::Accounting,
            TransferFailed | Incompatible | LogFull | LogMalformed => {
                ErrorKind::CollaboratorFailure
            }
        }
    }
}

/// Mapping the logging errors to CustomContractError.
impl From<LogError> for CustomContractError {
    fn from(le: LogError) -> Self {
        match le {
            LogError::Full => Self::LogFull,
            LogError::Malformed => Self::LogMalformed,
        }
    }
}

/// Mapping errors related to CCD transfers to CustomContractError.
impl From<TransferError> for CustomContractError {
    fn from(_te: TransferError) -> Self {
        Self::TransferFailed
    }
}

#[derive(Debug)]
pub enum ContractReadError<R> {
    Call(CallContractError<R>),
    Compatibility,
    Parse,
}

#[concordium_cfg_test]
mod tests {
    use super::*;

    #[concordium_test]
    fn test_error_kinds() {
        claim_eq!(CustomContractError::InvalidFee.kind(), ErrorKind::Validation);
        claim_eq!(
            CustomContractError::SellerCannotBid.kind(),
            ErrorKind::Authorization
        );
        claim_eq!(CustomContractError::AuctionExpired.kind(), ErrorKind::State);
        claim_eq!(CustomContractError::BidTooLow.kind(), ErrorKind::Accounting);
        claim_eq!(
            CustomContractError::CannotOutbidSelf.kind(),
            ErrorKind::Accounting
        );
        claim_eq!(
            CustomContractError::TransferFailed.kind(),
            ErrorKind::CollaboratorFailure
        );
    }

    #[concordium_test]
    fn test_only_state_errors_are_retryable() {
        claim!(CustomContractError::AuctionNotExpired.kind().is_retryable());
        claim!(!CustomContractError::NotWinner.kind().is_retryable());
        claim!(!CustomContractError::TransferFailed.kind().is_retryable());
    }

    #[concordium_test]
    fn test_error_codes() {
        claim_eq!(Reject::from(CustomContractError::ParseParams).error_code.get(), -1);
        claim_eq!(
            Reject::from(CustomContractError::Incompatible).error_code.get(),
            -23
        );
        // Last variant
        claim_eq!(
            Reject::from(CustomContractError::UnexpectedToken).error_code.get(),
            -24
        );
    }

    #[concordium_test]
    fn test_transfer_error_mapping() {
        claim_eq!(
            CustomContractError::from(TransferError::AmountTooLarge),
            CustomContractError::TransferFailed
        );
        claim_eq!(
            CustomContractError::from(LogError::Full),
            CustomContractError::LogFull
        );
    }
}
