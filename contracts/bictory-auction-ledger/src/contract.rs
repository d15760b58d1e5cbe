use commons::{AuctionId, ContractResult, CustomContractError, Token};
use concordium_cis1::{OnReceivingCis1Params, Receiver, TokenIdVec};
use concordium_std::*;

use crate::events::LedgerEvent;
use crate::external::*;
use crate::registry::{handle_read_error, HostRegistryExt};
use crate::state::{Settlement, State};

/// Receive function the registry calls when a token is moved into custody.
const ON_RECEIVING_CIS1: &str = "BictoryAuctionLedger.onReceivingCIS1";

/// Initialize the ledger with no auctions.
#[init(contract = "BictoryAuctionLedger", parameter = "InitParams")]
fn contract_init<S: HasStateApi>(
    ctx: &impl HasInitContext,
    state_builder: &mut StateBuilder<S>,
) -> InitResult<State<S>> {
    let params = InitParams::deserial(&mut ctx.parameter_cursor())?;
    Ok(State::new(state_builder, params.listing_fee))
}

/// Put a token up for auction. The attached amount must equal the listing fee.
///
/// The token is pulled from the seller with a CIS-1 transfer, so the ledger must be an operator of
/// the seller. The auction is recorded only after the registry confirms the ledger holds the
/// token.
///
///  It rejects if:
///  - Sender is a contract.
///  - Attached amount differs from the listing fee.
///  - Token contract is the ledger itself or does not exist.
///  - Sender does not own the token.
///  - Starting price is zero or duration is out of bounds.
///  - The token transfer fails or does not move the token to the ledger.
#[receive(
    mutable,
    payable,
    contract = "BictoryAuctionLedger",
    name = "list",
    parameter = "ListParams",
    return_value = "AuctionId",
    enable_logger
)]
fn contract_list<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    amount: Amount,
    logger: &mut impl HasLogger,
) -> ContractResult<AuctionId> {
    let params = ListParams::deserial(&mut ctx.parameter_cursor())?;
    let seller = sender_account(ctx)?;
    let self_address = ctx.self_address();

    ensure_eq!(
        amount,
        host.state().listing_fee,
        CustomContractError::InvalidFee
    );
    ensure_ne!(
        params.token.contract,
        self_address,
        CustomContractError::InvalidAsset
    );
    let owner = host
        .registry_owner_of(&params.token)
        .map_err(handle_read_error)?;
    ensure_eq!(
        owner,
        Some(Address::Account(seller)),
        CustomContractError::NotAssetOwner
    );
    let end_at = State::<S>::validate_listing(
        params.starting_price,
        params.duration_days,
        ctx.metadata().slot_time(),
    )?;

    // Custody marker is only set while the registry runs the transfer
    host.state_mut().expect_custody(params.token.clone());
    let pulled = host.registry_transfer(
        &params.token,
        Address::Account(seller),
        Receiver::Contract(
            self_address,
            OwnedReceiveName::new_unchecked(String::from(ON_RECEIVING_CIS1)),
        ),
    );
    host.state_mut().clear_custody();
    pulled?;

    let owner = host
        .registry_owner_of(&params.token)
        .map_err(handle_read_error)?;
    ensure_eq!(
        owner,
        Some(Address::Contract(self_address)),
        CustomContractError::TransferFailed
    );

    let auction_id = host.state_mut().list(
        params.token.clone(),
        seller,
        params.starting_price,
        end_at,
        amount,
    );

    logger.log(&LedgerEvent::listed(
        auction_id,
        &params.token,
        &seller,
        params.starting_price,
        end_at,
    ))?;

    Ok(auction_id)
}

/// CIS-1 receive hook. Only the token requested by an ongoing `list` call is accepted.
#[receive(
    contract = "BictoryAuctionLedger",
    name = "onReceivingCIS1",
    parameter = "OnReceivingCis1Params<TokenIdVec>"
)]
fn contract_on_receiving_cis1<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ContractResult<()> {
    let params = OnReceivingCis1Params::<TokenIdVec>::deserial(&mut ctx.parameter_cursor())?;

    let contract = if let Address::Contract(sender) = ctx.sender() {
        sender
    } else {
        bail!(CustomContractError::ContractOnly);
    };

    ensure_eq!(params.amount, 1, CustomContractError::UnexpectedToken);
    let token = Token {
        contract,
        id: params.token_id,
    };
    ensure!(
        host.state().is_expected_custody(&token),
        CustomContractError::UnexpectedToken
    );

    Ok(())
}

/// Place a bid. The attached amount is the bid and stays in escrow.
///
/// A displaced leader can take back its bid with `withdraw`.
#[receive(
    mutable,
    payable,
    contract = "BictoryAuctionLedger",
    name = "bid",
    parameter = "AuctionId",
    enable_logger
)]
fn contract_bid<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    amount: Amount,
    logger: &mut impl HasLogger,
) -> ContractResult<()> {
    let auction_id = AuctionId::deserial(&mut ctx.parameter_cursor())?;
    let bidder = sender_account(ctx)?;

    let displaced =
        host.state_mut()
            .bid(auction_id, bidder, amount, ctx.metadata().slot_time())?;

    logger.log(&LedgerEvent::bid(
        auction_id,
        &bidder,
        amount,
        displaced.map(|bid| bid.account),
    ))?;

    Ok(())
}

/// Pay out the sender's refund for an auction.
#[receive(
    mutable,
    contract = "BictoryAuctionLedger",
    name = "withdraw",
    parameter = "AuctionId",
    return_value = "Amount",
    enable_logger
)]
fn contract_withdraw<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ContractResult<Amount> {
    let auction_id = AuctionId::deserial(&mut ctx.parameter_cursor())?;
    let account = sender_account(ctx)?;

    let amount = host.state_mut().withdraw(auction_id, account)?;

    if let Err(error) = host.invoke_transfer(&account, amount) {
        host.state_mut()
            .restore_withdrawable(auction_id, account, amount);
        bail!(error.into());
    }

    logger.log(&LedgerEvent::withdraw(auction_id, &account, amount))?;

    Ok(amount)
}

/// Settle an expired auction as its seller.
#[receive(
    mutable,
    contract = "BictoryAuctionLedger",
    name = "endAsSeller",
    parameter = "AuctionId",
    return_value = "SettlementOutcome",
    enable_logger
)]
fn contract_end_as_seller<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ContractResult<SettlementOutcome> {
    settle(ctx, host, logger, SettlementRole::Seller)
}

/// Settle an expired auction as its highest bidder.
#[receive(
    mutable,
    contract = "BictoryAuctionLedger",
    name = "claimAsWinner",
    parameter = "AuctionId",
    return_value = "SettlementOutcome",
    enable_logger
)]
fn contract_claim_as_winner<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ContractResult<SettlementOutcome> {
    settle(ctx, host, logger, SettlementRole::Winner)
}

#[receive(
    contract = "BictoryAuctionLedger",
    name = "view",
    return_value = "LedgerView"
)]
fn contract_view<S: HasStateApi>(
    _ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ContractResult<LedgerView> {
    Ok(host.state().view())
}

#[receive(
    contract = "BictoryAuctionLedger",
    name = "viewAuction",
    parameter = "AuctionId",
    return_value = "AuctionView"
)]
fn contract_view_auction<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ContractResult<AuctionView> {
    let auction_id = AuctionId::deserial(&mut ctx.parameter_cursor())?;
    host.state()
        .view_auction(auction_id, ctx.metadata().slot_time())
}

/// Page through auctions in id order.
#[receive(
    contract = "BictoryAuctionLedger",
    name = "viewAuctions",
    parameter = "ViewAuctionsParams",
    return_value = "Vec<AuctionView>"
)]
fn contract_view_auctions<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ContractResult<Vec<AuctionView>> {
    let params = ViewAuctionsParams::deserial(&mut ctx.parameter_cursor())?;
    Ok(host
        .state()
        .view_auctions(params.from, params.limit, ctx.metadata().slot_time()))
}

/// Refund owed to the sender for an auction.
#[receive(
    contract = "BictoryAuctionLedger",
    name = "viewWithdrawable",
    parameter = "AuctionId",
    return_value = "Amount"
)]
fn contract_view_withdrawable<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ContractResult<Amount> {
    let auction_id = AuctionId::deserial(&mut ctx.parameter_cursor())?;
    let account = sender_account(ctx)?;

    let state = host.state();
    state.auction(auction_id)?;
    Ok(state.withdrawable_of(auction_id, &account))
}

fn settle<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
    role: SettlementRole,
) -> ContractResult<SettlementOutcome> {
    let auction_id = AuctionId::deserial(&mut ctx.parameter_cursor())?;
    let caller = sender_account(ctx)?;

    // Auction is marked as ended before any transfer
    let settlement = host.state_mut().begin_settlement(
        auction_id,
        &caller,
        role,
        ctx.metadata().slot_time(),
    )?;

    if let Err(error) = execute_settlement(host, ctx.self_address(), &settlement) {
        host.state_mut().abort_settlement(auction_id);
        bail!(error);
    }

    let outcome = settlement.outcome();
    logger.log(&LedgerEvent::settle(
        auction_id,
        role,
        &settlement.seller,
        outcome.winner,
        outcome.amount,
    ))?;

    Ok(outcome)
}

fn execute_settlement<S: HasStateApi>(
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    self_address: ContractAddress,
    settlement: &Settlement,
) -> ContractResult<()> {
    let from = Address::Contract(self_address);

    match settlement.winning_bid {
        None => host.registry_transfer(&settlement.token, from, Receiver::Account(settlement.seller)),
        Some(bid) => {
            host.registry_transfer(&settlement.token, from, Receiver::Account(bid.account))?;
            host.invoke_transfer(&settlement.seller, bid.amount)?;
            Ok(())
        }
    }
}

fn sender_account(ctx: &impl HasReceiveContext) -> ContractResult<AccountAddress> {
    match ctx.sender() {
        Address::Account(account) => Ok(account),
        Address::Contract(_) => Err(CustomContractError::OnlyAccountAddress),
    }
}

#[concordium_cfg_test]
mod tests {
    extern crate alloc;

    use super::*;
    use alloc::rc::Rc;
    use commons::test::{
        missing_contract_mock, missing_entrypoint_mock, parse_and_ok_mock, trap_mock,
    };
    use commons::ErrorKind;
    use concordium_cis1::TransferParams;
    use concordium_std::test_infrastructure::*;
    use core::cell::RefCell;

    const DAY_MILLIS: u64 = 24 * 60 * 60 * 1000;

    const LEDGER: ContractAddress = ContractAddress {
        index: 10,
        subindex: 0,
    };

    const NFT_CONTRACT: ContractAddress = ContractAddress {
        index: 1,
        subindex: 0,
    };

    const SELLER: AccountAddress = AccountAddress([1; 32]);
    const ALICE: AccountAddress = AccountAddress([2; 32]);
    const BOB: AccountAddress = AccountAddress([3; 32]);

    /// Owner of the single token the mocked registry knows.
    type Ownership = Rc<RefCell<Option<Address>>>;

    fn listing_fee() -> Amount {
        Amount::from_ccd(1)
    }

    fn token() -> Token {
        Token {
            contract: NFT_CONTRACT,
            id: TokenIdVec(vec![0, 1]),
        }
    }

    fn at_day(day: u64) -> Timestamp {
        Timestamp::from_timestamp_millis(day * DAY_MILLIS)
    }

    fn default_host() -> TestHost<State<TestStateApi>> {
        let mut state_builder = TestStateBuilder::new();
        let state = State::new(&mut state_builder, listing_fee());
        TestHost::new(state, state_builder)
    }

    fn account_ctx(sender: AccountAddress, day: u64, parameter: &[u8]) -> TestReceiveContext {
        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(Address::Account(sender))
            .set_invoker(sender)
            .set_self_address(LEDGER)
            .set_metadata_slot_time(at_day(day))
            .set_parameter(parameter);
        ctx
    }

    /// Registry that tracks the owner of `token()` and runs the custody check of the hook on
    /// transfers to a contract.
    fn setup_registry(host: &mut TestHost<State<TestStateApi>>, owner: Address) -> Ownership {
        let ownership = Rc::new(RefCell::new(Some(owner)));

        let current = ownership.clone();
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked(String::from("ownerOf")),
            MockFn::new_v1(move |param, _, _, _| {
                TokenIdVec::deserial(&mut Cursor::new(param.as_ref()))
                    .map_err(|_| CallContractError::Trap)?;
                Ok((false, *current.borrow()))
            }),
        );

        let current = ownership.clone();
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked(String::from("transfer")),
            MockFn::new_v1(move |param, _, _, state: &mut State<TestStateApi>| {
                let params =
                    TransferParams::<TokenIdVec>::deserial(&mut Cursor::new(param.as_ref()))
                        .map_err(|_| CallContractError::Trap)?;
                let transfer = &params.0[0];
                if *current.borrow() != Some(transfer.from) {
                    return Err(CallContractError::Trap);
                }
                let new_owner = match &transfer.to {
                    Receiver::Account(account) => Address::Account(*account),
                    Receiver::Contract(address, _) => {
                        let token = Token {
                            contract: NFT_CONTRACT,
                            id: transfer.token_id.clone(),
                        };
                        if !state.is_expected_custody(&token) {
                            return Err(CallContractError::Trap);
                        }
                        Address::Contract(*address)
                    }
                };
                *current.borrow_mut() = Some(new_owner);
                Ok((true, ()))
            }),
        );

        ownership
    }

    fn list_params(duration_days: u64) -> ListParams {
        ListParams {
            token: token(),
            starting_price: Amount::from_micro_ccd(1),
            duration_days,
        }
    }

    fn list(
        host: &mut TestHost<State<TestStateApi>>,
        sender: AccountAddress,
        params: &ListParams,
        fee: Amount,
    ) -> ContractResult<AuctionId> {
        let bytes = to_bytes(params);
        let ctx = account_ctx(sender, 0, &bytes);
        let mut logger = TestLogger::init();
        contract_list(&ctx, host, fee, &mut logger)
    }

    /// Host with `token()` listed by `SELLER` for 7 days starting on day 0.
    fn listed_host() -> (TestHost<State<TestStateApi>>, Ownership, AuctionId) {
        let mut host = default_host();
        let ownership = setup_registry(&mut host, Address::Account(SELLER));
        let auction_id = list(&mut host, SELLER, &list_params(7), listing_fee())
            .expect_report("Listing should pass");
        (host, ownership, auction_id)
    }

    fn bid(
        host: &mut TestHost<State<TestStateApi>>,
        bidder: AccountAddress,
        auction_id: AuctionId,
        amount: Amount,
        day: u64,
    ) -> ContractResult<()> {
        let bytes = to_bytes(&auction_id);
        let ctx = account_ctx(bidder, day, &bytes);
        let mut logger = TestLogger::init();

        // Attached amount is in the balance before the call runs and is returned on reject
        let balance = host.self_balance();
        host.set_self_balance(balance + amount);
        let result = contract_bid(&ctx, host, amount, &mut logger);
        if result.is_err() {
            host.set_self_balance(balance);
        }
        result
    }

    fn withdraw(
        host: &mut TestHost<State<TestStateApi>>,
        account: AccountAddress,
        auction_id: AuctionId,
    ) -> ContractResult<Amount> {
        let bytes = to_bytes(&auction_id);
        let ctx = account_ctx(account, 1, &bytes);
        let mut logger = TestLogger::init();
        contract_withdraw(&ctx, host, &mut logger)
    }

    fn settle_as(
        host: &mut TestHost<State<TestStateApi>>,
        caller: AccountAddress,
        role: SettlementRole,
        auction_id: AuctionId,
        day: u64,
    ) -> ContractResult<SettlementOutcome> {
        let bytes = to_bytes(&auction_id);
        let ctx = account_ctx(caller, day, &bytes);
        let mut logger = TestLogger::init();
        match role {
            SettlementRole::Seller => contract_end_as_seller(&ctx, host, &mut logger),
            SettlementRole::Winner => contract_claim_as_winner(&ctx, host, &mut logger),
        }
    }

    fn withdrawable(
        host: &TestHost<State<TestStateApi>>,
        account: AccountAddress,
        auction_id: AuctionId,
    ) -> ContractResult<Amount> {
        let bytes = to_bytes(&auction_id);
        let ctx = account_ctx(account, 1, &bytes);
        contract_view_withdrawable(&ctx, host)
    }

    fn auction_view(host: &TestHost<State<TestStateApi>>, auction_id: AuctionId) -> AuctionView {
        let bytes = to_bytes(&auction_id);
        let ctx = account_ctx(SELLER, 1, &bytes);
        contract_view_auction(&ctx, host).expect_report("Auction should exist")
    }

    #[concordium_test]
    fn test_init() {
        let params = InitParams {
            listing_fee: listing_fee(),
        };
        let bytes = to_bytes(&params);
        let mut ctx = TestInitContext::empty();
        ctx.set_parameter(&bytes);
        let mut state_builder = TestStateBuilder::new();

        let state = contract_init(&ctx, &mut state_builder).expect_report("Init should pass");

        claim_eq!(
            state.view(),
            LedgerView {
                listing_fee: listing_fee(),
                collected_fees: Amount::zero(),
                next_auction_id: 0,
            }
        );
    }

    #[concordium_test]
    fn test_list() {
        let mut host = default_host();
        let ownership = setup_registry(&mut host, Address::Account(SELLER));
        let params = list_params(7);
        let bytes = to_bytes(&params);
        let ctx = account_ctx(SELLER, 0, &bytes);
        let mut logger = TestLogger::init();

        let result = contract_list(&ctx, &mut host, listing_fee(), &mut logger);

        claim_eq!(result, Ok(0));
        claim_eq!(*ownership.borrow(), Some(Address::Contract(LEDGER)));
        claim_eq!(host.state().view().collected_fees, listing_fee());
        claim_eq!(host.state().view().next_auction_id, 1);

        let view = auction_view(&host, 0);
        claim_eq!(view.seller, SELLER);
        claim_eq!(view.token, token());
        claim_eq!(view.end_at, at_day(7));
        claim_eq!(view.phase, AuctionPhase::Active);
        claim_eq!(view.highest_bidder, None);

        claim_eq!(logger.logs.len(), 1, "One event should be logged");
        claim_eq!(
            logger.logs[0],
            to_bytes(&LedgerEvent::listed(
                0,
                &token(),
                &SELLER,
                Amount::from_micro_ccd(1),
                at_day(7)
            ))
        );

        // Next listing gets the next id once the token is back with the seller
        *ownership.borrow_mut() = Some(Address::Account(SELLER));
        claim_eq!(list(&mut host, SELLER, &params, listing_fee()), Ok(1));
    }

    #[concordium_test]
    fn test_list_rejects_wrong_fee() {
        let mut host = default_host();
        let ownership = setup_registry(&mut host, Address::Account(SELLER));

        for fee in [Amount::zero(), Amount::from_ccd(2)].iter() {
            claim_eq!(
                list(&mut host, SELLER, &list_params(7), *fee),
                Err(CustomContractError::InvalidFee)
            );
        }
        claim_eq!(*ownership.borrow(), Some(Address::Account(SELLER)));
        claim_eq!(host.state().view().next_auction_id, 0);
    }

    #[concordium_test]
    fn test_list_rejects_invalid_asset() {
        let mut host = default_host();

        // The ledger itself
        let params = ListParams {
            token: Token {
                contract: LEDGER,
                id: TokenIdVec(vec![0, 1]),
            },
            starting_price: Amount::from_micro_ccd(1),
            duration_days: 7,
        };
        claim_eq!(
            list(&mut host, SELLER, &params, listing_fee()),
            Err(CustomContractError::InvalidAsset)
        );

        // Registry that is not deployed
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked(String::from("ownerOf")),
            missing_contract_mock(),
        );
        claim_eq!(
            list(&mut host, SELLER, &list_params(7), listing_fee()),
            Err(CustomContractError::InvalidAsset)
        );
    }

    #[concordium_test]
    fn test_list_rejects_incompatible_registry() {
        let mut host = default_host();
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked(String::from("ownerOf")),
            missing_entrypoint_mock(),
        );

        let result = list(&mut host, SELLER, &list_params(7), listing_fee());

        claim_eq!(result, Err(CustomContractError::Incompatible));
    }

    #[concordium_test]
    fn test_list_rejects_non_owner() {
        let mut host = default_host();
        let ownership = setup_registry(&mut host, Address::Account(ALICE));

        claim_eq!(
            list(&mut host, SELLER, &list_params(7), listing_fee()),
            Err(CustomContractError::NotAssetOwner)
        );
        claim_eq!(
            list(&mut host, SELLER, &list_params(7), listing_fee())
                .map_err(|e| e.kind()),
            Err(ErrorKind::Authorization)
        );
        claim_eq!(*ownership.borrow(), Some(Address::Account(ALICE)));
    }

    #[concordium_test]
    fn test_list_rejects_bad_terms() {
        let mut host = default_host();
        setup_registry(&mut host, Address::Account(SELLER));

        let free = ListParams {
            starting_price: Amount::zero(),
            ..list_params(7)
        };
        claim_eq!(
            list(&mut host, SELLER, &free, listing_fee()),
            Err(CustomContractError::InvalidPrice)
        );
        claim_eq!(
            list(&mut host, SELLER, &list_params(0), listing_fee()),
            Err(CustomContractError::InvalidDuration)
        );
        claim_eq!(
            list(&mut host, SELLER, &list_params(61), listing_fee()),
            Err(CustomContractError::InvalidDuration)
        );
        claim_eq!(host.state().view().next_auction_id, 0);
    }

    #[concordium_test]
    fn test_list_rejects_contract_sender() {
        let mut host = default_host();
        setup_registry(&mut host, Address::Account(SELLER));
        let bytes = to_bytes(&list_params(7));
        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(Address::Contract(NFT_CONTRACT))
            .set_self_address(LEDGER)
            .set_parameter(&bytes);
        let mut logger = TestLogger::init();

        let result = contract_list(&ctx, &mut host, listing_fee(), &mut logger);

        claim_eq!(result, Err(CustomContractError::OnlyAccountAddress));
    }

    #[concordium_test]
    fn test_list_transfer_failure_leaves_no_record() {
        let mut host = default_host();
        let ownership = setup_registry(&mut host, Address::Account(SELLER));
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked(String::from("transfer")),
            trap_mock(),
        );

        let result = list(&mut host, SELLER, &list_params(7), listing_fee());

        claim_eq!(result, Err(CustomContractError::TransferFailed));
        claim_eq!(*ownership.borrow(), Some(Address::Account(SELLER)));
        claim_eq!(host.state().view().next_auction_id, 0);
        claim_eq!(host.state().view().collected_fees, Amount::zero());
        claim!(!host.state().is_expected_custody(&token()));
    }

    #[concordium_test]
    fn test_list_requires_custody() {
        let mut host = default_host();
        setup_registry(&mut host, Address::Account(SELLER));
        // Registry accepts the transfer but the token never moves
        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked(String::from("transfer")),
            parse_and_ok_mock::<TransferParams<TokenIdVec>, _>(()),
        );

        let result = list(&mut host, SELLER, &list_params(7), listing_fee());

        claim_eq!(result, Err(CustomContractError::TransferFailed));
        claim_eq!(host.state().view().next_auction_id, 0);
    }

    #[concordium_test]
    fn test_on_receiving_cis1() {
        let mut host = default_host();
        let params = OnReceivingCis1Params {
            token_id: TokenIdVec(vec![0, 1]),
            amount: 1,
            from: Address::Account(SELLER),
            contract_name: OwnedContractName::new_unchecked(String::from("init_BictoryNFT")),
            data: concordium_cis1::AdditionalData::empty(),
        };
        let bytes = to_bytes(&params);
        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(Address::Contract(NFT_CONTRACT))
            .set_self_address(LEDGER)
            .set_parameter(&bytes);

        // Unsolicited deposit
        claim_eq!(
            contract_on_receiving_cis1(&ctx, &host),
            Err(CustomContractError::UnexpectedToken)
        );

        host.state_mut().expect_custody(token());
        claim_eq!(contract_on_receiving_cis1(&ctx, &host), Ok(()));

        // Same token id from another contract
        ctx.set_sender(Address::Contract(LEDGER));
        claim_eq!(
            contract_on_receiving_cis1(&ctx, &host),
            Err(CustomContractError::UnexpectedToken)
        );

        ctx.set_sender(Address::Account(SELLER));
        claim_eq!(
            contract_on_receiving_cis1(&ctx, &host),
            Err(CustomContractError::ContractOnly)
        );
    }

    #[concordium_test]
    fn test_bid_and_withdraw_log_events() {
        let (mut host, _, auction_id) = listed_host();
        claim_eq!(bid(&mut host, ALICE, auction_id, Amount::from_ccd(10), 1), Ok(()));
        let balance = host.self_balance();
        host.set_self_balance(balance + Amount::from_ccd(20));

        let bytes = to_bytes(&auction_id);
        let ctx = account_ctx(BOB, 2, &bytes);
        let mut logger = TestLogger::init();

        let result = contract_bid(&ctx, &mut host, Amount::from_ccd(20), &mut logger);

        claim_eq!(result, Ok(()));
        claim_eq!(logger.logs.len(), 1, "One event should be logged");
        claim_eq!(
            logger.logs[0],
            to_bytes(&LedgerEvent::bid(
                auction_id,
                &BOB,
                Amount::from_ccd(20),
                Some(ALICE)
            ))
        );

        let ctx = account_ctx(ALICE, 3, &bytes);
        let mut logger = TestLogger::init();

        let result = contract_withdraw(&ctx, &mut host, &mut logger);

        claim_eq!(result, Ok(Amount::from_ccd(10)));
        claim_eq!(logger.logs.len(), 1, "One event should be logged");
        claim_eq!(
            logger.logs[0],
            to_bytes(&LedgerEvent::withdraw(
                auction_id,
                &ALICE,
                Amount::from_ccd(10)
            ))
        );
    }

    #[concordium_test]
    fn test_outbid_withdraw_and_claim() {
        let (mut host, ownership, auction_id) = listed_host();

        claim_eq!(bid(&mut host, ALICE, auction_id, Amount::from_ccd(10), 1), Ok(()));
        claim_eq!(bid(&mut host, BOB, auction_id, Amount::from_ccd(20), 2), Ok(()));
        claim_eq!(
            withdrawable(&host, ALICE, auction_id),
            Ok(Amount::from_ccd(10))
        );
        claim_eq!(withdrawable(&host, BOB, auction_id), Ok(Amount::zero()));

        claim_eq!(
            withdraw(&mut host, ALICE, auction_id),
            Ok(Amount::from_ccd(10))
        );
        claim!(host.transfer_occurred(&ALICE, Amount::from_ccd(10)));
        claim_eq!(withdrawable(&host, ALICE, auction_id), Ok(Amount::zero()));

        let outcome = settle_as(&mut host, BOB, SettlementRole::Winner, auction_id, 7);

        claim_eq!(
            outcome,
            Ok(SettlementOutcome {
                winner: Some(BOB),
                amount: Amount::from_ccd(20),
            })
        );
        claim_eq!(*ownership.borrow(), Some(Address::Account(BOB)));
        claim!(host.transfer_occurred(&SELLER, Amount::from_ccd(20)));
        claim_eq!(host.self_balance(), Amount::zero());

        let view = auction_view(&host, auction_id);
        claim!(view.ended);
        claim_eq!(view.phase, AuctionPhase::Ended);
        claim_eq!(view.escrow, Amount::zero());
    }

    #[concordium_test]
    fn test_end_without_bids() {
        let (mut host, ownership, auction_id) = listed_host();

        let outcome = settle_as(&mut host, SELLER, SettlementRole::Seller, auction_id, 8);

        claim_eq!(
            outcome,
            Ok(SettlementOutcome {
                winner: None,
                amount: Amount::zero(),
            })
        );
        claim_eq!(*ownership.borrow(), Some(Address::Account(SELLER)));
        claim_eq!(host.self_balance(), Amount::zero());
    }

    #[concordium_test]
    fn test_settle_logs_event() {
        let (mut host, _, auction_id) = listed_host();
        claim_eq!(bid(&mut host, ALICE, auction_id, Amount::from_ccd(10), 1), Ok(()));
        let bytes = to_bytes(&auction_id);
        let ctx = account_ctx(SELLER, 7, &bytes);
        let mut logger = TestLogger::init();

        let outcome = contract_end_as_seller(&ctx, &mut host, &mut logger);

        claim!(outcome.is_ok());
        claim_eq!(logger.logs.len(), 1, "One event should be logged");
        claim_eq!(
            logger.logs[0],
            to_bytes(&LedgerEvent::settle(
                auction_id,
                SettlementRole::Seller,
                &SELLER,
                Some(ALICE),
                Amount::from_ccd(10)
            ))
        );
    }

    #[concordium_test]
    fn test_bid_rejections() {
        let (mut host, _, auction_id) = listed_host();

        claim_eq!(
            bid(&mut host, ALICE, 9, Amount::from_ccd(10), 1),
            Err(CustomContractError::InvalidAuctionId)
        );
        claim_eq!(bid(&mut host, ALICE, auction_id, Amount::from_ccd(10), 1), Ok(()));

        let equal = bid(&mut host, BOB, auction_id, Amount::from_ccd(10), 1);
        claim_eq!(equal, Err(CustomContractError::BidTooLow));
        claim_eq!(equal.map_err(|e| e.kind()), Err(ErrorKind::Accounting));

        let own = bid(&mut host, SELLER, auction_id, Amount::from_ccd(20), 1);
        claim_eq!(own, Err(CustomContractError::SellerCannotBid));
        claim_eq!(own.map_err(|e| e.kind()), Err(ErrorKind::Authorization));

        claim_eq!(
            bid(&mut host, ALICE, auction_id, Amount::from_ccd(20), 1),
            Err(CustomContractError::CannotOutbidSelf)
        );
        claim_eq!(
            bid(&mut host, BOB, auction_id, Amount::from_ccd(20), 7),
            Err(CustomContractError::AuctionExpired)
        );

        claim!(settle_as(&mut host, SELLER, SettlementRole::Seller, auction_id, 7).is_ok());
        claim_eq!(
            bid(&mut host, BOB, auction_id, Amount::from_ccd(20), 8),
            Err(CustomContractError::AuctionEnded)
        );
    }

    #[concordium_test]
    fn test_leader_cannot_withdraw() {
        let (mut host, _, auction_id) = listed_host();
        claim_eq!(bid(&mut host, ALICE, auction_id, Amount::from_ccd(10), 1), Ok(()));

        let result = withdraw(&mut host, ALICE, auction_id);

        claim_eq!(result, Err(CustomContractError::NotWithdrawable));
        claim_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::Accounting));
        claim_eq!(
            withdraw(&mut host, BOB, auction_id),
            Err(CustomContractError::NotWithdrawable)
        );
        claim_eq!(
            withdraw(&mut host, BOB, 9),
            Err(CustomContractError::InvalidAuctionId)
        );
    }

    #[concordium_test]
    fn test_withdraw_restores_balance_on_payment_failure() {
        let (mut host, _, auction_id) = listed_host();
        claim_eq!(bid(&mut host, ALICE, auction_id, Amount::from_ccd(10), 1), Ok(()));
        claim_eq!(bid(&mut host, BOB, auction_id, Amount::from_ccd(20), 1), Ok(()));

        host.set_self_balance(Amount::zero());
        let result = withdraw(&mut host, ALICE, auction_id);

        claim_eq!(result, Err(CustomContractError::TransferFailed));
        claim_eq!(
            withdrawable(&host, ALICE, auction_id),
            Ok(Amount::from_ccd(10))
        );
        claim_eq!(
            auction_view(&host, auction_id).pending_refunds,
            Amount::from_ccd(10)
        );
    }

    #[concordium_test]
    fn test_settle_reopens_on_transfer_failure() {
        let (mut host, ownership, auction_id) = listed_host();
        claim_eq!(bid(&mut host, ALICE, auction_id, Amount::from_ccd(10), 1), Ok(()));

        // Registry refuses to release the token
        *ownership.borrow_mut() = Some(Address::Account(BOB));
        let result = settle_as(&mut host, ALICE, SettlementRole::Winner, auction_id, 7);

        claim_eq!(result, Err(CustomContractError::TransferFailed));
        let view = auction_view(&host, auction_id);
        claim!(!view.ended);
        claim_eq!(view.phase, AuctionPhase::Expired);
        claim!(!host.transfer_occurred(&SELLER, Amount::from_ccd(10)));

        *ownership.borrow_mut() = Some(Address::Contract(LEDGER));
        claim!(settle_as(&mut host, ALICE, SettlementRole::Winner, auction_id, 7).is_ok());
        claim_eq!(*ownership.borrow(), Some(Address::Account(ALICE)));
    }

    #[concordium_test]
    fn test_settle_reopens_on_payment_failure() {
        let (mut host, _, auction_id) = listed_host();
        claim_eq!(bid(&mut host, ALICE, auction_id, Amount::from_ccd(10), 1), Ok(()));

        host.set_self_balance(Amount::zero());
        let result = settle_as(&mut host, SELLER, SettlementRole::Seller, auction_id, 7);

        claim_eq!(result, Err(CustomContractError::TransferFailed));
        claim!(!auction_view(&host, auction_id).ended);
    }

    #[concordium_test]
    fn test_double_settlement() {
        let (mut host, _, auction_id) = listed_host();
        claim_eq!(bid(&mut host, ALICE, auction_id, Amount::from_ccd(10), 1), Ok(()));
        claim!(settle_as(&mut host, ALICE, SettlementRole::Winner, auction_id, 7).is_ok());
        let balance = host.self_balance();

        let again = settle_as(&mut host, SELLER, SettlementRole::Seller, auction_id, 8);

        claim_eq!(again, Err(CustomContractError::AuctionAlreadyEnded));
        claim_eq!(again.map_err(|e| e.kind()), Err(ErrorKind::State));
        claim_eq!(
            settle_as(&mut host, ALICE, SettlementRole::Winner, auction_id, 8),
            Err(CustomContractError::AuctionAlreadyEnded)
        );
        claim_eq!(host.self_balance(), balance);
    }

    #[concordium_test]
    fn test_settle_gates() {
        let (mut host, _, auction_id) = listed_host();
        claim_eq!(bid(&mut host, ALICE, auction_id, Amount::from_ccd(10), 1), Ok(()));

        claim_eq!(
            settle_as(&mut host, SELLER, SettlementRole::Seller, 9, 7),
            Err(CustomContractError::InvalidAuctionId)
        );
        claim_eq!(
            settle_as(&mut host, BOB, SettlementRole::Seller, auction_id, 7),
            Err(CustomContractError::NotSeller)
        );
        claim_eq!(
            settle_as(&mut host, BOB, SettlementRole::Winner, auction_id, 7),
            Err(CustomContractError::NotWinner)
        );
        claim_eq!(
            settle_as(&mut host, ALICE, SettlementRole::Winner, auction_id, 6),
            Err(CustomContractError::AuctionNotExpired)
        );
    }

    #[concordium_test]
    fn test_view_auctions() {
        let (mut host, ownership, _) = listed_host();
        *ownership.borrow_mut() = Some(Address::Account(SELLER));
        claim_eq!(list(&mut host, SELLER, &list_params(1), listing_fee()), Ok(1));

        let params = ViewAuctionsParams { from: 0, limit: 50 };
        let bytes = to_bytes(&params);
        let ctx = account_ctx(ALICE, 2, &bytes);

        let page = contract_view_auctions(&ctx, &host).expect_report("View should pass");

        claim_eq!(page.len(), 2);
        claim_eq!(page[0].id, 0);
        claim_eq!(page[0].phase, AuctionPhase::Active);
        claim_eq!(page[1].id, 1);
        claim_eq!(page[1].phase, AuctionPhase::Expired);

        claim_eq!(
            withdrawable(&host, ALICE, 5),
            Err(CustomContractError::InvalidAuctionId)
        );
    }
}
