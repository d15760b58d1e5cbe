use commons::{ContractReadError, CustomContractError, Token};
use concordium_cis1::{AdditionalData, Receiver, Transfer};
use concordium_std::*;

/// Calls to the CIS-1 contract that records token ownership.
pub trait HostRegistryExt<S>: HasHost<S> {
    /// Current owner of `token`, `None` if the registry knows the token but nobody holds it.
    fn registry_owner_of(
        &self,
        token: &Token,
    ) -> Result<Option<Address>, ContractReadError<Self::ReturnValueType>> {
        let mut response = self
            .invoke_contract_read_only(
                &token.contract,
                &token.id,
                EntrypointName::new_unchecked("ownerOf"),
                Amount::zero(),
            )
            .map_err(ContractReadError::Call)?
            .ok_or(ContractReadError::Compatibility)?;

        <Option<Address>>::deserial(&mut response).map_err(|_| ContractReadError::Parse)
    }

    /// Move `token` from `from` to `to` acting as an operator or owner.
    fn registry_transfer(
        &mut self,
        token: &Token,
        from: Address,
        to: Receiver,
    ) -> Result<(), CustomContractError> {
        self.invoke_contract(
            &token.contract,
            &(
                1u16,
                Transfer {
                    token_id: token.id.clone(),
                    amount: 1,
                    from,
                    to,
                    data: AdditionalData::empty(),
                },
            ),
            EntrypointName::new_unchecked("transfer"),
            Amount::zero(),
        )
        .map_err(handle_call_error)?;

        Ok(())
    }
}

impl<S, H: HasHost<S>> HostRegistryExt<S> for H {}

/// Map a failed `ownerOf` lookup. A registry that is not deployed is not a valid asset.
pub fn handle_read_error<R>(error: ContractReadError<R>) -> CustomContractError {
    match error {
        ContractReadError::Call(CallContractError::MissingContract)
        | ContractReadError::Call(CallContractError::LogicReject { .. }) => {
            CustomContractError::InvalidAsset
        }
        _ => CustomContractError::Incompatible,
    }
}

fn handle_call_error<R>(error: CallContractError<R>) -> CustomContractError {
    match error {
        CallContractError::MissingEntrypoint | CallContractError::MessageFailed => {
            CustomContractError::Incompatible
        }
        _ => CustomContractError::TransferFailed,
    }
}

#[concordium_cfg_test]
mod tests {
    use commons::test::{
        missing_contract_mock, missing_entrypoint_mock, parse_and_map_mock, trap_mock,
    };
    use concordium_cis1::{TokenIdVec, TransferParams};
    use concordium_std::test_infrastructure::*;

    use super::*;

    const NFT_CONTRACT: ContractAddress = ContractAddress {
        index: 1,
        subindex: 0,
    };

    const USER_1: AccountAddress = AccountAddress([1; 32]);

    fn token() -> Token {
        Token {
            contract: NFT_CONTRACT,
            id: TokenIdVec([1; 32].into()),
        }
    }

    #[concordium_test]
    fn test_transfer() {
        let mut host = TestHost::new((), TestStateBuilder::new());

        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            MockFn::new_v1(|param, _, _, _| {
                let params =
                    TransferParams::<TokenIdVec>::deserial(&mut Cursor::new(param.as_ref()))
                        .map_err(|_| CallContractError::Trap)?;
                let transfer = &params.0[0];
                if transfer.from != Address::Account(USER_1) || transfer.amount != 1 {
                    return Err(CallContractError::Trap);
                }
                Ok((true, ()))
            }),
        );

        let response = host.registry_transfer(
            &token(),
            Address::Account(USER_1),
            Receiver::Account(USER_1),
        );

        claim_eq!(response, Ok(()));
    }

    #[concordium_test]
    fn test_transfer_failures() {
        let mut host = TestHost::new((), TestStateBuilder::new());

        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            missing_entrypoint_mock(),
        );
        claim_eq!(
            host.registry_transfer(
                &token(),
                Address::Account(USER_1),
                Receiver::Account(USER_1)
            ),
            Err(CustomContractError::Incompatible)
        );

        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            trap_mock(),
        );
        claim_eq!(
            host.registry_transfer(
                &token(),
                Address::Account(USER_1),
                Receiver::Account(USER_1)
            ),
            Err(CustomContractError::TransferFailed)
        );
    }

    #[concordium_test]
    fn test_owner_of() {
        let mut host = TestHost::new((), TestStateBuilder::new());

        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("ownerOf".into()),
            parse_and_map_mock(|_: &TokenIdVec| Some(Some(Address::Account(USER_1)))),
        );

        let owner = host.registry_owner_of(&token()).map_err(handle_read_error);

        claim_eq!(owner, Ok(Some(Address::Account(USER_1))));
    }

    #[concordium_test]
    fn test_owner_of_missing_registry() {
        let mut host = TestHost::new((), TestStateBuilder::new());

        host.setup_mock_entrypoint(
            NFT_CONTRACT,
            OwnedEntrypointName::new_unchecked("ownerOf".into()),
            missing_contract_mock(),
        );

        let owner = host.registry_owner_of(&token()).map_err(handle_read_error);

        claim_eq!(owner, Err(CustomContractError::InvalidAsset));
    }
}
