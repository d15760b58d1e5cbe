use concordium_std::concordium_cfg_test;

#[concordium_cfg_test]
pub use inner::*;

#[concordium_cfg_test]
mod inner {
    use concordium_std::test_infrastructure::MockFn;
    use concordium_std::*;

    pub fn parse_and_ok_mock<D: Deserial, S>(
        return_value: impl Clone + Serial + 'static,
    ) -> MockFn<S> {
        MockFn::new(move |parameter, _amount, _balance, _state| {
            D::deserial(&mut Cursor::new(parameter)).map_err(|_| CallContractError::Trap)?;
            Ok((false, Some(return_value.clone())))
        })
    }

    pub fn parse_and_map_mock<D: Deserial, T: Serial, S>(
        f: impl Fn(&D) -> Option<T> + 'static,
    ) -> MockFn<S> {
        MockFn::new(move |parameter, _, _, _state| {
            let value =
                D::deserial(&mut Cursor::new(parameter)).map_err(|_| CallContractError::Trap)?;
            f(&value)
                .map(|r| (false, Some(r)))
                .ok_or(CallContractError::Trap)
        })
    }

    /// Entrypoint that always traps.
    pub fn trap_mock<S>() -> MockFn<S> {
        MockFn::new(|_, _, _, _state| Err::<(bool, Option<()>), _>(CallContractError::Trap))
    }

    /// Behaves as if the invoked contract has no such entrypoint.
    pub fn missing_entrypoint_mock<S>() -> MockFn<S> {
        MockFn::new(|_, _, _, _state| {
            Err::<(bool, Option<()>), _>(CallContractError::MissingEntrypoint)
        })
    }

    /// Behaves as if the invoked contract does not exist.
    pub fn missing_contract_mock<S>() -> MockFn<S> {
        MockFn::new(|_, _, _, _state| {
            Err::<(bool, Option<()>), _>(CallContractError::MissingContract)
        })
    }
}
