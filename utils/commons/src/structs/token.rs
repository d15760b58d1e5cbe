use super::*;

/// Identity of an asset kept by an external CIS-1 registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, SchemaType)]
pub struct Token {
    /// Registry contract address.
    pub contract: ContractAddress,
    /// Token identifier inside the registry.
    pub id: ContractTokenId,
}
