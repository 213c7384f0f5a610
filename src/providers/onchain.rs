//! On-chain balance provider interface.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token standards supported by balance checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenStandard {
    Erc20,
    Erc721,
    Erc1155,
}

impl std::fmt::Display for TokenStandard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenStandard::Erc20 => write!(f, "ERC20"),
            TokenStandard::Erc721 => write!(f, "ERC721"),
            TokenStandard::Erc1155 => write!(f, "ERC1155"),
        }
    }
}

/// Read access to token balances across chains.
///
/// Implementations wrap JSON-RPC clients keyed by chain id. `token_id` is
/// required for ERC-1155 lookups and ignored otherwise.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    async fn balance_of(
        &self,
        chain_id: u64,
        contract_address: &str,
        wallet_address: &str,
        standard: TokenStandard,
        token_id: Option<&str>,
    ) -> Result<u128>;
}
