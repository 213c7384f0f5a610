//! On-chain token ownership checks.
//!
//! Balances are looked up for every wallet the user controls (verified
//! addresses plus custody). ERC-20 balances are summed across wallets;
//! token checks trigger on any single wallet holding the token.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::engine::check::{Check, CheckContext, CheckOutcome, parse_args};
use crate::engine::rule::CheckKind;
use crate::errors::CheckError;
use crate::providers::{ChainProvider, TokenStandard};

fn provider_err(kind: CheckKind, e: anyhow::Error) -> CheckError {
    CheckError::ProviderFailed {
        check: kind.as_str().to_string(),
        details: e.to_string(),
    }
}

/// `requiresErc20 { chainId, contractAddress, minBalance }`
///
/// `minBalance` is in raw token units (a decimal string, since ERC-20
/// balances overflow u64).
pub struct RequiresErc20Check {
    chain: Arc<dyn ChainProvider>,
}

impl RequiresErc20Check {
    pub fn new(chain: Arc<dyn ChainProvider>) -> Self {
        Self { chain }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Erc20Args {
    chain_id: u64,
    contract_address: String,
    #[serde(default)]
    min_balance: Option<String>,
}

#[async_trait]
impl Check for RequiresErc20Check {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: Erc20Args = parse_args(CheckKind::RequiresErc20, ctx.args)?;
        let min_balance: u128 = match &args.min_balance {
            Some(raw) => raw.parse().map_err(|_| crate::errors::RuleError::InvalidArgs {
                check: CheckKind::RequiresErc20.as_str().to_string(),
                details: format!("minBalance is not a decimal integer: {}", raw),
            })?,
            None => 1,
        };

        let mut total: u128 = 0;
        for wallet in ctx.user.wallet_addresses() {
            let balance = self
                .chain
                .balance_of(
                    args.chain_id,
                    &args.contract_address,
                    &wallet,
                    TokenStandard::Erc20,
                    None,
                )
                .await
                .map_err(|e| provider_err(CheckKind::RequiresErc20, e))?;
            total = total.saturating_add(balance);
            if total >= min_balance {
                return Ok(CheckOutcome::triggered(format!(
                    "User holds the required ERC-20 balance on chain {}",
                    args.chain_id
                )));
            }
        }

        Ok(CheckOutcome::not_triggered(format!(
            "User holds {} of the required {} token units",
            total, min_balance
        )))
    }
}

/// `requiresErc721 { chainId, contractAddress }`
pub struct RequiresErc721Check {
    chain: Arc<dyn ChainProvider>,
}

impl RequiresErc721Check {
    pub fn new(chain: Arc<dyn ChainProvider>) -> Self {
        Self { chain }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Erc721Args {
    chain_id: u64,
    contract_address: String,
}

#[async_trait]
impl Check for RequiresErc721Check {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: Erc721Args = parse_args(CheckKind::RequiresErc721, ctx.args)?;

        for wallet in ctx.user.wallet_addresses() {
            let balance = self
                .chain
                .balance_of(
                    args.chain_id,
                    &args.contract_address,
                    &wallet,
                    TokenStandard::Erc721,
                    None,
                )
                .await
                .map_err(|e| provider_err(CheckKind::RequiresErc721, e))?;
            if balance > 0 {
                return Ok(CheckOutcome::triggered(format!(
                    "User holds the NFT at {}",
                    args.contract_address
                )));
            }
        }

        Ok(CheckOutcome::not_triggered(format!(
            "User does not hold the NFT at {}",
            args.contract_address
        )))
    }
}

/// `requiresErc1155 { chainId, contractAddress, tokenId }`
pub struct RequiresErc1155Check {
    chain: Arc<dyn ChainProvider>,
}

impl RequiresErc1155Check {
    pub fn new(chain: Arc<dyn ChainProvider>) -> Self {
        Self { chain }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Erc1155Args {
    chain_id: u64,
    contract_address: String,
    token_id: String,
}

#[async_trait]
impl Check for RequiresErc1155Check {
    async fn execute(&self, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let args: Erc1155Args = parse_args(CheckKind::RequiresErc1155, ctx.args)?;

        for wallet in ctx.user.wallet_addresses() {
            let balance = self
                .chain
                .balance_of(
                    args.chain_id,
                    &args.contract_address,
                    &wallet,
                    TokenStandard::Erc1155,
                    Some(&args.token_id),
                )
                .await
                .map_err(|e| provider_err(CheckKind::RequiresErc1155, e))?;
            if balance > 0 {
                return Ok(CheckOutcome::triggered(format!(
                    "User holds token {} at {}",
                    args.token_id, args.contract_address
                )));
            }
        }

        Ok(CheckOutcome::not_triggered(format!(
            "User does not hold token {} at {}",
            args.token_id, args.contract_address
        )))
    }
}
