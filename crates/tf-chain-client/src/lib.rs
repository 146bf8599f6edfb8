use alloy_primitives::{Address, B256, Bytes, TxHash, U256, keccak256};
use alloy_sol_types::{SolCall, SolEvent};
use anyhow::Result;
use async_trait::async_trait;

pub mod abi;
pub mod config;
pub mod units;

pub use abi::{IStablecoinDex, ITIP20, ITIP20Factory};
pub use config::ChainConfig;
pub use units::{
    MAX_MEMO_BYTES, display_amount, encode_memo, format_amount, parse_address, parse_amount,
    to_u128,
};

pub const DEFAULT_GAS_LIMIT: u64 = 500_000;
pub const CREATE_TOKEN_GAS_LIMIT: u64 = 3_000_000;

pub fn issuer_role() -> B256 {
    keccak256("ISSUER_ROLE")
}

/// A state-changing call against one of the wallet's known contracts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    Transfer {
        token: Address,
        to: Address,
        amount: U256,
    },
    TransferWithMemo {
        token: Address,
        to: Address,
        amount: U256,
        memo: B256,
    },
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
    Mint {
        token: Address,
        to: Address,
        amount: U256,
    },
    GrantRole {
        token: Address,
        role: B256,
        account: Address,
    },
    SwapExactAmountIn {
        dex: Address,
        token_in: Address,
        token_out: Address,
        amount_in: u128,
        min_amount_out: u128,
    },
    CreateToken {
        factory: Address,
        name: String,
        symbol: String,
        currency: String,
        quote_token: Address,
        admin: Address,
        salt: B256,
    },
}

impl ContractCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::TransferWithMemo { .. } => "transferWithMemo",
            Self::Approve { .. } => "approve",
            Self::Mint { .. } => "mint",
            Self::GrantRole { .. } => "grantRole",
            Self::SwapExactAmountIn { .. } => "swapExactAmountIn",
            Self::CreateToken { .. } => "createToken",
        }
    }

    pub fn target(&self) -> Address {
        match self {
            Self::Transfer { token, .. }
            | Self::TransferWithMemo { token, .. }
            | Self::Approve { token, .. }
            | Self::Mint { token, .. }
            | Self::GrantRole { token, .. } => *token,
            Self::SwapExactAmountIn { dex, .. } => *dex,
            Self::CreateToken { factory, .. } => *factory,
        }
    }

    /// Gas is never estimated; every call carries a fixed limit.
    pub fn gas_limit(&self) -> u64 {
        match self {
            Self::CreateToken { .. } => CREATE_TOKEN_GAS_LIMIT,
            _ => DEFAULT_GAS_LIMIT,
        }
    }

    pub fn calldata(&self) -> Bytes {
        let encoded = match self {
            Self::Transfer { to, amount, .. } => ITIP20::transferCall {
                to: *to,
                amount: *amount,
            }
            .abi_encode(),
            Self::TransferWithMemo {
                to, amount, memo, ..
            } => ITIP20::transferWithMemoCall {
                to: *to,
                amount: *amount,
                memo: *memo,
            }
            .abi_encode(),
            Self::Approve {
                spender, amount, ..
            } => ITIP20::approveCall {
                spender: *spender,
                amount: *amount,
            }
            .abi_encode(),
            Self::Mint { to, amount, .. } => ITIP20::mintCall {
                to: *to,
                amount: *amount,
            }
            .abi_encode(),
            Self::GrantRole { role, account, .. } => ITIP20::grantRoleCall {
                role: *role,
                account: *account,
            }
            .abi_encode(),
            Self::SwapExactAmountIn {
                token_in,
                token_out,
                amount_in,
                min_amount_out,
                ..
            } => IStablecoinDex::swapExactAmountInCall {
                tokenIn: *token_in,
                tokenOut: *token_out,
                amountIn: *amount_in,
                minAmountOut: *min_amount_out,
            }
            .abi_encode(),
            Self::CreateToken {
                name,
                symbol,
                currency,
                quote_token,
                admin,
                salt,
                ..
            } => ITIP20Factory::createTokenCall {
                name: name.clone(),
                symbol: symbol.clone(),
                currency: currency.clone(),
                quoteToken: *quote_token,
                admin: *admin,
                salt: *salt,
            }
            .abi_encode(),
        };
        Bytes::from(encoded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub success: bool,
    pub logs: Vec<ReceiptLog>,
}

impl TxReceipt {
    /// Address of the token announced by the factory's `TokenCreated` event.
    pub fn created_token(&self, factory: Address) -> Option<Address> {
        self.logs
            .iter()
            .filter(|log| log.address == factory)
            .find_map(|log| {
                ITIP20Factory::TokenCreated::decode_raw_log(log.topics.iter().copied(), &log.data)
                    .ok()
                    .map(|event| event.token)
            })
    }
}

/// Signed access to a Tempo node for the unlocked account.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn signer_address(&self) -> Address;

    async fn decimals(&self, token: Address) -> Result<u8>;
    async fn symbol(&self, token: Address) -> Result<String>;
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256>;
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;
    async fn has_role(&self, token: Address, role: B256, account: Address) -> Result<bool>;
    async fn quote_swap_exact_amount_in(
        &self,
        dex: Address,
        token_in: Address,
        token_out: Address,
        amount_in: u128,
    ) -> Result<u128>;

    async fn submit(&self, call: ContractCall, gas_limit: u64) -> Result<TxHash>;
    /// Polls until the node has a receipt. No timeout.
    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt>;
    /// `tempo_fundAddress`; a single hash is normalised to a one-element list.
    async fn fund_address(&self, address: Address) -> Result<Vec<TxHash>>;
}
