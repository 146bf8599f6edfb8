use alloy_primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenDescriptor {
    pub address: Address,
    pub symbol: String,
}

impl TokenDescriptor {
    pub fn new(address: Address, symbol: impl Into<String>) -> Self {
        Self {
            address,
            symbol: symbol.into(),
        }
    }
}

/// One token's balance as last read from chain, already scaled to a
/// decimal string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub symbol: String,
    pub address: Address,
    pub balance: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Send,
    Mint,
    Swap,
    Deploy,
    Faucet,
}

impl HistoryKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Mint => "mint",
            Self::Swap => "swap",
            Self::Deploy => "deploy",
            Self::Faucet => "Faucet Claim",
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub hash: TxHash,
    /// Creation time in epoch milliseconds.
    pub timestamp: u64,
    pub status: TxStatus,
    #[serde(default)]
    pub details: HistoryDetails,
}

/// A history entry before the store assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub kind: HistoryKind,
    pub hash: TxHash,
    pub status: TxStatus,
    pub details: HistoryDetails,
}

impl NewHistoryEntry {
    pub fn pending(kind: HistoryKind, hash: TxHash, details: HistoryDetails) -> Self {
        Self {
            kind,
            hash,
            status: TxStatus::Pending,
            details,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogLine {
    pub feature: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp_epoch_ms: u64,
}
