use alloy_primitives::{Address, TxHash, address};
use anyhow::{Context, Result};
use std::time::Duration;
use tf_api_types::TokenDescriptor;

pub const MODERATO_CHAIN_ID: u64 = 42431;
pub const MODERATO_RPC_URL: &str = "https://rpc.moderato.tempo.xyz";
pub const MODERATO_EXPLORER_URL: &str = "https://explore.tempo.xyz";

pub const PATH_USD: Address = address!("0x20C0000000000000000000000000000000000000");
pub const ALPHA_USD: Address = address!("0x20C0000000000000000000000000000000000001");
pub const BETA_USD: Address = address!("0x20C0000000000000000000000000000000000002");
pub const THETA_USD: Address = address!("0x20C0000000000000000000000000000000000003");
pub const TIP20_FACTORY: Address = address!("0x20FC000000000000000000000000000000000000");
pub const STABLECOIN_DEX: Address = address!("0xDEc0000000000000000000000000000000000000");

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Network identity plus the system contracts the wallet talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub explorer_url: String,
    pub tokens: Vec<TokenDescriptor>,
    pub path_usd: Address,
    pub tip20_factory: Address,
    pub stablecoin_dex: Address,
    pub poll_interval: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::moderato()
    }
}

impl ChainConfig {
    pub fn moderato() -> Self {
        Self {
            rpc_url: MODERATO_RPC_URL.to_owned(),
            chain_id: MODERATO_CHAIN_ID,
            explorer_url: MODERATO_EXPLORER_URL.to_owned(),
            tokens: vec![
                TokenDescriptor::new(PATH_USD, "PathUSD"),
                TokenDescriptor::new(ALPHA_USD, "AlphaUSD"),
                TokenDescriptor::new(BETA_USD, "BetaUSD"),
                TokenDescriptor::new(THETA_USD, "ThetaUSD"),
            ],
            path_usd: PATH_USD,
            tip20_factory: TIP20_FACTORY,
            stablecoin_dex: STABLECOIN_DEX,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Moderato defaults overridden by `TEMPO_RPC_URL`, `TEMPO_CHAIN_ID`,
    /// `TEMPO_EXPLORER_URL` and `TEMPO_POLL_INTERVAL_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::moderato();

        if let Some(url) = lookup("TEMPO_RPC_URL") {
            config.rpc_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(raw) = lookup("TEMPO_CHAIN_ID") {
            config.chain_id = raw
                .trim()
                .parse()
                .with_context(|| format!("TEMPO_CHAIN_ID is not a number: {raw}"))?;
        }
        if let Some(url) = lookup("TEMPO_EXPLORER_URL") {
            config.explorer_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(raw) = lookup("TEMPO_POLL_INTERVAL_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("TEMPO_POLL_INTERVAL_SECS is not a number: {raw}"))?;
            anyhow::ensure!(secs > 0, "TEMPO_POLL_INTERVAL_SECS must be greater than 0");
            config.poll_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn token_by_symbol(&self, symbol: &str) -> Option<&TokenDescriptor> {
        self.tokens.iter().find(|t| t.symbol == symbol)
    }

    pub fn tx_url(&self, hash: TxHash) -> String {
        format!("{}/tx/{hash}", self.explorer_url)
    }
}
