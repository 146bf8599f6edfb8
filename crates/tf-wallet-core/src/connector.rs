use alloy_primitives::{Address, TxHash};
use anyhow::Result;
use std::sync::Arc;
use tf_chain_client::{ChainClient, ChainConfig, ContractCall, TxReceipt};
use tracing::debug;

/// Session-scoped handle on the chain: the signing client plus the network
/// configuration. Built once after unlock.
pub struct ChainConnector {
    client: Arc<dyn ChainClient>,
    config: ChainConfig,
    signer_address: Address,
}

impl ChainConnector {
    pub fn new(client: Arc<dyn ChainClient>, config: ChainConfig) -> Self {
        let signer_address = client.signer_address();
        Self {
            client,
            config,
            signer_address,
        }
    }

    pub fn chain(&self) -> &dyn ChainClient {
        self.client.as_ref()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn signer_address(&self) -> Address {
        self.signer_address
    }

    /// Submits with the call's fixed gas limit.
    pub async fn send(&self, call: ContractCall) -> Result<TxHash> {
        let gas_limit = call.gas_limit();
        debug!(call = call.name(), target = %call.target(), gas_limit, "sending contract call");
        self.client.submit(call, gas_limit).await
    }

    pub async fn confirm(&self, hash: TxHash) -> Result<TxReceipt> {
        self.client.wait_for_receipt(hash).await
    }

    pub fn tx_url(&self, hash: TxHash) -> String {
        self.config.tx_url(hash)
    }

    pub fn address_url(&self, address: Address) -> String {
        format!("{}/address/{address}", self.config.explorer_url)
    }
}
