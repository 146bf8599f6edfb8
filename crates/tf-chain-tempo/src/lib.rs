use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy_primitives::{Address, B256, TxHash, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tf_chain_client::{
    ChainClient, ChainConfig, ContractCall, IStablecoinDex, ITIP20, ReceiptLog, TxReceipt,
};
use tracing::{debug, info};

pub const FUND_ADDRESS_METHOD: &str = "tempo_fundAddress";
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// JSON-RPC client for a Tempo node, signing with the unlocked wallet key.
pub struct TempoRpcClient {
    provider: DynProvider,
    signer_address: Address,
    chain_id: u64,
}

impl TempoRpcClient {
    pub fn connect(config: &ChainConfig, signer: PrivateKeySigner) -> Result<Self> {
        let url: reqwest::Url = config
            .rpc_url
            .parse()
            .with_context(|| format!("invalid rpc url {}", config.rpc_url))?;
        let signer_address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        info!(rpc = %config.rpc_url, chain_id = config.chain_id, signer = %signer_address, "connected tempo rpc client");

        Ok(Self {
            provider,
            signer_address,
            chain_id: config.chain_id,
        })
    }

    async fn read<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(call.abi_encode().into());
        let raw = self
            .provider
            .call(tx)
            .await
            .with_context(|| format!("eth_call {} on {to}", C::SIGNATURE))?;
        C::abi_decode_returns(&raw).with_context(|| format!("decode {} result", C::SIGNATURE))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FundResult {
    One(TxHash),
    Many(Vec<TxHash>),
}

fn parse_fund_result(value: serde_json::Value) -> Result<Vec<TxHash>> {
    let result: FundResult =
        serde_json::from_value(value).context("unexpected tempo_fundAddress result")?;
    Ok(match result {
        FundResult::One(hash) => vec![hash],
        FundResult::Many(hashes) => hashes,
    })
}

#[async_trait]
impl ChainClient for TempoRpcClient {
    fn signer_address(&self) -> Address {
        self.signer_address
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        self.read(token, ITIP20::decimalsCall {}).await
    }

    async fn symbol(&self, token: Address) -> Result<String> {
        self.read(token, ITIP20::symbolCall {}).await
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        self.read(token, ITIP20::balanceOfCall { owner }).await
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        self.read(token, ITIP20::allowanceCall { owner, spender })
            .await
    }

    async fn has_role(&self, token: Address, role: B256, account: Address) -> Result<bool> {
        self.read(token, ITIP20::hasRoleCall { role, account }).await
    }

    async fn quote_swap_exact_amount_in(
        &self,
        dex: Address,
        token_in: Address,
        token_out: Address,
        amount_in: u128,
    ) -> Result<u128> {
        self.read(
            dex,
            IStablecoinDex::quoteSwapExactAmountInCall {
                tokenIn: token_in,
                tokenOut: token_out,
                amountIn: amount_in,
            },
        )
        .await
    }

    async fn submit(&self, call: ContractCall, gas_limit: u64) -> Result<TxHash> {
        let tx = TransactionRequest::default()
            .with_to(call.target())
            .with_input(call.calldata())
            .with_gas_limit(gas_limit)
            .with_chain_id(self.chain_id);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|err| anyhow!("{} failed: {err}", call.name()))?;
        let tx_hash = *pending.tx_hash();

        info!(call = call.name(), target = %call.target(), %tx_hash, gas_limit, "transaction submitted");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .with_context(|| format!("eth_getTransactionReceipt {hash}"))?;

            if let Some(receipt) = receipt {
                let logs = receipt
                    .inner
                    .logs()
                    .iter()
                    .map(|log| ReceiptLog {
                        address: log.inner.address,
                        topics: log.inner.data.topics().to_vec(),
                        data: log.inner.data.data.clone(),
                    })
                    .collect();
                let success = receipt.status();
                info!(%hash, success, block = ?receipt.block_number, "transaction confirmed");
                return Ok(TxReceipt {
                    hash,
                    success,
                    logs,
                });
            }

            debug!(%hash, "receipt not available yet");
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    async fn fund_address(&self, address: Address) -> Result<Vec<TxHash>> {
        let value: serde_json::Value = self
            .provider
            .raw_request(FUND_ADDRESS_METHOD.into(), [address])
            .await
            .map_err(|err| anyhow!("{FUND_ADDRESS_METHOD} failed: {err}"))?;
        let hashes = parse_fund_result(value)?;
        info!(%address, count = hashes.len(), "faucet funded address");
        Ok(hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fund_result_accepts_single_hash_or_list() -> Result<()> {
        let one = B256::repeat_byte(0x11);
        let two = B256::repeat_byte(0x22);

        assert_eq!(parse_fund_result(json!(one))?, vec![one]);
        assert_eq!(parse_fund_result(json!([one, two]))?, vec![one, two]);
        assert!(parse_fund_result(json!({"hash": one})).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn faucet_errors_come_back_through_the_provider() {
        let config = ChainConfig {
            rpc_url: "http://127.0.0.1:1".to_owned(),
            ..ChainConfig::default()
        };
        let client = TempoRpcClient::connect(&config, PrivateKeySigner::random()).unwrap();
        let err = client
            .fund_address(Address::repeat_byte(0xab))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("tempo_fundAddress failed"));
    }

    #[test]
    fn connect_rejects_bad_url() {
        let config = ChainConfig {
            rpc_url: "not a url".to_owned(),
            ..ChainConfig::default()
        };
        assert!(TempoRpcClient::connect(&config, PrivateKeySigner::random()).is_err());
    }
}
