use super::{
    BusyFlag, FlowLog, confirm_tracked, ensure_success, parse_recipient, render_log,
    require_positive_amount, resolve_symbol, submit_tracked, tracked_tokens,
};
use crate::app::WalletServices;
use crate::error::FlowError;
use crate::registry::{Container, Feature};
use alloy_primitives::{Address, B256, TxHash};
use async_trait::async_trait;
use std::sync::Arc;
use tf_api_types::{HistoryDetails, HistoryKind, TokenDescriptor};
use tf_chain_client::{ContractCall, MAX_MEMO_BYTES, encode_memo, format_amount, parse_amount};

const FEATURE: &str = "send";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendForm {
    pub token: Address,
    pub recipient: String,
    pub amount: String,
    /// Optional; empty sends a plain transfer.
    pub memo: String,
}

struct ValidSend {
    recipient: Address,
    memo: Option<B256>,
}

pub struct SendFeature {
    services: Arc<WalletServices>,
    busy: BusyFlag,
}

impl SendFeature {
    pub fn new(services: Arc<WalletServices>) -> Self {
        Self {
            services,
            busy: BusyFlag::default(),
        }
    }

    pub fn tokens(&self) -> Vec<TokenDescriptor> {
        tracked_tokens(&self.services)
    }

    /// Formatted balance of `token` for the signer.
    pub async fn token_balance(&self, token: Address) -> Result<String, FlowError> {
        let chain = self.services.connector.chain();
        let raw = chain
            .balance_of(token, self.services.connector.signer_address())
            .await?;
        let decimals = chain.decimals(token).await?;
        Ok(format_amount(raw, decimals)?)
    }

    pub async fn import_token(&self, input: &str) -> Result<TokenDescriptor, FlowError> {
        let token = super::import_token(&self.services, input).await?;
        FlowLog::new(&self.services.feed, FEATURE).success(format!("Imported {}", token.symbol));
        Ok(token)
    }

    pub async fn submit(&self, form: SendForm) -> Result<TxHash, FlowError> {
        let _guard = self.busy.try_acquire()?;
        let log = FlowLog::new(&self.services.feed, FEATURE);

        let result = async {
            let valid = validate(&form)?;
            self.transfer(log, &form, valid).await
        }
        .await;

        if let Err(err) = &result {
            log.error(format!("ERROR: {err}"));
        }
        result
    }

    async fn transfer(&self, log: FlowLog<'_>, form: &SendForm, valid: ValidSend) -> Result<TxHash, FlowError> {
        let services = &self.services;
        log.info("INITIATING_TRANSFER...");

        let decimals = services.connector.chain().decimals(form.token).await?;
        let symbol = resolve_symbol(services, form.token).await;
        let amount = parse_amount(&form.amount, decimals)?;

        let call = match valid.memo {
            Some(memo) => {
                log.info(format!("ATTACHING_MEMO: \"{}\"", form.memo));
                log.info("SENDING_WITH_MEMO...");
                ContractCall::TransferWithMemo {
                    token: form.token,
                    to: valid.recipient,
                    amount,
                    memo,
                }
            }
            None => {
                log.info("SENDING_STANDARD_TRANSFER...");
                ContractCall::Transfer {
                    token: form.token,
                    to: valid.recipient,
                    amount,
                }
            }
        };
        let with_memo = valid.memo.is_some();

        let details = HistoryDetails {
            from: Some(services.connector.signer_address()),
            to: Some(valid.recipient),
            amount: Some(form.amount.trim().to_owned()),
            symbol: Some(symbol.clone()),
            token_address: Some(form.token),
        };

        let sent = async {
            let hash = submit_tracked(services, log, call, HistoryKind::Send, details).await?;
            let receipt = confirm_tracked(services, hash).await?;
            ensure_success(&receipt, "transfer")?;
            anyhow::Ok(hash)
        }
        .await;

        match sent {
            Ok(hash) => {
                log.success(format!("TRANSFER_COMPLETE: {} {symbol}", form.amount.trim()));
                Ok(hash)
            }
            Err(err) => {
                if with_memo {
                    log.error("MEMO_TRANSFER_FAILED");
                }
                Err(err.into())
            }
        }
    }
}

fn validate(form: &SendForm) -> Result<ValidSend, FlowError> {
    let recipient = parse_recipient(&form.recipient)?;
    require_positive_amount(&form.amount)?;

    // sent exactly as typed; only an empty field means no memo
    let memo = if form.memo.is_empty() {
        None
    } else {
        if form.memo.len() > MAX_MEMO_BYTES {
            return Err(FlowError::MemoTooLong(form.memo.len()));
        }
        Some(encode_memo(&form.memo)?)
    };
    Ok(ValidSend { recipient, memo })
}

#[async_trait]
impl Feature for SendFeature {
    fn id(&self) -> &'static str {
        FEATURE
    }

    fn name(&self) -> &'static str {
        "Send"
    }

    fn order(&self) -> u32 {
        4
    }

    fn render(&self, container: &mut dyn Container) {
        container.heading("Send");
        container.line("Tokens");
        for token in self.tokens() {
            container.line(&format!("  {} {}", token.symbol, token.address));
        }
        container.field("Memo", &format!("optional, up to {MAX_MEMO_BYTES} bytes"));
        if self.busy.is_busy() {
            container.line("Sending...");
        }
        render_log(container, &self.services.feed, FEATURE);
    }
}
