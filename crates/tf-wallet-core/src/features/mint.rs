use super::{
    BusyFlag, FlowLog, confirm_tracked, ensure_success, parse_recipient, render_log,
    require_positive_amount, resolve_symbol, send_and_confirm, short_hex, submit_tracked,
    tracked_tokens,
};
use crate::app::WalletServices;
use crate::error::FlowError;
use crate::registry::{Container, Feature};
use alloy_primitives::{Address, TxHash};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tf_api_types::{HistoryDetails, HistoryKind, TokenDescriptor};
use tf_chain_client::{ContractCall, issuer_role, parse_amount};

const FEATURE: &str = "mint";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintForm {
    pub token: Address,
    pub amount: String,
    /// Defaults to the signer.
    pub recipient: Option<String>,
}

pub struct MintFeature {
    services: Arc<WalletServices>,
    busy: BusyFlag,
}

impl MintFeature {
    pub fn new(services: Arc<WalletServices>) -> Self {
        Self {
            services,
            busy: BusyFlag::default(),
        }
    }

    pub fn tokens(&self) -> Vec<TokenDescriptor> {
        tracked_tokens(&self.services)
    }

    pub async fn import_token(&self, input: &str) -> Result<TokenDescriptor, FlowError> {
        let token = super::import_token(&self.services, input).await?;
        FlowLog::new(&self.services.feed, FEATURE).success(format!("Imported {}", token.symbol));
        Ok(token)
    }

    pub async fn submit(&self, form: MintForm) -> Result<TxHash, FlowError> {
        let _guard = self.busy.try_acquire()?;
        let log = FlowLog::new(&self.services.feed, FEATURE);

        let recipient = match validate(&form, self.services.connector.signer_address()) {
            Ok(recipient) => recipient,
            Err(err) => {
                log.error("Please fill all required fields");
                return Err(err);
            }
        };

        let result = self.mint(log, &form, recipient).await;
        if let Err(err) = &result {
            log.error(format!("Mint failed: {err}"));
        }
        result
    }

    async fn mint(&self, log: FlowLog<'_>, form: &MintForm, recipient: Address) -> Result<TxHash, FlowError> {
        let services = &self.services;
        log.info(format!(
            "Minting {} tokens to {}...",
            form.amount.trim(),
            short_hex(&recipient.to_string())
        ));

        let decimals = services.connector.chain().decimals(form.token).await?;
        let symbol = resolve_symbol(services, form.token).await;
        let amount = parse_amount(&form.amount, decimals)?;

        log.info(format!("Verifying ISSUER_ROLE on {symbol}..."));
        if let Err(err) = self.ensure_issuer(log, form.token).await {
            tracing::warn!(token = %form.token, error = %err, "issuer role step failed");
            log.warning("Role check skipped, proceeding...");
        }

        log.info("Sending mint transaction...");
        let call = ContractCall::Mint {
            token: form.token,
            to: recipient,
            amount,
        };
        let details = HistoryDetails {
            to: Some(recipient),
            amount: Some(form.amount.trim().to_owned()),
            symbol: Some(symbol),
            token_address: Some(form.token),
            ..Default::default()
        };
        let hash = submit_tracked(services, log, call, HistoryKind::Mint, details).await?;
        let receipt = confirm_tracked(services, hash).await?;
        ensure_success(&receipt, "mint")?;

        log.success("Mint successful!");
        Ok(hash)
    }

    /// Grants the signer the issuer role on `token` when it lacks it.
    async fn ensure_issuer(&self, log: FlowLog<'_>, token: Address) -> Result<()> {
        let services = &self.services;
        let me = services.connector.signer_address();
        let role = issuer_role();
        if services.connector.chain().has_role(token, role, me).await? {
            return Ok(());
        }

        log.info("Requesting minter permission...");
        send_and_confirm(
            services,
            ContractCall::GrantRole {
                token,
                role,
                account: me,
            },
        )
        .await?;
        log.success("Permission granted");
        Ok(())
    }
}

fn validate(form: &MintForm, signer: Address) -> Result<Address, FlowError> {
    require_positive_amount(&form.amount)?;
    match form.recipient.as_deref().map(str::trim) {
        None | Some("") => Ok(signer),
        Some(input) => parse_recipient(input),
    }
}

#[async_trait]
impl Feature for MintFeature {
    fn id(&self) -> &'static str {
        FEATURE
    }

    fn name(&self) -> &'static str {
        "Mint"
    }

    fn order(&self) -> u32 {
        6
    }

    fn render(&self, container: &mut dyn Container) {
        container.heading("Mint");
        container.line("Tokens");
        for token in self.tokens() {
            container.line(&format!("  {} {}", token.symbol, token.address));
        }
        container.field("Recipient", "defaults to this wallet");
        if self.busy.is_busy() {
            container.line("Minting...");
        }
        render_log(container, &self.services.feed, FEATURE);
    }
}
