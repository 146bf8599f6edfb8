use super::{BusyFlag, FlowLog, confirm_tracked, record_pending, render_log};
use crate::app::WalletServices;
use crate::error::FlowError;
use crate::registry::{Container, Feature};
use alloy_primitives::TxHash;
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tf_api_types::{HistoryDetails, HistoryKind};
use tracing::warn;

const FEATURE: &str = "faucet";
const ERROR_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FaucetState {
    #[default]
    Idle,
    Processing,
    Claimed(Vec<TxHash>),
    Failed(String),
}

/// Maps a faucet RPC error onto the message shown to the user.
pub fn friendly_faucet_error(message: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("too many requests") {
        "Rate limit exceeded".to_owned()
    } else if lower.contains("already claimed") {
        "Already claimed".to_owned()
    } else if lower.contains("method not found") {
        "Faucet offline".to_owned()
    } else {
        let preview: String = message.chars().take(ERROR_PREVIEW_CHARS).collect();
        format!("Error: {preview}...")
    }
}

pub struct FaucetFeature {
    services: Arc<WalletServices>,
    busy: BusyFlag,
    state: Mutex<FaucetState>,
}

impl FaucetFeature {
    pub fn new(services: Arc<WalletServices>) -> Self {
        Self {
            services,
            busy: BusyFlag::default(),
            state: Mutex::new(FaucetState::Idle),
        }
    }

    pub fn state(&self) -> FaucetState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_state(&self, state: FaucetState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Asks the node's faucet to fund the signer, then waits for every
    /// funding transaction.
    pub async fn claim(&self) -> Result<Vec<TxHash>, FlowError> {
        let _guard = self.busy.try_acquire()?;
        let services = &self.services;
        let log = FlowLog::new(&services.feed, FEATURE);
        let me = services.connector.signer_address();

        self.set_state(FaucetState::Processing);
        log.info("Contacting faucet...");

        let hashes = match services.connector.chain().fund_address(me).await {
            Ok(hashes) => hashes,
            Err(err) => {
                let friendly = friendly_faucet_error(&err.to_string());
                warn!(error = %err, "faucet request failed");
                self.set_state(FaucetState::Failed(friendly.clone()));
                log.error(friendly.clone());
                return Err(FlowError::Chain(anyhow!(friendly)));
            }
        };

        for hash in &hashes {
            record_pending(
                services,
                HistoryKind::Faucet,
                *hash,
                HistoryDetails {
                    to: Some(me),
                    ..Default::default()
                },
            );
        }
        self.set_state(FaucetState::Claimed(hashes.clone()));
        log.success("Claim Successful!");
        for hash in &hashes {
            log.info(format!("TX: {}", services.connector.tx_url(*hash)));
        }

        for hash in &hashes {
            if let Err(err) = confirm_tracked(services, *hash).await {
                warn!(%hash, error = %err, "faucet receipt unavailable");
                log.warning(format!("Could not confirm {hash}"));
            }
        }
        Ok(hashes)
    }
}

#[async_trait]
impl Feature for FaucetFeature {
    fn id(&self) -> &'static str {
        FEATURE
    }

    fn name(&self) -> &'static str {
        "Faucet"
    }

    fn order(&self) -> u32 {
        3
    }

    fn render(&self, container: &mut dyn Container) {
        container.heading("Faucet");
        container.field(
            "Recipient",
            &self.services.connector.signer_address().to_string(),
        );
        let status = match self.state() {
            FaucetState::Idle => "Ready to claim".to_owned(),
            FaucetState::Processing => "Processing...".to_owned(),
            FaucetState::Claimed(hashes) => format!("Claimed ({} transactions)", hashes.len()),
            FaucetState::Failed(message) => message,
        };
        container.field("Status", &status);
        render_log(container, &self.services.feed, FEATURE);
    }
}
