use super::{BusyFlag, clock_time, render_log, short_hex, tracked_tokens};
use crate::app::WalletServices;
use crate::error::FlowError;
use crate::registry::{Container, Feature};
use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tf_api_types::{BalanceSnapshot, HistoryEntry, TokenDescriptor, TxStatus};
use tf_chain_client::{display_amount, format_amount};
use tracing::{debug, warn};

pub const POLL_ID: &str = "dashboard-balances";
const RECENT_ENTRIES: usize = 10;

pub struct DashboardFeature {
    services: Arc<WalletServices>,
    busy: BusyFlag,
}

impl DashboardFeature {
    pub fn new(services: Arc<WalletServices>) -> Self {
        Self {
            services,
            busy: BusyFlag::default(),
        }
    }

    pub async fn refresh(&self) -> Vec<BalanceSnapshot> {
        refresh_balances(&self.services).await
    }

    /// Adds a token by address and refreshes balances so it shows up.
    pub async fn import_token(&self, input: &str) -> Result<TokenDescriptor, FlowError> {
        let _guard = self.busy.try_acquire()?;
        let log = super::FlowLog::new(&self.services.feed, "dashboard");
        match super::import_token(&self.services, input).await {
            Ok(token) => {
                log.success(format!("Imported {}", token.symbol));
                refresh_balances(&self.services).await;
                Ok(token)
            }
            Err(err) => {
                log.error(format!("Import failed: {err}"));
                Err(err)
            }
        }
    }

    pub async fn remove_token(&self, address: Address) -> Result<bool, FlowError> {
        let removed = self.services.tokens.remove(address)?;
        if removed {
            refresh_balances(&self.services).await;
        }
        Ok(removed)
    }

    pub fn user_tokens(&self) -> Vec<TokenDescriptor> {
        self.services.tokens.all()
    }
}

/// Reads every tracked token's balance and replaces the cached snapshot.
/// Tokens that cannot be read are left out.
pub async fn refresh_balances(services: &WalletServices) -> Vec<BalanceSnapshot> {
    let owner = services.connector.signer_address();
    let chain = services.connector.chain();
    let mut balances = Vec::new();

    for token in tracked_tokens(services) {
        let read = async {
            let raw = chain.balance_of(token.address, owner).await?;
            let decimals = chain.decimals(token.address).await?;
            anyhow::Ok((format_amount(raw, decimals)?, decimals))
        };
        match read.await {
            Ok((balance, decimals)) => balances.push(BalanceSnapshot {
                symbol: token.symbol,
                address: token.address,
                balance,
                decimals,
            }),
            Err(err) => warn!(token = %token.address, symbol = %token.symbol, error = %err, "skipping token balance"),
        }
    }

    debug!(count = balances.len(), "balances refreshed");
    services.cache.set_balances(balances.clone());
    balances
}

fn status_label(entry: &HistoryEntry) -> &'static str {
    match entry.status {
        TxStatus::Success => "Success",
        // Nothing ever writes `Failed`; unconfirmed entries read the same.
        TxStatus::Pending | TxStatus::Failed => "Failed",
    }
}

fn describe(entry: &HistoryEntry) -> String {
    let details = &entry.details;
    let amount = match (&details.amount, &details.symbol) {
        (Some(amount), Some(symbol)) => format!(" {amount} {symbol}"),
        (Some(amount), None) => format!(" {amount}"),
        _ => String::new(),
    };
    format!(
        "{} {}{} [{}] {}",
        clock_time(entry.timestamp),
        entry.kind,
        amount,
        status_label(entry),
        short_hex(&entry.hash.to_string())
    )
}

#[async_trait]
impl Feature for DashboardFeature {
    fn id(&self) -> &'static str {
        "dashboard"
    }

    fn name(&self) -> &'static str {
        "Dashboard"
    }

    fn order(&self) -> u32 {
        1
    }

    fn render(&self, container: &mut dyn Container) {
        let services = &self.services;
        container.heading("Dashboard");
        container.field("Network", &format!("Tempo (chain {})", services.config.chain_id));
        container.field("Address", &services.connector.signer_address().to_string());

        let refreshed = if services.cache.has_data() {
            clock_time(services.cache.last_updated_ms())
        } else {
            "--".to_owned()
        };
        container.field(
            "Last refresh",
            &format!("{refreshed} (auto {}s)", services.config.poll_interval.as_secs()),
        );

        container.line("");
        container.line("Balances");
        let balances = services.cache.balances();
        if balances.is_empty() {
            container.line("Loading assets...");
        }
        for balance in balances {
            container.line(&format!(
                "{:>12} {}",
                display_amount(&balance.balance, 4),
                balance.symbol
            ));
        }

        container.line("");
        container.line("Recent transactions");
        let recent = services.history.recent(RECENT_ENTRIES);
        if recent.is_empty() {
            container.line("No transactions yet");
        }
        for entry in &recent {
            container.line(&describe(entry));
        }

        render_log(container, &services.feed, self.id());
    }

    async fn init(&self) -> Result<()> {
        let services = &self.services;
        services.cache.set_address(services.connector.signer_address());
        refresh_balances(services).await;

        let weak: Weak<WalletServices> = Arc::downgrade(services);
        services.scheduler.register(POLL_ID, move || {
            let weak = weak.clone();
            async move {
                if let Some(services) = weak.upgrade() {
                    refresh_balances(&services).await;
                }
                Ok(())
            }
        });
        Ok(())
    }
}
