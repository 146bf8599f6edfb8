//! The wallet's tabs. Each feature owns a small typed state, runs one action
//! at a time behind a [`BusyFlag`] and reports progress through the
//! activity feed.

use crate::activity::ActivityFeed;
use crate::app::WalletServices;
use crate::error::FlowError;
use crate::registry::Container;
use alloy_primitives::{Address, TxHash};
use anyhow::{Result, bail};
use std::sync::atomic::{AtomicBool, Ordering};
use tf_api_types::{HistoryDetails, HistoryKind, LogLevel, NewHistoryEntry, TokenDescriptor, TxStatus};
use tf_chain_client::{ContractCall, TxReceipt, parse_address};
use tracing::warn;

pub mod dashboard;
pub mod deploy;
pub mod faucet;
pub mod mint;
pub mod send;
pub mod swap;

pub use dashboard::DashboardFeature;
pub use deploy::{DeployFeature, DeployForm, DeployOutcome};
pub use faucet::{FaucetFeature, FaucetState};
pub use mint::{MintFeature, MintForm};
pub use send::{SendFeature, SendForm};
pub use swap::{QuotePreview, SwapFeature, SwapForm, parse_slippage};

const RENDERED_LOG_LINES: usize = 12;

/// Submit control of a feature. Held for the duration of one action.
#[derive(Default)]
pub struct BusyFlag(AtomicBool);

pub struct SubmitGuard<'a>(&'a AtomicBool);

impl BusyFlag {
    pub fn try_acquire(&self) -> Result<SubmitGuard<'_>, FlowError> {
        if self.0.swap(true, Ordering::AcqRel) {
            return Err(FlowError::Busy);
        }
        Ok(SubmitGuard(&self.0))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Log writer bound to one feature.
#[derive(Clone, Copy)]
pub(crate) struct FlowLog<'a> {
    feed: &'a ActivityFeed,
    feature: &'static str,
}

impl<'a> FlowLog<'a> {
    pub(crate) fn new(feed: &'a ActivityFeed, feature: &'static str) -> Self {
        Self { feed, feature }
    }

    pub(crate) fn info(&self, message: impl Into<String>) {
        self.feed.log(self.feature, LogLevel::Info, message);
    }

    pub(crate) fn success(&self, message: impl Into<String>) {
        self.feed.log(self.feature, LogLevel::Success, message);
    }

    pub(crate) fn warning(&self, message: impl Into<String>) {
        self.feed.log(self.feature, LogLevel::Warning, message);
    }

    pub(crate) fn error(&self, message: impl Into<String>) {
        self.feed.log(self.feature, LogLevel::Error, message);
    }
}

/// Sends `call` and records it as a pending history entry.
pub(crate) async fn submit_tracked(
    services: &WalletServices,
    log: FlowLog<'_>,
    call: ContractCall,
    kind: HistoryKind,
    details: HistoryDetails,
) -> Result<TxHash> {
    let hash = services.connector.send(call).await?;
    log.info(format!("TX: {}", services.connector.tx_url(hash)));
    record_pending(services, kind, hash, details);
    Ok(hash)
}

pub(crate) fn record_pending(
    services: &WalletServices,
    kind: HistoryKind,
    hash: TxHash,
    details: HistoryDetails,
) {
    if let Err(err) = services
        .history
        .add(NewHistoryEntry::pending(kind, hash, details))
    {
        warn!(%hash, error = %err, "failed to record history entry");
    }
}

/// Waits for the receipt. A successful one flips the history entry to
/// success and schedules a balance refresh.
pub(crate) async fn confirm_tracked(services: &WalletServices, hash: TxHash) -> Result<TxReceipt> {
    let receipt = services.connector.confirm(hash).await?;
    if receipt.success {
        if let Err(err) = services.history.update_status(hash, TxStatus::Success) {
            warn!(%hash, error = %err, "failed to update history entry");
        }
        services.scheduler.trigger_refresh();
    }
    Ok(receipt)
}

/// Sends `call` and waits for it, failing on revert. Not recorded in
/// history.
pub(crate) async fn send_and_confirm(services: &WalletServices, call: ContractCall) -> Result<()> {
    let name = call.name();
    let hash = services.connector.send(call).await?;
    let receipt = services.connector.confirm(hash).await?;
    ensure_success(&receipt, name)
}

pub(crate) fn ensure_success(receipt: &TxReceipt, what: &str) -> Result<()> {
    if !receipt.success {
        bail!("{what} transaction {} reverted", receipt.hash);
    }
    Ok(())
}

/// Rejects empty, malformed and non-positive amounts.
pub(crate) fn require_positive_amount(amount: &str) -> Result<(), FlowError> {
    match amount.trim().parse::<f64>() {
        Ok(value) if value > 0.0 && value.is_finite() => Ok(()),
        _ => Err(FlowError::validation("INVALID_AMOUNT")),
    }
}

pub(crate) fn parse_recipient(input: &str) -> Result<Address, FlowError> {
    parse_address(input).map_err(|err| FlowError::validation(format!("INVALID_RECIPIENT: {err}")))
}

/// Configured tokens with the user's imports merged over them by symbol.
pub fn tracked_tokens(services: &WalletServices) -> Vec<TokenDescriptor> {
    let mut tokens = services.config.tokens.clone();
    for imported in services.tokens.all() {
        match tokens.iter_mut().find(|t| t.symbol == imported.symbol) {
            Some(existing) => existing.address = imported.address,
            None => tokens.push(imported),
        }
    }
    tokens
}

/// Symbol from the known token lists, falling back to a chain read.
pub(crate) async fn resolve_symbol(services: &WalletServices, token: Address) -> String {
    if let Some(known) = tracked_tokens(services)
        .into_iter()
        .find(|t| t.address == token)
    {
        return known.symbol;
    }
    match services.connector.chain().symbol(token).await {
        Ok(symbol) => symbol,
        Err(err) => {
            warn!(%token, error = %err, "symbol lookup failed");
            short_hex(&token.to_string())
        }
    }
}

/// Reads `symbol()` from `input` and adds it to the user token list.
pub async fn import_token(services: &WalletServices, input: &str) -> Result<TokenDescriptor, FlowError> {
    let address = parse_address(input).map_err(|err| FlowError::validation(err.to_string()))?;
    let symbol = services.connector.chain().symbol(address).await?;
    let token = TokenDescriptor::new(address, symbol);
    services.tokens.import(token.clone())?;
    Ok(token)
}

pub(crate) fn short_hex(value: &str) -> String {
    if value.len() <= 16 {
        return value.to_owned();
    }
    format!("{}...{}", &value[..8], &value[value.len() - 6..])
}

/// `HH:MM:SS` of an epoch-millisecond timestamp, in UTC.
pub(crate) fn clock_time(epoch_ms: u64) -> String {
    let secs = (epoch_ms / 1000) % 86_400;
    format!(
        "{:02}:{:02}:{:02} UTC",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}

pub(crate) fn render_log(container: &mut dyn Container, feed: &ActivityFeed, feature: &str) {
    let lines = feed.lines_for(feature);
    if lines.is_empty() {
        return;
    }
    container.line("");
    container.line("Activity");
    let skip = lines.len().saturating_sub(RENDERED_LOG_LINES);
    for line in lines.into_iter().skip(skip) {
        let marker = match line.level {
            LogLevel::Info => ">",
            LogLevel::Success => "+",
            LogLevel::Warning => "!",
            LogLevel::Error => "x",
        };
        container.line(&format!("{marker} {}", line.message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::harness;
    use alloy_primitives::address;
    use tf_chain_client::config::ALPHA_USD;

    #[test]
    fn busy_flag_releases_on_drop() {
        let busy = BusyFlag::default();
        let guard = busy.try_acquire().unwrap();
        assert!(busy.is_busy());
        assert!(matches!(busy.try_acquire(), Err(FlowError::Busy)));
        drop(guard);
        assert!(!busy.is_busy());
        assert!(busy.try_acquire().is_ok());
    }

    #[test]
    fn amounts_must_be_positive() {
        assert!(require_positive_amount("10.5").is_ok());
        assert!(require_positive_amount("0").is_err());
        assert!(require_positive_amount("-2").is_err());
        assert!(require_positive_amount("").is_err());
        assert!(require_positive_amount("ten").is_err());
    }

    #[test]
    fn formats_clock_and_short_hex() {
        assert_eq!(clock_time(1_700_000_000_000), "22:13:20 UTC");
        assert_eq!(
            short_hex("0x20c0000000000000000000000000000000000001"),
            "0x20c000...000001"
        );
    }

    #[tokio::test]
    async fn user_tokens_merge_over_configured_by_symbol() -> anyhow::Result<()> {
        let h = harness();
        let replacement = address!("0x00000000000000000000000000000000000000a1");
        let extra = address!("0x00000000000000000000000000000000000000e1");
        h.chain.with_token(replacement, "AlphaUSD", 6);
        h.chain.with_token(extra, "ExtraUSD", 6);

        import_token(&h.services, &replacement.to_string()).await?;
        import_token(&h.services, &extra.to_string()).await?;
        import_token(&h.services, &extra.to_string()).await?;

        let tokens = tracked_tokens(&h.services);
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[1].symbol, "AlphaUSD");
        assert_eq!(tokens[1].address, replacement);
        assert_ne!(tokens[1].address, ALPHA_USD);
        assert_eq!(tokens[4].address, extra);
        assert_eq!(h.services.tokens.all().len(), 2);
        Ok(())
    }
}
