use super::{
    BusyFlag, FlowLog, confirm_tracked, ensure_success, render_log, require_positive_amount,
    resolve_symbol, send_and_confirm, submit_tracked, tracked_tokens,
};
use crate::app::WalletServices;
use crate::error::FlowError;
use crate::registry::{Container, Feature};
use alloy_primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use std::sync::Arc;
use tf_api_types::{HistoryDetails, HistoryKind};
use tf_chain_client::{ContractCall, format_amount, parse_amount, to_u128};
use tracing::debug;

const FEATURE: &str = "swap";
const QUOTE_DECIMALS: u8 = 6;
const BPS: u128 = 10_000;

/// Slippage tolerances offered to the user, in basis points.
pub const SLIPPAGE_CHOICES_BPS: [u32; 3] = [50, 100, 200];
pub const DEFAULT_SLIPPAGE_BPS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapForm {
    pub token_in: Address,
    pub token_out: Address,
    pub amount: String,
    /// One of [`SLIPPAGE_CHOICES_BPS`].
    pub slippage_bps: u32,
}

impl SwapForm {
    pub fn new(token_in: Address, token_out: Address, amount: impl Into<String>) -> Self {
        Self {
            token_in,
            token_out,
            amount: amount.into(),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
        }
    }
}

/// Accepts `0.5`, `1` or `2`, with or without a trailing `%`.
pub fn parse_slippage(input: &str) -> Result<u32, FlowError> {
    let percent = input.trim().trim_end_matches('%');
    match percent {
        "0.5" | ".5" => Ok(50),
        "1" | "1.0" => Ok(100),
        "2" | "2.0" => Ok(200),
        _ => Err(FlowError::validation(format!(
            "Slippage must be 0.5%, 1% or 2%, got `{}`",
            input.trim()
        ))),
    }
}

fn percent_label(bps: u32) -> String {
    match bps % 100 {
        0 => format!("{}%", bps / 100),
        rest => format!("{}.{}%", bps / 100, rest / 10),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotePreview {
    Expected(String),
    NoLiquidity,
}

pub struct SwapFeature {
    services: Arc<WalletServices>,
    busy: BusyFlag,
}

/// Minimum accepted output after `slippage_bps`, without overflowing on
/// large quotes.
fn min_amount_out(quote: u128, slippage_bps: u32) -> u128 {
    let keep = BPS.saturating_sub(u128::from(slippage_bps));
    (quote / BPS) * keep + (quote % BPS) * keep / BPS
}

impl SwapFeature {
    pub fn new(services: Arc<WalletServices>) -> Self {
        Self {
            services,
            busy: BusyFlag::default(),
        }
    }

    /// Quote failures read as zero output.
    async fn quote(&self, token_in: Address, token_out: Address, amount_in: u128) -> u128 {
        let dex = self.services.config.stablecoin_dex;
        match self
            .services
            .connector
            .chain()
            .quote_swap_exact_amount_in(dex, token_in, token_out, amount_in)
            .await
        {
            Ok(quote) => quote,
            Err(err) => {
                debug!(error = %err, "swap quote unavailable");
                0
            }
        }
    }

    /// Expected output for the form as it stands, shown before submitting.
    pub async fn preview_quote(&self, form: &SwapForm) -> Result<QuotePreview, FlowError> {
        validate(form)?;
        let decimals = self.services.connector.chain().decimals(form.token_in).await?;
        let amount_in = to_u128(parse_amount(&form.amount, decimals)?)?;
        let quote = self.quote(form.token_in, form.token_out, amount_in).await;
        if quote == 0 {
            return Ok(QuotePreview::NoLiquidity);
        }
        Ok(QuotePreview::Expected(format_amount(
            U256::from(quote),
            QUOTE_DECIMALS,
        )?))
    }

    pub async fn submit(&self, form: SwapForm) -> Result<TxHash, FlowError> {
        let _guard = self.busy.try_acquire()?;
        let log = FlowLog::new(&self.services.feed, FEATURE);

        let result = async {
            validate(&form)?;
            self.swap(log, &form).await
        }
        .await;

        if let Err(err) = &result {
            log.error(format!("Error: {err}"));
        }
        result
    }

    async fn swap(&self, log: FlowLog<'_>, form: &SwapForm) -> Result<TxHash, FlowError> {
        let services = &self.services;
        let chain = services.connector.chain();
        let owner = services.connector.signer_address();
        let dex = services.config.stablecoin_dex;

        let symbol_in = resolve_symbol(services, form.token_in).await;
        let symbol_out = resolve_symbol(services, form.token_out).await;
        log.info(format!(
            "Swapping {} {symbol_in} for {symbol_out}...",
            form.amount.trim()
        ));

        let decimals = chain.decimals(form.token_in).await?;
        let amount = parse_amount(&form.amount, decimals)?;
        let amount_in = to_u128(amount)?;

        log.info("Checking balance...");
        let balance = chain.balance_of(form.token_in, owner).await?;
        if balance < amount {
            return Err(FlowError::InsufficientBalance);
        }

        log.info("Approving DEX...");
        let allowance = chain.allowance(form.token_in, owner, dex).await?;
        if allowance < amount {
            send_and_confirm(
                services,
                ContractCall::Approve {
                    token: form.token_in,
                    spender: dex,
                    amount: U256::MAX,
                },
            )
            .await?;
            log.success("Approval granted");
        }

        let quote = self.quote(form.token_in, form.token_out, amount_in).await;
        let min_out = min_amount_out(quote, form.slippage_bps);
        if min_out == 0 {
            log.warning("No liquidity found");
            return Err(FlowError::NoLiquidity);
        }

        log.info("Sending swap transaction...");
        let call = ContractCall::SwapExactAmountIn {
            dex,
            token_in: form.token_in,
            token_out: form.token_out,
            amount_in,
            min_amount_out: min_out,
        };
        let details = HistoryDetails {
            from: Some(owner),
            amount: Some(form.amount.trim().to_owned()),
            symbol: Some(format!("{symbol_in} -> {symbol_out}")),
            token_address: Some(form.token_in),
            ..Default::default()
        };
        let hash = submit_tracked(services, log, call, HistoryKind::Swap, details).await?;
        let receipt = confirm_tracked(services, hash).await?;
        ensure_success(&receipt, "swap")?;

        log.success("Swap complete!");
        Ok(hash)
    }
}

fn validate(form: &SwapForm) -> Result<(), FlowError> {
    if form.token_in == form.token_out {
        return Err(FlowError::validation("Select two different tokens"));
    }
    if !SLIPPAGE_CHOICES_BPS.contains(&form.slippage_bps) {
        return Err(FlowError::validation(format!(
            "Unsupported slippage of {} bps",
            form.slippage_bps
        )));
    }
    require_positive_amount(&form.amount)
}

#[async_trait]
impl Feature for SwapFeature {
    fn id(&self) -> &'static str {
        FEATURE
    }

    fn name(&self) -> &'static str {
        "Swap"
    }

    fn order(&self) -> u32 {
        5
    }

    fn render(&self, container: &mut dyn Container) {
        container.heading("Swap");
        let symbols: Vec<_> = tracked_tokens(&self.services)
            .into_iter()
            .map(|token| token.symbol)
            .collect();
        container.field("Pairs", &symbols.join(", "));
        let choices: Vec<_> = SLIPPAGE_CHOICES_BPS
            .iter()
            .map(|bps| percent_label(*bps))
            .collect();
        container.field(
            "Slippage",
            &format!(
                "{} (default {})",
                choices.join(" / "),
                percent_label(DEFAULT_SLIPPAGE_BPS)
            ),
        );
        if self.busy.is_busy() {
            container.line("Swapping...");
        }
        render_log(container, &self.services.feed, FEATURE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{SIGNER, harness};
    use tf_api_types::TxStatus;
    use tf_chain_client::config::{ALPHA_USD, BETA_USD, STABLECOIN_DEX};

    fn form(amount: &str) -> SwapForm {
        SwapForm::new(ALPHA_USD, BETA_USD, amount)
    }

    #[test]
    fn slippage_floor_follows_the_chosen_tolerance() {
        assert_eq!(min_amount_out(10_000, 100), 9_900);
        assert_eq!(min_amount_out(1_000_000, 100), 990_000);
        assert_eq!(min_amount_out(1_000_000, 50), 995_000);
        assert_eq!(min_amount_out(1_000_000, 200), 980_000);
        assert_eq!(min_amount_out(1, 100), 0);
        assert!(min_amount_out(u128::MAX, 100) > u128::MAX / 100 * 98);
    }

    #[test]
    fn slippage_input_is_limited_to_the_offered_choices() {
        assert_eq!(parse_slippage("0.5").unwrap(), 50);
        assert_eq!(parse_slippage("1%").unwrap(), 100);
        assert_eq!(parse_slippage(" 2 ").unwrap(), 200);
        assert!(parse_slippage("5").is_err());
        assert!(parse_slippage("").is_err());
        assert_eq!(percent_label(50), "0.5%");
        assert_eq!(percent_label(200), "2%");
    }

    #[tokio::test]
    async fn chosen_slippage_sets_the_minimum_output() -> anyhow::Result<()> {
        let h = harness();
        h.chain.set_balance(ALPHA_USD, SIGNER, U256::from(50_000_000u64));
        h.chain
            .set_allowance(ALPHA_USD, SIGNER, STABLECOIN_DEX, U256::MAX);
        h.chain.set_quote(Some(1_000_000));
        let swap = SwapFeature::new(h.services.clone());

        let mut tight = form("1");
        tight.slippage_bps = 50;
        swap.submit(tight).await?;
        let mut loose = form("1");
        loose.slippage_bps = 200;
        swap.submit(loose).await?;

        let floors: Vec<_> = h
            .chain
            .submitted()
            .into_iter()
            .filter_map(|call| match call {
                ContractCall::SwapExactAmountIn { min_amount_out, .. } => Some(min_amount_out),
                _ => None,
            })
            .collect();
        assert_eq!(floors, vec![995_000, 980_000]);

        let mut odd = form("1");
        odd.slippage_bps = 300;
        assert!(matches!(swap.submit(odd).await, Err(FlowError::Validation(_))));
        assert_eq!(h.chain.submitted().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn approves_once_then_swaps() -> anyhow::Result<()> {
        let h = harness();
        h.chain.set_balance(ALPHA_USD, SIGNER, U256::from(50_000_000u64));
        h.chain.set_quote(Some(4_990_000));
        let swap = SwapFeature::new(h.services.clone());

        swap.submit(form("5")).await?;
        let calls = h.chain.submitted();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            ContractCall::Approve {
                token: ALPHA_USD,
                spender: STABLECOIN_DEX,
                amount: U256::MAX,
            }
        );
        assert_eq!(
            calls[1],
            ContractCall::SwapExactAmountIn {
                dex: STABLECOIN_DEX,
                token_in: ALPHA_USD,
                token_out: BETA_USD,
                amount_in: 5_000_000,
                min_amount_out: 4_940_100,
            }
        );
        let entries = h.services.history.all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, HistoryKind::Swap);
        assert_eq!(entries[0].status, TxStatus::Success);

        swap.submit(form("5")).await?;
        let calls = h.chain.submitted();
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[2], ContractCall::SwapExactAmountIn { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn insufficient_balance_stops_before_approval() {
        let h = harness();
        h.chain.set_balance(ALPHA_USD, SIGNER, U256::from(1_000_000u64));
        h.chain.set_quote(Some(1_000_000));
        let swap = SwapFeature::new(h.services.clone());

        let err = swap.submit(form("2")).await.unwrap_err();
        assert!(matches!(err, FlowError::InsufficientBalance));
        assert!(h.chain.submitted().is_empty());
        assert_eq!(
            h.services.feed.messages_for("swap").last().unwrap(),
            "Error: Insufficient balance"
        );
    }

    #[tokio::test]
    async fn missing_pool_reports_no_liquidity() {
        let h = harness();
        h.chain.set_balance(ALPHA_USD, SIGNER, U256::from(10_000_000u64));
        h.chain
            .set_allowance(ALPHA_USD, SIGNER, STABLECOIN_DEX, U256::MAX);
        h.chain.set_quote(None);
        let swap = SwapFeature::new(h.services.clone());

        let err = swap.submit(form("1")).await.unwrap_err();
        assert!(matches!(err, FlowError::NoLiquidity));
        assert!(h.chain.submitted().is_empty());
        assert!(
            h.services
                .feed
                .messages_for("swap")
                .contains(&"No liquidity found".to_owned())
        );
    }

    #[tokio::test]
    async fn same_token_is_rejected() {
        let h = harness();
        let swap = SwapFeature::new(h.services.clone());
        let mut same = form("1");
        same.token_out = ALPHA_USD;
        assert!(matches!(
            swap.submit(same).await,
            Err(FlowError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn preview_formats_the_quote() -> anyhow::Result<()> {
        let h = harness();
        let swap = SwapFeature::new(h.services.clone());

        h.chain.set_quote(Some(998_500));
        assert_eq!(
            swap.preview_quote(&form("1")).await?,
            QuotePreview::Expected("0.998500".to_owned())
        );

        h.chain.set_quote(None);
        assert_eq!(swap.preview_quote(&form("1")).await?, QuotePreview::NoLiquidity);
        Ok(())
    }
}
