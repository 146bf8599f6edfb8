use crate::commands::{Command, HELP, parse};
use alloy_primitives::Address;
use anyhow::{Result, anyhow};
use std::sync::Arc;
use tf_api_types::{LogLevel, TxStatus};
use tf_chain_client::parse_address;
use tf_wallet_core::features::{
    DeployForm, MintForm, QuotePreview, SendForm, SwapForm, tracked_tokens,
};
use tf_wallet_core::{Container, FeatureRegistry, MountedFeatures, Visibility, WalletServices};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// Renders tabs straight to stdout.
pub(crate) struct TerminalContainer;

impl Container for TerminalContainer {
    fn clear(&mut self) {
        println!();
    }

    fn heading(&mut self, text: &str) {
        println!("== {text} ==");
    }

    fn line(&mut self, text: &str) {
        println!("{text}");
    }
}

pub(crate) struct Shell {
    pub(crate) services: Arc<WalletServices>,
    pub(crate) registry: FeatureRegistry,
    pub(crate) features: MountedFeatures,
    pub(crate) visibility: watch::Sender<Visibility>,
}

/// Symbol (case-insensitive) of a tracked token, or a raw address.
fn resolve_token(services: &WalletServices, input: &str) -> Result<Address> {
    if let Some(token) = tracked_tokens(services)
        .into_iter()
        .find(|token| token.symbol.eq_ignore_ascii_case(input))
    {
        return Ok(token.address);
    }
    parse_address(input).map_err(|_| anyhow!("unknown token `{input}`"))
}

/// Prints activity lines as they arrive.
pub(crate) fn spawn_feed_printer(services: &WalletServices) -> tokio::task::JoinHandle<()> {
    let mut lines = services.feed.subscribe();
    tokio::spawn(async move {
        loop {
            match lines.recv().await {
                Ok(line) => {
                    let marker = match line.level {
                        LogLevel::Info => ">",
                        LogLevel::Success => "+",
                        LogLevel::Warning => "!",
                        LogLevel::Error => "x",
                    };
                    println!("[{}] {marker} {}", line.feature, line.message);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "activity printer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

impl Shell {
    async fn open(&self, tab: &str) -> bool {
        if !self.registry.activate(tab).await {
            return false;
        }
        // init may have changed what the tab shows
        self.registry.rerender();
        true
    }

    async fn bring_forward(&self, tab: &str) {
        if self.registry.active().as_deref() != Some(tab) {
            self.open(tab).await;
        }
    }

    /// Reads commands until `quit`, end of input or Ctrl-C.
    pub(crate) async fn run<R>(&self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        self.open("dashboard").await;
        println!("Type `help` for commands.");

        let mut lines = input.lines();
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                break;
            };

            let command = match parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    println!("{err}");
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }
            if let Err(err) = self.execute(command).await {
                warn!(error = %err, "command failed");
                println!("Error: {err}");
            }
        }
        Ok(())
    }

    async fn execute(&self, command: Command) -> Result<()> {
        if let Some(tab) = command.tab() {
            self.bring_forward(tab).await;
        }

        let services = &self.services;
        let features = &self.features;
        match command {
            Command::Help => println!("{HELP}"),
            Command::Tabs => {
                let active = self.registry.active();
                for feature in self.registry.features() {
                    let marker = if active.as_deref() == Some(feature.id()) { "*" } else { " " };
                    println!("{marker} {:<10} {}", feature.id(), feature.name());
                }
            }
            Command::Open(tab) => {
                if !self.open(&tab).await {
                    println!("No tab named `{tab}`.");
                }
                return Ok(());
            }
            Command::Refresh => services.scheduler.force_refresh().await,
            Command::Show => {
                self.visibility.send_replace(Visibility::Visible);
                println!("Polling every {}s.", services.config.poll_interval.as_secs());
            }
            Command::Hide => {
                self.visibility.send_replace(Visibility::Hidden);
                println!("Polling paused.");
            }
            Command::Balance(token) => {
                let token = resolve_token(services, &token)?;
                println!("{}", features.send.token_balance(token).await?);
            }
            Command::History => {
                for entry in services.history.all() {
                    let status = match entry.status {
                        TxStatus::Success => "success",
                        TxStatus::Pending => "pending",
                        TxStatus::Failed => "failed",
                    };
                    println!("{:<13} {:<8} {}", entry.kind, status, services.connector.tx_url(entry.hash));
                }
            }
            Command::Import(address) => {
                features.dashboard.import_token(&address).await?;
            }
            Command::Remove(address) => {
                let address = parse_address(&address)?;
                if !features.dashboard.remove_token(address).await? {
                    println!("{address} was not imported.");
                }
            }
            Command::Send {
                token,
                to,
                amount,
                memo,
            } => {
                let form = SendForm {
                    token: resolve_token(services, &token)?,
                    recipient: to,
                    amount,
                    memo,
                };
                features.send.submit(form).await?;
            }
            Command::Quote {
                token_in,
                token_out,
                amount,
            } => {
                let form = SwapForm::new(
                    resolve_token(services, &token_in)?,
                    resolve_token(services, &token_out)?,
                    amount,
                );
                match features.swap.preview_quote(&form).await? {
                    QuotePreview::Expected(out) => println!("Expected output: {out}"),
                    QuotePreview::NoLiquidity => println!("No liquidity"),
                }
            }
            Command::Swap {
                token_in,
                token_out,
                amount,
                slippage_bps,
            } => {
                let mut form = SwapForm::new(
                    resolve_token(services, &token_in)?,
                    resolve_token(services, &token_out)?,
                    amount,
                );
                if let Some(slippage_bps) = slippage_bps {
                    form.slippage_bps = slippage_bps;
                }
                features.swap.submit(form).await?;
            }
            Command::Mint {
                token,
                amount,
                recipient,
            } => {
                let form = MintForm {
                    token: resolve_token(services, &token)?,
                    amount,
                    recipient,
                };
                features.mint.submit(form).await?;
            }
            Command::Deploy {
                random,
                name,
                symbol,
            } => {
                let outcome = features
                    .deploy
                    .submit(DeployForm {
                        use_random: random,
                        name,
                        symbol,
                    })
                    .await?;
                if let Some(token) = outcome.token {
                    println!("Deployed {token}");
                }
            }
            Command::Faucet => {
                features.faucet.claim().await?;
            }
            Command::Quit => {}
        }

        self.registry.rerender();
        Ok(())
    }
}
