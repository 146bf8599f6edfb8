use super::{
    BusyFlag, FlowLog, confirm_tracked, record_pending, render_log, send_and_confirm,
};
use crate::app::WalletServices;
use crate::error::FlowError;
use crate::registry::{Container, Feature};
use alloy_primitives::{Address, B256, TxHash};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::sync::Arc;
use std::time::Duration;
use tf_api_types::{HistoryDetails, HistoryKind, TokenDescriptor};
use tf_chain_client::{ContractCall, issuer_role};
use tracing::warn;

const FEATURE: &str = "create";
const MAX_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(2);
const CURRENCY: &str = "USD";

const NAME_PREFIXES: [&str; 9] = [
    "Alpha", "Beta", "Gamma", "Delta", "Omega", "Nova", "Stellar", "Quantum", "Prime",
];
const NAME_SUFFIXES: [&str; 6] = ["Dollar", "USD", "Coin", "Cash", "Pay", "Credit"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployForm {
    pub use_random: bool,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub hash: TxHash,
    pub success: bool,
    /// Address from the factory's `TokenCreated` event, when one was found.
    pub token: Option<Address>,
}

pub struct DeployFeature {
    services: Arc<WalletServices>,
    busy: BusyFlag,
}

/// A name like "Nova Cash" and a symbol like "QXR42".
pub fn random_metadata() -> (String, String) {
    let mut rng = rand::thread_rng();
    let prefix = NAME_PREFIXES.choose(&mut rng).copied().unwrap_or("Nova");
    let suffix = NAME_SUFFIXES.choose(&mut rng).copied().unwrap_or("USD");
    let letters: String = (0..3)
        .map(|_| char::from(b'A' + rng.gen_range(0..26u8)))
        .collect();
    let number = rng.gen_range(0..99u32);
    (format!("{prefix} {suffix}"), format!("{letters}{number}"))
}

fn random_salt() -> B256 {
    let mut salt = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut salt);
    B256::from(salt)
}

/// Part of a provider error before the first `(`, which is where the noisy
/// payload starts.
fn headline(message: &str) -> &str {
    message.split('(').next().unwrap_or(message).trim()
}

impl DeployFeature {
    pub fn new(services: Arc<WalletServices>) -> Self {
        Self {
            services,
            busy: BusyFlag::default(),
        }
    }

    pub async fn submit(&self, form: DeployForm) -> Result<DeployOutcome, FlowError> {
        let _guard = self.busy.try_acquire()?;
        let log = FlowLog::new(&self.services.feed, FEATURE);

        let (name, symbol) = if form.use_random {
            let generated = random_metadata();
            log.info(format!("Generated metadata: {} ({})", generated.0, generated.1));
            generated
        } else {
            (form.name.trim().to_owned(), form.symbol.trim().to_owned())
        };
        if name.is_empty() || symbol.is_empty() {
            log.error("Error: Missing name or symbol");
            return Err(FlowError::validation("Missing name or symbol"));
        }

        let result = self.deploy(log, name, symbol).await;
        if let Err(err) = &result {
            log.error(format!("Error: {err}"));
            log.info("Suggestion: Check internet or try again later.");
        }
        result
    }

    async fn deploy(&self, log: FlowLog<'_>, name: String, symbol: String) -> Result<DeployOutcome, FlowError> {
        let services = &self.services;
        let config = &services.config;
        let admin = services.connector.signer_address();
        let salt = random_salt();

        log.info("Connecting to factory...");
        let call = ContractCall::CreateToken {
            factory: config.tip20_factory,
            name,
            symbol: symbol.clone(),
            currency: CURRENCY.to_owned(),
            quote_token: config.path_usd,
            admin,
            salt,
        };

        log.info("Submitting transaction...");
        let hash = self.submit_with_retry(log, call).await?;
        log.info(format!("Tx Hash: {hash}"));
        record_pending(
            services,
            HistoryKind::Deploy,
            hash,
            HistoryDetails {
                from: Some(admin),
                symbol: Some(symbol.clone()),
                ..Default::default()
            },
        );

        log.info("Waiting for confirmation...");
        let receipt = confirm_tracked(services, hash).await?;
        if !receipt.success {
            log.error("TX_FAILED");
            return Ok(DeployOutcome {
                hash,
                success: false,
                token: None,
            });
        }

        let token = receipt.created_token(config.tip20_factory);
        match token {
            Some(address) => {
                log.success(format!("Success: {}", services.connector.address_url(address)));
                self.adopt(log, address, &symbol).await;
            }
            None => log.error("WARNING: TOKEN_ADDRESS_NOT_FOUND"),
        }

        Ok(DeployOutcome {
            hash,
            success: true,
            token,
        })
    }

    /// Fixed-delay retry around submission only.
    async fn submit_with_retry(&self, log: FlowLog<'_>, call: ContractCall) -> anyhow::Result<TxHash> {
        let mut attempt = 1;
        loop {
            match self.services.connector.send(call.clone()).await {
                Ok(hash) => return Ok(hash),
                Err(err) => {
                    let message = err.to_string();
                    warn!(attempt, error = %message, "createToken submission failed");
                    log.warning(format!("ATTEMPT {attempt} FAILED: {}", headline(&message)));
                    if attempt >= MAX_ATTEMPTS {
                        return Err(err);
                    }
                    tokio::time::sleep(RETRY_DELAY).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Saves the new token and makes the signer its issuer.
    async fn adopt(&self, log: FlowLog<'_>, token: Address, symbol: &str) {
        let services = &self.services;
        match services.tokens.import(TokenDescriptor::new(token, symbol)) {
            Ok(true) => log.info("Token added to wallet"),
            Ok(false) => {}
            Err(err) => warn!(%token, error = %err, "failed to save created token"),
        }

        log.info("Granting issuer privileges...");
        let grant = ContractCall::GrantRole {
            token,
            role: issuer_role(),
            account: services.connector.signer_address(),
        };
        match send_and_confirm(services, grant).await {
            Ok(()) => log.success("ISSUER_ROLE_GRANTED"),
            Err(err) => {
                warn!(%token, error = %err, "issuer role grant failed");
                log.error("ROLE_GRANT_FAILED");
            }
        }
    }
}

#[async_trait]
impl Feature for DeployFeature {
    fn id(&self) -> &'static str {
        FEATURE
    }

    fn name(&self) -> &'static str {
        "Create Token"
    }

    fn order(&self) -> u32 {
        2
    }

    fn render(&self, container: &mut dyn Container) {
        container.heading("Create Token");
        container.field("Currency", CURRENCY);
        container.field("Quote token", &self.services.config.path_usd.to_string());
        if self.busy.is_busy() {
            container.line("Deploying...");
        }
        render_log(container, &self.services.feed, FEATURE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{SIGNER, harness};
    use alloy_primitives::address;
    use alloy_sol_types::SolEvent;
    use tf_api_types::TxStatus;
    use tf_chain_client::config::{PATH_USD, TIP20_FACTORY};
    use tf_chain_client::{ITIP20Factory, ReceiptLog};
    use tokio::time::Instant;

    const CREATED: Address = address!("0x20c00000000000000000000000000000000000f7");

    fn token_created_log() -> ReceiptLog {
        let event = ITIP20Factory::TokenCreated {
            token: CREATED,
            name: "Nova Cash".to_owned(),
            symbol: "NVC1".to_owned(),
            currency: "USD".to_owned(),
            quoteToken: PATH_USD,
            admin: SIGNER,
            salt: B256::ZERO,
        };
        let data = event.encode_log_data();
        ReceiptLog {
            address: TIP20_FACTORY,
            topics: data.topics().to_vec(),
            data: data.data.clone(),
        }
    }

    fn named(name: &str, symbol: &str) -> DeployForm {
        DeployForm {
            use_random: false,
            name: name.to_owned(),
            symbol: symbol.to_owned(),
        }
    }

    #[test]
    fn random_metadata_has_expected_shape() {
        for _ in 0..50 {
            let (name, symbol) = random_metadata();
            let (prefix, suffix) = name.split_once(' ').unwrap();
            assert!(NAME_PREFIXES.contains(&prefix));
            assert!(NAME_SUFFIXES.contains(&suffix));
            assert!(symbol[..3].chars().all(|c| c.is_ascii_uppercase()));
            assert!(symbol[3..].parse::<u32>().unwrap() < 99);
        }
    }

    #[test]
    fn headline_drops_the_payload() {
        assert_eq!(
            headline("server returned an error response (code: -32000)"),
            "server returned an error response"
        );
        assert_eq!(headline("timeout"), "timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_twice_then_succeeds() -> anyhow::Result<()> {
        let h = harness();
        h.chain.fail_next_submits(2, "nonce too low (code: -32000)");
        h.chain.set_receipt_logs(vec![token_created_log()]);
        let deploy = DeployFeature::new(h.services.clone());

        let started = Instant::now();
        let outcome = deploy.submit(named("Nova Cash", "NVC1")).await?;
        assert!(started.elapsed() >= RETRY_DELAY * 2);

        let messages = h.services.feed.messages_for("create");
        let failures: Vec<_> = messages
            .iter()
            .filter(|m| m.starts_with("ATTEMPT"))
            .cloned()
            .collect();
        assert_eq!(
            failures,
            vec!["ATTEMPT 1 FAILED: nonce too low", "ATTEMPT 2 FAILED: nonce too low"]
        );

        assert!(outcome.success);
        assert_eq!(outcome.token, Some(CREATED));
        let calls = h.chain.submitted_with_gas();
        assert!(matches!(
            &calls[0],
            (ContractCall::CreateToken { name, currency, quote_token, admin, .. }, 3_000_000)
                if name == "Nova Cash" && currency == "USD" && *quote_token == PATH_USD && *admin == SIGNER
        ));
        assert_eq!(
            calls[1].0,
            ContractCall::GrantRole {
                token: CREATED,
                role: issuer_role(),
                account: SIGNER,
            }
        );
        assert!(messages.contains(&"ISSUER_ROLE_GRANTED".to_owned()));
        assert_eq!(
            h.services.tokens.all(),
            vec![TokenDescriptor::new(CREATED, "NVC1")]
        );
        assert_eq!(h.services.history.all()[0].status, TxStatus::Success);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_attempts() {
        let h = harness();
        h.chain.fail_next_submits(3, "insufficient funds for gas");
        let deploy = DeployFeature::new(h.services.clone());

        let started = Instant::now();
        assert!(deploy.submit(named("Nova Cash", "NVC1")).await.is_err());
        let elapsed = started.elapsed();
        assert!(elapsed >= RETRY_DELAY * 2 && elapsed < RETRY_DELAY * 3);

        let messages = h.services.feed.messages_for("create");
        let failures: Vec<_> = messages
            .iter()
            .filter(|m| m.starts_with("ATTEMPT"))
            .cloned()
            .collect();
        assert_eq!(failures.len(), 3);
        assert_eq!(failures[2], "ATTEMPT 3 FAILED: insufficient funds for gas");
        assert!(messages.contains(&"Error: insufficient funds for gas".to_owned()));
        assert_eq!(
            messages.last().unwrap(),
            "Suggestion: Check internet or try again later."
        );
        assert!(h.services.history.all().is_empty());
    }

    #[tokio::test]
    async fn missing_event_and_revert_are_reported() -> anyhow::Result<()> {
        let h = harness();
        let deploy = DeployFeature::new(h.services.clone());

        let outcome = deploy.submit(named("Prime Pay", "PPY7")).await?;
        assert!(outcome.success);
        assert_eq!(outcome.token, None);
        assert!(
            h.services
                .feed
                .messages_for("create")
                .contains(&"WARNING: TOKEN_ADDRESS_NOT_FOUND".to_owned())
        );

        h.chain.revert(h.chain.peek_next_hash());
        let outcome = deploy.submit(named("Prime Pay", "PPY8")).await?;
        assert!(!outcome.success);
        assert_eq!(
            h.services.feed.messages_for("create").last().unwrap(),
            "TX_FAILED"
        );
        Ok(())
    }

    #[tokio::test]
    async fn role_grant_failure_is_logged() -> anyhow::Result<()> {
        let h = harness();
        h.chain.set_receipt_logs(vec![token_created_log()]);
        h.chain.fail_call("grantRole");
        let deploy = DeployFeature::new(h.services.clone());

        let outcome = deploy.submit(named("Nova Cash", "NVC1")).await?;
        assert_eq!(outcome.token, Some(CREATED));
        assert_eq!(
            h.services.feed.messages_for("create").last().unwrap(),
            "ROLE_GRANT_FAILED"
        );
        Ok(())
    }

    #[tokio::test]
    async fn blank_metadata_is_rejected() {
        let h = harness();
        let deploy = DeployFeature::new(h.services.clone());
        assert!(matches!(
            deploy.submit(named(" ", "X")).await,
            Err(FlowError::Validation(_))
        ));
        assert!(h.chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn random_form_generates_metadata() -> anyhow::Result<()> {
        let h = harness();
        let deploy = DeployFeature::new(h.services.clone());
        deploy
            .submit(DeployForm {
                use_random: true,
                ..Default::default()
            })
            .await?;
        assert!(
            h.services.feed.messages_for("create")[0].starts_with("Generated metadata: ")
        );
        Ok(())
    }
}
