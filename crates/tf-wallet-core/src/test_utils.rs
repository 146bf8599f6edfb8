use crate::app::WalletServices;
use crate::connector::ChainConnector;
use crate::polling::{PollingScheduler, Visibility};
use crate::registry::Container;
use alloy_primitives::{Address, B256, TxHash, U256, address};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tf_chain_client::{ChainClient, ChainConfig, ContractCall, ReceiptLog, TxReceipt};
use tf_storage::InMemoryStore;
use tokio::sync::watch;

pub const SIGNER: Address = address!("0x5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a");

#[derive(Default)]
struct MockState {
    decimals: HashMap<Address, u8>,
    symbols: HashMap<Address, String>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    roles: HashSet<(Address, B256, Address)>,
    unreadable: HashSet<Address>,
    drifting_balances: bool,
    balance_reads: u64,
    role_check_fails: bool,
    quote: Option<u128>,
    submit_failures: VecDeque<String>,
    fail_calls: HashSet<&'static str>,
    submitted: Vec<(ContractCall, u64)>,
    reverted: HashSet<TxHash>,
    receipt_logs: Vec<ReceiptLog>,
    fund_result: Option<Result<Vec<TxHash>, String>>,
    receipts_awaited: Vec<TxHash>,
    next_hash: u64,
}

/// In-process chain that records every submitted call.
pub struct MockChainClient {
    signer: Address,
    state: Mutex<MockState>,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    pub fn new() -> Self {
        Self {
            signer: SIGNER,
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn with_token(&self, token: Address, symbol: &str, decimals: u8) -> &Self {
        let mut state = self.state();
        state.symbols.insert(token, symbol.to_owned());
        state.decimals.insert(token, decimals);
        drop(state);
        self
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) -> &Self {
        self.state().balances.insert((token, owner), amount);
        self
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state()
            .allowances
            .insert((token, owner, spender), amount);
    }

    pub fn grant(&self, token: Address, role: B256, account: Address) {
        self.state().roles.insert((token, role, account));
    }

    /// Every balance read yields once, then returns `reads * 1_000_000`,
    /// so concurrent refreshes interleave and see different values.
    pub fn drift_balances(&self) {
        self.state().drifting_balances = true;
    }

    pub fn make_unreadable(&self, token: Address) {
        self.state().unreadable.insert(token);
    }

    pub fn fail_role_checks(&self) {
        self.state().role_check_fails = true;
    }

    pub fn set_quote(&self, quote: Option<u128>) {
        self.state().quote = quote;
    }

    /// The next `count` submissions fail with `message`.
    pub fn fail_next_submits(&self, count: usize, message: &str) {
        let mut state = self.state();
        for _ in 0..count {
            state.submit_failures.push_back(message.to_owned());
        }
    }

    /// Every submission of the named call fails.
    pub fn fail_call(&self, name: &'static str) {
        self.state().fail_calls.insert(name);
    }

    pub fn revert(&self, hash: TxHash) {
        self.state().reverted.insert(hash);
    }

    pub fn set_receipt_logs(&self, logs: Vec<ReceiptLog>) {
        self.state().receipt_logs = logs;
    }

    pub fn set_fund_result(&self, result: Result<Vec<TxHash>, String>) {
        self.state().fund_result = Some(result);
    }

    pub fn submitted(&self) -> Vec<ContractCall> {
        self.state()
            .submitted
            .iter()
            .map(|(call, _)| call.clone())
            .collect()
    }

    pub fn submitted_with_gas(&self) -> Vec<(ContractCall, u64)> {
        self.state().submitted.clone()
    }

    pub fn receipts_awaited(&self) -> Vec<TxHash> {
        self.state().receipts_awaited.clone()
    }

    /// Hash the next successful submission will return.
    pub fn peek_next_hash(&self) -> TxHash {
        hash_for(self.state().next_hash + 1)
    }
}

fn hash_for(n: u64) -> TxHash {
    B256::from(U256::from(n))
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        let state = self.state();
        if state.unreadable.contains(&token) {
            return Err(anyhow!("call reverted"));
        }
        state
            .decimals
            .get(&token)
            .copied()
            .ok_or_else(|| anyhow!("no contract at {token}"))
    }

    async fn symbol(&self, token: Address) -> Result<String> {
        let state = self.state();
        if state.unreadable.contains(&token) {
            return Err(anyhow!("call reverted"));
        }
        state
            .symbols
            .get(&token)
            .cloned()
            .ok_or_else(|| anyhow!("no contract at {token}"))
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let drifting = self.state().drifting_balances;
        if drifting {
            tokio::task::yield_now().await;
        }
        let mut state = self.state();
        if state.unreadable.contains(&token) || !state.decimals.contains_key(&token) {
            return Err(anyhow!("call reverted"));
        }
        if drifting {
            state.balance_reads += 1;
            return Ok(U256::from(state.balance_reads * 1_000_000));
        }
        Ok(state
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        Ok(self
            .state()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn has_role(&self, token: Address, role: B256, account: Address) -> Result<bool> {
        let state = self.state();
        if state.role_check_fails {
            return Err(anyhow!("execution reverted"));
        }
        Ok(state.roles.contains(&(token, role, account)))
    }

    async fn quote_swap_exact_amount_in(
        &self,
        _dex: Address,
        _token_in: Address,
        _token_out: Address,
        _amount_in: u128,
    ) -> Result<u128> {
        self.state()
            .quote
            .ok_or_else(|| anyhow!("execution reverted: PairDoesNotExist()"))
    }

    async fn submit(&self, call: ContractCall, gas_limit: u64) -> Result<TxHash> {
        let mut state = self.state();
        if let Some(message) = state.submit_failures.pop_front() {
            return Err(anyhow!(message));
        }
        if state.fail_calls.contains(call.name()) {
            return Err(anyhow!("{} failed: execution reverted", call.name()));
        }
        match &call {
            ContractCall::GrantRole {
                token,
                role,
                account,
            } => {
                state.roles.insert((*token, *role, *account));
            }
            ContractCall::Approve {
                token,
                spender,
                amount,
            } => {
                let owner = self.signer;
                state.allowances.insert((*token, owner, *spender), *amount);
            }
            _ => {}
        }
        state.next_hash += 1;
        let hash = hash_for(state.next_hash);
        state.submitted.push((call, gas_limit));
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt> {
        let mut state = self.state();
        state.receipts_awaited.push(hash);
        Ok(TxReceipt {
            hash,
            success: !state.reverted.contains(&hash),
            logs: state.receipt_logs.clone(),
        })
    }

    async fn fund_address(&self, _address: Address) -> Result<Vec<TxHash>> {
        match self.state().fund_result.clone() {
            Some(Ok(hashes)) => Ok(hashes),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("the method tempo_fundAddress does not exist")),
        }
    }
}

/// Container that keeps rendered lines for inspection.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    lines: Arc<Mutex<Vec<String>>>,
}

impl SharedBuffer {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn text(&self) -> String {
        self.lines().join("\n")
    }
}

impl Container for SharedBuffer {
    fn clear(&mut self) {
        self.lines.lock().unwrap().clear();
    }

    fn heading(&mut self, text: &str) {
        self.lines.lock().unwrap().push(format!("# {text}"));
    }

    fn line(&mut self, text: &str) {
        self.lines.lock().unwrap().push(text.to_owned());
    }
}

pub struct Harness {
    pub chain: Arc<MockChainClient>,
    pub services: Arc<WalletServices>,
    pub visibility: watch::Sender<Visibility>,
}

/// Services over a mock chain and in-memory storage. The poll timer is
/// parked behind a hidden surface so only explicit refreshes run.
pub fn harness() -> Harness {
    let chain = Arc::new(MockChainClient::new());
    let config = ChainConfig::default();
    for token in &config.tokens {
        chain.with_token(token.address, &token.symbol, 6);
    }

    let (visibility, rx) = watch::channel(Visibility::Hidden);
    let scheduler = Arc::new(PollingScheduler::spawn(Duration::from_secs(20), rx));
    let connector = ChainConnector::new(chain.clone(), config);
    let services = WalletServices::new(connector, Arc::new(InMemoryStore::default()), scheduler);

    Harness {
        chain,
        services,
        visibility,
    }
}
