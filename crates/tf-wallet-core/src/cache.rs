use alloy_primitives::Address;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tf_api_types::BalanceSnapshot;
use tf_storage::epoch_ms;
use tokio::time::Instant;

pub const STALE_AFTER: Duration = Duration::from_secs(30);

#[derive(Default)]
struct CacheState {
    address: Option<Address>,
    balances: Vec<BalanceSnapshot>,
    updated_at: Option<Instant>,
    updated_epoch_ms: u64,
}

/// Last balance snapshot for the unlocked account. Each write replaces the
/// whole list, so readers never see a partial refresh.
#[derive(Default)]
pub struct BalanceCache {
    state: RwLock<CacheState>,
}

impl BalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_address(&self, address: Address) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .address = Some(address);
    }

    pub fn address(&self) -> Option<Address> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .address
    }

    pub fn set_balances(&self, balances: Vec<BalanceSnapshot>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.balances = balances;
        state.updated_at = Some(Instant::now());
        state.updated_epoch_ms = epoch_ms();
    }

    pub fn balances(&self) -> Vec<BalanceSnapshot> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .balances
            .clone()
    }

    pub fn has_data(&self) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.address.is_some() && !state.balances.is_empty()
    }

    /// Wall-clock time of the last `set_balances`, 0 before the first.
    pub fn last_updated_ms(&self) -> u64 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .updated_epoch_ms
    }

    pub fn is_stale(&self) -> bool {
        match self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .updated_at
        {
            Some(at) => at.elapsed() > STALE_AFTER,
            None => true,
        }
    }
}
