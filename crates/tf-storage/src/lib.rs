use alloy_primitives::{Address, TxHash};
use anyhow::{Context, Result, anyhow};
use rocksdb::{DB, Options};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tf_api_types::{HistoryEntry, NewHistoryEntry, TokenDescriptor, TxStatus};
use tf_crypto::EncryptedKey;
use tracing::warn;
use uuid::Uuid;

pub const WALLET_SLOT: &str = "tempo_local_wallet";
pub const USER_TOKENS_SLOT: &str = "tempo_user_tokens";
pub const HISTORY_SLOT: &str = "tempo_tx_history";
pub const MAX_HISTORY_ENTRIES: usize = 50;

/// String-keyed persistent slots. Calls are synchronous and each one is
/// atomic on its own.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryStore {
    slots: RwLock<HashMap<String, String>>,
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self
            .slots
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self
            .slots
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self
            .slots
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        guard.remove(key);
        Ok(())
    }
}

pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DB::open(&options, path)
            .with_context(|| format!("failed to open rocksdb at {}", path.display()))?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.db.get(key.as_bytes())? {
            Some(raw) => Ok(Some(
                String::from_utf8(raw).with_context(|| format!("slot {key} is not utf-8"))?,
            )),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db.put(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db.delete(key.as_bytes())?;
        Ok(())
    }
}

pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// The single encrypted credential slot.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.store.get(WALLET_SLOT)?.is_some())
    }

    pub fn save(&self, record: &EncryptedKey) -> Result<()> {
        let value = serde_json::to_string(record)?;
        self.store.set(WALLET_SLOT, &value)
    }

    pub fn load(&self) -> Result<Option<EncryptedKey>> {
        match self.store.get(WALLET_SLOT)? {
            Some(raw) => Ok(Some(
                serde_json::from_str(&raw).context("credential record is corrupt")?,
            )),
            None => Ok(None),
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(WALLET_SLOT)
    }
}

/// Tokens the user imported on top of the configured list.
#[derive(Clone)]
pub struct UserTokenList {
    store: Arc<dyn KeyValueStore>,
    lock: Arc<Mutex<()>>,
}

impl UserTokenList {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn all(&self) -> Vec<TokenDescriptor> {
        let raw = match self.store.get(USER_TOKENS_SLOT) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "failed to read user tokens");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(error = %err, "user token list is corrupt, ignoring");
            Vec::new()
        })
    }

    /// Returns `false` when a token with the same address is already listed.
    pub fn import(&self, token: TokenDescriptor) -> Result<bool> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("token list lock poisoned"))?;
        let mut tokens = self.all();
        if tokens.iter().any(|t| t.address == token.address) {
            return Ok(false);
        }
        tokens.push(token);
        self.store
            .set(USER_TOKENS_SLOT, &serde_json::to_string(&tokens)?)?;
        Ok(true)
    }

    pub fn remove(&self, address: Address) -> Result<bool> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("token list lock poisoned"))?;
        let mut tokens = self.all();
        let before = tokens.len();
        tokens.retain(|t| t.address != address);
        if tokens.len() == before {
            return Ok(false);
        }
        self.store
            .set(USER_TOKENS_SLOT, &serde_json::to_string(&tokens)?)?;
        Ok(true)
    }
}

/// Persisted transaction history, newest first.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    lock: Arc<Mutex<()>>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn next_id(timestamp: u64) -> String {
        let random = Uuid::new_v4().simple().to_string();
        format!("{timestamp}-{}", &random[..9])
    }

    pub fn add(&self, entry: NewHistoryEntry) -> Result<HistoryEntry> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        let timestamp = epoch_ms();
        let record = HistoryEntry {
            id: Self::next_id(timestamp),
            kind: entry.kind,
            hash: entry.hash,
            timestamp,
            status: entry.status,
            details: entry.details,
        };

        let mut entries = self.all();
        entries.insert(0, record.clone());
        entries.truncate(MAX_HISTORY_ENTRIES);
        self.persist(&entries)?;
        Ok(record)
    }

    /// Updates the first entry with `hash`. Returns whether one matched.
    pub fn update_status(&self, hash: TxHash, status: TxStatus) -> Result<bool> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        let mut entries = self.all();
        let Some(entry) = entries.iter_mut().find(|e| e.hash == hash) else {
            return Ok(false);
        };
        entry.status = status;
        self.persist(&entries)?;
        Ok(true)
    }

    pub fn all(&self) -> Vec<HistoryEntry> {
        let raw = match self.store.get(HISTORY_SLOT) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "failed to read transaction history");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(error = %err, "transaction history is corrupt, ignoring");
            Vec::new()
        })
    }

    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let mut entries = self.all();
        entries.truncate(limit);
        entries
    }

    pub fn clear(&self) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        self.store.remove(HISTORY_SLOT)
    }

    fn persist(&self, entries: &[HistoryEntry]) -> Result<()> {
        let value = serde_json::to_string(entries)?;
        self.store.set(HISTORY_SLOT, &value)
    }
}
