use alloy_primitives::Address;
use anyhow::{Result, anyhow};
use std::sync::Arc;
use tf_crypto::{DEFAULT_KDF_ITERATIONS, WalletKey, decrypt_key, encrypt_key_with_iterations};
use tf_storage::{CredentialStore, KeyValueStore};
use tracing::info;

/// Local key custody for the single wallet account.
pub struct AccountManager {
    credentials: CredentialStore,
    kdf_iterations: u32,
}

impl AccountManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            credentials: CredentialStore::new(store),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
        }
    }

    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }

    pub fn has_wallet(&self) -> Result<bool> {
        self.credentials.exists()
    }

    /// Generates a fresh key and overwrites any stored credential.
    pub fn create_wallet(&self, password: &str) -> Result<Address> {
        self.store_key(&WalletKey::new_random(), password)
    }

    pub fn import_wallet(&self, private_key_hex: &str, password: &str) -> Result<Address> {
        let key = WalletKey::from_private_key_hex(private_key_hex)?;
        self.store_key(&key, password)
    }

    pub fn unlock(&self, password: &str) -> Result<WalletKey> {
        let record = self
            .credentials
            .load()?
            .ok_or_else(|| anyhow!("no wallet found"))?;
        let key = decrypt_key(&record, password)?;
        info!(address = %key.address(), "wallet unlocked");
        Ok(key)
    }

    /// Deletes the stored credential. Irreversible without the private key.
    pub fn reset(&self) -> Result<()> {
        self.credentials.clear()?;
        info!("wallet credential removed");
        Ok(())
    }

    fn store_key(&self, key: &WalletKey, password: &str) -> Result<Address> {
        let record = encrypt_key_with_iterations(key, password, self.kdf_iterations)?;
        self.credentials.save(&record)?;
        info!(address = %record.address, "wallet credential stored");
        Ok(record.address)
    }
}
