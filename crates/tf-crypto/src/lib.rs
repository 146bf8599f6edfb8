use alloy_primitives::{Address, B256, hex};
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Result, anyhow};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroize;

pub const CREDENTIAL_VERSION: u8 = 1;
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

const SALT_LEN: usize = 16;
const MAC_DOMAIN: &[u8] = b"tempoflow:v1:mac";

/// secp256k1 key that signs for the wallet's single account.
pub struct WalletKey {
    signer: PrivateKeySigner,
}

impl WalletKey {
    pub fn new_random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// Accepts a 32-byte hex private key, with or without the `0x` prefix.
    pub fn from_private_key_hex(input: &str) -> Result<Self> {
        let signer = input
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|err| anyhow!("invalid private key: {err}"))?;
        Ok(Self { signer })
    }

    pub fn from_secret_key_bytes(secret_key: [u8; 32]) -> Result<Self> {
        let signer = PrivateKeySigner::from_bytes(&B256::from(secret_key))
            .map_err(|err| anyhow!("invalid private key: {err}"))?;
        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signer.to_bytes().0
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn into_signer(self) -> PrivateKeySigner {
        self.signer
    }
}

impl fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletKey")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Password-encrypted private key as persisted in the credential slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedKey {
    pub version: u8,
    pub address: Address,
    pub salt: String,
    pub iterations: u32,
    pub ciphertext: String,
    pub mac: String,
}

pub fn encrypt_key(key: &WalletKey, password: &str) -> Result<EncryptedKey> {
    encrypt_key_with_iterations(key, password, DEFAULT_KDF_ITERATIONS)
}

pub fn encrypt_key_with_iterations(
    key: &WalletKey,
    password: &str,
    iterations: u32,
) -> Result<EncryptedKey> {
    if password.is_empty() {
        return Err(anyhow!("password cannot be empty"));
    }
    if iterations == 0 {
        return Err(anyhow!("kdf iterations must be greater than 0"));
    }

    let mut salt = [0_u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut derived = derive_key(password, &salt, iterations);
    let mut secret_key = key.secret_key_bytes();
    let ciphertext = apply_key_stream(&secret_key, &derived);
    let mac = compute_mac(&derived, &ciphertext);

    secret_key.zeroize();
    derived.zeroize();

    Ok(EncryptedKey {
        version: CREDENTIAL_VERSION,
        address: key.address(),
        salt: hex::encode(salt),
        iterations,
        ciphertext: hex::encode(ciphertext),
        mac: hex::encode(mac),
    })
}

pub fn decrypt_key(record: &EncryptedKey, password: &str) -> Result<WalletKey> {
    if password.is_empty() {
        return Err(anyhow!("password cannot be empty"));
    }
    if record.version != CREDENTIAL_VERSION {
        return Err(anyhow!("unsupported credential version {}", record.version));
    }

    let salt = hex::decode(&record.salt).map_err(|err| anyhow!("corrupt credential salt: {err}"))?;
    let ciphertext = hex::decode(&record.ciphertext)
        .map_err(|err| anyhow!("corrupt credential ciphertext: {err}"))?;
    let mac = hex::decode(&record.mac).map_err(|err| anyhow!("corrupt credential mac: {err}"))?;

    if ciphertext.len() != 32 {
        return Err(anyhow!("invalid encrypted key length"));
    }

    let mut derived = derive_key(password, &salt, record.iterations);
    if compute_mac(&derived, &ciphertext).as_slice() != mac.as_slice() {
        derived.zeroize();
        return Err(anyhow!("invalid password"));
    }

    let plain = apply_key_stream(&ciphertext, &derived);
    derived.zeroize();

    let mut secret_key = [0_u8; 32];
    secret_key.copy_from_slice(&plain);
    let key = WalletKey::from_secret_key_bytes(secret_key);
    secret_key.zeroize();
    let key = key?;

    if key.address() != record.address {
        return Err(anyhow!("credential address does not match decrypted key"));
    }

    Ok(key)
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let mut block = finalize_block(hasher);

    for _ in 1..iterations {
        let mut hasher = Sha256::new();
        hasher.update(block);
        hasher.update(password.as_bytes());
        block = finalize_block(hasher);
    }

    block
}

fn finalize_block(hasher: Sha256) -> [u8; 32] {
    let mut block = [0_u8; 32];
    block.copy_from_slice(&hasher.finalize());
    block
}

fn apply_key_stream(input: &[u8], key: &[u8; 32]) -> Vec<u8> {
    let mut key_stream = derive_key_stream(key, input.len());
    let output = input
        .iter()
        .zip(key_stream.iter())
        .map(|(byte, mask)| byte ^ mask)
        .collect();
    key_stream.zeroize();
    output
}

fn derive_key_stream(seed: &[u8], len: usize) -> Vec<u8> {
    let mut stream = Vec::with_capacity(len);
    let mut counter: u64 = 0;
    while stream.len() < len {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(counter.to_le_bytes());
        let block = hasher.finalize();
        for byte in block {
            if stream.len() == len {
                break;
            }
            stream.push(byte);
        }
        counter += 1;
    }
    stream
}

fn compute_mac(key: &[u8; 32], ciphertext: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(MAC_DOMAIN);
    hasher.update(key);
    hasher.update(ciphertext);
    finalize_block(hasher)
}
