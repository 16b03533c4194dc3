//! Encrypted JSON keystore directory (Web3 Secret Storage files).

use std::fs;
use std::path::{Path, PathBuf};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, H256};
use secrecy::{ExposeSecret, SecretVec};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::account::{checksum, Account};
use crate::core::errors::WalletError;
use crate::core::signature::Signature;
use crate::core::transaction::SignedTransaction;
use crate::hardware::ensure_sender;

/// The only field read from a keystore file without decrypting it.
#[derive(Debug, Deserialize)]
struct KeyFileHeader {
    address: String,
}

/// Accounts stored as encrypted key files in one directory.
#[derive(Debug, Clone)]
pub struct Keystore {
    dir: PathBuf,
}

impl Keystore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every readable key file, sorted by file name. Files that are not
    /// keystores are skipped. A missing directory has no accounts.
    pub fn accounts(&self) -> Result<Vec<Account>, WalletError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut accounts = Vec::with_capacity(files.len());
        for file in files {
            match read_address(&file) {
                Ok(address) => accounts.push(Account::keystore(address, file)),
                Err(err) => debug!(file = %file.display(), error = %err, "not a keystore file"),
            }
        }
        Ok(accounts)
    }

    /// The single key file holding `address`.
    pub fn find(&self, address: Address) -> Result<Account, WalletError> {
        let mut matches: Vec<Account> = self
            .accounts()?
            .into_iter()
            .filter(|account| account.address == address)
            .collect();
        match matches.len() {
            0 => Err(WalletError::AccountNotFound(address)),
            1 => Ok(matches.remove(0)),
            count => {
                warn!(address = %checksum(&address), count, "several key files hold the account");
                Err(WalletError::AmbiguousAccount { address, count })
            }
        }
    }

    /// Generates a fresh key and stores it encrypted with `password`.
    pub fn new_account(&self, password: &str) -> Result<Account, WalletError> {
        fs::create_dir_all(&self.dir)?;
        let mut rng = rand::thread_rng();
        let (wallet, name) = LocalWallet::new_keystore(&self.dir, &mut rng, password, None)
            .map_err(|e| WalletError::Keystore(e.to_string()))?;
        let file = self.dir.join(name);
        restrict_permissions(&file);
        info!(address = %checksum(&wallet.address()), "created account");
        Ok(Account::keystore(wallet.address(), file))
    }

    /// Stores an existing hex private key encrypted with `password`.
    pub fn import_key(&self, private_key: &str, password: &str) -> Result<Account, WalletError> {
        let key = parse_private_key(private_key)?;
        // Refuse keys that would collide with an existing file.
        let address = LocalWallet::from_bytes(key.expose_secret())
            .map_err(|e| WalletError::InvalidInput(format!("invalid private key: {}", e)))?
            .address();
        if self.accounts()?.iter().any(|account| account.address == address) {
            return Err(WalletError::Keystore(format!(
                "account {} already exists",
                checksum(&address)
            )));
        }

        fs::create_dir_all(&self.dir)?;
        let mut rng = rand::thread_rng();
        let (_wallet, name) =
            LocalWallet::encrypt_keystore(&self.dir, &mut rng, key.expose_secret(), password, None)
                .map_err(|e| WalletError::Keystore(e.to_string()))?;
        let file = self.dir.join(name);
        restrict_permissions(&file);
        info!(address = %checksum(&address), "imported account");
        Ok(Account::keystore(address, file))
    }

    /// Decrypts the key file of `account`.
    pub fn unlock(&self, account: &Account, password: &str) -> Result<LocalWallet, WalletError> {
        let file = account.file().ok_or_else(|| {
            WalletError::Keystore(format!("{} is not a keystore account", account))
        })?;
        let wallet = LocalWallet::decrypt_keystore(file, password)
            .map_err(|e| WalletError::Keystore(format!("could not decrypt key: {}", e)))?;
        if wallet.address() != account.address {
            return Err(WalletError::Keystore(format!(
                "{} decrypts to {}",
                file.display(),
                checksum(&wallet.address())
            )));
        }
        Ok(wallet)
    }

    /// Signs `tx` for `chain_id` with the key of `account`.
    pub fn sign_transaction(
        &self,
        account: &Account,
        password: &str,
        tx: &TypedTransaction,
        chain_id: u64,
    ) -> Result<SignedTransaction, WalletError> {
        let wallet = self.unlock(account, password)?.with_chain_id(chain_id);
        let mut unsigned = tx.clone();
        unsigned.set_chain_id(chain_id);
        let raw = wallet.sign_transaction_sync(&unsigned)?;
        let injected = Signature::from(&raw).for_transaction(&unsigned, chain_id)?;
        let signed = SignedTransaction::new(unsigned, injected);
        ensure_sender(account.address, signed.sender()?)?;
        Ok(signed)
    }

    /// Signs a 32-byte digest as is.
    pub fn sign_hash(
        &self,
        account: &Account,
        password: &str,
        digest: H256,
    ) -> Result<Signature, WalletError> {
        let wallet = self.unlock(account, password)?;
        let raw = wallet.sign_hash(digest)?;
        Ok(Signature::from(&raw))
    }
}

fn read_address(file: &Path) -> Result<Address, WalletError> {
    let header: KeyFileHeader = serde_json::from_slice(&fs::read(file)?)?;
    let text = header.address.trim_start_matches("0x");
    let mut bytes = [0u8; 20];
    hex::decode_to_slice(text, &mut bytes)
        .map_err(|e| WalletError::Keystore(format!("address {:?}: {}", header.address, e)))?;
    Ok(Address::from(bytes))
}

fn parse_private_key(input: &str) -> Result<SecretVec<u8>, WalletError> {
    let text = input.trim();
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.len() != 64 {
        return Err(WalletError::InvalidInput(
            "private key must be 32 bytes of hex".to_string(),
        ));
    }
    let bytes = hex::decode(digits)
        .map_err(|e| WalletError::InvalidInput(format!("private key: {}", e)))?;
    Ok(SecretVec::new(bytes))
}

#[cfg(unix)]
fn restrict_permissions(file: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(file, fs::Permissions::from_mode(0o600)) {
        warn!(path = %file.display(), error = %e, "could not set 0o600 on key file");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(file: &Path) {
    debug!(path = %file.display(), "key file permissions left to the platform");
}
