use std::fmt;
use std::path::PathBuf;

use ethers::types::Address;
use ethers::utils::to_checksum;
use serde::Serialize;

use crate::core::derivation::DerivationPath;

/// Where an account's key material lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Keystore,
    Trezor,
    Ledger,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Keystore => "keystore",
            Scheme::Trezor => "trezor",
            Scheme::Ledger => "ledger",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountLocation {
    Path(DerivationPath),
    File(PathBuf),
}

impl fmt::Display for AccountLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountLocation::Path(path) => write!(f, "{}", path),
            AccountLocation::File(file) => write!(f, "{}", file.display()),
        }
    }
}

/// An address together with the wallet and path (or file) that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub scheme: Scheme,
    pub location: AccountLocation,
}

impl Account {
    pub fn derived(address: Address, scheme: Scheme, path: DerivationPath) -> Self {
        Self {
            address,
            scheme,
            location: AccountLocation::Path(path),
        }
    }

    pub fn keystore(address: Address, file: PathBuf) -> Self {
        Self {
            address,
            scheme: Scheme::Keystore,
            location: AccountLocation::File(file),
        }
    }

    pub fn path(&self) -> Option<&DerivationPath> {
        match &self.location {
            AccountLocation::Path(path) => Some(path),
            AccountLocation::File(_) => None,
        }
    }

    pub fn file(&self) -> Option<&PathBuf> {
        match &self.location {
            AccountLocation::File(file) => Some(file),
            AccountLocation::Path(_) => None,
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}://{}",
            checksum(&self.address),
            self.scheme,
            self.location
        )
    }
}

/// EIP-55 checksummed hex form of an address.
pub fn checksum(address: &Address) -> String {
    to_checksum(address, None)
}
