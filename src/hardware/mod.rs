//! Hardware wallet integration
//!
//! Vendor-neutral wallet trait, device discovery and account resolution.
//! The protocol code is always compiled; opening real USB devices needs the
//! `trezor` or `ledger` feature.

pub mod hid;
pub mod ledger;
pub mod padding;
pub mod resolver;
pub mod trezor;

use std::rc::Rc;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::Address;

use crate::core::account::{Account, Scheme};
use crate::core::derivation::DerivationPath;
use crate::core::errors::WalletError;
use crate::core::signature::Signature;
use crate::core::transaction::{SignedTransaction, SigningRequest};
use crate::ui::Prompt;

pub use ledger::LedgerDevice;
pub use resolver::resolve;
pub use trezor::TrezorDevice;

/// Operations every hardware wallet offers. Callers only ever see
/// `Box<dyn HwWallet>`.
pub trait HwWallet {
    fn scheme(&self) -> Scheme;

    /// One-line connection status.
    fn status(&self) -> String;

    fn label(&self) -> String;

    fn derive(&mut self, path: &DerivationPath) -> Result<Address, WalletError>;

    /// Signs `tx` for `chain_id` and returns the recovered sender with the
    /// signed transaction.
    fn sign_transaction(
        &mut self,
        path: &DerivationPath,
        tx: &TypedTransaction,
        chain_id: u64,
    ) -> Result<(Address, SignedTransaction), WalletError>;

    fn sign_message(
        &mut self,
        path: &DerivationPath,
        message: &[u8],
    ) -> Result<(Address, Signature), WalletError>;

    fn encrypt(
        &mut self,
        path: &DerivationPath,
        key: &str,
        data: &[u8],
        ask_on_encrypt: bool,
        ask_on_decrypt: bool,
    ) -> Result<Vec<u8>, WalletError>;

    fn decrypt(
        &mut self,
        path: &DerivationPath,
        key: &str,
        data: &[u8],
        ask_on_encrypt: bool,
        ask_on_decrypt: bool,
    ) -> Result<Vec<u8>, WalletError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Trezor,
    Ledger,
}

impl From<Vendor> for Scheme {
    fn from(vendor: Vendor) -> Self {
        match vendor {
            Vendor::Trezor => Scheme::Trezor,
            Vendor::Ledger => Scheme::Ledger,
        }
    }
}

/// Opens and initializes every attached device of `vendor`. Devices that
/// fail to open or initialize are logged and left out.
pub fn discover(vendor: Vendor, prompt: Rc<dyn Prompt>) -> Result<Vec<Box<dyn HwWallet>>, WalletError> {
    match vendor {
        Vendor::Trezor => discover_trezor(prompt),
        Vendor::Ledger => discover_ledger(),
    }
}

#[cfg(feature = "trezor")]
fn discover_trezor(prompt: Rc<dyn Prompt>) -> Result<Vec<Box<dyn HwWallet>>, WalletError> {
    let candidates = hid::open_matching(&trezor::TREZOR_FILTER)?;
    Ok(hid::initialize_each("trezor", candidates, |link| {
        TrezorDevice::open(link, prompt.clone()).map(|d| Box::new(d) as Box<dyn HwWallet>)
    }))
}

#[cfg(not(feature = "trezor"))]
fn discover_trezor(_prompt: Rc<dyn Prompt>) -> Result<Vec<Box<dyn HwWallet>>, WalletError> {
    Err(WalletError::NotSupported(
        "built without the `trezor` feature".to_string(),
    ))
}

#[cfg(feature = "ledger")]
fn discover_ledger() -> Result<Vec<Box<dyn HwWallet>>, WalletError> {
    let candidates = hid::open_matching(&ledger::LEDGER_FILTER)?;
    Ok(hid::initialize_each("ledger", candidates, |link| {
        LedgerDevice::open(link).map(|d| Box::new(d) as Box<dyn HwWallet>)
    }))
}

#[cfg(not(feature = "ledger"))]
fn discover_ledger() -> Result<Vec<Box<dyn HwWallet>>, WalletError> {
    Err(WalletError::NotSupported(
        "built without the `ledger` feature".to_string(),
    ))
}

/// Signs one request with `wallet` and checks that the recovered sender is
/// the account the request was resolved for.
pub fn sign_with(
    wallet: &mut dyn HwWallet,
    account: &Account,
    request: SigningRequest,
) -> Result<SignedTransaction, WalletError> {
    let SigningRequest { path, tx, chain_id } = request;
    let (sender, signed) = wallet.sign_transaction(&path, &tx, chain_id)?;
    ensure_sender(account.address, sender)?;
    Ok(signed)
}

pub fn ensure_sender(expected: Address, actual: Address) -> Result<(), WalletError> {
    if expected != actual {
        return Err(WalletError::SenderMismatch { expected, actual });
    }
    Ok(())
}
