//! Account resolution across attached hardware wallets
//!
//! Each wallet is searched template by template over indices
//! `0..=max_index`. The first wallet with exactly one matching path wins.

use ethers::types::Address;

use super::HwWallet;
use crate::core::account::{checksum, Account};
use crate::core::derivation::PathTemplate;
use crate::core::errors::WalletError;
use tracing::{debug, warn};

/// Every account `wallet` derives for `templates` over `0..=max_index`,
/// template-major.
pub fn list_accounts(
    wallet: &mut dyn HwWallet,
    templates: &[PathTemplate],
    max_index: u32,
) -> Result<Vec<Account>, WalletError> {
    let mut accounts = Vec::new();
    for template in templates {
        for index in 0..=max_index {
            let path = template.instantiate(index)?;
            let address = wallet.derive(&path)?;
            accounts.push(Account::derived(address, wallet.scheme(), path));
        }
    }
    Ok(accounts)
}

/// All accounts on one wallet that derive to `address`.
fn matches_on(
    wallet: &mut dyn HwWallet,
    address: Address,
    templates: &[PathTemplate],
    max_index: u32,
) -> Result<Vec<Account>, WalletError> {
    let mut found = Vec::new();
    for template in templates {
        for index in 0..=max_index {
            let path = template.instantiate(index)?;
            if wallet.derive(&path)? == address {
                debug!(path = %path, "{} matches", wallet.label());
                found.push(Account::derived(address, wallet.scheme(), path));
            }
        }
    }
    Ok(found)
}

/// Finds the one wallet and path that derive `address`.
///
/// A wallet with no match, several matches or a derivation failure is
/// logged and skipped. When no wallet has a unique match the error is
/// `AmbiguousAccount` if any wallet had several, otherwise the first device
/// error, otherwise `AccountNotFound`.
pub fn resolve<'a>(
    wallets: &'a mut [Box<dyn HwWallet>],
    address: Address,
    templates: &[PathTemplate],
    max_index: u32,
) -> Result<(&'a mut dyn HwWallet, Account), WalletError> {
    let mut ambiguous: Option<usize> = None;
    let mut first_error: Option<WalletError> = None;

    for i in 0..wallets.len() {
        let label = wallets[i].label();
        match matches_on(wallets[i].as_mut(), address, templates, max_index) {
            Ok(mut found) if found.len() == 1 => {
                let account = found.remove(0);
                return Ok((wallets[i].as_mut(), account));
            }
            Ok(found) if found.is_empty() => {
                warn!(wallet = %label, "{} not found", checksum(&address));
            }
            Ok(found) => {
                warn!(
                    wallet = %label,
                    matches = found.len(),
                    "{} derives from several paths",
                    checksum(&address)
                );
                ambiguous.get_or_insert(found.len());
            }
            Err(err) => {
                warn!(wallet = %label, error = %err, "derivation failed");
                first_error.get_or_insert(err);
            }
        }
    }

    if let Some(count) = ambiguous {
        return Err(WalletError::AmbiguousAccount { address, count });
    }
    Err(first_error.unwrap_or(WalletError::AccountNotFound(address)))
}
