use std::io::Write;

use tracing::info;

use super::Session;
use crate::core::account::{checksum, Account};
use crate::core::errors::WalletError;
use crate::hardware::resolver::list_accounts;

fn print_account(out: &mut dyn Write, account: &Account, verbose: bool) -> std::io::Result<()> {
    if verbose {
        writeln!(out, "{}", account)
    } else {
        writeln!(out, "{}", checksum(&account.address))
    }
}

/// Keystore accounts, or the accounts every attached device derives.
pub fn list(session: &Session, verbose: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    if let Some(keystore) = session.keystore() {
        let accounts = keystore.accounts()?;
        info!("found {} account(s) in {}", accounts.len(), keystore.dir().display());
        for account in &accounts {
            print_account(out, account, verbose)?;
        }
        return Ok(());
    }

    let mut wallets = session.open_wallets()?;
    for wallet in wallets.iter_mut() {
        session.prompt().status(&format!("Wallet status: {}", wallet.status()));
        let accounts = list_accounts(
            wallet.as_mut(),
            &session.config.templates,
            session.config.max_index,
        )?;
        for account in &accounts {
            print_account(out, account, verbose)?;
        }
    }
    Ok(())
}

pub fn new_account(session: &Session, out: &mut dyn Write) -> anyhow::Result<()> {
    let keystore = session.require_keystore()?;
    let password = session
        .prompt()
        .read_new_password()
        .map_err(|source| WalletError::Prompt { what: "password", source })?;
    let account = keystore.new_account(&password)?;
    writeln!(out, "{}", account)?;
    Ok(())
}

pub fn import_key(session: &Session, out: &mut dyn Write) -> anyhow::Result<()> {
    let keystore = session.require_keystore()?;
    let key = session
        .prompt()
        .read_secret("Private key (hex): ")
        .map_err(|source| WalletError::Prompt { what: "private key", source })?;
    let password = session
        .prompt()
        .read_new_password()
        .map_err(|source| WalletError::Prompt { what: "password", source })?;
    let account = keystore.import_key(&key, &password)?;
    writeln!(out, "{}", account)?;
    Ok(())
}

/// One line per discovered device: label and connection status.
pub fn status(session: &Session, out: &mut dyn Write) -> anyhow::Result<()> {
    for wallet in session.open_wallets()? {
        writeln!(out, "{}: {}", wallet.label(), wallet.status())?;
    }
    Ok(())
}
