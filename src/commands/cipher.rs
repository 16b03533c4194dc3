use std::io::Write;

use super::{hex_string, parse_input_bytes, Session};
use crate::cli::CipherArgs;
use crate::core::errors::WalletError;
use crate::core::transaction::parse_address;

/// Device confirmation is requested for both directions; decrypt must use
/// the same flags the data was encrypted with.
const ASK_ON_ENCRYPT: bool = true;
const ASK_ON_DECRYPT: bool = true;

fn run_cipher(session: &Session, args: &CipherArgs, encrypt: bool) -> Result<Vec<u8>, WalletError> {
    let from = parse_address(&args.from)?;
    let key = String::from_utf8(parse_input_bytes(&args.key)?)
        .map_err(|_| WalletError::InvalidInput("cipher key must be UTF-8".to_string()))?;
    let data = parse_input_bytes(&args.data)?;

    session.with_hardware_account(from, |wallet, account| {
        let path = account
            .path()
            .ok_or_else(|| WalletError::InvalidPath("account has no derivation path".to_string()))?;
        if encrypt {
            wallet.encrypt(path, &key, &data, ASK_ON_ENCRYPT, ASK_ON_DECRYPT)
        } else {
            wallet.decrypt(path, &key, &data, ASK_ON_ENCRYPT, ASK_ON_DECRYPT)
        }
    })
}

pub fn encrypt(session: &Session, args: &CipherArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let encrypted = run_cipher(session, args, true)?;
    writeln!(out, "{}", hex_string(&encrypted))?;
    Ok(())
}

pub fn decrypt(session: &Session, args: &CipherArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let decrypted = run_cipher(session, args, false)?;
    out.write_all(&decrypted)?;
    Ok(())
}
