use std::io::Write;

use super::{hex_string, parse_input_bytes, Session};
use crate::cli::{RecoverArgs, SignMsgArgs};
use crate::core::account::checksum;
use crate::core::errors::WalletError;
use crate::core::message::{self, message_hash, with_eth_prefix};
use crate::core::transaction::parse_address;
use crate::hardware::ensure_sender;

fn message_bytes(data: &str, eth_prefix: bool) -> Result<Vec<u8>, WalletError> {
    let data = parse_input_bytes(data)?;
    Ok(if eth_prefix { with_eth_prefix(&data) } else { data })
}

/// Keystores sign `keccak256(message)`; hardware wallets apply the
/// personal-message header on the device.
pub fn sign_msg(session: &Session, args: &SignMsgArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let from = parse_address(&args.from)?;
    let message = message_bytes(&args.data, args.with_eth_prefix)?;

    let signature = match session.keystore() {
        Some(keystore) => {
            let account = keystore.find(from)?;
            let password = session.password_for(&account)?;
            keystore.sign_hash(&account, &password, message_hash(&message))?
        }
        None => session.with_hardware_account(from, |wallet, account| {
            let path = account
                .path()
                .ok_or_else(|| WalletError::InvalidPath("account has no derivation path".to_string()))?;
            let (signer, signature) = wallet.sign_message(path, &message)?;
            ensure_sender(account.address, signer)?;
            Ok(signature)
        })?,
    };

    writeln!(out, "{}", hex_string(&signature.to_rsv_bytes()))?;
    Ok(())
}

pub fn recover(args: &RecoverArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let message = message_bytes(&args.data, args.with_eth_prefix)?;
    let signature = parse_input_bytes(&args.sig)?;
    let address = message::recover(&message, &signature)?;
    writeln!(out, "{}", checksum(&address))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::{LocalWallet, Signer};
    use ethers::types::H256;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_recover_command_output() {
        let wallet: LocalWallet = KEY.parse().unwrap();
        let sig = wallet
            .sign_hash(H256::from(ethers::utils::keccak256(b"hello")))
            .unwrap();
        let args = RecoverArgs {
            data: "hello".to_string(),
            sig: format!("0x{}", hex::encode(sig.to_vec())),
            with_eth_prefix: false,
        };
        let mut out = Vec::new();
        recover(&args, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap().trim(),
            checksum(&wallet.address())
        );
    }

    #[test]
    fn test_recover_with_prefix_matches_personal_sign() {
        let wallet: LocalWallet = KEY.parse().unwrap();
        let sig = wallet
            .sign_hash(ethers::utils::hash_message(b"hi"))
            .unwrap();
        let args = RecoverArgs {
            data: "0x6869".to_string(),
            sig: format!("0x{}", hex::encode(sig.to_vec())),
            with_eth_prefix: true,
        };
        let mut out = Vec::new();
        recover(&args, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains(&checksum(&wallet.address())));
    }

    #[test]
    fn test_recover_rejects_bad_v() {
        let mut sig = vec![1u8; 65];
        sig[64] = 1;
        let args = RecoverArgs {
            data: "hello".to_string(),
            sig: hex_string(&sig),
            with_eth_prefix: false,
        };
        assert!(recover(&args, &mut Vec::<u8>::new()).is_err());
    }
}
