use std::io::{Read, Write};

use ethers::types::{Address, Bytes, U256};
use serde::Serialize;
use tracing::info;

use super::{hex_string, Session};
use crate::cli::SignArgs;
use crate::core::errors::WalletError;
use crate::core::transaction::{
    parse_address, parse_amount, parse_data, Fees, SignedTransaction, SigningRequest, TxInput,
    TxParams,
};
use crate::hardware::sign_with;

/// `--json` output
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    pub chain_id: String,
    pub tx: String,
    pub txsig: String,
}

fn missing(flag: &str) -> WalletError {
    WalletError::InvalidInput(format!("missing {}", flag))
}

/// Merges flags over `input` into the sender and transaction fields.
pub fn tx_params(args: &SignArgs, input: &TxInput) -> Result<(Address, TxParams), WalletError> {
    let from = args
        .from
        .as_deref()
        .or(input.from.as_deref())
        .ok_or_else(|| missing("--from"))?;
    let from = parse_address(from)?;

    let to = args
        .to
        .as_deref()
        .or(input.to.as_deref())
        .filter(|s| !s.is_empty())
        .map(parse_address)
        .transpose()?;
    let data = match args.input.as_deref().or(input.data.as_deref()) {
        Some(text) => parse_data(text)?,
        None => Bytes::default(),
    };
    if to.is_none() && data.is_empty() {
        return Err(WalletError::InvalidInput(
            "either --to or --input must be provided".to_string(),
        ));
    }

    let nonce = args.nonce.or(input.tx_count).ok_or_else(|| missing("--nonce"))?;
    let gas_limit = args.gas_limit.or(input.gas).ok_or_else(|| missing("--gas-limit"))?;
    let chain_id = args.chain_id.or(input.chain_id).ok_or_else(|| missing("--chain-id"))?;
    let value = match args.value.as_deref().or(input.value.as_deref()) {
        Some(text) => parse_amount(text)?,
        None => U256::zero(),
    };

    let gas_price = args
        .gas_price
        .as_deref()
        .or(input.gas_price.as_deref())
        .map(parse_amount)
        .transpose()?;
    let gas_tip = args
        .gas_tip
        .as_deref()
        .or(input.gas_tip.as_deref())
        .map(parse_amount)
        .transpose()?;
    let max_fee = args.gas_max_fee.as_deref().map(parse_amount).transpose()?;

    let fees = match (gas_tip, max_fee.or(gas_price)) {
        (Some(priority_fee), Some(max_fee)) => Fees::Dynamic {
            max_fee,
            priority_fee,
        },
        (Some(_), None) => {
            return Err(WalletError::InvalidInput(
                "--gas-tip needs --gas-maxfee or --gas-price".to_string(),
            ))
        }
        (None, _) => Fees::Legacy {
            gas_price: gas_price.ok_or_else(|| {
                WalletError::InvalidInput(
                    "either --gas-price or --gas-tip with --gas-maxfee must be provided"
                        .to_string(),
                )
            })?,
        },
    };

    Ok((
        from,
        TxParams {
            chain_id,
            nonce: U256::from(nonce),
            to,
            value,
            data,
            gas_limit: U256::from(gas_limit),
            fees,
        },
    ))
}

/// `0x || r || s || v`, with `v` as injected into the transaction.
fn signature_hex(signed: &SignedTransaction) -> String {
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    signed.signature.r.to_big_endian(&mut r);
    signed.signature.s.to_big_endian(&mut s);
    format!("0x{}{}{:02x}", hex::encode(r), hex::encode(s), signed.signature.v)
}

pub fn sign_output(signed: &SignedTransaction, chain_id: u64, rpc_url: Option<String>) -> SignOutput {
    SignOutput {
        rpc_url,
        chain_id: chain_id.to_string(),
        tx: hex_string(&signed.raw),
        txsig: signature_hex(signed),
    }
}

fn read_stdin_input() -> Result<TxInput, WalletError> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn sign(session: &Session, args: &SignArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let input = if args.stdin {
        read_stdin_input()?
    } else {
        TxInput::default()
    };
    let (from, params) = tx_params(args, &input)?;
    let tx = params.build(from);
    let chain_id = params.chain_id;

    let signed = match session.keystore() {
        Some(keystore) => {
            let account = keystore.find(from)?;
            let password = session.password_for(&account)?;
            keystore.sign_transaction(&account, &password, &tx, chain_id)?
        }
        None => session.with_hardware_account(from, |wallet, account| {
            let path = account
                .path()
                .cloned()
                .ok_or_else(|| WalletError::InvalidPath("account has no derivation path".to_string()))?;
            sign_with(wallet, account, SigningRequest { path, tx, chain_id })
        })?,
    };
    info!(chain_id, bytes = signed.raw.len(), "transaction signed");

    let output = sign_output(&signed, chain_id, input.rpc_url);
    if args.json {
        writeln!(out, "{}", serde_json::to_string(&output)?)?;
    } else if args.sig {
        writeln!(out, "{}", output.txsig)?;
    } else {
        writeln!(out, "{}", output.tx)?;
    }
    Ok(())
}
