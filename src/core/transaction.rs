//! Transaction building, amount parsing and the signing request / result
//! types handed across the wallet boundary.

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, Bytes, Eip1559TransactionRequest, Signature as EthSignature, TransactionRequest,
    U256,
};
use ethers::utils::parse_units;
use serde::Deserialize;

use crate::core::derivation::DerivationPath;
use crate::core::errors::WalletError;

/// Parses an amount in wei.
///
/// Accepted forms: `21000` (decimal wei), `0x5208` (hex wei) and a decimal
/// number followed by a unit, e.g. `1.5gwei`, `0.01 eth`, `3wei`.
pub fn parse_amount(input: &str) -> Result<U256, WalletError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(WalletError::InvalidInput("empty amount".to_string()));
    }

    if let Some(hex_digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return U256::from_str_radix(hex_digits, 16)
            .map_err(|e| WalletError::InvalidInput(format!("{}: {}", text, e)));
    }

    if text.bytes().all(|b| b.is_ascii_digit()) {
        return U256::from_dec_str(text)
            .map_err(|e| WalletError::InvalidInput(format!("{}: {}", text, e)));
    }

    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| WalletError::InvalidInput(format!("invalid amount: {}", text)))?;
    let (number, unit) = text.split_at(split);
    let unit = match unit.trim().to_ascii_lowercase().as_str() {
        "wei" => "wei",
        "gwei" => "gwei",
        "eth" | "ether" => "ether",
        other => {
            return Err(WalletError::InvalidInput(format!(
                "unknown unit {:?} in {}",
                other, text
            )))
        }
    };
    let parsed = parse_units(number.trim(), unit)
        .map_err(|e| WalletError::InvalidInput(format!("{}: {}", text, e)))?;
    Ok(parsed.into())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fees {
    Legacy { gas_price: U256 },
    Dynamic { max_fee: U256, priority_fee: U256 },
}

/// The fields needed to build one unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxParams {
    pub chain_id: u64,
    pub nonce: U256,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: U256,
    pub fees: Fees,
}

impl TxParams {
    pub fn build(&self, from: Address) -> TypedTransaction {
        match &self.fees {
            Fees::Legacy { gas_price } => {
                let mut req = TransactionRequest::new()
                    .from(from)
                    .nonce(self.nonce)
                    .gas_price(*gas_price)
                    .gas(self.gas_limit)
                    .value(self.value)
                    .data(self.data.clone())
                    .chain_id(self.chain_id);
                if let Some(to) = self.to {
                    req = req.to(to);
                }
                req.into()
            }
            Fees::Dynamic {
                max_fee,
                priority_fee,
            } => {
                let mut req = Eip1559TransactionRequest::new()
                    .from(from)
                    .nonce(self.nonce)
                    .max_fee_per_gas(*max_fee)
                    .max_priority_fee_per_gas(*priority_fee)
                    .gas(self.gas_limit)
                    .value(self.value)
                    .data(self.data.clone())
                    .chain_id(self.chain_id);
                if let Some(to) = self.to {
                    req = req.to(to);
                }
                req.into()
            }
        }
    }
}

/// Transaction fields read from JSON on stdin. Field names follow the
/// JSON-RPC style callers already produce.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TxInput {
    pub rpc_url: Option<String>,
    pub chain_id: Option<u64>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
    pub data: Option<String>,
    pub gas: Option<u64>,
    pub gas_price: Option<String>,
    pub gas_tip: Option<String>,
    pub tx_count: Option<u64>,
}

/// Everything a wallet needs for one signature; consumed by the sign call.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    pub path: DerivationPath,
    pub tx: TypedTransaction,
    pub chain_id: u64,
}

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx: TypedTransaction,
    pub signature: EthSignature,
    /// RLP of the signed transaction, ready for `eth_sendRawTransaction`.
    pub raw: Bytes,
}

impl SignedTransaction {
    pub fn new(tx: TypedTransaction, signature: EthSignature) -> Self {
        let raw = tx.rlp_signed(&signature);
        Self { tx, signature, raw }
    }

    /// Recovers the sender from the injected signature.
    pub fn sender(&self) -> Result<Address, WalletError> {
        Ok(self.signature.recover(self.tx.sighash())?)
    }
}

/// Parses `0x`-prefixed (or bare) hex call data.
pub fn parse_data(input: &str) -> Result<Bytes, WalletError> {
    let text = input.trim();
    let digits = text.strip_prefix("0x").unwrap_or(text);
    let bytes = hex::decode(digits)
        .map_err(|e| WalletError::InvalidInput(format!("invalid hex data: {}", e)))?;
    Ok(bytes.into())
}

pub fn parse_address(input: &str) -> Result<Address, WalletError> {
    input
        .trim()
        .parse::<Address>()
        .map_err(|e| WalletError::InvalidInput(format!("invalid address {:?}: {}", input, e)))
}
