//! Trezor Ethereum operations
//!
//! Address derivation, transaction and message signing, and the
//! CipherKeyValue based encrypt / decrypt, exposed through [`HwWallet`].

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, NameOrAddress, U256};

use super::device::TrezorDevice;
use super::messages::{
    AccessListEntry, CipherKeyValue, CipheredKeyValue, EthereumAddress, EthereumGetAddress,
    EthereumMessageSignature, EthereumSignMessage, EthereumSignTx, EthereumSignTxEip1559,
    EthereumTxAck, EthereumTxRequest,
};
use crate::core::account::{checksum, Scheme};
use crate::core::derivation::DerivationPath;
use crate::core::errors::WalletError;
use crate::core::signature::{eip155_recovery_id, message_recovery_id, Signature};
use crate::core::transaction::SignedTransaction;
use crate::hardware::hid::HidLink;
use crate::hardware::padding::{pkcs7_pad, pkcs7_unpad, BLOCK_SIZE};
use crate::hardware::HwWallet;
use tracing::{debug, info};

const VENDOR: &str = "trezor";

/// Transaction data bytes sent along with the signing request.
pub const DATA_INITIAL_CHUNK: usize = 1024;

/// Big-endian bytes without leading zeros; zero encodes as empty.
pub fn minimal_be_bytes(value: &U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    let first = buf.iter().position(|&b| b != 0).unwrap_or(32);
    buf[first..].to_vec()
}

/// Picks the binary or the hex address field, whichever the firmware set.
pub fn address_from_reply(reply: &EthereumAddress) -> Result<Address, WalletError> {
    if !reply.old_address.is_empty() {
        if reply.old_address.len() != 20 {
            return Err(WalletError::malformed(
                VENDOR,
                format!("derived address has {} bytes", reply.old_address.len()),
            ));
        }
        return Ok(Address::from_slice(&reply.old_address));
    }
    match reply.address.as_deref() {
        Some(text) if !text.is_empty() => parse_hex_address(text),
        _ => Err(WalletError::malformed(VENDOR, "missing derived address")),
    }
}

fn parse_hex_address(text: &str) -> Result<Address, WalletError> {
    text.parse::<Address>()
        .map_err(|_| WalletError::malformed(VENDOR, format!("invalid address {:?}", text)))
}

fn recipient(tx: &TypedTransaction) -> Result<Option<String>, WalletError> {
    match tx.to() {
        None => Ok(None),
        Some(NameOrAddress::Address(addr)) => Ok(Some(checksum(addr))),
        Some(NameOrAddress::Name(name)) => Err(WalletError::InvalidInput(format!(
            "recipient {} is an unresolved ENS name",
            name
        ))),
    }
}

impl<L: HidLink> TrezorDevice<L> {
    pub fn ethereum_address(&mut self, path: &DerivationPath) -> Result<Address, WalletError> {
        let reply: EthereumAddress = self.call(&EthereumGetAddress {
            address_n: path.components().to_vec(),
            show_display: None,
        })?;
        let address = address_from_reply(&reply)?;
        debug!(path = %path, address = %checksum(&address), "trezor derived");
        Ok(address)
    }

    fn sign_tx(
        &mut self,
        path: &DerivationPath,
        tx: &TypedTransaction,
        chain_id: u64,
    ) -> Result<(Address, SignedTransaction), WalletError> {
        let data = tx.data().map(|d| d.to_vec()).unwrap_or_default();
        let data_length = u32::try_from(data.len())
            .map_err(|_| WalletError::InvalidInput("transaction data too large".to_string()))?;
        let (initial, mut remaining) = data.split_at(data.len().min(DATA_INITIAL_CHUNK));
        let zero = U256::zero();
        let nonce = minimal_be_bytes(tx.nonce().unwrap_or(&zero));
        let gas_limit = minimal_be_bytes(tx.gas().unwrap_or(&zero));
        let value = minimal_be_bytes(tx.value().unwrap_or(&zero));
        let to = recipient(tx)?;

        info!(path = %path, chain_id, data_len = data.len(), "trezor signing transaction");

        let mut reply: EthereumTxRequest = match tx {
            TypedTransaction::Legacy(_) => self.call(&EthereumSignTx {
                address_n: path.components().to_vec(),
                nonce,
                gas_price: minimal_be_bytes(&tx.gas_price().unwrap_or_default()),
                gas_limit,
                to,
                value,
                data_initial_chunk: initial.to_vec(),
                data_length: Some(data_length),
                chain_id: Some(chain_id),
                tx_type: None,
            })?,
            TypedTransaction::Eip1559(inner) => self.call(&EthereumSignTxEip1559 {
                address_n: path.components().to_vec(),
                nonce,
                max_gas_fee: minimal_be_bytes(&inner.max_fee_per_gas.unwrap_or_default()),
                max_priority_fee: minimal_be_bytes(
                    &inner.max_priority_fee_per_gas.unwrap_or_default(),
                ),
                gas_limit,
                to,
                value,
                data_initial_chunk: initial.to_vec(),
                data_length,
                chain_id,
                access_list: inner
                    .access_list
                    .0
                    .iter()
                    .map(|item| AccessListEntry {
                        address: checksum(&item.address),
                        storage_keys: item.storage_keys.iter().map(|k| k.as_bytes().to_vec()).collect(),
                    })
                    .collect(),
            })?,
            TypedTransaction::Eip2930(_) => {
                return Err(WalletError::NotSupported(
                    "trezor: access-list (EIP-2930) transactions".to_string(),
                ))
            }
        };

        while let Some(requested) = reply.data_length {
            let requested = requested as usize;
            if requested > remaining.len() {
                break;
            }
            let (chunk, rest) = remaining.split_at(requested);
            remaining = rest;
            debug!(chunk = requested, left = remaining.len(), "trezor data chunk");
            reply = self.call(&EthereumTxAck {
                data_chunk: chunk.to_vec(),
            })?;
        }

        let legacy = matches!(tx, TypedTransaction::Legacy(_));
        let v = reply.signature_v.unwrap_or(0);
        if reply.signature_r.is_empty() || reply.signature_s.is_empty() || (legacy && v == 0) {
            return Err(WalletError::malformed(VENDOR, "reply lacks signature"));
        }
        let recovery_id = if legacy {
            eip155_recovery_id(v as u64, chain_id)?
        } else {
            message_recovery_id(v as u64)?
        };
        let signature = Signature::from_parts(&reply.signature_r, &reply.signature_s, recovery_id)?;

        let mut unsigned = tx.clone();
        unsigned.set_chain_id(chain_id);
        let injected = signature.for_transaction(&unsigned, chain_id)?;
        let signed = SignedTransaction::new(unsigned, injected);
        let sender = signed.sender()?;
        Ok((sender, signed))
    }

    fn sign_msg(
        &mut self,
        path: &DerivationPath,
        message: &[u8],
    ) -> Result<(Address, Signature), WalletError> {
        let reply: EthereumMessageSignature = self.call(&EthereumSignMessage {
            address_n: path.components().to_vec(),
            message: message.to_vec(),
        })?;
        let signature = Signature::from_rsv(&reply.signature)
            .map_err(|e| WalletError::malformed(VENDOR, e.to_string()))?;
        let address = match reply.address.as_deref() {
            Some(text) if !text.is_empty() => parse_hex_address(text)?,
            _ => self.ethereum_address(path)?,
        };
        Ok((address, signature))
    }

    fn cipher(
        &mut self,
        path: &DerivationPath,
        key: &str,
        value: Vec<u8>,
        encrypt: bool,
        ask_on_encrypt: bool,
        ask_on_decrypt: bool,
    ) -> Result<Vec<u8>, WalletError> {
        let reply: CipheredKeyValue = self.call(&CipherKeyValue {
            address_n: path.components().to_vec(),
            key: key.to_string(),
            value,
            encrypt,
            ask_on_encrypt,
            ask_on_decrypt,
            iv: Vec::new(),
        })?;
        Ok(reply.value)
    }
}

impl<L: HidLink> HwWallet for TrezorDevice<L> {
    fn scheme(&self) -> Scheme {
        Scheme::Trezor
    }

    fn status(&self) -> String {
        TrezorDevice::status(self)
    }

    fn label(&self) -> String {
        TrezorDevice::label(self)
    }

    fn derive(&mut self, path: &DerivationPath) -> Result<Address, WalletError> {
        self.ethereum_address(path)
    }

    fn sign_transaction(
        &mut self,
        path: &DerivationPath,
        tx: &TypedTransaction,
        chain_id: u64,
    ) -> Result<(Address, SignedTransaction), WalletError> {
        self.sign_tx(path, tx, chain_id)
    }

    fn sign_message(
        &mut self,
        path: &DerivationPath,
        message: &[u8],
    ) -> Result<(Address, Signature), WalletError> {
        self.sign_msg(path, message)
    }

    fn encrypt(
        &mut self,
        path: &DerivationPath,
        key: &str,
        data: &[u8],
        ask_on_encrypt: bool,
        ask_on_decrypt: bool,
    ) -> Result<Vec<u8>, WalletError> {
        let padded = pkcs7_pad(data, BLOCK_SIZE);
        self.cipher(path, key, padded, true, ask_on_encrypt, ask_on_decrypt)
    }

    fn decrypt(
        &mut self,
        path: &DerivationPath,
        key: &str,
        data: &[u8],
        ask_on_encrypt: bool,
        ask_on_decrypt: bool,
    ) -> Result<Vec<u8>, WalletError> {
        let plain = self.cipher(path, key, data.to_vec(), false, ask_on_encrypt, ask_on_decrypt)?;
        pkcs7_unpad(&plain, BLOCK_SIZE)
    }
}
