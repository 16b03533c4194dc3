//! Ledger Ethereum App
//!
//! Address derivation plus transaction and personal-message signing over
//! APDUs, exposed through [`HwWallet`].

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::Address;

use super::apdu::{
    ApduClass, ApduCommand, ApduInstruction, MAX_APDU_DATA, P1_FIRST_BLOCK, P1_MORE_BLOCKS,
    P1_NO_CONFIRM, P2_NO_CHAINCODE,
};
use super::device::LedgerDevice;
use crate::core::account::{checksum, Scheme};
use crate::core::derivation::DerivationPath;
use crate::core::errors::WalletError;
use crate::core::signature::{eip155_recovery_id_truncated, message_recovery_id, Signature};
use crate::core::transaction::SignedTransaction;
use crate::hardware::hid::HidLink;
use crate::hardware::HwWallet;
use tracing::{debug, info};

const VENDOR: &str = "ledger";

/// Splits a length-prefixed field off the front of `data`.
fn take_prefixed<'a>(data: &'a [u8], field: &str) -> Result<(&'a [u8], &'a [u8]), WalletError> {
    let (&len, rest) = data
        .split_first()
        .ok_or_else(|| WalletError::malformed(VENDOR, format!("missing {} length", field)))?;
    let len = len as usize;
    if rest.len() < len {
        return Err(WalletError::malformed(
            VENDOR,
            format!("{} needs {} bytes, {} left", field, len, rest.len()),
        ));
    }
    Ok(rest.split_at(len))
}

/// Parses `[len][pubkey][len][address hex ASCII]`, ignoring a trailing
/// chain code.
pub fn parse_address_reply(data: &[u8]) -> Result<Address, WalletError> {
    let (_pubkey, rest) = take_prefixed(data, "public key")?;
    let (ascii, _chain_code) = take_prefixed(rest, "address")?;
    let text = std::str::from_utf8(ascii)
        .map_err(|_| WalletError::malformed(VENDOR, "address is not ASCII"))?;
    let mut bytes = [0u8; 20];
    hex::decode_to_slice(text, &mut bytes)
        .map_err(|_| WalletError::malformed(VENDOR, format!("invalid address {:?}", text)))?;
    Ok(Address::from(bytes))
}

/// Size of the first block. Legacy transactions never end on a 1..=3 byte
/// block, which the app would misread as a truncated RLP list.
pub fn first_block_size(total: usize, legacy: bool) -> usize {
    let mut first = MAX_APDU_DATA.min(total);
    if legacy {
        while first > 1 && total > first && (1..=3).contains(&((total - first) % MAX_APDU_DATA)) {
            first -= 1;
        }
    }
    first
}

/// Splits `payload` into APDU data blocks.
pub fn blocks(payload: &[u8], first: usize) -> Vec<&[u8]> {
    let (head, tail) = payload.split_at(first.min(payload.len()));
    std::iter::once(head).chain(tail.chunks(MAX_APDU_DATA)).collect()
}

/// `v(1) r(32) s(32)`
fn split_vrs(reply: &[u8]) -> Result<(u8, &[u8], &[u8]), WalletError> {
    if reply.len() < 65 {
        return Err(WalletError::malformed(
            VENDOR,
            format!("signature reply has {} bytes", reply.len()),
        ));
    }
    Ok((reply[0], &reply[1..33], &reply[33..65]))
}

impl<L: HidLink> LedgerDevice<L> {
    pub fn ethereum_address(&mut self, path: &DerivationPath) -> Result<Address, WalletError> {
        let command = ApduCommand::new(
            ApduClass::Standard,
            ApduInstruction::GetAddress,
            P1_NO_CONFIRM,
            P2_NO_CHAINCODE,
            path.to_bytes(),
        )?;
        let address = parse_address_reply(&self.transport.call(&command)?)?;
        debug!(path = %path, address = %checksum(&address), "ledger derived");
        Ok(address)
    }

    /// Sends `payload` block by block; the reply to the last block is returned.
    fn stream(
        &mut self,
        ins: ApduInstruction,
        payload: &[u8],
        first: usize,
    ) -> Result<Vec<u8>, WalletError> {
        let mut reply = Vec::new();
        for (i, block) in blocks(payload, first).into_iter().enumerate() {
            let p1 = if i == 0 { P1_FIRST_BLOCK } else { P1_MORE_BLOCKS };
            let command = ApduCommand::new(ApduClass::Standard, ins, p1, 0x00, block.to_vec())?;
            reply = self.transport.call(&command)?;
        }
        Ok(reply)
    }

    fn sign_tx(
        &mut self,
        path: &DerivationPath,
        tx: &TypedTransaction,
        chain_id: u64,
    ) -> Result<(Address, SignedTransaction), WalletError> {
        let mut unsigned = tx.clone();
        unsigned.set_chain_id(chain_id);
        let legacy = matches!(unsigned, TypedTransaction::Legacy(_));

        let mut payload = path.to_bytes();
        payload.extend_from_slice(&unsigned.rlp());
        let first = first_block_size(payload.len(), legacy);
        info!(path = %path, chain_id, payload = payload.len(), "ledger signing transaction");

        let reply = self.stream(ApduInstruction::SignTransaction, &payload, first)?;
        let (v, r, s) = split_vrs(&reply)?;
        let recovery_id = if legacy {
            eip155_recovery_id_truncated(v, chain_id)?
        } else {
            message_recovery_id(v as u64)?
        };
        let signature = Signature::from_parts(r, s, recovery_id)?;

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
        let length = u32::try_from(message.len())
            .map_err(|_| WalletError::InvalidInput("message too large".to_string()))?;
        let mut payload = path.to_bytes();
        payload.extend_from_slice(&length.to_be_bytes());
        payload.extend_from_slice(message);

        let first = first_block_size(payload.len(), false);
        let reply = self.stream(ApduInstruction::SignPersonalMessage, &payload, first)?;
        let (v, r, s) = split_vrs(&reply)?;
        let signature = Signature::from_parts(r, s, message_recovery_id(v as u64)?)?;
        let address = self.ethereum_address(path)?;
        Ok((address, signature))
    }
}

impl<L: HidLink> HwWallet for LedgerDevice<L> {
    fn scheme(&self) -> Scheme {
        Scheme::Ledger
    }

    fn status(&self) -> String {
        LedgerDevice::status(self)
    }

    fn label(&self) -> String {
        LedgerDevice::label(self)
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
        _path: &DerivationPath,
        _key: &str,
        _data: &[u8],
        _ask_on_encrypt: bool,
        _ask_on_decrypt: bool,
    ) -> Result<Vec<u8>, WalletError> {
        Err(WalletError::NotSupported("ledger: encryption".to_string()))
    }

    fn decrypt(
        &mut self,
        _path: &DerivationPath,
        _key: &str,
        _data: &[u8],
        _ask_on_encrypt: bool,
        _ask_on_decrypt: bool,
    ) -> Result<Vec<u8>, WalletError> {
        Err(WalletError::NotSupported("ledger: decryption".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn address_reply(ascii: &str, chain_code: bool) -> Vec<u8> {
        let mut data = vec![65];
        data.extend_from_slice(&[0x04; 65]);
        data.push(ascii.len() as u8);
        data.extend_from_slice(ascii.as_bytes());
        if chain_code {
            data.extend_from_slice(&[0xcc; 32]);
        }
        data
    }

    #[test]
    fn test_parse_address_reply() {
        let ascii = "000000000000000000000000000000000000BEEF";
        assert_eq!(
            parse_address_reply(&address_reply(ascii, false)).unwrap(),
            Address::from_low_u64_be(0xbeef)
        );
        assert_eq!(
            parse_address_reply(&address_reply(ascii, true)).unwrap(),
            Address::from_low_u64_be(0xbeef)
        );
    }

    #[test]
    fn test_missing_address_field_is_framing_error() {
        let mut data = vec![65];
        data.extend_from_slice(&[0x04; 65]);
        assert!(parse_address_reply(&data).unwrap_err().is_framing());

        data.push(40);
        data.extend_from_slice(b"0000");
        assert!(parse_address_reply(&data).unwrap_err().is_framing());

        assert!(parse_address_reply(&[]).unwrap_err().is_framing());
    }

    #[test_case(100, false, 100 ; "short payload")]
    #[test_case(600, false, 255 ; "typed keeps full blocks")]
    #[test_case(257, true, 253 ; "legacy avoids 2 byte tail")]
    #[test_case(512, true, 253 ; "legacy avoids 2 byte tail after two blocks")]
    #[test_case(520, true, 255 ; "legacy tail already long")]
    #[test_case(255, true, 255 ; "exact fit")]
    fn test_first_block_size(total: usize, legacy: bool, expected: usize) {
        assert_eq!(first_block_size(total, legacy), expected);
    }

    #[test]
    fn test_legacy_blocks_never_end_short() {
        for total in 1..2000usize {
            let payload = vec![0u8; total];
            let parts = blocks(&payload, first_block_size(total, true));
            let last = parts.last().unwrap().len();
            assert!(parts.len() == 1 || last > 3, "total {} ends with {}", total, last);
            assert!(parts.iter().all(|b| b.len() <= MAX_APDU_DATA));
            assert_eq!(parts.iter().map(|b| b.len()).sum::<usize>(), total);
        }
    }

    #[test]
    fn test_split_vrs_requires_65_bytes() {
        assert!(split_vrs(&[0u8; 64]).unwrap_err().is_framing());
        let mut reply = vec![0x25];
        reply.extend_from_slice(&[1; 32]);
        reply.extend_from_slice(&[2; 32]);
        let (v, r, s) = split_vrs(&reply).unwrap();
        assert_eq!(v, 0x25);
        assert_eq!(r, &[1; 32]);
        assert_eq!(s, &[2; 32]);
    }
}
