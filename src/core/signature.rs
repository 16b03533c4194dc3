//! Canonical secp256k1 signature and the `v` conventions devices reply with.
//!
//! Devices hand back `v` as a raw recovery id (0/1), as an Ethereum
//! message id (27/28) or as an EIP-155 value (`chainId * 2 + 35 + id`).
//! Everything is normalized to the recovery id at the device boundary and
//! re-encoded per transaction type when injected into a transaction.

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Signature as EthSignature, H256, U256};

use crate::core::errors::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Recovery id, always 0 or 1.
    pub v: u8,
}

impl Signature {
    /// Builds a signature from big-endian `r` / `s` of at most 32 bytes each.
    pub fn from_parts(r: &[u8], s: &[u8], recovery_id: u8) -> Result<Self, WalletError> {
        if recovery_id > 1 {
            return Err(WalletError::InvalidSignature(format!(
                "recovery id {} out of range",
                recovery_id
            )));
        }
        Ok(Self {
            r: left_pad(r, "r")?,
            s: left_pad(s, "s")?,
            v: recovery_id,
        })
    }

    /// Parses a 65-byte `r || s || v` blob with `v` in 0/1 or 27/28.
    pub fn from_rsv(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != 65 {
            return Err(WalletError::InvalidSignature(format!(
                "expected 65 bytes, got {}",
                bytes.len()
            )));
        }
        let id = message_recovery_id(bytes[64] as u64)?;
        Self::from_parts(&bytes[..32], &bytes[32..64], id)
    }

    /// `r || s || (v + 27)`, the form `eth_sign` style signatures travel in.
    pub fn to_rsv_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v + 27;
        out
    }

    /// ethers signature with an explicit `v` encoding.
    pub fn with_v(&self, v: u64) -> EthSignature {
        EthSignature {
            r: U256::from_big_endian(&self.r),
            s: U256::from_big_endian(&self.s),
            v,
        }
    }

    /// Encodes `v` the way the transaction type expects: EIP-155 for legacy,
    /// bare parity for typed transactions.
    pub fn for_transaction(
        &self,
        tx: &TypedTransaction,
        chain_id: u64,
    ) -> Result<EthSignature, WalletError> {
        let v = match tx {
            TypedTransaction::Legacy(_) => eip155_offset(chain_id)? + self.v as u64,
            _ => self.v as u64,
        };
        Ok(self.with_v(v))
    }

    /// Recovers the signer of a 32-byte digest.
    pub fn recover(&self, digest: H256) -> Result<Address, WalletError> {
        Ok(self.with_v(self.v as u64 + 27).recover(digest)?)
    }
}

impl From<&EthSignature> for Signature {
    fn from(sig: &EthSignature) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        sig.r.to_big_endian(&mut r);
        sig.s.to_big_endian(&mut s);
        let v = match sig.v {
            0 | 27 => 0,
            1 | 28 => 1,
            v => ((v - 1) % 2) as u8,
        };
        Self { r, s, v }
    }
}

/// `chainId * 2 + 35`
pub fn eip155_offset(chain_id: u64) -> Result<u64, WalletError> {
    chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(35))
        .ok_or_else(|| WalletError::InvalidInput(format!("chain id {} too large", chain_id)))
}

/// Recovery id from a full-width EIP-155 `v`.
pub fn eip155_recovery_id(v: u64, chain_id: u64) -> Result<u8, WalletError> {
    let offset = eip155_offset(chain_id)?;
    match v.checked_sub(offset) {
        Some(id @ 0..=1) => Ok(id as u8),
        _ => Err(WalletError::InvalidSignature(format!(
            "v {} does not match chain id {}",
            v, chain_id
        ))),
    }
}

/// Recovery id from an EIP-155 `v` that the device truncated to one byte.
pub fn eip155_recovery_id_truncated(v: u8, chain_id: u64) -> Result<u8, WalletError> {
    let offset = eip155_offset(chain_id)?;
    match v.wrapping_sub(offset as u8) {
        id @ 0..=1 => Ok(id),
        _ => Err(WalletError::InvalidSignature(format!(
            "v {:#04x} does not match chain id {}",
            v, chain_id
        ))),
    }
}

/// Recovery id from a message or typed-transaction `v` (0/1 or 27/28).
pub fn message_recovery_id(v: u64) -> Result<u8, WalletError> {
    match v {
        0 | 27 => Ok(0),
        1 | 28 => Ok(1),
        other => Err(WalletError::InvalidSignature(format!(
            "invalid recovery id {}",
            other
        ))),
    }
}

fn left_pad(bytes: &[u8], name: &str) -> Result<[u8; 32], WalletError> {
    if bytes.is_empty() || bytes.len() > 32 {
        return Err(WalletError::InvalidSignature(format!(
            "{} has {} bytes",
            name,
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}
