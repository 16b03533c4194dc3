use ethers::types::{Address, H256};
use ethers::utils::keccak256;

use crate::core::errors::WalletError;
use crate::core::signature::Signature;

/// Prepends the EIP-191 personal message header.
pub fn with_eth_prefix(message: &[u8]) -> Vec<u8> {
    let mut out = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    out.extend_from_slice(message);
    out
}

pub fn message_hash(message: &[u8]) -> H256 {
    H256::from(keccak256(message))
}

/// Recovers the signer of `keccak256(message)` from a 65-byte signature.
/// `v` must be 27 or 28.
pub fn recover(message: &[u8], signature: &[u8]) -> Result<Address, WalletError> {
    if signature.len() != 65 {
        return Err(WalletError::InvalidSignature(format!(
            "signature must be 65 bytes, got {}",
            signature.len()
        )));
    }
    if signature[64] != 27 && signature[64] != 28 {
        return Err(WalletError::InvalidSignature(
            "invalid Ethereum signature (V is not 27 or 28)".to_string(),
        ));
    }
    Signature::from_rsv(signature)?.recover(message_hash(message))
}
