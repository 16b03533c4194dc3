//! PKCS#7 padding for the device cipher, which only accepts whole blocks.

use crate::core::errors::WalletError;

pub const BLOCK_SIZE: usize = 16;

pub fn pkcs7_pad(data: &[u8], block_size: usize) -> Vec<u8> {
    let pad = block_size - data.len() % block_size;
    let mut out = Vec::with_capacity(data.len() + pad);
    out.extend_from_slice(data);
    out.resize(data.len() + pad, pad as u8);
    out
}

pub fn pkcs7_unpad(data: &[u8], block_size: usize) -> Result<Vec<u8>, WalletError> {
    if data.is_empty() {
        return Err(WalletError::InvalidInput("pkcs7: data is empty".to_string()));
    }
    if data.len() % block_size != 0 {
        return Err(WalletError::InvalidInput(
            "pkcs7: data is not block-aligned".to_string(),
        ));
    }
    let pad = data[data.len() - 1] as usize;
    if pad == 0 || pad > block_size || !data[data.len() - pad..].iter().all(|&b| b as usize == pad) {
        return Err(WalletError::InvalidInput("pkcs7: invalid padding".to_string()));
    }
    Ok(data[..data.len() - pad].to_vec())
}
