//! APDU (Application Protocol Data Unit) commands for the Ledger Ethereum app

use crate::core::errors::WalletError;
use tracing::debug;

/// Largest data field a short APDU can carry.
pub const MAX_APDU_DATA: usize = 255;

/// APDU class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApduClass {
    /// Every Ledger app uses 0xE0.
    Standard = 0xE0,
}

/// Ethereum app instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApduInstruction {
    GetAddress = 0x02,
    SignTransaction = 0x04,
    GetAppConfiguration = 0x06,
    SignPersonalMessage = 0x08,
}

/// P1 for the first data block of a multi-block request.
pub const P1_FIRST_BLOCK: u8 = 0x00;
/// P1 for every following block.
pub const P1_MORE_BLOCKS: u8 = 0x80;
/// Derive without on-device confirmation.
pub const P1_NO_CONFIRM: u8 = 0x00;
/// Leave the chain code out of the derive reply.
pub const P2_NO_CHAINCODE: u8 = 0x00;

/// APDU command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
}

impl ApduCommand {
    pub fn new(
        cla: ApduClass,
        ins: ApduInstruction,
        p1: u8,
        p2: u8,
        data: Vec<u8>,
    ) -> Result<Self, WalletError> {
        if data.len() > MAX_APDU_DATA {
            return Err(WalletError::InvalidInput(format!(
                "APDU data of {} bytes exceeds {}",
                data.len(),
                MAX_APDU_DATA
            )));
        }
        Ok(Self {
            cla: cla as u8,
            ins: ins as u8,
            p1,
            p2,
            data,
        })
    }

    /// `CLA INS P1 P2 Lc data`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(5 + self.data.len());
        bytes.push(self.cla);
        bytes.push(self.ins);
        bytes.push(self.p1);
        bytes.push(self.p2);
        bytes.push(self.data.len() as u8);
        bytes.extend_from_slice(&self.data);

        debug!(
            "APDU CLA={:02X} INS={:02X} P1={:02X} P2={:02X} Lc={}",
            self.cla,
            self.ins,
            self.p1,
            self.p2,
            self.data.len()
        );
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() < 5 || bytes.len() != 5 + bytes[4] as usize {
            return Err(WalletError::malformed("ledger", "bad APDU command length"));
        }
        Ok(Self {
            cla: bytes[0],
            ins: bytes[1],
            p1: bytes[2],
            p2: bytes[3],
            data: bytes[5..].to_vec(),
        })
    }
}

/// APDU response: payload plus the trailing status word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    pub data: Vec<u8>,
    pub sw1: u8,
    pub sw2: u8,
}

impl ApduResponse {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() < 2 {
            return Err(WalletError::malformed("ledger", "reply shorter than status word"));
        }
        let len = bytes.len();
        let sw1 = bytes[len - 2];
        let sw2 = bytes[len - 1];
        debug!("APDU reply SW={:02X}{:02X} len={}", sw1, sw2, len - 2);
        Ok(Self {
            data: bytes[..len - 2].to_vec(),
            sw1,
            sw2,
        })
    }

    pub fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    pub fn status_code(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    pub fn error_description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "success",
            (0x55, 0x15) => "device locked",
            (0x65, 0x11) => "app not open",
            (0x67, 0x00) => "wrong data length",
            (0x69, 0x82) => "security status not satisfied",
            (0x69, 0x85) => "condition not satisfied (rejected on device)",
            (0x6A, 0x80) => "invalid data",
            (0x6A, 0x82) => "file not found",
            (0x6B, 0x00) => "incorrect parameters",
            (0x6D, 0x00) => "instruction not supported",
            (0x6E, 0x00) => "class not supported",
            (0x6F, 0x00) => "unknown error",
            _ => "unrecognized status",
        }
    }

    /// Payload if the status word is 0x9000.
    pub fn into_data(self) -> Result<Vec<u8>, WalletError> {
        if !self.is_success() {
            return Err(WalletError::ApduStatus {
                code: self.status_code(),
                description: self.error_description(),
            });
        }
        Ok(self.data)
    }
}
