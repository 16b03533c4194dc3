//! Ledger transport layer
//!
//! HID framing: every 64-byte report starts with channel `0x0101`, tag
//! `0x05` and a big-endian sequence index. The first report also carries the
//! big-endian length of the whole APDU.

use super::apdu::{ApduCommand, ApduResponse};
use crate::core::errors::WalletError;
use crate::hardware::hid::{HidLink, Report, REPORT_SIZE};
use tracing::{debug, warn};

/// APDU channel
pub const CHANNEL: u16 = 0x0101;

/// HID command tag
pub const TAG_APDU: u8 = 0x05;

/// channel (2) + tag (1) + sequence (2)
const HEADER_LEN: usize = 5;

/// Payload bytes carried by the first report (after the 2-byte length) and
/// by continuation reports.
pub const FIRST_CHUNK: usize = REPORT_SIZE - HEADER_LEN - 2;
pub const NEXT_CHUNK: usize = REPORT_SIZE - HEADER_LEN;

const VENDOR: &str = "ledger";

fn header(sequence: u16) -> [u8; HEADER_LEN] {
    let channel = CHANNEL.to_be_bytes();
    let seq = sequence.to_be_bytes();
    [channel[0], channel[1], TAG_APDU, seq[0], seq[1]]
}

/// Splits serialized APDU bytes into zero-padded HID reports.
pub fn encode_frames(apdu: &[u8]) -> Vec<Report> {
    let mut stream = Vec::with_capacity(2 + apdu.len());
    stream.extend_from_slice(&(apdu.len() as u16).to_be_bytes());
    stream.extend_from_slice(apdu);

    stream
        .chunks(NEXT_CHUNK)
        .enumerate()
        .map(|(sequence, chunk)| {
            let mut report = [0u8; REPORT_SIZE];
            report[..HEADER_LEN].copy_from_slice(&header(sequence as u16));
            report[HEADER_LEN..HEADER_LEN + chunk.len()].copy_from_slice(chunk);
            report
        })
        .collect()
}

/// Incremental reassembly of one reply from HID reports.
#[derive(Debug, Default)]
pub struct FrameReader {
    sequence: u16,
    expected: Option<usize>,
    data: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one report. Returns the reassembled bytes, status word
    /// included, once the declared length is filled.
    pub fn push(&mut self, report: &Report) -> Result<Option<Vec<u8>>, WalletError> {
        if report[..HEADER_LEN] != header(self.sequence) {
            debug!(
                expected_seq = self.sequence,
                got = %hex::encode(&report[..HEADER_LEN]),
                "ledger header mismatch"
            );
            return Err(WalletError::InvalidReplyHeader { vendor: VENDOR });
        }

        let expected = match self.expected {
            Some(expected) => {
                self.data.extend_from_slice(&report[HEADER_LEN..]);
                expected
            }
            None => {
                let expected =
                    u16::from_be_bytes([report[HEADER_LEN], report[HEADER_LEN + 1]]) as usize;
                self.expected = Some(expected);
                self.data = Vec::with_capacity(expected);
                self.data.extend_from_slice(&report[HEADER_LEN + 2..]);
                expected
            }
        };
        self.sequence = self.sequence.wrapping_add(1);

        if self.data.len() < expected {
            return Ok(None);
        }
        let mut data = std::mem::take(&mut self.data);
        data.truncate(expected);
        *self = Self::default();
        Ok(Some(data))
    }
}

/// Ledger APDU transport over any HID link
pub struct LedgerTransport<L> {
    link: L,
}

impl<L: HidLink> LedgerTransport<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    /// Sends one APDU and returns the raw reply. A non-success status word
    /// is not an error at this layer.
    pub fn exchange(&mut self, command: &ApduCommand) -> Result<ApduResponse, WalletError> {
        let reports = encode_frames(&command.to_bytes());
        debug!(ins = command.ins, reports = reports.len(), "ledger send");
        for report in &reports {
            self.link.write_report(report)?;
        }

        let mut reader = FrameReader::new();
        let bytes = loop {
            let report = self.link.read_report()?;
            if let Some(bytes) = reader.push(&report)? {
                break bytes;
            }
        };

        let response = ApduResponse::from_bytes(&bytes)?;
        if !response.is_success() {
            warn!(
                "APDU failed: {:04X} - {}",
                response.status_code(),
                response.error_description()
            );
        }
        Ok(response)
    }

    /// [`exchange`](Self::exchange), then the payload of a 0x9000 reply.
    pub fn call(&mut self, command: &ApduCommand) -> Result<Vec<u8>, WalletError> {
        self.exchange(command)?.into_data()
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}
