//! Trezor transport layer
//!
//! HID framing: every 64-byte report starts with the `?` report id, the
//! first report of a message additionally carries `##`, the big-endian
//! message kind and the big-endian payload length.

use super::messages::{MessageType, TrezorMessage};
use crate::core::errors::WalletError;
use crate::hardware::hid::{HidLink, Report, REPORT_SIZE};
use tracing::debug;

/// Leading byte of every report.
pub const REPORT_ID: u8 = 0x3f;

/// Message magic following the report id in the first report.
pub const HEADER_MAGIC: [u8; 2] = *b"##";

/// `##` + kind (2) + length (4)
const HEADER_LEN: usize = 8;

/// Payload bytes carried by the first report and by continuation reports.
pub const FIRST_CHUNK: usize = REPORT_SIZE - 1 - HEADER_LEN;
pub const NEXT_CHUNK: usize = REPORT_SIZE - 1;

const VENDOR: &str = "trezor";

/// Splits a message into zero-padded HID reports.
pub fn encode_frames(message: &TrezorMessage) -> Vec<Report> {
    let mut stream = Vec::with_capacity(HEADER_LEN + message.payload.len());
    stream.extend_from_slice(&HEADER_MAGIC);
    stream.extend_from_slice(&message.kind.to_be_bytes());
    stream.extend_from_slice(&(message.payload.len() as u32).to_be_bytes());
    stream.extend_from_slice(&message.payload);

    stream
        .chunks(NEXT_CHUNK)
        .map(|chunk| {
            let mut report = [0u8; REPORT_SIZE];
            report[0] = REPORT_ID;
            report[1..1 + chunk.len()].copy_from_slice(chunk);
            report
        })
        .collect()
}

/// Incremental reassembly of one message from HID reports.
#[derive(Debug, Default)]
pub struct FrameReader {
    kind: u16,
    expected: Option<usize>,
    payload: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one report. Returns the message once the declared length is
    /// filled; trailing padding is dropped.
    pub fn push(&mut self, report: &Report) -> Result<Option<TrezorMessage>, WalletError> {
        if report[0] != REPORT_ID {
            return Err(WalletError::InvalidReplyHeader { vendor: VENDOR });
        }

        let expected = match self.expected {
            Some(expected) => {
                self.payload.extend_from_slice(&report[1..]);
                expected
            }
            None => {
                if report[1..3] != HEADER_MAGIC {
                    return Err(WalletError::InvalidReplyHeader { vendor: VENDOR });
                }
                self.kind = u16::from_be_bytes([report[3], report[4]]);
                let expected =
                    u32::from_be_bytes([report[5], report[6], report[7], report[8]]) as usize;
                self.expected = Some(expected);
                self.payload = Vec::with_capacity(expected);
                self.payload.extend_from_slice(&report[1 + HEADER_LEN..]);
                expected
            }
        };

        if self.payload.len() < expected {
            return Ok(None);
        }
        let mut payload = std::mem::take(&mut self.payload);
        payload.truncate(expected);
        let kind = self.kind;
        *self = Self::default();
        Ok(Some(TrezorMessage { kind, payload }))
    }
}

/// Trezor message transport over any HID link
pub struct TrezorTransport<L> {
    link: L,
}

impl<L: HidLink> TrezorTransport<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    pub fn write(&mut self, message: &TrezorMessage) -> Result<(), WalletError> {
        let reports = encode_frames(message);
        debug!(
            kind = %MessageType::describe(message.kind),
            len = message.payload.len(),
            reports = reports.len(),
            "trezor send"
        );
        for report in &reports {
            self.link.write_report(report)?;
        }
        Ok(())
    }

    pub fn read(&mut self) -> Result<TrezorMessage, WalletError> {
        let mut reader = FrameReader::new();
        loop {
            let report = self.link.read_report()?;
            if let Some(message) = reader.push(&report)? {
                debug!(
                    kind = %MessageType::describe(message.kind),
                    len = message.payload.len(),
                    "trezor recv"
                );
                return Ok(message);
            }
        }
    }

    /// Sends one message and waits for one reply.
    pub fn exchange(&mut self, message: &TrezorMessage) -> Result<TrezorMessage, WalletError> {
        self.write(message)?;
        self.read()
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}
