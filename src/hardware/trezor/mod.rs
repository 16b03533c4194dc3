//! Trezor hardware wallet
//!
//! - `transport`: 64-byte HID report framing
//! - `messages`: protobuf messages
//! - `device`: session and the interactive call loop
//! - `ethereum_app`: Ethereum operations and the `HwWallet` impl

pub mod device;
pub mod ethereum_app;
pub mod messages;
pub mod transport;

pub use device::{TrezorDevice, TREZOR_FILTER};
pub use transport::TrezorTransport;
