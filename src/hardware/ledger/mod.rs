//! Ledger hardware wallet integration
//!
//! APDU framing over HID and the Ethereum app commands.

pub mod apdu;
pub mod device;
pub mod ethereum_app;
pub mod transport;

pub use device::{AppVersion, LedgerDevice, LEDGER_FILTER};
pub use transport::LedgerTransport;
