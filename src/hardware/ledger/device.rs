//! Ledger device session
//!
//! Opening a device probes the Ethereum app: a derive of the default
//! account, then the app configuration. The outcome decides whether the
//! device is online, offline (locked or app closed) or in browser mode.

use std::fmt;

use super::apdu::{ApduClass, ApduCommand, ApduInstruction};
use super::transport::LedgerTransport;
use crate::core::derivation::{DerivationPath, DEFAULT_BASE_PATH};
use crate::core::errors::WalletError;
use crate::hardware::hid::{DeviceFilter, HidLink};
use tracing::{debug, info, warn};

/// Nano S, Nano X, Nano S Plus and their per-interface product ids.
pub const LEDGER_FILTER: DeviceFilter = DeviceFilter {
    name: "ledger",
    ids: &[
        (0x2c97, 0x0000),
        (0x2c97, 0x0001),
        (0x2c97, 0x0004),
        (0x2c97, 0x0005),
        (0x2c97, 0x0011),
        (0x2c97, 0x0015),
        (0x2c97, 0x1011),
        (0x2c97, 0x1015),
        (0x2c97, 0x4011),
        (0x2c97, 0x4015),
        (0x2c97, 0x5011),
        (0x2c97, 0x5015),
    ],
    usage_page: 0xffa0,
    interface_number: 0,
};

/// Ethereum app version from the configuration reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct AppVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl AppVersion {
    /// Assumed when the app answers derives but not the version query.
    pub const FALLBACK: AppVersion = AppVersion {
        major: 1,
        minor: 0,
        patch: 0,
    };

    /// Marks an app that rejected the probe derive.
    pub const OFFLINE: AppVersion = AppVersion {
        major: 0,
        minor: 0,
        patch: 0,
    };

    /// `flags major minor patch`
    pub fn from_config(data: &[u8]) -> Result<Self, WalletError> {
        match data {
            [_flags, major, minor, patch] => Ok(Self {
                major: *major,
                minor: *minor,
                patch: *patch,
            }),
            _ => Err(WalletError::malformed(
                "ledger",
                format!("configuration reply has {} bytes", data.len()),
            )),
        }
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn is_transport_failure(err: &WalletError) -> bool {
    matches!(err, WalletError::Usb(_) | WalletError::Io(_))
}

/// Ledger device
pub struct LedgerDevice<L> {
    pub(super) transport: LedgerTransport<L>,
    version: AppVersion,
    browser: bool,
}

impl<L: HidLink> LedgerDevice<L> {
    /// Wraps an open link and probes the Ethereum app. Only USB failures
    /// make this fail; every other outcome is recorded in the status.
    pub fn open(link: L) -> Result<Self, WalletError> {
        let mut device = Self {
            transport: LedgerTransport::new(link),
            version: AppVersion::OFFLINE,
            browser: false,
        };
        device.probe()?;
        Ok(device)
    }

    fn probe(&mut self) -> Result<(), WalletError> {
        let base: DerivationPath = DEFAULT_BASE_PATH.parse()?;
        match self.ethereum_address(&base) {
            Ok(address) => debug!(address = ?address, "ledger probe derive ok"),
            Err(err) if err.is_framing() => {
                info!(error = %err, "ledger replied in browser mode");
                self.browser = true;
                return Ok(());
            }
            Err(err) if is_transport_failure(&err) => return Err(err),
            Err(err) => {
                warn!(error = %err, "ledger Ethereum app offline");
                self.version = AppVersion::OFFLINE;
                return Ok(());
            }
        }

        self.version = match self.app_version() {
            Ok(version) => version,
            Err(err) if is_transport_failure(&err) => return Err(err),
            Err(err) => {
                debug!(error = %err, "version query failed, assuming {}", AppVersion::FALLBACK);
                AppVersion::FALLBACK
            }
        };
        info!("Ledger Ethereum app v{}", self.version);
        Ok(())
    }

    pub fn app_version(&mut self) -> Result<AppVersion, WalletError> {
        let command = ApduCommand::new(
            ApduClass::Standard,
            ApduInstruction::GetAppConfiguration,
            0x00,
            0x00,
            vec![],
        )?;
        AppVersion::from_config(&self.transport.call(&command)?)
    }

    pub fn version(&self) -> AppVersion {
        self.version
    }

    pub fn is_browser_mode(&self) -> bool {
        self.browser
    }

    pub fn is_offline(&self) -> bool {
        !self.browser && self.version == AppVersion::OFFLINE
    }

    pub fn status(&self) -> String {
        if self.browser {
            "Ledger Ethereum app in browser mode".to_string()
        } else if self.is_offline() {
            "Ledger Ethereum app offline".to_string()
        } else {
            format!("Ledger Ethereum app v{} online", self.version)
        }
    }

    pub fn label(&self) -> String {
        format!("ledger v{}", self.version)
    }
}
