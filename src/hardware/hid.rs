//! HID report link shared by both vendors, plus the device matching rule.

use crate::core::errors::WalletError;

/// Size of one HID report on both Trezor and Ledger devices.
pub const REPORT_SIZE: usize = 64;

pub type Report = [u8; REPORT_SIZE];

/// One exclusively owned, blocking, report-oriented connection to a device.
pub trait HidLink {
    fn write_report(&mut self, report: &Report) -> Result<(), WalletError>;

    /// Blocks until a full report arrives. There is no timeout.
    fn read_report(&mut self) -> Result<Report, WalletError>;
}

impl<L: HidLink + ?Sized> HidLink for Box<L> {
    fn write_report(&mut self, report: &Report) -> Result<(), WalletError> {
        (**self).write_report(report)
    }

    fn read_report(&mut self) -> Result<Report, WalletError> {
        (**self).read_report()
    }
}

/// The parts of an enumerated USB device the matching rule looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub usage_page: u16,
    pub interface_number: i32,
    pub path: String,
}

/// Known identifiers of one hardware wallet brand.
#[derive(Debug, Clone, Copy)]
pub struct DeviceFilter {
    pub name: &'static str,
    pub ids: &'static [(u16, u16)],
    pub usage_page: u16,
    pub interface_number: i32,
}

impl DeviceFilter {
    /// Known (vendor, product) pair, and either the usage page (Windows,
    /// macOS) or the interface index (Linux) matches.
    pub fn matches(&self, info: &UsbDeviceInfo) -> bool {
        let known = self
            .ids
            .iter()
            .any(|&(vendor, product)| vendor == info.vendor_id && product == info.product_id);
        known
            && (info.usage_page == self.usage_page
                || info.interface_number == self.interface_number)
    }
}

/// Initializes every candidate, logging and dropping the ones that fail.
pub fn initialize_each<C, W, F>(name: &str, candidates: Vec<(UsbDeviceInfo, C)>, mut init: F) -> Vec<W>
where
    F: FnMut(C) -> Result<W, WalletError>,
{
    let mut wallets = Vec::with_capacity(candidates.len());
    for (info, candidate) in candidates {
        match init(candidate) {
            Ok(wallet) => {
                tracing::info!(device = %info.path, "{} initialized", name);
                wallets.push(wallet);
            }
            Err(err) => {
                tracing::warn!(device = %info.path, error = %err, "skipping {}: initialization failed", name);
            }
        }
    }
    wallets
}

#[cfg(any(feature = "trezor", feature = "ledger"))]
pub use backend::{open_matching, HidapiLink};

#[cfg(any(feature = "trezor", feature = "ledger"))]
mod backend {
    use super::{DeviceFilter, HidLink, Report, UsbDeviceInfo, REPORT_SIZE};
    use crate::core::errors::WalletError;
    use hidapi::{HidApi, HidDevice};
    use tracing::{debug, warn};

    /// hidapi-backed link.
    pub struct HidapiLink {
        device: HidDevice,
    }

    impl HidLink for HidapiLink {
        fn write_report(&mut self, report: &Report) -> Result<(), WalletError> {
            // hidapi wants the report id in front; both vendors use id 0 here.
            let mut buf = [0u8; REPORT_SIZE + 1];
            buf[1..].copy_from_slice(report);
            self.device
                .write(&buf)
                .map_err(|e| WalletError::Usb(format!("write failed: {}", e)))?;
            Ok(())
        }

        fn read_report(&mut self) -> Result<Report, WalletError> {
            let mut report = [0u8; REPORT_SIZE];
            let mut filled = 0;
            while filled < REPORT_SIZE {
                let n = self
                    .device
                    .read(&mut report[filled..])
                    .map_err(|e| WalletError::Usb(format!("read failed: {}", e)))?;
                filled += n;
            }
            Ok(report)
        }
    }

    /// Enumerates HID devices and opens every one the filter accepts.
    /// Devices that fail to open are logged and skipped.
    pub fn open_matching(
        filter: &DeviceFilter,
    ) -> Result<Vec<(UsbDeviceInfo, HidapiLink)>, WalletError> {
        let api = HidApi::new().map_err(|e| WalletError::Usb(format!("hidapi init failed: {}", e)))?;

        let mut opened = Vec::new();
        for dev in api.device_list() {
            let info = UsbDeviceInfo {
                vendor_id: dev.vendor_id(),
                product_id: dev.product_id(),
                usage_page: dev.usage_page(),
                interface_number: dev.interface_number(),
                path: dev.path().to_string_lossy().into_owned(),
            };
            if !filter.matches(&info) {
                continue;
            }
            debug!(device = %info.path, "{} candidate {:04x}:{:04x}", filter.name, info.vendor_id, info.product_id);
            match dev.open_device(&api) {
                Ok(device) => opened.push((info, HidapiLink { device })),
                Err(e) => warn!(device = %info.path, error = %e, "skipping {}: open failed", filter.name),
            }
        }
        Ok(opened)
    }
}
