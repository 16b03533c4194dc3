//! Command implementations behind the CLI.
//!
//! Every command runs against a [`Session`]: the resolved configuration,
//! the prompt and the device discovery function. Results go to the given
//! writer; diagnostics go through `tracing`.

mod accounts;
mod cipher;
mod message;
mod sign;

use std::io::Write;
use std::rc::Rc;

use anyhow::Context;
use ethers::types::Address;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::cli::{Cli, Commands};
use crate::core::account::{checksum, Account, Scheme};
use crate::core::config::{BridgeConfig, Settings, WalletSource};
use crate::core::errors::WalletError;
use crate::hardware::{self, HwWallet, Vendor};
use crate::keystore::Keystore;
use crate::ui::Prompt;

pub use sign::{sign_output, tx_params, SignOutput};

/// Opens every attached device of one vendor.
pub type Discovery = Box<dyn Fn(Vendor, Rc<dyn Prompt>) -> Result<Vec<Box<dyn HwWallet>>, WalletError>>;

/// Parses the command line, loads settings and runs one command.
pub fn run(cli: Cli, prompt: Rc<dyn Prompt>, out: &mut dyn Write) -> anyhow::Result<()> {
    if let Commands::Recover(args) = &cli.command {
        return message::recover(args, out);
    }
    let settings = Settings::discover(cli.config.as_deref()).context("loading settings")?;
    let config =
        BridgeConfig::resolve(settings, cli.overrides()).context("resolving configuration")?;
    debug!(source = ?config.source, max_index = config.max_index, "configuration resolved");
    Session::new(config, prompt).execute(cli.command, cli.verbose, out)
}

pub struct Session {
    pub config: BridgeConfig,
    prompt: Rc<dyn Prompt>,
    discovery: Discovery,
}

impl Session {
    pub fn new(config: BridgeConfig, prompt: Rc<dyn Prompt>) -> Self {
        Self {
            config,
            prompt,
            discovery: Box::new(hardware::discover),
        }
    }

    /// Replaces USB discovery, e.g. with simulated devices.
    pub fn with_discovery(mut self, discovery: Discovery) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn execute(&self, command: Commands, verbose: bool, out: &mut dyn Write) -> anyhow::Result<()> {
        match command {
            Commands::Accounts => accounts::list(self, verbose, out),
            Commands::New => accounts::new_account(self, out),
            Commands::ImportKey => accounts::import_key(self, out),
            Commands::Status => accounts::status(self, out),
            Commands::Sign(args) => sign::sign(self, &args, out),
            Commands::SignMsg(args) => message::sign_msg(self, &args, out),
            Commands::Recover(args) => message::recover(&args, out),
            Commands::Hwencrypt(args) => cipher::encrypt(self, &args, out),
            Commands::Hwdecrypt(args) => cipher::decrypt(self, &args, out),
        }
    }

    pub fn prompt(&self) -> &dyn Prompt {
        self.prompt.as_ref()
    }

    pub fn keystore(&self) -> Option<Keystore> {
        match &self.config.source {
            WalletSource::Keystore(dir) => Some(Keystore::new(dir.clone())),
            _ => None,
        }
    }

    fn require_keystore(&self) -> Result<Keystore, WalletError> {
        self.keystore().ok_or_else(|| {
            WalletError::NotSupported("this command only works with --keystore".to_string())
        })
    }

    fn vendor(&self) -> Option<Vendor> {
        match self.config.source {
            WalletSource::Trezor => Some(Vendor::Trezor),
            WalletSource::Ledger => Some(Vendor::Ledger),
            WalletSource::Keystore(_) => None,
        }
    }

    /// Discovers the devices of the configured vendor; none is an error.
    pub fn open_wallets(&self) -> Result<Vec<Box<dyn HwWallet>>, WalletError> {
        let vendor = self.vendor().ok_or_else(|| {
            WalletError::InvalidInput("this command needs --trezor or --ledger".to_string())
        })?;
        let wallets = (self.discovery)(vendor, self.prompt.clone())?;
        if wallets.is_empty() {
            return Err(WalletError::Usb(format!("no {} found", Scheme::from(vendor))));
        }
        info!("found {} wallet(s)", wallets.len());
        Ok(wallets)
    }

    /// Reads the keystore password for `account`.
    fn password_for(&self, account: &Account) -> Result<Zeroizing<String>, WalletError> {
        self.prompt
            .read_secret(&format!("Password for {}: ", checksum(&account.address)))
            .map_err(|source| WalletError::Prompt {
                what: "password",
                source,
            })
    }

    /// Runs `op` on the single hardware account deriving `address`.
    fn with_hardware_account<T>(
        &self,
        address: Address,
        op: impl FnOnce(&mut dyn HwWallet, &Account) -> Result<T, WalletError>,
    ) -> Result<T, WalletError> {
        let mut wallets = self.open_wallets()?;
        let (wallet, account) = hardware::resolve(
            &mut wallets,
            address,
            &self.config.templates,
            self.config.max_index,
        )?;
        info!(account = %account, "found account");
        op(wallet, &account)
    }
}

/// `0x`-prefixed input is hex, anything else is taken as text.
pub fn parse_input_bytes(input: &str) -> Result<Vec<u8>, WalletError> {
    match input.strip_prefix("0x") {
        Some(digits) => hex::decode(digits)
            .map_err(|e| WalletError::InvalidInput(format!("invalid hex input: {}", e))),
        None => Ok(input.as_bytes().to_vec()),
    }
}

pub fn hex_string(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
