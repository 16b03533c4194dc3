use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::derivation::{PathTemplate, DEFAULT_TEMPLATE};
use crate::core::errors::WalletError;

/// Environment variable naming a settings file.
pub const CONFIG_ENV: &str = "HWSIGN_CONFIG";

/// Settings file contents. Every field is optional in the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Default keystore directory.
    #[serde(default)]
    pub keystore: Option<PathBuf>,

    /// Derivation templates searched for hardware accounts.
    #[serde(default = "Settings::default_hd_paths")]
    pub hd_paths: Vec<String>,

    /// Highest account index tried per template (inclusive).
    #[serde(default = "Settings::default_max_index")]
    pub max_index: u32,
}

impl Settings {
    fn default_hd_paths() -> Vec<String> {
        vec![DEFAULT_TEMPLATE.to_string()]
    }
    fn default_max_index() -> u32 {
        2
    }

    pub fn from_toml(text: &str) -> Result<Self, WalletError> {
        toml::from_str(text).map_err(|e| WalletError::InvalidInput(format!("settings: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Loads `explicit`, else the file named by `HWSIGN_CONFIG`, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, WalletError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keystore: None,
            hd_paths: Self::default_hd_paths(),
            max_index: Self::default_max_index(),
        }
    }
}

/// Which wallet backs the current invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletSource {
    Keystore(PathBuf),
    Trezor,
    Ledger,
}

/// Configuration for one invocation, built once from settings and flags and
/// passed by reference to every command.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub source: WalletSource,
    pub templates: Vec<PathTemplate>,
    pub max_index: u32,
}

/// Command-line values that override [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub keystore: Option<PathBuf>,
    pub trezor: bool,
    pub ledger: bool,
    pub hd_paths: Vec<String>,
    pub max_index: Option<u32>,
}

impl BridgeConfig {
    pub fn resolve(settings: Settings, overrides: Overrides) -> Result<Self, WalletError> {
        let keystore = overrides.keystore.or(settings.keystore);
        let source = match (overrides.trezor, overrides.ledger) {
            (true, true) => {
                return Err(WalletError::InvalidInput(
                    "choose one of --trezor and --ledger".to_string(),
                ))
            }
            (true, false) => WalletSource::Trezor,
            (false, true) => WalletSource::Ledger,
            (false, false) => match keystore {
                Some(dir) => WalletSource::Keystore(dir),
                None => {
                    return Err(WalletError::InvalidInput(
                        "no wallet selected: pass --keystore <dir>, --trezor or --ledger"
                            .to_string(),
                    ))
                }
            },
        };

        let raw_paths = if overrides.hd_paths.is_empty() {
            settings.hd_paths
        } else {
            overrides.hd_paths
        };
        let templates = raw_paths
            .iter()
            .map(|p| PathTemplate::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        if templates.is_empty() {
            return Err(WalletError::InvalidInput("no derivation templates".to_string()));
        }

        Ok(Self {
            source,
            templates,
            max_index: overrides.max_index.unwrap_or(settings.max_index),
        })
    }

    pub fn is_hardware(&self) -> bool {
        !matches!(self.source, WalletSource::Keystore(_))
    }
}
