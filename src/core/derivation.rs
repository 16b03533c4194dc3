//! BIP-32 derivation paths and the `%d` path templates used for account search.

use std::fmt;
use std::str::FromStr;

use crate::core::errors::WalletError;

/// Bit marking a hardened index.
pub const HARDENED: u32 = 0x8000_0000;

/// Ledger refuses paths deeper than this.
pub const MAX_DEPTH: usize = 10;

/// Placeholder replaced by the account index in a [`PathTemplate`].
pub const INDEX_PLACEHOLDER: &str = "%d";

/// Default account template: `m/44'/60'/<index>'/0/0`.
pub const DEFAULT_TEMPLATE: &str = "m/44'/60'/%d'/0/0";

/// Path the Ledger wallet derives during initialization.
pub const DEFAULT_BASE_PATH: &str = "m/44'/60'/0'/0/0";

/// An immutable BIP-32 derivation path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    components: Vec<u32>,
}

impl DerivationPath {
    pub fn new(components: Vec<u32>) -> Result<Self, WalletError> {
        if components.is_empty() {
            return Err(WalletError::InvalidPath("path has no components".to_string()));
        }
        if components.len() > MAX_DEPTH {
            return Err(WalletError::InvalidPath(format!(
                "path depth {} exceeds {}",
                components.len(),
                MAX_DEPTH
            )));
        }
        Ok(Self { components })
    }

    pub fn components(&self) -> &[u32] {
        &self.components
    }

    /// Depth byte followed by each index as big-endian u32 (Ledger APDU layout).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + 4 * self.components.len());
        bytes.push(self.components.len() as u8);
        for index in &self.components {
            bytes.extend_from_slice(&index.to_be_bytes());
        }
        bytes
    }
}

impl FromStr for DerivationPath {
    type Err = WalletError;

    /// Parses `m/44'/60'/0'/0/0`. Hardened components may use `'` or `h`.
    fn from_str(path_str: &str) -> Result<Self, Self::Err> {
        let rest = path_str
            .trim()
            .strip_prefix("m/")
            .ok_or_else(|| WalletError::InvalidPath(format!("must start with m/: {}", path_str)))?;

        if rest.is_empty() {
            return Err(WalletError::InvalidPath(format!(
                "no components: {}",
                path_str
            )));
        }

        let mut components = Vec::new();
        for part in rest.split('/') {
            let hardened = part.ends_with('\'') || part.ends_with('h') || part.ends_with('H');
            let digits = if hardened { &part[..part.len() - 1] } else { part };

            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(WalletError::InvalidPath(format!(
                    "invalid component {:?} in {}",
                    part, path_str
                )));
            }
            let index: u32 = digits
                .parse()
                .map_err(|_| WalletError::InvalidPath(format!("index out of range: {}", part)))?;

            if index >= HARDENED {
                return Err(WalletError::InvalidPath(format!(
                    "index out of range: {}",
                    part
                )));
            }
            if hardened {
                components.push(index | HARDENED);
            } else {
                components.push(index);
            }
        }

        Self::new(components)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.components {
            if index & HARDENED != 0 {
                write!(f, "/{}'", index & !HARDENED)?;
            } else {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}

/// A derivation path with exactly one `%d` index placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    template: String,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, WalletError> {
        let template = template.trim();
        if template.matches(INDEX_PLACEHOLDER).count() != 1 {
            return Err(WalletError::InvalidPath(format!(
                "template needs exactly one {}: {}",
                INDEX_PLACEHOLDER, template
            )));
        }
        let parsed = Self {
            template: template.to_string(),
        };
        // Validate the rest of the template once up front.
        parsed.instantiate(0)?;
        Ok(parsed)
    }

    pub fn instantiate(&self, index: u32) -> Result<DerivationPath, WalletError> {
        self.template
            .replacen(INDEX_PLACEHOLDER, &index.to_string(), 1)
            .parse()
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl Default for PathTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}
