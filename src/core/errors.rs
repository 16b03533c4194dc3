use ethers::types::Address;

/// Error type shared by the hardware protocol layer, the resolver and the
/// keystore collaborator.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// The reply did not start with the vendor's transport constants.
    /// Usually means the device is in browser (WebUSB/U2F) mode.
    #[error("{vendor}: invalid reply header")]
    InvalidReplyHeader { vendor: &'static str },

    /// A reply was framed correctly but a required field is missing or short.
    #[error("{vendor}: malformed reply: {reason}")]
    MalformedReply { vendor: &'static str, reason: String },

    /// The device answered with an explicit failure message.
    #[error("{vendor}: {message}")]
    DeviceFailure { vendor: &'static str, message: String },

    /// Ledger status word other than 0x9000.
    #[error("ledger: status {code:#06x} ({description})")]
    ApduStatus { code: u16, description: &'static str },

    #[error("{vendor}: expected reply {expected}, got {actual}")]
    UnexpectedReply {
        vendor: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Invalid PIN provided")]
    InvalidPin,

    #[error("failed to read {what}: {source}")]
    Prompt {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("No account found for address: {0:?}")]
    AccountNotFound(Address),

    #[error("Found {count} accounts for address {address:?}, widen or narrow the search")]
    AmbiguousAccount { address: Address, count: usize },

    /// The signer recovered from a device signature differs from the account.
    #[error("signer mismatch: expected {expected:?}, recovered {actual:?}")]
    SenderMismatch { expected: Address, actual: Address },

    #[error("USB error: {0}")]
    Usb(String),

    #[error("invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("keystore error: {0}")]
    Keystore(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WalletError {
    pub fn malformed(vendor: &'static str, reason: impl Into<String>) -> Self {
        WalletError::MalformedReply {
            vendor,
            reason: reason.into(),
        }
    }

    /// Reply bytes did not follow the transport or message layout.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            WalletError::InvalidReplyHeader { .. } | WalletError::MalformedReply { .. }
        )
    }

    /// Account lookup failed; a wider or narrower search may help.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            WalletError::AccountNotFound(_) | WalletError::AmbiguousAccount { .. }
        )
    }

    pub fn is_user_input(&self) -> bool {
        matches!(self, WalletError::InvalidPin | WalletError::Prompt { .. })
    }

    /// Errors that point at a broken device or a bug rather than user action.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            WalletError::SenderMismatch { .. } | WalletError::InvalidSignature(_)
        )
    }
}

impl From<ethers::types::SignatureError> for WalletError {
    fn from(err: ethers::types::SignatureError) -> Self {
        WalletError::InvalidSignature(err.to_string())
    }
}

impl From<ethers::signers::WalletError> for WalletError {
    fn from(err: ethers::signers::WalletError) -> Self {
        WalletError::Keystore(err.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Keystore(err.to_string())
    }
}
