pub mod account;
pub mod config;
pub mod derivation;
pub mod errors;
pub mod message;
pub mod signature;
pub mod transaction;

pub use account::{Account, AccountLocation, Scheme};
pub use derivation::{DerivationPath, PathTemplate};
pub use errors::WalletError;
pub use signature::Signature;
