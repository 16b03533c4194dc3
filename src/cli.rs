use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::config::Overrides;

/// Ethereum signing bridge for keystores and hardware wallets
#[derive(Debug, Parser)]
#[command(
    name = "hwsign",
    about = "Sign Ethereum transactions and messages with a keystore, Trezor or Ledger",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Keystore directory
    #[arg(long, global = true)]
    pub keystore: Option<PathBuf>,

    /// Use attached Trezor devices
    #[arg(long, global = true)]
    pub trezor: bool,

    /// Use attached Ledger devices
    #[arg(long, global = true)]
    pub ledger: bool,

    /// Derivation template with one `%d` index placeholder (repeatable)
    #[arg(long = "hd", global = true)]
    pub hd_paths: Vec<String>,

    /// Highest account index to derive per template
    #[arg(short = 'n', long = "max", global = true)]
    pub max_index: Option<u32>,

    /// Settings file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging and detailed account listings
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            keystore: self.keystore.clone(),
            trezor: self.trezor,
            ledger: self.ledger,
            hd_paths: self.hd_paths.clone(),
            max_index: self.max_index,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List accounts
    #[command(visible_alias = "ls")]
    Accounts,
    /// Create a new account in the keystore
    New,
    /// Import a hex private key into the keystore
    ImportKey,
    /// Sign a transaction
    #[command(visible_alias = "tx")]
    Sign(SignArgs),
    /// Sign a message
    #[command(visible_alias = "msg")]
    SignMsg(SignMsgArgs),
    /// Recover the signer address of a message signature
    Recover(RecoverArgs),
    /// Encrypt data on a Trezor
    #[command(visible_alias = "hwe")]
    Hwencrypt(CipherArgs),
    /// Decrypt data on a Trezor
    #[command(visible_alias = "hwd")]
    Hwdecrypt(CipherArgs),
    /// Show attached hardware wallets
    Status,
}

#[derive(Debug, Clone, Default, Args)]
pub struct SignArgs {
    /// Account to sign with
    #[arg(long)]
    pub from: Option<String>,
    /// Recipient; omit to deploy a contract
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long)]
    pub nonce: Option<u64>,
    #[arg(long = "gas-limit", alias = "gas")]
    pub gas_limit: Option<u64>,
    /// Gas price for a legacy transaction
    #[arg(long = "gas-price")]
    pub gas_price: Option<String>,
    /// Priority fee; selects an EIP-1559 transaction
    #[arg(long = "gas-tip")]
    pub gas_tip: Option<String>,
    /// Max fee per gas for an EIP-1559 transaction (defaults to --gas-price)
    #[arg(long = "gas-maxfee")]
    pub gas_max_fee: Option<String>,
    /// Amount: wei, 0x-hex wei, or with a unit (`1.5gwei`, `0.1eth`)
    #[arg(long)]
    pub value: Option<String>,
    #[arg(long = "chain-id")]
    pub chain_id: Option<u64>,
    /// Hex call data
    #[arg(long, alias = "data")]
    pub input: Option<String>,
    /// Read transaction fields as JSON from stdin; flags override them
    #[arg(long)]
    pub stdin: bool,
    /// Print `{chainId, tx, txsig}` JSON
    #[arg(long, conflicts_with = "sig")]
    pub json: bool,
    /// Print only the signature `r || s || v`
    #[arg(long)]
    pub sig: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SignMsgArgs {
    #[arg(long)]
    pub from: String,
    /// Message; `0x` prefix means hex, otherwise text
    #[arg(long)]
    pub data: String,
    /// Prepend the `\x19Ethereum Signed Message:\n<len>` header
    #[arg(long)]
    pub with_eth_prefix: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RecoverArgs {
    /// Signed message; `0x` prefix means hex, otherwise text
    #[arg(long)]
    pub data: String,
    /// 65-byte hex signature with v 27/28
    #[arg(long)]
    pub sig: String,
    #[arg(long)]
    pub with_eth_prefix: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CipherArgs {
    #[arg(long)]
    pub from: String,
    /// Cipher key label; `0x` prefix means hex, otherwise text
    #[arg(long)]
    pub key: String,
    /// Input; `0x` prefix means hex, otherwise text
    #[arg(long)]
    pub data: String,
}
