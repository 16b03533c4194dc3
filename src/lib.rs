#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]
// src/lib.rs

pub mod cli;
pub mod commands;
pub mod core;
pub mod keystore;
pub mod ui;

// Hardware wallet protocols; USB access is behind the `trezor` / `ledger` features
pub mod hardware;
