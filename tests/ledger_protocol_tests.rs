//! Ledger protocol tests against a simulated Ethereum app

mod util;

use std::cell::RefCell;
use std::rc::Rc;

use ethers::signers::Signer;
use ethers::types::{Address, Bytes, U256};
use pretty_assertions::assert_eq;

use hwsign::core::errors::WalletError;
use hwsign::core::message::{recover, with_eth_prefix};
use hwsign::core::transaction::{Fees, TxParams};
use hwsign::hardware::ledger::apdu::{ApduClass, ApduCommand, ApduInstruction, MAX_APDU_DATA};
use hwsign::hardware::ledger::{AppVersion, LedgerDevice, LedgerTransport};
use hwsign::hardware::HwWallet;
use util::{path, wallet, KeyTable, LedgerState, SimLedger};

const BASE: &str = "m/44'/60'/0'/0/0";
const LEGACY_BASE: &str = "m/44'/60'/0'/0";

const INS_GET_ADDRESS: u8 = 0x02;
const INS_SIGN: u8 = 0x04;
const INS_CONFIG: u8 = 0x06;
const INS_PERSONAL_SIGN: u8 = 0x08;

fn keyed() -> LedgerState {
    LedgerState::new(
        KeyTable::default()
            .with(BASE, wallet(3))
            .with(LEGACY_BASE, wallet(4)),
    )
}

fn open(state: LedgerState) -> (LedgerDevice<SimLedger>, Rc<RefCell<LedgerState>>) {
    let state = Rc::new(RefCell::new(state));
    let device = LedgerDevice::open(SimLedger::shared(state.clone())).unwrap();
    (device, state)
}

fn tx_params(chain_id: u64, data: Vec<u8>, fees: Fees) -> TxParams {
    TxParams {
        chain_id,
        nonce: U256::from(7u64),
        to: Some(Address::from_low_u64_be(0xbeef)),
        value: U256::from(10u64).pow(U256::from(16u64)),
        data: Bytes::from(data),
        gas_limit: U256::from(60_000u64),
        fees,
    }
}

fn legacy_fees() -> Fees {
    Fees::Legacy {
        gas_price: U256::from(3_000_000_000u64),
    }
}

#[test]
fn test_probe_reads_app_version() {
    let (device, state) = open(keyed());
    assert_eq!(
        device.version(),
        AppVersion {
            major: 1,
            minor: 9,
            patch: 17
        }
    );
    assert!(!device.is_offline());
    assert!(!device.is_browser_mode());
    assert_eq!(device.status(), "Ledger Ethereum app v1.9.17 online");
    assert_eq!(device.label(), "ledger v1.9.17");

    let state = state.borrow();
    assert_eq!(state.commands_for(INS_GET_ADDRESS).len(), 1);
    assert_eq!(state.commands_for(INS_CONFIG).len(), 1);
}

#[test]
fn test_version_query_failure_falls_back() {
    let mut state = keyed();
    state.config = None;
    let (device, _) = open(state);
    assert_eq!(device.version(), AppVersion::FALLBACK);
    assert_eq!(device.status(), "Ledger Ethereum app v1.0.0 online");
}

#[test]
fn test_closed_app_is_offline() {
    let mut state = keyed();
    state.app_open = false;
    let (device, state) = open(state);
    assert!(device.is_offline());
    assert_eq!(device.status(), "Ledger Ethereum app offline");
    assert!(state.borrow().commands_for(INS_CONFIG).is_empty());
}

#[test]
fn test_foreign_header_means_browser_mode() {
    let mut state = keyed();
    state.browser = true;
    let (device, _) = open(state);
    assert!(device.is_browser_mode());
    assert!(!device.is_offline());
    assert_eq!(device.status(), "Ledger Ethereum app in browser mode");
}

#[test]
fn test_derive() {
    let (mut device, _) = open(keyed());
    assert_eq!(device.derive(&path(BASE)).unwrap(), wallet(3).address());
    assert_eq!(device.derive(&path(LEGACY_BASE)).unwrap(), wallet(4).address());
}

#[test]
fn test_derive_on_closed_app_reports_status_word() {
    let mut state = keyed();
    state.app_open = false;
    let (mut device, _) = open(state);
    match device.derive(&path(BASE)).unwrap_err() {
        WalletError::ApduStatus { code, .. } => assert_eq!(code, 0x6511),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_legacy_transaction_matches_local_signature() {
    let key = wallet(3);
    let (mut device, _) = open(keyed());
    let tx = tx_params(1, vec![], legacy_fees()).build(key.address());

    let (sender, signed) = device.sign_transaction(&path(BASE), &tx, 1).unwrap();
    assert_eq!(sender, key.address());
    assert!(signed.signature.v == 37 || signed.signature.v == 38);

    let expected = key.with_chain_id(1u64).sign_transaction_sync(&tx).unwrap();
    assert_eq!(signed.raw, tx.rlp_signed(&expected));
}

#[test]
fn test_legacy_v_overflowing_a_byte() {
    // chainId 1337 puts v at 2709/2710, which the app truncates to one byte
    let key = wallet(3);
    let (mut device, _) = open(keyed());
    let tx = tx_params(1337, vec![], legacy_fees()).build(key.address());

    let (sender, signed) = device.sign_transaction(&path(BASE), &tx, 1337).unwrap();
    assert_eq!(sender, key.address());
    assert!(signed.signature.v == 2709 || signed.signature.v == 2710);
}

#[test]
fn test_long_transaction_is_split_into_blocks() {
    let key = wallet(3);
    let (mut device, state) = open(keyed());
    let tx = tx_params(1, vec![0xab; 700], legacy_fees()).build(key.address());

    let (sender, signed) = device.sign_transaction(&path(BASE), &tx, 1).unwrap();
    assert_eq!(sender, key.address());

    let state = state.borrow();
    let blocks = state.commands_for(INS_SIGN);
    assert!(blocks.len() >= 3);
    assert_eq!(blocks[0].p1, 0x00);
    assert!(blocks[1..].iter().all(|b| b.p1 == 0x80));
    assert!(blocks.iter().all(|b| b.data.len() <= MAX_APDU_DATA));
    let last = blocks.last().unwrap().data.len();
    assert!(!(1..=3).contains(&last));

    let sent: usize = blocks.iter().map(|b| b.data.len()).sum();
    let mut unsigned = signed.tx.clone();
    unsigned.set_chain_id(1u64);
    assert_eq!(sent, path(BASE).to_bytes().len() + unsigned.rlp().len());
}

#[test]
fn test_eip1559_transaction() {
    let key = wallet(3);
    let (mut device, _) = open(keyed());
    let tx = tx_params(
        10,
        vec![0x01, 0x02],
        Fees::Dynamic {
            max_fee: U256::from(40_000_000_000u64),
            priority_fee: U256::from(1_000_000_000u64),
        },
    )
    .build(key.address());

    let (sender, signed) = device.sign_transaction(&path(BASE), &tx, 10).unwrap();
    assert_eq!(sender, key.address());
    assert!(signed.signature.v <= 1);

    let expected = key.with_chain_id(10u64).sign_transaction_sync(&tx).unwrap();
    assert_eq!(signed.raw, tx.rlp_signed(&expected));
}

#[test]
fn test_personal_message_across_blocks() {
    let key = wallet(3);
    let (mut device, state) = open(keyed());
    let message = vec![b'm'; 400];

    let (signer, signature) = device.sign_message(&path(BASE), &message).unwrap();
    assert_eq!(signer, key.address());
    assert_eq!(
        recover(&with_eth_prefix(&message), &signature.to_rsv_bytes()).unwrap(),
        key.address()
    );

    let state = state.borrow();
    let blocks = state.commands_for(INS_PERSONAL_SIGN);
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].data.len(), MAX_APDU_DATA);
    assert_eq!(blocks[1].p1, 0x80);
}

#[test]
fn test_cipher_is_not_supported() {
    let (mut device, _) = open(keyed());
    let err = device
        .encrypt(&path(BASE), "key", b"data", true, true)
        .unwrap_err();
    assert!(matches!(err, WalletError::NotSupported(_)));
    let err = device
        .decrypt(&path(BASE), "key", &[0; 16], true, true)
        .unwrap_err();
    assert!(matches!(err, WalletError::NotSupported(_)));
}

#[test]
fn test_transport_keeps_failed_status_words() {
    let mut state = keyed();
    state.app_open = false;
    let mut transport = LedgerTransport::new(SimLedger::new(state));
    let command = ApduCommand::new(
        ApduClass::Standard,
        ApduInstruction::GetAppConfiguration,
        0x00,
        0x00,
        vec![],
    )
    .unwrap();

    let response = transport.exchange(&command).unwrap();
    assert!(!response.is_success());
    assert_eq!(response.status_code(), 0x6511);

    let err = transport.call(&command).unwrap_err();
    assert!(matches!(err, WalletError::ApduStatus { code: 0x6511, .. }));
}

#[test]
fn test_transport_configuration_round_trip() {
    let mut transport = LedgerTransport::new(SimLedger::new(keyed()));
    let command = ApduCommand::new(
        ApduClass::Standard,
        ApduInstruction::GetAppConfiguration,
        0x00,
        0x00,
        vec![],
    )
    .unwrap();
    assert_eq!(transport.call(&command).unwrap(), vec![0x01, 1, 9, 17]);
}
