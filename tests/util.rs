// tests/util.rs
// Simulated devices and prompts shared by the integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Eip1559TransactionRequest, TransactionRequest, H256, U256};
use ethers::utils::rlp::Rlp;
use ethers::utils::{hash_message, keccak256};
use zeroize::Zeroizing;

use hwsign::core::account::checksum;
use hwsign::core::derivation::DerivationPath;
use hwsign::core::errors::WalletError;
use hwsign::hardware::hid::{HidLink, Report, REPORT_SIZE};
use hwsign::hardware::ledger::apdu::ApduCommand;
use hwsign::hardware::ledger::transport as ledger_wire;
use hwsign::hardware::trezor::messages::{
    ButtonRequest, CipherKeyValue, CipheredKeyValue, EthereumAddress, EthereumGetAddress,
    EthereumMessageSignature, EthereumSignMessage, EthereumSignTx, EthereumSignTxEip1559,
    EthereumTxAck, EthereumTxRequest, Failure, Features, MessageType, PassphraseRequest,
    PinMatrixAck, PinMatrixRequest, ProtoMessage, TrezorMessage,
};
use hwsign::hardware::trezor::transport as trezor_wire;
use hwsign::ui::Prompt;

/// Deterministic test key; `seed` must be non-zero.
pub fn wallet(seed: u8) -> LocalWallet {
    LocalWallet::from_bytes(&[seed; 32]).unwrap()
}

pub fn path(text: &str) -> DerivationPath {
    text.parse().unwrap()
}

fn path_bytes(components: &[u32]) -> Vec<u8> {
    components.iter().flat_map(|c| c.to_be_bytes()).collect()
}

/// Address a simulated device reports for a path without a registered key.
pub fn filler_address(components: &[u32]) -> Address {
    Address::from_slice(&keccak256(path_bytes(components))[12..])
}

/// Keys by derivation path; unknown paths get a deterministic filler address
/// and cannot sign.
#[derive(Default, Clone)]
pub struct KeyTable {
    keys: HashMap<Vec<u32>, LocalWallet>,
}

impl KeyTable {
    pub fn with(mut self, at: &str, key: LocalWallet) -> Self {
        self.keys.insert(path(at).components().to_vec(), key);
        self
    }

    pub fn address(&self, components: &[u32]) -> Address {
        self.keys
            .get(components)
            .map(|k| k.address())
            .unwrap_or_else(|| filler_address(components))
    }

    fn key(&self, components: &[u32]) -> Result<&LocalWallet, WalletError> {
        self.keys
            .get(components)
            .ok_or_else(|| WalletError::Usb("simulated device has no key for path".to_string()))
    }
}

fn rs_bytes(value: U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    buf.to_vec()
}

// ---------------------------------------------------------------------------
// Trezor
// ---------------------------------------------------------------------------

struct PendingTx {
    path: Vec<u32>,
    tx: TypedTransaction,
    chain_id: u64,
    data: Vec<u8>,
    total: usize,
}

/// Device side of the Trezor wire protocol.
pub struct TrezorState {
    pub keys: KeyTable,
    pub label: String,
    pub pin: Option<String>,
    pub passphrase: bool,
    pub confirm: bool,
    /// Every message the host sent, in order.
    pub requests: Vec<TrezorMessage>,
    unlocked: bool,
    passphrase_given: bool,
    held: Option<TrezorMessage>,
    button_reply: Option<TrezorMessage>,
    signing: Option<PendingTx>,
}

impl TrezorState {
    pub fn new(keys: KeyTable) -> Self {
        Self {
            keys,
            label: "sim".to_string(),
            pin: None,
            passphrase: false,
            confirm: false,
            requests: Vec::new(),
            unlocked: false,
            passphrase_given: false,
            held: None,
            button_reply: None,
            signing: None,
        }
    }

    pub fn sent(&self, kind: MessageType) -> usize {
        self.requests.iter().filter(|m| m.is(kind)).count()
    }

    pub fn first<M: ProtoMessage>(&self) -> M {
        self.requests
            .iter()
            .find(|m| m.is(M::KIND))
            .expect("request was not sent")
            .decode()
            .unwrap()
    }

    fn features(&self) -> Features {
        Features {
            vendor: Some("trezor.io".to_string()),
            major_version: 2,
            minor_version: 6,
            patch_version: 0,
            pin_protection: Some(self.pin.is_some()),
            passphrase_protection: Some(self.passphrase),
            label: Some(self.label.clone()),
            initialized: Some(true),
            model: Some("T".to_string()),
            ..Features::default()
        }
    }

    fn respond(&mut self, msg: TrezorMessage) -> Result<TrezorMessage, WalletError> {
        self.requests.push(msg.clone());
        match MessageType::from_u16(msg.kind) {
            Some(MessageType::Initialize) | Some(MessageType::GetFeatures) => {
                Ok(TrezorMessage::from_message(&self.features()))
            }
            Some(MessageType::Cancel) => {
                self.held = None;
                self.button_reply = None;
                self.signing = None;
                Ok(failure("Cancelled"))
            }
            Some(MessageType::PinMatrixAck) => {
                let ack: PinMatrixAck = msg.decode()?;
                if Some(ack.pin) != self.pin {
                    self.held = None;
                    return Ok(failure("PIN invalid"));
                }
                self.unlocked = true;
                self.resume()
            }
            Some(MessageType::PassphraseAck) => {
                self.passphrase_given = true;
                self.resume()
            }
            Some(MessageType::ButtonAck) => Ok(self
                .button_reply
                .take()
                .unwrap_or_else(|| failure("Unexpected message"))),
            _ => self.dispatch(msg),
        }
    }

    fn resume(&mut self) -> Result<TrezorMessage, WalletError> {
        match self.held.take() {
            Some(held) => self.dispatch(held),
            None => Ok(failure("Unexpected message")),
        }
    }

    fn dispatch(&mut self, msg: TrezorMessage) -> Result<TrezorMessage, WalletError> {
        if self.pin.is_some() && !self.unlocked {
            self.held = Some(msg);
            return Ok(TrezorMessage::from_message(&PinMatrixRequest { kind: Some(1) }));
        }
        if self.passphrase && !self.passphrase_given {
            self.held = Some(msg);
            return Ok(TrezorMessage::from_message(&PassphraseRequest));
        }

        match MessageType::from_u16(msg.kind) {
            Some(MessageType::EthereumGetAddress) => {
                let req: EthereumGetAddress = msg.decode()?;
                Ok(TrezorMessage::from_message(&EthereumAddress {
                    old_address: self.keys.address(&req.address_n).as_bytes().to_vec(),
                    address: None,
                }))
            }
            Some(MessageType::EthereumSignTx) => {
                let req: EthereumSignTx = msg.decode()?;
                let chain_id = req.chain_id.unwrap_or(1);
                let mut tx = TransactionRequest::new()
                    .nonce(U256::from_big_endian(&req.nonce))
                    .gas_price(U256::from_big_endian(&req.gas_price))
                    .gas(U256::from_big_endian(&req.gas_limit))
                    .value(U256::from_big_endian(&req.value))
                    .chain_id(chain_id);
                if let Some(to) = req.to.as_deref() {
                    tx = tx.to(parse_to(to)?);
                }
                let total = req
                    .data_length
                    .map(|n| n as usize)
                    .unwrap_or(req.data_initial_chunk.len());
                self.start_tx(req.address_n, tx.into(), chain_id, req.data_initial_chunk, total)
            }
            Some(MessageType::EthereumSignTxEip1559) => {
                let req: EthereumSignTxEip1559 = msg.decode()?;
                let mut tx = Eip1559TransactionRequest::new()
                    .nonce(U256::from_big_endian(&req.nonce))
                    .max_fee_per_gas(U256::from_big_endian(&req.max_gas_fee))
                    .max_priority_fee_per_gas(U256::from_big_endian(&req.max_priority_fee))
                    .gas(U256::from_big_endian(&req.gas_limit))
                    .value(U256::from_big_endian(&req.value))
                    .chain_id(req.chain_id);
                if let Some(to) = req.to.as_deref() {
                    tx = tx.to(parse_to(to)?);
                }
                let total = req.data_length as usize;
                self.start_tx(req.address_n, tx.into(), req.chain_id, req.data_initial_chunk, total)
            }
            Some(MessageType::EthereumTxAck) => {
                let ack: EthereumTxAck = msg.decode()?;
                match self.signing.as_mut() {
                    Some(pending) => pending.data.extend_from_slice(&ack.data_chunk),
                    None => return Ok(failure("Unexpected message")),
                }
                self.next_tx_step()
            }
            Some(MessageType::EthereumSignMessage) => {
                let req: EthereumSignMessage = msg.decode()?;
                let key = self.keys.key(&req.address_n)?;
                let signature = key.sign_hash(hash_message(&req.message))?;
                let reply = TrezorMessage::from_message(&EthereumMessageSignature {
                    signature: signature.to_vec(),
                    address: Some(checksum(&key.address())),
                });
                Ok(self.confirm(reply))
            }
            Some(MessageType::CipherKeyValue) => {
                let req: CipherKeyValue = msg.decode()?;
                if req.value.len() % 16 != 0 {
                    return Ok(failure("Value length must be a multiple of 16"));
                }
                let mut seed = req.key.as_bytes().to_vec();
                seed.extend_from_slice(&path_bytes(&req.address_n));
                let pad = keccak256(seed);
                let value = req
                    .value
                    .iter()
                    .zip(pad.iter().cycle())
                    .map(|(b, k)| b ^ k)
                    .collect();
                let reply = TrezorMessage::from_message(&CipheredKeyValue { value });
                Ok(self.confirm(reply))
            }
            _ => Ok(failure("Unexpected message")),
        }
    }

    fn confirm(&mut self, reply: TrezorMessage) -> TrezorMessage {
        if !self.confirm {
            return reply;
        }
        self.button_reply = Some(reply);
        TrezorMessage::from_message(&ButtonRequest { code: Some(8) })
    }

    fn start_tx(
        &mut self,
        path: Vec<u32>,
        tx: TypedTransaction,
        chain_id: u64,
        initial: Vec<u8>,
        total: usize,
    ) -> Result<TrezorMessage, WalletError> {
        self.signing = Some(PendingTx {
            path,
            tx,
            chain_id,
            data: initial,
            total,
        });
        self.next_tx_step()
    }

    fn next_tx_step(&mut self) -> Result<TrezorMessage, WalletError> {
        let left = match self.signing.as_ref() {
            Some(pending) => pending.total.saturating_sub(pending.data.len()),
            None => return Ok(failure("Unexpected message")),
        };
        if left > 0 {
            return Ok(TrezorMessage::from_message(&EthereumTxRequest {
                data_length: Some(left.min(1024) as u32),
                ..EthereumTxRequest::default()
            }));
        }

        let PendingTx {
            path,
            mut tx,
            chain_id,
            data,
            ..
        } = self.signing.take().unwrap();
        tx.set_data(data.into());
        let signature = self.keys.key(&path)?.sign_hash(tx.sighash())?;
        let parity = signature.v - 27;
        let v = match tx {
            TypedTransaction::Legacy(_) => chain_id * 2 + 35 + parity,
            _ => parity,
        };
        let reply = TrezorMessage::from_message(&EthereumTxRequest {
            data_length: None,
            signature_v: Some(v as u32),
            signature_r: rs_bytes(signature.r),
            signature_s: rs_bytes(signature.s),
        });
        Ok(self.confirm(reply))
    }
}

fn parse_to(text: &str) -> Result<Address, WalletError> {
    text.parse()
        .map_err(|_| WalletError::InvalidInput(format!("bad recipient {}", text)))
}

fn failure(message: &str) -> TrezorMessage {
    TrezorMessage::from_message(&Failure {
        code: Some(99),
        message: Some(message.to_string()),
    })
}

/// HID link backed by a [`TrezorState`].
pub struct SimTrezor {
    state: Rc<RefCell<TrezorState>>,
    reader: trezor_wire::FrameReader,
    outbox: VecDeque<Report>,
}

impl SimTrezor {
    pub fn new(state: TrezorState) -> Self {
        Self::shared(Rc::new(RefCell::new(state)))
    }

    /// A link onto existing state, e.g. to inspect requests afterwards.
    pub fn shared(state: Rc<RefCell<TrezorState>>) -> Self {
        Self {
            state,
            reader: trezor_wire::FrameReader::new(),
            outbox: VecDeque::new(),
        }
    }
}

impl HidLink for SimTrezor {
    fn write_report(&mut self, report: &Report) -> Result<(), WalletError> {
        if let Some(msg) = self.reader.push(report)? {
            let reply = self.state.borrow_mut().respond(msg)?;
            self.outbox.extend(trezor_wire::encode_frames(&reply));
        }
        Ok(())
    }

    fn read_report(&mut self) -> Result<Report, WalletError> {
        self.outbox
            .pop_front()
            .ok_or_else(|| WalletError::Usb("nothing to read".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

const SW_OK: [u8; 2] = [0x90, 0x00];
const SW_INS_NOT_SUPPORTED: [u8; 2] = [0x6d, 0x00];
const SW_APP_CLOSED: [u8; 2] = [0x65, 0x11];

/// Device side of the Ledger Ethereum app.
pub struct LedgerState {
    pub keys: KeyTable,
    /// Reply to the configuration query; `None` answers INS not supported.
    pub config: Option<[u8; 4]>,
    pub app_open: bool,
    /// Answers every exchange with a foreign report header.
    pub browser: bool,
    pub commands: Vec<ApduCommand>,
    pending: Vec<u8>,
}

impl LedgerState {
    pub fn new(keys: KeyTable) -> Self {
        Self {
            keys,
            config: Some([0x01, 1, 9, 17]),
            app_open: true,
            browser: false,
            commands: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn commands_for(&self, ins: u8) -> Vec<&ApduCommand> {
        self.commands.iter().filter(|c| c.ins == ins).collect()
    }

    fn respond(&mut self, apdu: &[u8]) -> Result<Vec<u8>, WalletError> {
        let command = ApduCommand::from_bytes(apdu)?;
        self.commands.push(command.clone());
        if !self.app_open {
            return Ok(SW_APP_CLOSED.to_vec());
        }

        let mut reply = match command.ins {
            0x02 => {
                let components = read_path(&command.data)?.0;
                let address = self.keys.address(&components);
                let ascii = hex::encode(address.as_bytes());
                let mut out = vec![65];
                out.extend_from_slice(&[0x04; 65]);
                out.push(ascii.len() as u8);
                out.extend_from_slice(ascii.as_bytes());
                out
            }
            0x06 => match self.config {
                Some(config) => config.to_vec(),
                None => return Ok(SW_INS_NOT_SUPPORTED.to_vec()),
            },
            0x04 => {
                self.accumulate(&command);
                match self.sign_pending_tx()? {
                    Some(vrs) => vrs,
                    None => Vec::new(),
                }
            }
            0x08 => {
                self.accumulate(&command);
                match self.sign_pending_message()? {
                    Some(vrs) => vrs,
                    None => Vec::new(),
                }
            }
            _ => return Ok(SW_INS_NOT_SUPPORTED.to_vec()),
        };
        reply.extend_from_slice(&SW_OK);
        Ok(reply)
    }

    fn accumulate(&mut self, command: &ApduCommand) {
        if command.p1 == 0x00 {
            self.pending.clear();
        }
        self.pending.extend_from_slice(&command.data);
    }

    fn sign_pending_tx(&mut self) -> Result<Option<Vec<u8>>, WalletError> {
        let (components, tx) = read_path(&self.pending)?;
        if tx.is_empty() {
            return Ok(None);
        }
        let legacy = tx.first().map_or(false, |&b| b >= 0xc0);
        let list = if legacy { tx.as_slice() } else { &tx[1..] };
        let complete = Rlp::new(list)
            .payload_info()
            .map(|info| info.header_len + info.value_len == list.len())
            .unwrap_or(false);
        if !complete {
            return Ok(None);
        }

        let signature = self
            .keys
            .key(&components)?
            .sign_hash(H256::from(keccak256(&tx)))?;
        let parity = signature.v - 27;
        let v = if legacy {
            let chain_id: u64 = Rlp::new(list)
                .val_at(6)
                .map_err(|e| WalletError::InvalidInput(e.to_string()))?;
            (chain_id * 2 + 35 + parity) as u8
        } else {
            parity as u8
        };
        self.pending.clear();
        Ok(Some(vrs(v, &signature)))
    }

    fn sign_pending_message(&mut self) -> Result<Option<Vec<u8>>, WalletError> {
        let (components, rest) = read_path(&self.pending)?;
        if rest.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let message = &rest[4..];
        if message.len() < len {
            return Ok(None);
        }
        let signature = self.keys.key(&components)?.sign_hash(hash_message(message))?;
        self.pending.clear();
        Ok(Some(vrs(signature.v as u8, &signature)))
    }
}

fn vrs(v: u8, signature: &ethers::types::Signature) -> Vec<u8> {
    let mut out = vec![v];
    out.extend_from_slice(&rs_bytes(signature.r));
    out.extend_from_slice(&rs_bytes(signature.s));
    out
}

/// `[count][u32 BE]*` followed by the rest of the payload.
fn read_path(data: &[u8]) -> Result<(Vec<u32>, Vec<u8>), WalletError> {
    let count = *data
        .first()
        .ok_or_else(|| WalletError::InvalidInput("empty APDU payload".to_string()))?
        as usize;
    let end = 1 + 4 * count;
    if data.len() < end {
        return Err(WalletError::InvalidInput("short derivation path".to_string()));
    }
    let components = data[1..end]
        .chunks(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok((components, data[end..].to_vec()))
}

/// HID link backed by a [`LedgerState`].
pub struct SimLedger {
    state: Rc<RefCell<LedgerState>>,
    reader: ledger_wire::FrameReader,
    outbox: VecDeque<Report>,
}

impl SimLedger {
    pub fn new(state: LedgerState) -> Self {
        Self::shared(Rc::new(RefCell::new(state)))
    }

    pub fn shared(state: Rc<RefCell<LedgerState>>) -> Self {
        Self {
            state,
            reader: ledger_wire::FrameReader::new(),
            outbox: VecDeque::new(),
        }
    }
}

impl HidLink for SimLedger {
    fn write_report(&mut self, report: &Report) -> Result<(), WalletError> {
        if self.state.borrow().browser {
            let mut foreign = [0u8; REPORT_SIZE];
            foreign[0] = 0xff;
            self.outbox.push_back(foreign);
            return Ok(());
        }
        if let Some(apdu) = self.reader.push(report)? {
            let reply = self.state.borrow_mut().respond(&apdu)?;
            self.outbox.extend(ledger_wire::encode_frames(&reply));
        }
        Ok(())
    }

    fn read_report(&mut self) -> Result<Report, WalletError> {
        self.outbox
            .pop_front()
            .ok_or_else(|| WalletError::Usb("nothing to read".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Answers secret prompts from a script and records what was asked.
pub struct FixedPrompt {
    answers: RefCell<VecDeque<String>>,
    pub asked: RefCell<Vec<String>>,
    pub statuses: RefCell<Vec<String>>,
}

impl FixedPrompt {
    pub fn new(answers: &[&str]) -> Rc<Self> {
        Rc::new(Self {
            answers: RefCell::new(answers.iter().map(|s| s.to_string()).collect()),
            asked: RefCell::new(Vec::new()),
            statuses: RefCell::new(Vec::new()),
        })
    }
}

impl Prompt for FixedPrompt {
    fn read_secret(&self, prompt: &str) -> io::Result<Zeroizing<String>> {
        self.asked.borrow_mut().push(prompt.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .map(Zeroizing::new)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no answer"))
    }

    fn status(&self, line: &str) {
        self.statuses.borrow_mut().push(line.to_string());
    }
}
