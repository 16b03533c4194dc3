//! Trezor protobuf messages
//!
//! Hand-rolled proto2 wire encoding for the subset of messages the Ethereum
//! flow needs. Unknown fields are skipped on decode.

use crate::core::errors::WalletError;

const VENDOR: &str = "trezor";

/// Wire message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageType {
    // management
    Initialize = 0,
    Ping = 1,
    Success = 2,
    Failure = 3,
    Features = 17,
    Cancel = 20,
    GetFeatures = 55,

    // interactive
    PinMatrixRequest = 18,
    PinMatrixAck = 19,
    ButtonRequest = 26,
    ButtonAck = 27,
    PassphraseRequest = 41,
    PassphraseAck = 42,

    // crypto
    CipherKeyValue = 23,
    CipheredKeyValue = 48,

    // ethereum
    EthereumGetAddress = 56,
    EthereumAddress = 57,
    EthereumSignTx = 58,
    EthereumTxRequest = 59,
    EthereumTxAck = 60,
    EthereumSignMessage = 64,
    EthereumMessageSignature = 66,
    EthereumSignTxEip1559 = 452,
}

impl MessageType {
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0 => Self::Initialize,
            1 => Self::Ping,
            2 => Self::Success,
            3 => Self::Failure,
            17 => Self::Features,
            18 => Self::PinMatrixRequest,
            19 => Self::PinMatrixAck,
            20 => Self::Cancel,
            23 => Self::CipherKeyValue,
            26 => Self::ButtonRequest,
            27 => Self::ButtonAck,
            41 => Self::PassphraseRequest,
            42 => Self::PassphraseAck,
            48 => Self::CipheredKeyValue,
            55 => Self::GetFeatures,
            56 => Self::EthereumGetAddress,
            57 => Self::EthereumAddress,
            58 => Self::EthereumSignTx,
            59 => Self::EthereumTxRequest,
            60 => Self::EthereumTxAck,
            64 => Self::EthereumSignMessage,
            66 => Self::EthereumMessageSignature,
            452 => Self::EthereumSignTxEip1559,
            _ => return None,
        })
    }

    /// Human readable name of a raw kind, for errors and logs.
    pub fn describe(kind: u16) -> String {
        match Self::from_u16(kind) {
            Some(t) => format!("{:?}", t),
            None => format!("unknown({})", kind),
        }
    }
}

/// A raw message envelope: wire kind plus protobuf payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrezorMessage {
    pub kind: u16,
    pub payload: Vec<u8>,
}

impl TrezorMessage {
    pub fn new(kind: MessageType, payload: Vec<u8>) -> Self {
        Self {
            kind: kind as u16,
            payload,
        }
    }

    pub fn from_message<M: ProtoMessage>(message: &M) -> Self {
        Self::new(M::KIND, message.encode())
    }

    pub fn is(&self, kind: MessageType) -> bool {
        self.kind == kind as u16
    }

    /// Decodes the payload as `M`, checking the kind first.
    pub fn decode<M: ProtoMessage>(&self) -> Result<M, WalletError> {
        if !self.is(M::KIND) {
            return Err(WalletError::UnexpectedReply {
                vendor: VENDOR,
                expected: format!("{:?}", M::KIND),
                actual: MessageType::describe(self.kind),
            });
        }
        M::decode(&self.payload)
    }
}

/// A protobuf message with a fixed wire kind.
pub trait ProtoMessage: Sized {
    const KIND: MessageType;
    fn encode(&self) -> Vec<u8>;
    fn decode(payload: &[u8]) -> Result<Self, WalletError>;
}

// ---------------------------------------------------------------------------
// wire format

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

pub fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Returns the value and the number of bytes consumed.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize), WalletError> {
    let mut result = 0u64;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return Err(WalletError::malformed(VENDOR, "varint overflow"));
        }
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }
    Err(WalletError::malformed(VENDOR, "truncated varint"))
}

/// Field-by-field protobuf writer.
#[derive(Debug, Default)]
pub struct ProtoWriter {
    buf: Vec<u8>,
}

impl ProtoWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn tag(&mut self, field: u32, wire: u8) {
        encode_varint(&mut self.buf, ((field as u64) << 3) | wire as u64);
    }

    pub fn uint(&mut self, field: u32, value: u64) -> &mut Self {
        self.tag(field, WIRE_VARINT);
        encode_varint(&mut self.buf, value);
        self
    }

    pub fn opt_uint(&mut self, field: u32, value: Option<u64>) -> &mut Self {
        if let Some(v) = value {
            self.uint(field, v);
        }
        self
    }

    pub fn boolean(&mut self, field: u32, value: bool) -> &mut Self {
        self.uint(field, value as u64)
    }

    pub fn opt_bool(&mut self, field: u32, value: Option<bool>) -> &mut Self {
        if let Some(v) = value {
            self.boolean(field, v);
        }
        self
    }

    pub fn bytes(&mut self, field: u32, value: &[u8]) -> &mut Self {
        self.tag(field, WIRE_LEN);
        encode_varint(&mut self.buf, value.len() as u64);
        self.buf.extend_from_slice(value);
        self
    }

    /// Skips empty values, matching proto2 optional fields left unset.
    pub fn opt_bytes(&mut self, field: u32, value: &[u8]) -> &mut Self {
        if !value.is_empty() {
            self.bytes(field, value);
        }
        self
    }

    pub fn string(&mut self, field: u32, value: &str) -> &mut Self {
        self.bytes(field, value.as_bytes())
    }

    pub fn opt_string(&mut self, field: u32, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.string(field, v);
        }
        self
    }

    /// Repeated uint32, unpacked (proto2 default).
    pub fn repeated_uint(&mut self, field: u32, values: &[u32]) -> &mut Self {
        for &v in values {
            self.uint(field, v as u64);
        }
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Varint(u64),
    Fixed(u64),
    Bytes(Vec<u8>),
}

/// A decoded message as an ordered list of `(field number, value)`.
#[derive(Debug, Clone, Default)]
pub struct Fields(Vec<(u32, FieldValue)>);

impl Fields {
    pub fn parse(data: &[u8]) -> Result<Self, WalletError> {
        let mut fields = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let (key, n) = decode_varint(&data[pos..])?;
            pos += n;
            let number = (key >> 3) as u32;
            let value = match (key & 0x7) as u8 {
                WIRE_VARINT => {
                    let (v, n) = decode_varint(&data[pos..])?;
                    pos += n;
                    FieldValue::Varint(v)
                }
                WIRE_LEN => {
                    let (len, n) = decode_varint(&data[pos..])?;
                    pos += n;
                    let end = pos
                        .checked_add(len as usize)
                        .filter(|&end| end <= data.len())
                        .ok_or_else(|| {
                            WalletError::malformed(VENDOR, format!("field {} overruns message", number))
                        })?;
                    let bytes = data[pos..end].to_vec();
                    pos = end;
                    FieldValue::Bytes(bytes)
                }
                WIRE_FIXED64 => FieldValue::Fixed(take_fixed(data, &mut pos, 8)?),
                WIRE_FIXED32 => FieldValue::Fixed(take_fixed(data, &mut pos, 4)?),
                wire => {
                    return Err(WalletError::malformed(
                        VENDOR,
                        format!("unsupported wire type {} for field {}", wire, number),
                    ))
                }
            };
            fields.push((number, value));
        }
        Ok(Self(fields))
    }

    fn last(&self, number: u32) -> Option<&FieldValue> {
        self.0.iter().rev().find(|(n, _)| *n == number).map(|(_, v)| v)
    }

    pub fn uint(&self, number: u32) -> Option<u64> {
        match self.last(number) {
            Some(FieldValue::Varint(v)) | Some(FieldValue::Fixed(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn boolean(&self, number: u32) -> Option<bool> {
        self.uint(number).map(|v| v != 0)
    }

    pub fn bytes(&self, number: u32) -> Option<&[u8]> {
        match self.last(number) {
            Some(FieldValue::Bytes(b)) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn string(&self, number: u32) -> Result<Option<String>, WalletError> {
        self.bytes(number)
            .map(|b| {
                String::from_utf8(b.to_vec()).map_err(|_| {
                    WalletError::malformed(VENDOR, format!("field {} is not UTF-8", number))
                })
            })
            .transpose()
    }

    /// Repeated varint field, accepting both packed and unpacked encodings.
    pub fn repeated_uint(&self, number: u32) -> Result<Vec<u64>, WalletError> {
        let mut out = Vec::new();
        for (n, value) in &self.0 {
            if *n != number {
                continue;
            }
            match value {
                FieldValue::Varint(v) | FieldValue::Fixed(v) => out.push(*v),
                FieldValue::Bytes(packed) => {
                    let mut pos = 0;
                    while pos < packed.len() {
                        let (v, used) = decode_varint(&packed[pos..])?;
                        out.push(v);
                        pos += used;
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn repeated_bytes(&self, number: u32) -> Vec<&[u8]> {
        self.0
            .iter()
            .filter_map(|(n, v)| match v {
                FieldValue::Bytes(b) if *n == number => Some(b.as_slice()),
                _ => None,
            })
            .collect()
    }
}

fn take_fixed(data: &[u8], pos: &mut usize, width: usize) -> Result<u64, WalletError> {
    let end = *pos + width;
    if end > data.len() {
        return Err(WalletError::malformed(VENDOR, "truncated fixed field"));
    }
    let mut raw = [0u8; 8];
    raw[..width].copy_from_slice(&data[*pos..end]);
    *pos = end;
    Ok(u64::from_le_bytes(raw))
}

fn path_from(fields: &Fields, number: u32) -> Result<Vec<u32>, WalletError> {
    fields
        .repeated_uint(number)?
        .into_iter()
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| WalletError::malformed(VENDOR, "path component exceeds u32"))
        })
        .collect()
}

fn u32_field(fields: &Fields, number: u32) -> Result<Option<u32>, WalletError> {
    fields
        .uint(number)
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| WalletError::malformed(VENDOR, format!("field {} exceeds u32", number)))
        })
        .transpose()
}

// ---------------------------------------------------------------------------
// messages

macro_rules! empty_message {
    ($(#[$meta:meta])* $name:ident, $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name;

        impl ProtoMessage for $name {
            const KIND: MessageType = MessageType::$kind;
            fn encode(&self) -> Vec<u8> {
                Vec::new()
            }
            fn decode(_payload: &[u8]) -> Result<Self, WalletError> {
                Ok(Self)
            }
        }
    };
}

empty_message!(Initialize, Initialize);
empty_message!(GetFeatures, GetFeatures);
empty_message!(
    /// Aborts whatever the device is waiting for.
    Cancel,
    Cancel
);
empty_message!(ButtonAck, ButtonAck);
empty_message!(PassphraseRequest, PassphraseRequest);
empty_message!(Success, Success);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Features {
    pub vendor: Option<String>,
    pub major_version: u32,
    pub minor_version: u32,
    pub patch_version: u32,
    pub device_id: Option<String>,
    pub pin_protection: Option<bool>,
    pub passphrase_protection: Option<bool>,
    pub label: Option<String>,
    pub initialized: Option<bool>,
    pub model: Option<String>,
}

impl Features {
    pub fn version(&self) -> String {
        format!(
            "{}.{}.{}",
            self.major_version, self.minor_version, self.patch_version
        )
    }
}

impl ProtoMessage for Features {
    const KIND: MessageType = MessageType::Features;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new()
            .opt_string(1, self.vendor.as_deref())
            .uint(2, self.major_version as u64)
            .uint(3, self.minor_version as u64)
            .uint(4, self.patch_version as u64)
            .opt_string(6, self.device_id.as_deref())
            .opt_bool(7, self.pin_protection)
            .opt_bool(8, self.passphrase_protection)
            .opt_string(10, self.label.as_deref())
            .opt_bool(12, self.initialized)
            .opt_string(21, self.model.as_deref())
            .finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            vendor: f.string(1)?,
            major_version: u32_field(&f, 2)?.unwrap_or(0),
            minor_version: u32_field(&f, 3)?.unwrap_or(0),
            patch_version: u32_field(&f, 4)?.unwrap_or(0),
            device_id: f.string(6)?,
            pin_protection: f.boolean(7),
            passphrase_protection: f.boolean(8),
            label: f.string(10)?,
            initialized: f.boolean(12),
            model: f.string(21)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Failure {
    pub code: Option<u32>,
    pub message: Option<String>,
}

impl ProtoMessage for Failure {
    const KIND: MessageType = MessageType::Failure;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new()
            .opt_uint(1, self.code.map(u64::from))
            .opt_string(2, self.message.as_deref())
            .finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            code: u32_field(&f, 1)?,
            message: f.string(2)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinMatrixRequest {
    pub kind: Option<u32>,
}

impl ProtoMessage for PinMatrixRequest {
    const KIND: MessageType = MessageType::PinMatrixRequest;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new().opt_uint(1, self.kind.map(u64::from)).finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            kind: u32_field(&f, 1)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinMatrixAck {
    /// Keypad positions, not the PIN digits themselves.
    pub pin: String,
}

impl ProtoMessage for PinMatrixAck {
    const KIND: MessageType = MessageType::PinMatrixAck;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new().string(1, &self.pin).finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            pin: f.string(1)?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassphraseAck {
    pub passphrase: String,
}

impl ProtoMessage for PassphraseAck {
    const KIND: MessageType = MessageType::PassphraseAck;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new().string(1, &self.passphrase).finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            passphrase: f.string(1)?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonRequest {
    pub code: Option<u32>,
}

impl ProtoMessage for ButtonRequest {
    const KIND: MessageType = MessageType::ButtonRequest;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new().opt_uint(1, self.code.map(u64::from)).finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            code: u32_field(&f, 1)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthereumGetAddress {
    pub address_n: Vec<u32>,
    pub show_display: Option<bool>,
}

impl ProtoMessage for EthereumGetAddress {
    const KIND: MessageType = MessageType::EthereumGetAddress;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new()
            .repeated_uint(1, &self.address_n)
            .opt_bool(2, self.show_display)
            .finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            address_n: path_from(&f, 1)?,
            show_display: f.boolean(2),
        })
    }
}

/// Older firmware fills the binary field, newer the hex string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthereumAddress {
    pub old_address: Vec<u8>,
    pub address: Option<String>,
}

impl ProtoMessage for EthereumAddress {
    const KIND: MessageType = MessageType::EthereumAddress;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new()
            .opt_bytes(1, &self.old_address)
            .opt_string(2, self.address.as_deref())
            .finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            old_address: f.bytes(1).map(<[u8]>::to_vec).unwrap_or_default(),
            address: f.string(2)?,
        })
    }
}

/// Legacy (and EIP-155) transaction signing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthereumSignTx {
    pub address_n: Vec<u32>,
    pub nonce: Vec<u8>,
    pub gas_price: Vec<u8>,
    pub gas_limit: Vec<u8>,
    pub to: Option<String>,
    pub value: Vec<u8>,
    pub data_initial_chunk: Vec<u8>,
    pub data_length: Option<u32>,
    pub chain_id: Option<u64>,
    pub tx_type: Option<u32>,
}

impl ProtoMessage for EthereumSignTx {
    const KIND: MessageType = MessageType::EthereumSignTx;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new()
            .repeated_uint(1, &self.address_n)
            .bytes(2, &self.nonce)
            .bytes(3, &self.gas_price)
            .bytes(4, &self.gas_limit)
            .bytes(6, &self.value)
            .opt_bytes(7, &self.data_initial_chunk)
            .opt_uint(8, self.data_length.map(u64::from))
            .opt_uint(9, self.chain_id)
            .opt_uint(10, self.tx_type.map(u64::from))
            .opt_string(11, self.to.as_deref())
            .finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        let bytes = |n| f.bytes(n).map(<[u8]>::to_vec).unwrap_or_default();
        Ok(Self {
            address_n: path_from(&f, 1)?,
            nonce: bytes(2),
            gas_price: bytes(3),
            gas_limit: bytes(4),
            value: bytes(6),
            data_initial_chunk: bytes(7),
            data_length: u32_field(&f, 8)?,
            chain_id: f.uint(9),
            tx_type: u32_field(&f, 10)?,
            to: f.string(11)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessListEntry {
    pub address: String,
    pub storage_keys: Vec<Vec<u8>>,
}

impl AccessListEntry {
    fn encode(&self) -> Vec<u8> {
        let mut w = ProtoWriter::new();
        w.string(1, &self.address);
        for key in &self.storage_keys {
            w.bytes(2, key);
        }
        w.finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            address: f.string(1)?.unwrap_or_default(),
            storage_keys: f.repeated_bytes(2).into_iter().map(<[u8]>::to_vec).collect(),
        })
    }
}

/// EIP-1559 transaction signing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthereumSignTxEip1559 {
    pub address_n: Vec<u32>,
    pub nonce: Vec<u8>,
    pub max_gas_fee: Vec<u8>,
    pub max_priority_fee: Vec<u8>,
    pub gas_limit: Vec<u8>,
    pub to: Option<String>,
    pub value: Vec<u8>,
    pub data_initial_chunk: Vec<u8>,
    pub data_length: u32,
    pub chain_id: u64,
    pub access_list: Vec<AccessListEntry>,
}

impl ProtoMessage for EthereumSignTxEip1559 {
    const KIND: MessageType = MessageType::EthereumSignTxEip1559;

    fn encode(&self) -> Vec<u8> {
        let mut w = ProtoWriter::new();
        w.repeated_uint(1, &self.address_n)
            .bytes(2, &self.nonce)
            .bytes(3, &self.max_gas_fee)
            .bytes(4, &self.max_priority_fee)
            .bytes(5, &self.gas_limit)
            .opt_string(6, self.to.as_deref())
            .bytes(7, &self.value)
            .opt_bytes(8, &self.data_initial_chunk)
            .uint(9, self.data_length as u64)
            .uint(10, self.chain_id);
        for entry in &self.access_list {
            w.bytes(11, &entry.encode());
        }
        w.finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        let bytes = |n| f.bytes(n).map(<[u8]>::to_vec).unwrap_or_default();
        Ok(Self {
            address_n: path_from(&f, 1)?,
            nonce: bytes(2),
            max_gas_fee: bytes(3),
            max_priority_fee: bytes(4),
            gas_limit: bytes(5),
            to: f.string(6)?,
            value: bytes(7),
            data_initial_chunk: bytes(8),
            data_length: u32_field(&f, 9)?.unwrap_or(0),
            chain_id: f.uint(10).unwrap_or(0),
            access_list: f
                .repeated_bytes(11)
                .into_iter()
                .map(AccessListEntry::decode)
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Device reply during signing: either asks for more data or carries the
/// signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthereumTxRequest {
    pub data_length: Option<u32>,
    pub signature_v: Option<u32>,
    pub signature_r: Vec<u8>,
    pub signature_s: Vec<u8>,
}

impl ProtoMessage for EthereumTxRequest {
    const KIND: MessageType = MessageType::EthereumTxRequest;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new()
            .opt_uint(1, self.data_length.map(u64::from))
            .opt_uint(2, self.signature_v.map(u64::from))
            .opt_bytes(3, &self.signature_r)
            .opt_bytes(4, &self.signature_s)
            .finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            data_length: u32_field(&f, 1)?,
            signature_v: u32_field(&f, 2)?,
            signature_r: f.bytes(3).map(<[u8]>::to_vec).unwrap_or_default(),
            signature_s: f.bytes(4).map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthereumTxAck {
    pub data_chunk: Vec<u8>,
}

impl ProtoMessage for EthereumTxAck {
    const KIND: MessageType = MessageType::EthereumTxAck;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new().bytes(1, &self.data_chunk).finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            data_chunk: f.bytes(1).map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthereumSignMessage {
    pub address_n: Vec<u32>,
    pub message: Vec<u8>,
}

impl ProtoMessage for EthereumSignMessage {
    const KIND: MessageType = MessageType::EthereumSignMessage;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new()
            .repeated_uint(1, &self.address_n)
            .bytes(2, &self.message)
            .finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            address_n: path_from(&f, 1)?,
            message: f.bytes(2).map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthereumMessageSignature {
    pub signature: Vec<u8>,
    pub address: Option<String>,
}

impl ProtoMessage for EthereumMessageSignature {
    const KIND: MessageType = MessageType::EthereumMessageSignature;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new()
            .bytes(2, &self.signature)
            .opt_string(3, self.address.as_deref())
            .finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            signature: f.bytes(2).map(<[u8]>::to_vec).unwrap_or_default(),
            address: f.string(3)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CipherKeyValue {
    pub address_n: Vec<u32>,
    pub key: String,
    pub value: Vec<u8>,
    pub encrypt: bool,
    pub ask_on_encrypt: bool,
    pub ask_on_decrypt: bool,
    pub iv: Vec<u8>,
}

impl ProtoMessage for CipherKeyValue {
    const KIND: MessageType = MessageType::CipherKeyValue;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new()
            .repeated_uint(1, &self.address_n)
            .string(2, &self.key)
            .bytes(3, &self.value)
            .boolean(4, self.encrypt)
            .boolean(5, self.ask_on_encrypt)
            .boolean(6, self.ask_on_decrypt)
            .opt_bytes(7, &self.iv)
            .finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            address_n: path_from(&f, 1)?,
            key: f.string(2)?.unwrap_or_default(),
            value: f.bytes(3).map(<[u8]>::to_vec).unwrap_or_default(),
            encrypt: f.boolean(4).unwrap_or(false),
            ask_on_encrypt: f.boolean(5).unwrap_or(false),
            ask_on_decrypt: f.boolean(6).unwrap_or(false),
            iv: f.bytes(7).map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CipheredKeyValue {
    pub value: Vec<u8>,
}

impl ProtoMessage for CipheredKeyValue {
    const KIND: MessageType = MessageType::CipheredKeyValue;

    fn encode(&self) -> Vec<u8> {
        ProtoWriter::new().bytes(1, &self.value).finish()
    }

    fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let f = Fields::parse(payload)?;
        Ok(Self {
            value: f.bytes(1).map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }
}
