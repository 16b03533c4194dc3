//! Trezor device session
//!
//! Owns the transport and drives every request through the `call` state
//! machine, which answers PIN, passphrase and button sub-requests until the
//! expected reply (or a failure) arrives.

use std::rc::Rc;

use super::messages::{
    ButtonAck, Cancel, Failure, Features, Initialize, MessageType, PassphraseAck, PinMatrixAck,
    ProtoMessage, TrezorMessage,
};
use super::transport::TrezorTransport;
use crate::core::errors::WalletError;
use crate::hardware::hid::{DeviceFilter, HidLink};
use crate::ui::Prompt;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

const VENDOR: &str = "trezor";

/// SatoshiLabs HID (Trezor One) and the WebUSB-era pid.
pub const TREZOR_FILTER: DeviceFilter = DeviceFilter {
    name: "trezor",
    ids: &[(0x534c, 0x0001), (0x1209, 0x53c1)],
    usage_page: 0xff00,
    interface_number: 0,
};

/// Shown before asking for a PIN: the prompt takes keypad positions.
pub const PIN_MATRIX_HELP: &str = "Look at the device for number positions\n\n\
    7 | 8 | 9\n\
    --+---+--\n\
    4 | 5 | 6\n\
    --+---+--\n\
    1 | 2 | 3\n";

/// Where a single `call` currently stands.
#[derive(Debug)]
pub enum CallState {
    /// A message went out; holds the device's reply.
    Sent(TrezorMessage),
    AwaitingPin,
    AwaitingPassphrase,
    AwaitingButton,
    Done(TrezorMessage),
    Failed(WalletError),
}

impl CallState {
    /// Routes a reply. Interactive requests take precedence over the
    /// expected kind.
    pub fn classify(reply: TrezorMessage, expected: MessageType) -> Self {
        match MessageType::from_u16(reply.kind) {
            Some(MessageType::PinMatrixRequest) => CallState::AwaitingPin,
            Some(MessageType::PassphraseRequest) => CallState::AwaitingPassphrase,
            Some(MessageType::ButtonRequest) => CallState::AwaitingButton,
            Some(MessageType::Failure) => match Failure::decode(&reply.payload) {
                Ok(failure) => CallState::Failed(WalletError::DeviceFailure {
                    vendor: VENDOR,
                    message: failure
                        .message
                        .unwrap_or_else(|| format!("failure code {}", failure.code.unwrap_or(0))),
                }),
                Err(err) => CallState::Failed(err),
            },
            _ if reply.kind == expected as u16 => CallState::Done(reply),
            _ => CallState::Failed(WalletError::UnexpectedReply {
                vendor: VENDOR,
                expected: format!("{:?}", expected),
                actual: MessageType::describe(reply.kind),
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Done(_) | CallState::Failed(_))
    }
}

/// A PIN is typed as keypad positions, so only 1-9 are valid.
pub fn is_valid_pin(pin: &str) -> bool {
    !pin.is_empty() && pin.bytes().all(|b| (b'1'..=b'9').contains(&b))
}

/// Trezor device
pub struct TrezorDevice<L> {
    transport: TrezorTransport<L>,
    prompt: Rc<dyn Prompt>,
    features: Features,
}

impl<L: HidLink> TrezorDevice<L> {
    /// Wraps an open link and runs the `Initialize` round trip.
    pub fn open(link: L, prompt: Rc<dyn Prompt>) -> Result<Self, WalletError> {
        let mut device = Self {
            transport: TrezorTransport::new(link),
            prompt,
            features: Features::default(),
        };
        device.initialize()?;
        Ok(device)
    }

    pub fn initialize(&mut self) -> Result<&Features, WalletError> {
        let features: Features = self.call(&Initialize)?;
        info!(
            vendor = features.vendor.as_deref().unwrap_or("?"),
            model = features.model.as_deref().unwrap_or("?"),
            "Trezor v{} '{}'",
            features.version(),
            features.label.as_deref().unwrap_or_default()
        );
        if features.initialized == Some(false) {
            warn!("Trezor is not initialized; set it up before use");
        }
        self.features = features;
        Ok(&self.features)
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    /// Sends `request` and runs the interactive loop until a `Resp` arrives.
    pub fn call<Req, Resp>(&mut self, request: &Req) -> Result<Resp, WalletError>
    where
        Req: ProtoMessage,
        Resp: ProtoMessage,
    {
        let mut state = self.send(&TrezorMessage::from_message(request));
        loop {
            state = match state {
                CallState::Sent(reply) => CallState::classify(reply, Resp::KIND),
                CallState::AwaitingPin => self.answer_pin(),
                CallState::AwaitingPassphrase => self.answer_passphrase(),
                CallState::AwaitingButton => {
                    debug!("button confirmation requested");
                    self.prompt.status("Confirm the action on your Trezor");
                    self.send(&TrezorMessage::from_message(&ButtonAck))
                }
                CallState::Done(reply) => return Resp::decode(&reply.payload),
                CallState::Failed(err) => return Err(err),
            };
        }
    }

    fn send(&mut self, message: &TrezorMessage) -> CallState {
        match self.transport.exchange(message) {
            Ok(reply) => CallState::Sent(reply),
            Err(err) => CallState::Failed(err),
        }
    }

    fn answer_pin(&mut self) -> CallState {
        self.prompt.status(PIN_MATRIX_HELP);
        let pin = match self.prompt.read_secret("Please enter current PIN: ") {
            Ok(pin) => pin,
            Err(source) => return self.abandon(WalletError::Prompt { what: "PIN", source }),
        };
        if !is_valid_pin(&pin) {
            return self.abandon(WalletError::InvalidPin);
        }
        let mut ack = PinMatrixAck {
            pin: pin.as_str().to_owned(),
        };
        let message = TrezorMessage::from_message(&ack);
        ack.pin.zeroize();
        self.send(&message)
    }

    fn answer_passphrase(&mut self) -> CallState {
        let passphrase = match self.prompt.read_secret("Please enter passphrase: ") {
            Ok(passphrase) => passphrase,
            Err(source) => {
                return self.abandon(WalletError::Prompt {
                    what: "passphrase",
                    source,
                })
            }
        };
        let mut ack = PassphraseAck {
            passphrase: passphrase.as_str().to_owned(),
        };
        let message = TrezorMessage::from_message(&ack);
        ack.passphrase.zeroize();
        self.send(&message)
    }

    /// Cancels the pending device request, then fails with `err`.
    fn abandon(&mut self, err: WalletError) -> CallState {
        match self.transport.exchange(&TrezorMessage::from_message(&Cancel)) {
            Ok(reply) => debug!(reply = %MessageType::describe(reply.kind), "trezor cancelled"),
            Err(cancel_err) => warn!(error = %cancel_err, "trezor cancel failed"),
        }
        CallState::Failed(err)
    }

    pub fn status(&self) -> String {
        format!(
            "Trezor v{} '{}' online",
            self.features.version(),
            self.features.label.as_deref().unwrap_or_default()
        )
    }

    pub fn label(&self) -> String {
        self.features.label.clone().unwrap_or_default()
    }

    pub fn prompt(&self) -> &dyn Prompt {
        self.prompt.as_ref()
    }
}
