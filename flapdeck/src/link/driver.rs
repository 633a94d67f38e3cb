//! The protocol engine.
//!
//! Owns the outgoing and ack queues and the two long-lived loops that move
//! frames over the serial connection:
//!
//! - The **write loop** transmits enqueued frames in order and waits up to
//!   [`RETRY_TIME`] for a matching ack. An unacknowledged frame is
//!   retransmitted at most [`MAX_RETRANSMITS`] times; after that the whole
//!   outgoing queue is flushed and the loop moves on.
//! - The **read loop** accumulates bytes until a frame delimiter, decodes
//!   via [`codec`](super::codec), and dispatches: acks to the write loop,
//!   the character set to the alphabet, state frames to the state callback.
//!
//! The module count is discovered from the first state frame when the
//! driver is constructed without one (real hardware), and reconciled
//! against every later report.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use prost::Message;
use rand::Rng;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use super::codec;
use super::serial::SerialConnection;
use super::wire::{self, from_splitflap, to_splitflap};
use crate::alphabet::AlphabetHandle;

/// How long to wait for an ack before retransmitting.
pub const RETRY_TIME: Duration = Duration::from_millis(500);

/// How many times an unacknowledged frame is retransmitted before the
/// outgoing queue is flushed.
pub const MAX_RETRANSMITS: u32 = 1;

/// Position sentinel meaning "leave this module untouched" (code point of
/// `'a'`).
pub const HOLD_POSITION: u32 = 'a' as u32;

const QUEUE_CAPACITY: usize = 100;
const QUEUE_HIGH_WATER: usize = 10;

/// Per-module force-movement policy for [`DriverHandle::set_text_with_movement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForceMovement {
    /// Modules re-seek only when their target changes.
    #[default]
    None,
    /// Force a re-seek on every module set to a non-blank, non-hold glyph.
    OnlyNonBlank,
    /// Force a re-seek on every module.
    All,
}

/// Errors from the position and text APIs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("cannot set positions before the number of modules is known")]
    ModuleCountUnknown,
    #[error("more positions specified ({got}) than modules ({modules})")]
    TooManyPositions { got: usize, modules: usize },
    #[error("positions ({positions}) and force-movement ({force}) lengths must match")]
    ForceLengthMismatch { positions: usize, force: usize },
    #[error("module index {index} is out of range for {modules} modules")]
    ModuleOutOfRange { index: usize, modules: usize },
}

/// Called once per state frame received from the display.
pub type StateCallback = Box<dyn Fn(&wire::SplitflapState) + Send + Sync>;

struct EnqueuedFrame {
    nonce: u32,
    bytes: Vec<u8>,
}

struct LinkState {
    next_nonce: u32,
    num_modules: usize,
    config: Vec<wire::ModuleConfig>,
}

impl LinkState {
    fn reset_modules(&mut self, count: usize) {
        self.num_modules = count;
        self.config = vec![wire::ModuleConfig::default(); count];
    }
}

struct Shared<S> {
    serial: S,
    out_tx: mpsc::Sender<EnqueuedFrame>,
    ack_tx: mpsc::Sender<u32>,
    state: Mutex<LinkState>,
    alphabet: AlphabetHandle,
    on_state: StateCallback,
    cancel: CancellationToken,
}

/// Protocol engine over a [`SerialConnection`]. Construct, then [`start`]
/// to spawn the loops and obtain a cloneable [`DriverHandle`].
///
/// [`start`]: Driver::start
pub struct Driver<S: SerialConnection> {
    shared: Arc<Shared<S>>,
    out_rx: mpsc::Receiver<EnqueuedFrame>,
    ack_rx: mpsc::Receiver<u32>,
}

impl<S: SerialConnection> Driver<S> {
    /// Create a driver. `modules` may be zero for real hardware, in which
    /// case the count is adopted from the first state frame; the mock path
    /// passes the count it was built with.
    pub fn new(
        serial: S,
        alphabet: AlphabetHandle,
        on_state: StateCallback,
        modules: usize,
    ) -> Self {
        let (out_tx, out_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (ack_tx, ack_rx) = mpsc::channel(QUEUE_CAPACITY);

        let mut state = LinkState {
            next_nonce: rand::thread_rng().gen_range(0..256),
            num_modules: 0,
            config: Vec::new(),
        };
        if modules > 0 {
            state.reset_modules(modules);
        }

        Self {
            shared: Arc::new(Shared {
                serial,
                out_tx,
                ack_tx,
                state: Mutex::new(state),
                alphabet,
                on_state,
                cancel: CancellationToken::new(),
            }),
            out_rx,
            ack_rx,
        }
    }

    /// Spawn the read and write loops and request the display's state.
    pub fn start(self) -> DriverHandle<S> {
        let handle = DriverHandle {
            shared: Arc::clone(&self.shared),
        };

        tokio::spawn(read_loop(Arc::clone(&self.shared)));
        tokio::spawn(write_loop(self.shared, self.out_rx, self.ack_rx));

        handle.request_state();
        handle
    }
}

/// Cloneable handle to a running [`Driver`].
pub struct DriverHandle<S: SerialConnection> {
    shared: Arc<Shared<S>>,
}

impl<S: SerialConnection> Clone for DriverHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: SerialConnection> DriverHandle<S> {
    /// The alphabet table owned by this engine.
    pub fn alphabet(&self) -> AlphabetHandle {
        self.shared.alphabet.clone()
    }

    /// Number of modules, zero until discovered.
    pub fn num_modules(&self) -> usize {
        self.shared.state.lock().expect("link state poisoned").num_modules
    }

    /// Signal both loops to exit.
    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }

    /// Set every module to the flap index of the corresponding character,
    /// without forcing movement.
    pub fn set_text(&self, text: &str) -> Result<(), DriverError> {
        self.set_text_with_movement(text, ForceMovement::None)
    }

    /// Set module targets from `text`, padding with blanks so every module
    /// is updated even when the text is shorter than the display. Unknown
    /// glyphs map to blank; the [`HOLD_POSITION`] code point passes through
    /// and leaves its module untouched.
    pub fn set_text_with_movement(
        &self,
        text: &str,
        movement: ForceMovement,
    ) -> Result<(), DriverError> {
        let alphabet = &self.shared.alphabet;
        let num_modules = self.num_modules();

        let mut positions: Vec<u32> = text
            .chars()
            .map(|c| {
                if c as u32 == HOLD_POSITION {
                    HOLD_POSITION
                } else {
                    alphabet.index(c) as u32
                }
            })
            .collect();
        let blank = alphabet.index(' ') as u32;
        while positions.len() < num_modules {
            positions.push(blank);
        }

        let force = match movement {
            ForceMovement::None => None,
            ForceMovement::OnlyNonBlank => {
                let mut force: Vec<bool> = text
                    .chars()
                    .map(|c| alphabet.index(c) != 0 && c as u32 != HOLD_POSITION)
                    .collect();
                force.resize(positions.len(), false);
                Some(force)
            }
            ForceMovement::All => Some(vec![true; positions.len()]),
        };

        self.set_positions(&positions, force.as_deref())
    }

    /// Apply explicit flap targets to the leading modules. `force`, when
    /// present, must be the same length as `positions`; `true` entries bump
    /// the module's movement nonce so it re-seeks even on an unchanged
    /// target. The full configuration is then enqueued.
    pub fn set_positions(
        &self,
        positions: &[u32],
        force: Option<&[bool]>,
    ) -> Result<(), DriverError> {
        let payload = {
            let mut state = self.shared.state.lock().expect("link state poisoned");
            if state.num_modules == 0 {
                return Err(DriverError::ModuleCountUnknown);
            }
            if positions.len() > state.num_modules {
                return Err(DriverError::TooManyPositions {
                    got: positions.len(),
                    modules: state.num_modules,
                });
            }
            if let Some(force) = force {
                if force.len() != positions.len() {
                    return Err(DriverError::ForceLengthMismatch {
                        positions: positions.len(),
                        force: force.len(),
                    });
                }
            }

            for (i, &position) in positions.iter().enumerate() {
                if position == HOLD_POSITION {
                    continue;
                }
                state.config[i].target_flap_index = position;
                if force.is_some_and(|f| f[i]) {
                    state.config[i].movement_nonce = (state.config[i].movement_nonce + 1) % 256;
                }
            }

            to_splitflap::Payload::SplitflapConfig(wire::SplitflapConfig {
                modules: state.config.clone(),
            })
        };

        self.enqueue(payload);
        Ok(())
    }

    /// Nudge one module: bump its movement nonce without touching the
    /// target, making it re-seek its current glyph.
    pub fn spin_module(&self, index: usize) -> Result<(), DriverError> {
        let payload = {
            let mut state = self.shared.state.lock().expect("link state poisoned");
            if index >= state.num_modules {
                return Err(DriverError::ModuleOutOfRange {
                    index,
                    modules: state.num_modules,
                });
            }
            state.config[index].movement_nonce = (state.config[index].movement_nonce + 1) % 256;
            to_splitflap::Payload::SplitflapConfig(wire::SplitflapConfig {
                modules: state.config.clone(),
            })
        };

        self.enqueue(payload);
        Ok(())
    }

    /// Ask the display to report its current state.
    pub fn request_state(&self) {
        self.enqueue(to_splitflap::Payload::RequestState(wire::RequestState {}));
    }

    fn enqueue(&self, payload: to_splitflap::Payload) {
        let nonce = {
            let mut state = self.shared.state.lock().expect("link state poisoned");
            let nonce = state.next_nonce;
            state.next_nonce = state.next_nonce.wrapping_add(1);
            nonce
        };

        let message = wire::ToSplitflap {
            nonce,
            payload: Some(payload),
        };
        let frame = EnqueuedFrame {
            nonce,
            bytes: codec::encode_frame(&message.encode_to_vec()),
        };

        if self.shared.out_tx.try_send(frame).is_err() {
            warn!(nonce, "outgoing queue full, dropping frame");
            return;
        }

        let queued = QUEUE_CAPACITY - self.shared.out_tx.capacity();
        if queued > QUEUE_HIGH_WATER {
            warn!(
                queued,
                "outgoing queue length is high, is the splitflap still connected?"
            );
        }
    }
}

async fn read_loop<S: SerialConnection>(shared: Arc<Shared<S>>) {
    info!("read loop started");
    let mut buffer: Vec<u8> = Vec::new();
    loop {
        let bytes = tokio::select! {
            _ = shared.cancel.cancelled() => return,
            result = shared.serial.read() => match result {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(error = %e, "error reading from serial, read loop exiting");
                    return;
                }
            },
        };
        if bytes.is_empty() {
            continue;
        }

        buffer.extend_from_slice(&bytes);
        while let Some(end) = buffer.iter().position(|&b| b == 0) {
            let frame: Vec<u8> = buffer.drain(..=end).collect();
            process_frame(&shared, &frame[..frame.len() - 1]).await;
        }
    }
}

async fn process_frame<S: SerialConnection>(shared: &Shared<S>, frame: &[u8]) {
    // bad CRC or framing: drop silently, keep reading
    let Some(payload) = codec::decode_frame(frame) else {
        return;
    };
    let message = match wire::FromSplitflap::decode(payload.as_slice()) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "failed to decode frame payload");
            return;
        }
    };

    match message.payload {
        Some(from_splitflap::Payload::Ack(ack)) => {
            let _ = shared.ack_tx.send(ack.nonce).await;
        }
        Some(from_splitflap::Payload::GeneralState(general)) => {
            let glyphs: Vec<char> = String::from_utf8_lossy(&general.flap_character_set)
                .chars()
                .collect();
            let count = glyphs.len();
            if shared.alphabet.adopt(glyphs) {
                info!(flaps = count, "adopted character set reported by display");
            }
        }
        Some(from_splitflap::Payload::SplitflapState(state)) => {
            let reported = state.modules.len();
            {
                let mut link = shared.state.lock().expect("link state poisoned");
                if link.num_modules == 0 {
                    info!(modules = reported, "adopted module count from display");
                    link.reset_modules(reported);
                } else if link.num_modules != reported {
                    warn!(
                        old = link.num_modules,
                        new = reported,
                        "number of reported modules changed"
                    );
                    link.reset_modules(reported);
                }
            }
            (shared.on_state)(&state);
        }
        Some(from_splitflap::Payload::Log(log)) => {
            trace!(msg = %log.msg, "firmware log");
        }
        Some(from_splitflap::Payload::SupervisorState(_)) => {
            trace!("supervisor state frame dropped");
        }
        None => {}
    }
}

async fn write_loop<S: SerialConnection>(
    shared: Arc<Shared<S>>,
    mut out_rx: mpsc::Receiver<EnqueuedFrame>,
    mut ack_rx: mpsc::Receiver<u32>,
) {
    info!("write loop started");
    loop {
        let frame = tokio::select! {
            _ = shared.cancel.cancelled() => {
                info!("stop requested, exiting write loop");
                return;
            }
            frame = out_rx.recv() => match frame {
                Some(frame) => frame,
                None => return,
            },
        };

        let mut transmits = 0u32;
        'frame: loop {
            if let Err(e) = shared.serial.write(&frame.bytes).await {
                error!(error = %e, "serial write failed, write loop exiting");
                return;
            }
            transmits += 1;
            let deadline = tokio::time::Instant::now() + RETRY_TIME;

            loop {
                tokio::select! {
                    _ = shared.cancel.cancelled() => {
                        info!("stop requested, exiting write loop");
                        return;
                    }
                    _ = tokio::time::sleep_until(deadline) => {
                        if transmits > MAX_RETRANSMITS {
                            warn!(
                                nonce = frame.nonce,
                                transmits, "frame unacknowledged, flushing outgoing queue"
                            );
                            while out_rx.try_recv().is_ok() {}
                            break 'frame;
                        }
                        trace!(nonce = frame.nonce, "ack timeout, retransmitting");
                        continue 'frame;
                    }
                    ack = ack_rx.recv() => match ack {
                        Some(nonce) if nonce == frame.nonce => break 'frame,
                        // stale ack from an abandoned frame, keep waiting
                        Some(_) => continue,
                        None => return,
                    },
                }
            }
        }
    }
}
