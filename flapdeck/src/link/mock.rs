//! In-memory serial connection emulating a cooperative display.
//!
//! The mock parses each outgoing frame, acks it after a short delay, and
//! answers configuration writes with a synthetic state frame in which every
//! module sits at its requested target, as if the hardware had settled
//! instantly. A state request is answered with the seeded character set and
//! the current mirrored state, which is how the driver discovers the module
//! count without real hardware.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use prost::Message;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::codec;
use super::serial::SerialConnection;
use super::wire::{
    self, from_splitflap, to_splitflap, FromSplitflap, ModuleState, ModuleStatus, SplitflapConfig,
    SplitflapState,
};
use crate::alphabet::AlphabetHandle;

/// Delay before the mock acks a frame.
const ACK_DELAY: Duration = Duration::from_millis(5);
/// Additional delay before a state frame follows a config write.
const STATE_DELAY: Duration = Duration::from_millis(5);

struct MockInner {
    inbound: Mutex<Vec<u8>>,
    notify: Notify,
    config: Mutex<Vec<wire::ModuleConfig>>,
    charset: Vec<char>,
    /// When set, the mock swallows everything: no acks, no state.
    silent: bool,
    writes: AtomicUsize,
}

/// Mock implementation of [`SerialConnection`].
#[derive(Clone)]
pub struct MockSerial {
    inner: Arc<MockInner>,
}

impl MockSerial {
    /// A cooperative mock with `modules` modules, all blank.
    pub fn new(modules: usize) -> Self {
        Self::build(modules, false)
    }

    /// A mock that never responds; every write times out. Used to exercise
    /// the retry path.
    pub fn unresponsive(modules: usize) -> Self {
        Self::build(modules, true)
    }

    fn build(modules: usize, silent: bool) -> Self {
        Self {
            inner: Arc::new(MockInner {
                inbound: Mutex::new(Vec::new()),
                notify: Notify::new(),
                config: Mutex::new(vec![wire::ModuleConfig::default(); modules]),
                charset: AlphabetHandle::seeded().glyphs(),
                silent,
                writes: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of frames written to this port so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }
}

impl MockInner {
    fn push_frame(&self, message: &FromSplitflap) {
        let frame = codec::encode_frame(&message.encode_to_vec());
        self.inbound.lock().expect("mock lock poisoned").extend_from_slice(&frame);
        self.notify.notify_one();
    }

    fn push_ack(&self, nonce: u32) {
        self.push_frame(&FromSplitflap {
            payload: Some(from_splitflap::Payload::Ack(wire::Ack { nonce })),
        });
    }

    fn state_from_config(config: &[wire::ModuleConfig]) -> SplitflapState {
        SplitflapState {
            modules: config
                .iter()
                .map(|m| ModuleState {
                    state: ModuleStatus::Normal as i32,
                    flap_index: m.target_flap_index,
                    moving: false,
                })
                .collect(),
        }
    }

    fn handle_config(self: &Arc<Self>, config: SplitflapConfig) {
        *self.config.lock().expect("mock lock poisoned") = config.modules.clone();
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(STATE_DELAY).await;
            let state = Self::state_from_config(&config.modules);
            debug!(modules = state.modules.len(), "mock emitting state frame");
            inner.push_frame(&FromSplitflap {
                payload: Some(from_splitflap::Payload::SplitflapState(state)),
            });
        });
    }

    fn handle_request_state(self: &Arc<Self>) {
        let charset: Vec<u8> = self.charset.iter().map(|&c| c as u8).collect();
        self.push_frame(&FromSplitflap {
            payload: Some(from_splitflap::Payload::GeneralState(wire::GeneralState {
                flap_character_set: charset,
            })),
        });
        let state = Self::state_from_config(&self.config.lock().expect("mock lock poisoned"));
        self.push_frame(&FromSplitflap {
            payload: Some(from_splitflap::Payload::SplitflapState(state)),
        });
    }
}

impl SerialConnection for MockSerial {
    async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        if self.inner.silent {
            return Ok(());
        }

        // frames arrive delimited; strip the trailing zero before decoding
        let Some(frame) = bytes.strip_suffix(&[0]) else {
            warn!("mock received an undelimited write");
            return Ok(());
        };
        let Some(payload) = codec::decode_frame(frame) else {
            return Ok(());
        };
        let message = match wire::ToSplitflap::decode(payload.as_slice()) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "mock failed to decode outgoing message");
                return Ok(());
            }
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(ACK_DELAY).await;
            inner.push_ack(message.nonce);
            match message.payload {
                Some(to_splitflap::Payload::SplitflapConfig(config)) => {
                    inner.handle_config(config);
                }
                Some(to_splitflap::Payload::RequestState(_)) => {
                    inner.handle_request_state();
                }
                None => {}
            }
        });
        Ok(())
    }

    async fn read(&self) -> io::Result<Vec<u8>> {
        loop {
            {
                let mut inbound = self.inner.inbound.lock().expect("mock lock poisoned");
                if !inbound.is_empty() {
                    return Ok(std::mem::take(&mut *inbound));
                }
            }
            self.inner.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_inbound(bytes: &[u8]) -> Vec<FromSplitflap> {
        bytes
            .split(|&b| b == 0)
            .filter(|chunk| !chunk.is_empty())
            .filter_map(|chunk| codec::decode_frame(chunk))
            .map(|payload| FromSplitflap::decode(payload.as_slice()).unwrap())
            .collect()
    }

    fn config_frame(nonce: u32, targets: &[u32]) -> Vec<u8> {
        let message = wire::ToSplitflap {
            nonce,
            payload: Some(to_splitflap::Payload::SplitflapConfig(SplitflapConfig {
                modules: targets
                    .iter()
                    .map(|&t| wire::ModuleConfig {
                        target_flap_index: t,
                        movement_nonce: 0,
                        reset_nonce: 0,
                    })
                    .collect(),
            })),
        };
        codec::encode_frame(&message.encode_to_vec())
    }

    #[tokio::test]
    async fn test_config_write_is_acked_and_reflected() {
        let mock = MockSerial::new(3);
        mock.write(&config_frame(7, &[1, 2, 3])).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        let bytes = mock.read().await.unwrap();
        let messages = decode_inbound(&bytes);
        assert_eq!(messages.len(), 2);

        match &messages[0].payload {
            Some(from_splitflap::Payload::Ack(ack)) => assert_eq!(ack.nonce, 7),
            other => panic!("expected ack, got {other:?}"),
        }
        match &messages[1].payload {
            Some(from_splitflap::Payload::SplitflapState(state)) => {
                let targets: Vec<u32> = state.modules.iter().map(|m| m.flap_index).collect();
                assert_eq!(targets, vec![1, 2, 3]);
            }
            other => panic!("expected state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unresponsive_mock_stays_silent() {
        let mock = MockSerial::unresponsive(3);
        mock.write(&config_frame(1, &[1, 2, 3])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(mock.inner.inbound.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_garbage_write_is_ignored() {
        let mock = MockSerial::new(2);
        mock.write(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(mock.inner.inbound.lock().unwrap().is_empty());
    }
}
