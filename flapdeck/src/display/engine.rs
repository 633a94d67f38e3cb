//! The composition engine: the single loop that owns what the display
//! shows.
//!
//! All display-buffer decisions happen on this task. It selects over five
//! event sources: rotation switches, direct messages (with lockout),
//! hardware state feedback, the provider sampling tick and the render tick.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{Client, Display, DisplayError};
use crate::alphabet::AlphabetHandle;
use crate::dashboard::{ActiveDashboard, DashboardMessage};
use crate::geometry::{arrange, invert_layout, right_pad, Size};
use crate::link::SerialConnection;
use crate::provider::{ProviderSet, ProviderValues};
use crate::routine::InitContext;

const ROTATION_CHANNEL_CAPACITY: usize = 4;
const DIRECT_CHANNEL_CAPACITY: usize = 16;
const STATE_CHANNEL_CAPACITY: usize = 16;

/// A directly-set text with an optional routine lockout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectCommand {
    pub text: String,
    /// Routine output is suppressed for this long. Zero clears any
    /// existing lockout.
    pub duration: Duration,
}

/// Handle for pushing direct messages into a running engine.
#[derive(Clone)]
pub struct DisplayHandle {
    direct_tx: mpsc::Sender<DirectCommand>,
}

impl DisplayHandle {
    /// Show `text` verbatim, suppressing routines for `duration`.
    pub async fn set(&self, text: impl Into<String>, duration: Duration) {
        let _ = self
            .direct_tx
            .send(DirectCommand {
                text: text.into(),
                duration,
            })
            .await;
    }
}

/// Capacity suited to the driver's state callback channel.
pub fn state_channel() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(STATE_CHANNEL_CAPACITY)
}

/// Merge routine messages into a display-shaped glyph buffer and apply
/// translations. Later messages overwrite earlier ones at conflicting
/// cells; nothing outside a message's declared rectangle is written.
pub fn compose(
    size: Size,
    messages: &[DashboardMessage],
    translations: &BTreeMap<char, char>,
) -> String {
    let mut buffer = vec![' '; size.area()];
    for tagged in messages {
        if tagged.message.text.chars().count() > tagged.size.area() {
            warn!(
                text = %tagged.message.text,
                width = tagged.size.width,
                height = tagged.size.height,
                "routine returned a message larger than its declared size"
            );
            continue;
        }
        let start = tagged.location.y * size.width + tagged.location.x;
        for (i, glyph) in tagged.message.text.chars().enumerate() {
            if start + i < buffer.len() {
                buffer[start + i] = glyph;
            }
        }
    }
    buffer
        .into_iter()
        .map(|glyph| translations.get(&glyph).copied().unwrap_or(glyph))
        .collect()
}

pub struct Engine<S: SerialConnection> {
    display: Display,
    client: Client<S>,
    providers: ProviderSet,
    alphabet: AlphabetHandle,
    active: Option<ActiveDashboard>,
    values: ProviderValues,
    lockout_until: Option<Instant>,
    subscriber: Option<mpsc::Sender<String>>,
    rotation_tx: mpsc::Sender<String>,
    rotation_rx: mpsc::Receiver<String>,
    direct_rx: mpsc::Receiver<DirectCommand>,
    state_rx: mpsc::Receiver<String>,
}

impl<S: SerialConnection> Engine<S> {
    /// Build an engine over a running driver's client. `state_rx` receives
    /// rendered state strings from the driver's state callback (see
    /// [`state_channel`]).
    pub fn new(
        display: Display,
        client: Client<S>,
        providers: ProviderSet,
        alphabet: AlphabetHandle,
        state_rx: mpsc::Receiver<String>,
    ) -> (Self, DisplayHandle) {
        let (rotation_tx, rotation_rx) = mpsc::channel(ROTATION_CHANNEL_CAPACITY);
        let (direct_tx, direct_rx) = mpsc::channel(DIRECT_CHANNEL_CAPACITY);

        let engine = Self {
            display,
            client,
            providers,
            alphabet,
            active: None,
            values: ProviderValues::new(),
            lockout_until: None,
            subscriber: None,
            rotation_tx,
            rotation_rx,
            direct_rx,
            state_rx,
        };
        (engine, DisplayHandle { direct_tx })
    }

    /// Register a state subscriber. Notifications never block the engine;
    /// a full subscriber misses updates.
    pub fn with_subscriber(mut self, subscriber: mpsc::Sender<String>) -> Self {
        self.subscriber = Some(subscriber);
        self
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut Display {
        &mut self.display
    }

    /// Initialize and activate a dashboard. The previous dashboard is
    /// deactivated first; on failure it stays cleared.
    pub fn activate_dashboard(&mut self, name: &str) -> Result<(), DisplayError> {
        self.deactivate_dashboard();

        let Some(dashboard) = self.display.dashboards.get(name) else {
            return Err(DisplayError::UnknownDashboard(name.to_string()));
        };

        let ctx = InitContext {
            alphabet: self.alphabet.clone(),
        };
        let active = dashboard.init(&ctx)?;

        for provider in dashboard.provider_names() {
            self.providers.set_active(&provider);
        }
        self.display.active_dashboard = name.to_string();
        self.active = Some(active);
        info!(dashboard = name, "dashboard activated");
        Ok(())
    }

    /// Deactivate the active dashboard, restoring background poll rates on
    /// its providers.
    pub fn deactivate_dashboard(&mut self) {
        if self.display.active_dashboard.is_empty() {
            return;
        }
        if let Some(dashboard) = self.display.dashboards.get(&self.display.active_dashboard) {
            for provider in dashboard.provider_names() {
                self.providers.set_background(&provider);
            }
        }
        self.display.active_dashboard.clear();
        self.active = None;
    }

    /// Start a rotation; it drives dashboard activation from here on. Any
    /// running rotation is stopped first.
    pub fn activate_rotation(&mut self, name: &str) -> Result<(), DisplayError> {
        match self.display.rotations.get(name) {
            None => return Err(DisplayError::UnknownRotation(name.to_string())),
            Some(rotation) if rotation.rotation.len() < 2 => {
                return Err(DisplayError::RotationTooShort);
            }
            Some(_) => {}
        }
        if !self.display.active_rotation.is_empty() {
            let previous = std::mem::take(&mut self.display.active_rotation);
            if let Some(rotation) = self.display.rotations.get_mut(&previous) {
                rotation.stop();
            }
        }
        self.deactivate_dashboard();

        let notifier = self.rotation_tx.clone();
        if let Some(rotation) = self.display.rotations.get_mut(name) {
            rotation.start(notifier);
        }
        self.display.active_rotation = name.to_string();
        info!(rotation = name, "dashboard rotation started");
        Ok(())
    }

    /// Stop the active rotation and blank the display. No-op when none is
    /// active.
    pub fn deactivate_rotation(&mut self) {
        if self.display.active_rotation.is_empty() {
            return;
        }
        let name = std::mem::take(&mut self.display.active_rotation);
        match self.display.rotations.get_mut(&name) {
            Some(rotation) => rotation.stop(),
            None => error!(rotation = %name, "active rotation missing from configuration"),
        }
        self.deactivate_dashboard();
        self.clear();
        info!(rotation = %name, "dashboard rotation stopped");
    }

    /// Send a full-display blank frame.
    pub fn clear(&mut self) {
        let blanks = " ".repeat(self.display.size.area());
        let out = arrange(&blanks, &self.display.layout);
        self.client.send(&out);
    }

    /// Run the event loop until cancelled.
    pub async fn run(mut self, cancel: CancellationToken) {
        let inv_layout = invert_layout(&self.display.layout);
        let poll = Duration::from_millis(self.display.poll_rate_ms);
        let mut provider_tick = tokio::time::interval_at(Instant::now() + poll, poll);
        let mut render_tick = tokio::time::interval_at(Instant::now() + poll, poll);
        provider_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            poll_rate_ms = self.display.poll_rate_ms,
            "composition engine started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.providers.stop_all();
                    self.client.driver().stop();
                    info!("composition engine stopped");
                    return;
                }

                Some(name) = self.rotation_rx.recv() => {
                    self.deactivate_dashboard();
                    self.clear();
                    if let Err(e) = self.activate_dashboard(&name) {
                        error!(dashboard = %name, error = %e, "rotation failed to activate dashboard");
                    }
                }

                Some(command) = self.direct_rx.recv() => {
                    self.lockout_until = Some(Instant::now() + command.duration);
                    let padded = right_pad(&command.text, self.display.size);
                    let out = arrange(&padded, &self.display.layout);
                    self.client.send(&out);
                }

                Some(state) = self.state_rx.recv() => {
                    let normalized = arrange(&state, &inv_layout);
                    info!(state = %normalized, "received state from display");
                    self.display.last_state = normalized.clone();
                    if let Some(subscriber) = &self.subscriber {
                        let _ = subscriber.try_send(normalized);
                    }
                }

                _ = provider_tick.tick() => {
                    self.values = self.providers.sample();
                }

                _ = render_tick.tick() => {
                    self.render();
                }
            }
        }
    }

    fn render(&mut self) {
        if let Some(until) = self.lockout_until {
            if Instant::now() < until {
                return;
            }
        }
        let Some(active) = &mut self.active else {
            return;
        };

        let messages = active.update(Utc::now(), &self.values);
        if messages.is_empty() {
            return;
        }

        let buffer = compose(self.display.size, &messages, &self.display.translations);
        let out = arrange(&buffer, &self.display.layout);
        self.client.send(&out);
    }
}
