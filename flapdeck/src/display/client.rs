//! Deduplicating driver client.
//!
//! Sits between the composition engine and the protocol engine: consecutive
//! identical payloads are dropped so an unchanged frame never hits the wire.

use tracing::error;

use crate::link::{DriverHandle, ForceMovement, SerialConnection};

pub struct Client<S: SerialConnection> {
    driver: DriverHandle<S>,
    last_sent: String,
}

impl<S: SerialConnection> Client<S> {
    pub fn new(driver: DriverHandle<S>) -> Self {
        Self {
            driver,
            last_sent: String::new(),
        }
    }

    /// Forward a wire-ordered payload unless it matches the last one sent.
    pub fn send(&mut self, payload: &str) {
        if payload == self.last_sent {
            return;
        }
        match self
            .driver
            .set_text_with_movement(payload, ForceMovement::None)
        {
            Ok(()) => self.last_sent = payload.to_string(),
            Err(e) => error!(error = %e, "failed to send payload to display"),
        }
    }

    pub fn driver(&self) -> &DriverHandle<S> {
        &self.driver
    }
}
