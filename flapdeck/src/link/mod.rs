//! Serial link to the display: framing, wire schema, transport, and the
//! protocol engine.

pub mod codec;
mod driver;
mod mock;
mod serial;
pub mod wire;

pub use driver::{
    Driver, DriverError, DriverHandle, ForceMovement, StateCallback, HOLD_POSITION,
    MAX_RETRANSMITS, RETRY_TIME,
};
pub use mock::MockSerial;
pub use serial::{SerialConnection, SerialPort, DEFAULT_BAUD_RATE};
