//! Serial transport abstraction.
//!
//! The protocol engine is generic over [`SerialConnection`] so the same
//! driver runs against real hardware and the in-memory mock. The real
//! implementation wraps `tokio-serial` at the firmware's fixed line
//! settings (8N1, 230 400 baud by default).

use std::future::Future;
use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_serial::{DataBits, Parity, SerialStream, StopBits};
use tracing::info;

/// Default line speed of the splitflap firmware.
pub const DEFAULT_BAUD_RATE: u32 = 230_400;

/// A byte-duplex port.
///
/// `read` may block until data is available; a zero-length result means
/// idle, not end-of-stream. Implementations must be usable concurrently
/// from one reading task and one writing task.
pub trait SerialConnection: Send + Sync + 'static {
    fn write(&self, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    fn read(&self) -> impl Future<Output = io::Result<Vec<u8>>> + Send;

    fn close(&self) -> impl Future<Output = io::Result<()>> + Send {
        async { Ok(()) }
    }
}

/// Real serial port backed by `tokio-serial`.
pub struct SerialPort {
    reader: Mutex<ReadHalf<SerialStream>>,
    writer: Mutex<WriteHalf<SerialStream>>,
}

impl SerialPort {
    /// Open `port_name` at the default baud rate.
    pub fn open(port_name: &str) -> io::Result<Self> {
        Self::open_with_baud(port_name, DEFAULT_BAUD_RATE)
    }

    pub fn open_with_baud(port_name: &str, baud: u32) -> io::Result<Self> {
        let stream = tokio_serial::SerialStream::open(
            &tokio_serial::new(port_name, baud)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One),
        )
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        info!(port = port_name, baud, "serial port opened");

        let (reader, writer) = tokio::io::split(stream);
        Ok(Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        })
    }
}

impl SerialConnection for SerialPort {
    async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }

    async fn read(&self) -> io::Result<Vec<u8>> {
        let mut reader = self.reader.lock().await;
        let mut buf = [0u8; 256];
        let n = reader.read(&mut buf).await?;
        Ok(buf[..n].to_vec())
    }
}
