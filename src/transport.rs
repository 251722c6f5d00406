//! Byte-stream transports beneath the frame codec.
//!
//! The engines talk to a [`SerialTransport`]: a minimal synchronous byte
//! pipe with a non-blocking availability probe. [`SerialPortTransport`]
//! adapts a real serial port; [`MockSerial`] provides an in-memory
//! crossed pair for tests and demos.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serialport::{DataBits, Parity, SerialPort, StopBits};

use crate::error::{ModbusError, ModbusResult};

/// Synchronous serial byte pipe used by both engines.
pub trait SerialTransport {
    /// Write the whole buffer to the line.
    fn write(&mut self, bytes: &[u8]) -> ModbusResult<()>;

    /// Read up to `max_len` currently-buffered bytes without blocking past
    /// the transport's own timeout.
    fn read(&mut self, max_len: usize) -> ModbusResult<Vec<u8>>;

    /// Number of received bytes waiting to be read.
    fn bytes_available(&self) -> usize;
}

/// Line parameters for a real serial port.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Transport over a physical (or OS-virtual) serial port.
pub struct SerialPortTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialPortTransport {
    pub fn open(path: &str, config: &SerialConfig) -> ModbusResult<Self> {
        let port = serialport::new(path, config.baud_rate)
            .data_bits(config.data_bits)
            .stop_bits(config.stop_bits)
            .parity(config.parity)
            .timeout(config.timeout)
            .open()
            .map_err(|e| ModbusError::io(format!("failed to open {}: {}", path, e)))?;
        log::info!("Opened serial port {} at {} baud", path, config.baud_rate);
        Ok(Self { port, path: path.to_string() })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl SerialTransport for SerialPortTransport {
    fn write(&mut self, bytes: &[u8]) -> ModbusResult<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn read(&mut self, max_len: usize) -> ModbusResult<Vec<u8>> {
        let available = self.bytes_available().min(max_len);
        if available == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; available];
        let n = self.port.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn bytes_available(&self) -> usize {
        self.port.bytes_to_read().unwrap_or(0) as usize
    }
}

/// One end of an in-memory serial link.
///
/// [`MockSerial::pair`] returns two crossed endpoints: bytes written on one
/// end become readable on the other, which is exactly what a loopback cable
/// between a master and a slave looks like.
#[derive(Clone)]
pub struct MockSerial {
    rx: Arc<Mutex<VecDeque<u8>>>,
    tx: Arc<Mutex<VecDeque<u8>>>,
}

impl MockSerial {
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Mutex::new(VecDeque::new()));
        let b_to_a = Arc::new(Mutex::new(VecDeque::new()));
        let a = Self { rx: b_to_a.clone(), tx: a_to_b.clone() };
        let b = Self { rx: a_to_b, tx: b_to_a };
        (a, b)
    }

    fn lock(queue: &Arc<Mutex<VecDeque<u8>>>) -> ModbusResult<std::sync::MutexGuard<'_, VecDeque<u8>>> {
        queue
            .lock()
            .map_err(|_| ModbusError::io("mock serial queue poisoned"))
    }

    /// Inject raw bytes into this end's receive queue, bypassing the peer.
    /// Lets tests feed hand-built or corrupted frames.
    pub fn inject_rx(&self, bytes: &[u8]) {
        if let Ok(mut rx) = self.rx.lock() {
            rx.extend(bytes.iter().copied());
        }
    }

    /// Drain everything this end has transmitted so far.
    pub fn drain_tx(&self) -> Vec<u8> {
        match self.tx.lock() {
            Ok(mut tx) => tx.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl SerialTransport for MockSerial {
    fn write(&mut self, bytes: &[u8]) -> ModbusResult<()> {
        let mut tx = Self::lock(&self.tx)?;
        tx.extend(bytes.iter().copied());
        Ok(())
    }

    fn read(&mut self, max_len: usize) -> ModbusResult<Vec<u8>> {
        let mut rx = Self::lock(&self.rx)?;
        let n = rx.len().min(max_len);
        Ok(rx.drain(..n).collect())
    }

    fn bytes_available(&self) -> usize {
        self.rx.lock().map(|rx| rx.len()).unwrap_or(0)
    }
}
